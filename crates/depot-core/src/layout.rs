//! Repository path layouts.
//!
//! Templates use the Ivy pattern language: `[token]` is replaced by the token's
//! value and `( ... )` marks an optional group that disappears entirely when any
//! token inside it has no value. A token outside an optional group must resolve.

use std::collections::BTreeMap;

use crate::identity::ArtifactIdentity;
use crate::{Error, Result};

/// Conventional Maven 2 artifact layout.
pub const M2_ARTIFACT_PATTERN: &str =
    "[organisation]/[module]/[revision]/[artifact]-[revision](-[classifier]).[ext]";

/// Default Ivy artifact layout.
pub const IVY_ARTIFACT_PATTERN: &str =
    "[organisation]/[module]/[revision]/[type]s/[artifact]-[revision](-[classifier]).[ext]";

/// Default Ivy descriptor layout.
pub const IVY_DESCRIPTOR_PATTERN: &str = "[organisation]/[module]/ivy-[revision].xml";

/// Maven descriptors are always placed with this pattern. It is not configurable.
pub const MAVEN_DESCRIPTOR_PATTERN: &str = "[orgPath]/[module]/[revision]/[module]-[revision].pom";

/// Values available to a template.
#[derive(Debug, Clone, Default)]
pub struct TokenValues {
    values: BTreeMap<String, String>,
}

impl TokenValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token values for an identity.
    ///
    /// With `m2_compatible`, dots in the group become `/` for `[organisation]`.
    /// `[orgPath]` always uses the slashed form.
    pub fn for_identity(id: &ArtifactIdentity, m2_compatible: bool) -> Self {
        let org_path = id.group.replace('.', "/");
        let organisation = if m2_compatible {
            org_path.clone()
        } else {
            id.group.clone()
        };

        let mut tokens = Self::new()
            .with("organisation", organisation.clone())
            .with("organization", organisation)
            .with("orgPath", org_path)
            .with("module", id.module.clone())
            .with("revision", id.version.clone())
            .with("artifact", id.name.clone())
            .with("type", id.artifact_type.clone())
            .with("ext", id.ext().to_string());
        if let Some(conf) = &id.configuration {
            tokens.insert("conf", conf.clone());
        }
        if let Some(classifier) = &id.classifier {
            tokens.insert("classifier", classifier.clone());
        }
        tokens
    }

    pub fn with(mut self, token: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(token, value);
        self
    }

    /// Set a token. Extra named tokens are substituted like the built-in ones.
    pub fn insert(&mut self, token: impl Into<String>, value: impl Into<String>) {
        self.values.insert(token.into(), value.into());
    }

    /// A token's value, treating empty strings as absent.
    pub fn get(&self, token: &str) -> Option<&str> {
        self.values
            .get(token)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

/// Substitute `tokens` into `template`.
pub fn substitute(template: &str, tokens: &TokenValues) -> Result<String> {
    let fail = |message: String| Error::PathResolution {
        template: template.to_string(),
        message,
    };

    let mut out = String::with_capacity(template.len());
    // Text of the optional group being collected, and whether it is still complete.
    let mut optional: Option<(String, bool)> = None;
    let mut chars = template.chars();

    while let Some(c) = chars.next() {
        match c {
            '[' => {
                let mut token = String::new();
                loop {
                    match chars.next() {
                        Some(']') => break,
                        Some('[') | Some('(') | Some(')') | None => {
                            return Err(fail(format!("unterminated token '[{token}'")));
                        }
                        Some(ch) => token.push(ch),
                    }
                }
                if token.is_empty() {
                    return Err(fail("empty token '[]'".to_string()));
                }
                match (tokens.get(&token), optional.as_mut()) {
                    (Some(value), Some((group, _))) => group.push_str(value),
                    (None, Some((_, complete))) => *complete = false,
                    (Some(value), None) => out.push_str(value),
                    (None, None) => {
                        return Err(fail(format!("no value for required token '[{token}]'")));
                    }
                }
            }
            '(' => {
                if optional.is_some() {
                    return Err(fail("nested optional groups are not supported".to_string()));
                }
                optional = Some((String::new(), true));
            }
            ')' => match optional.take() {
                Some((group, true)) => out.push_str(&group),
                Some((_, false)) => {}
                None => return Err(fail("unbalanced ')'".to_string())),
            },
            ']' => return Err(fail("unbalanced ']'".to_string())),
            other => match optional.as_mut() {
                Some((group, _)) => group.push(other),
                None => out.push(other),
            },
        }
    }

    if optional.is_some() {
        return Err(fail("unterminated optional group".to_string()));
    }
    Ok(out)
}

/// Resolve the repository path for an artifact.
pub fn artifact_path(
    template: &str,
    id: &ArtifactIdentity,
    m2_compatible: bool,
    extra_tokens: &BTreeMap<String, String>,
) -> Result<String> {
    let mut tokens = TokenValues::for_identity(id, m2_compatible);
    for (token, value) in extra_tokens {
        tokens.insert(token.clone(), value.clone());
    }
    substitute(template, &tokens)
}

/// Resolve the fixed Maven descriptor path for a module.
pub fn maven_descriptor_path(group: &str, module: &str, version: &str) -> Result<String> {
    let id = ArtifactIdentity::new(group, module, version, "pom");
    substitute(MAVEN_DESCRIPTOR_PATTERN, &TokenValues::for_identity(&id, true))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str = "[orgPath]/[module]/[revision]/[module]-[revision](-[classifier]).[ext]";

    fn lib() -> ArtifactIdentity {
        ArtifactIdentity::new("com.acme", "lib", "1.0", "jar")
    }

    #[test]
    fn test_optional_classifier_absent() {
        let path = artifact_path(TEMPLATE, &lib(), true, &BTreeMap::new()).unwrap();
        assert_eq!(path, "com/acme/lib/1.0/lib-1.0.jar");
    }

    #[test]
    fn test_optional_classifier_present() {
        let id = lib().with_classifier("sources");
        let path = artifact_path(TEMPLATE, &id, true, &BTreeMap::new()).unwrap();
        assert_eq!(path, "com/acme/lib/1.0/lib-1.0-sources.jar");
    }

    #[test]
    fn test_m2_flag_controls_organisation() {
        let plain = artifact_path(M2_ARTIFACT_PATTERN, &lib(), false, &BTreeMap::new()).unwrap();
        assert_eq!(plain, "com.acme/lib/1.0/lib-1.0.jar");

        let m2 = artifact_path(M2_ARTIFACT_PATTERN, &lib(), true, &BTreeMap::new()).unwrap();
        assert_eq!(m2, "com/acme/lib/1.0/lib-1.0.jar");
    }

    #[test]
    fn test_ivy_layout_uses_type_and_extension() {
        let id = lib().with_extension("zip").with_classifier("dist");
        let path = artifact_path(IVY_ARTIFACT_PATTERN, &id, false, &BTreeMap::new()).unwrap();
        assert_eq!(path, "com.acme/lib/1.0/jars/lib-1.0-dist.zip");
    }

    #[test]
    fn test_extra_tokens() {
        let mut extra = BTreeMap::new();
        extra.insert("branch".to_string(), "main".to_string());
        let template = "[orgPath]/[module]/[branch]/[revision]/[artifact](-[flavor]).[ext]";
        let path = artifact_path(template, &lib(), true, &extra).unwrap();
        assert_eq!(path, "com/acme/lib/main/1.0/lib.jar");
    }

    #[test]
    fn test_missing_required_token() {
        let result = artifact_path("[orgPath]/[conf]/[artifact]", &lib(), true, &BTreeMap::new());
        match result {
            Err(Error::PathResolution { message, .. }) => assert!(message.contains("[conf]")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_configuration_token() {
        let id = lib().with_configuration("archives");
        let path = artifact_path("[conf]/[artifact].[ext]", &id, true, &BTreeMap::new()).unwrap();
        assert_eq!(path, "archives/lib.jar");
    }

    #[test]
    fn test_malformed_templates() {
        let tokens = TokenValues::for_identity(&lib(), true);
        assert!(substitute("[module", &tokens).is_err());
        assert!(substitute("[module]/(x", &tokens).is_err());
        assert!(substitute("[module])", &tokens).is_err());
        assert!(substitute("((-[classifier]))", &tokens).is_err());
        assert!(substitute("[]", &tokens).is_err());
    }

    #[test]
    fn test_maven_descriptor_ignores_m2_flag() {
        let path = maven_descriptor_path("com.acme", "lib", "1.0").unwrap();
        assert_eq!(path, "com/acme/lib/1.0/lib-1.0.pom");
    }
}
