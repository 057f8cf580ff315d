//! Artifact identities and the wildcard specs that select them.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// The declared identity of one produced file, independent of where it lives on disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactIdentity {
    /// Organization / group id (e.g. `com.acme`).
    pub group: String,
    /// Owning module (project) name.
    pub module: String,
    /// Artifact name.
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifier: Option<String>,
    /// Artifact type (e.g. `jar`, `pom`, `ivy`).
    #[serde(rename = "type")]
    pub artifact_type: String,
    /// File extension; falls back to the type when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
    /// Configuration that produced the artifact (e.g. `archives`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<String>,
}

impl ArtifactIdentity {
    /// Create an identity whose module and artifact names are the same.
    pub fn new(
        group: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
        artifact_type: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Self {
            group: group.into(),
            module: name.clone(),
            name,
            version: version.into(),
            classifier: None,
            artifact_type: artifact_type.into(),
            extension: None,
            configuration: None,
        }
    }

    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = module.into();
        self
    }

    pub fn with_classifier(mut self, classifier: impl Into<String>) -> Self {
        self.classifier = Some(classifier.into()).filter(|c: &String| !c.is_empty());
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    pub fn with_configuration(mut self, configuration: impl Into<String>) -> Self {
        self.configuration = Some(configuration.into());
        self
    }

    /// The extension used for the `[ext]` token.
    pub fn ext(&self) -> &str {
        self.extension.as_deref().unwrap_or(&self.artifact_type)
    }

    /// Module coordinates as `group:module:version`.
    pub fn module_id(&self) -> String {
        format!("{}:{}:{}", self.group, self.module, self.version)
    }
}

impl std::fmt::Display for ArtifactIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.name, self.version)?;
        if let Some(classifier) = &self.classifier {
            write!(f, ":{classifier}")?;
        }
        write!(f, "@{}", self.ext())
    }
}

/// Wildcard matcher over identity fields.
///
/// A field that is empty or `*` matches anything; any other value must match exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSpec {
    pub configuration: String,
    pub group: String,
    pub name: String,
    pub version: String,
    pub classifier: String,
    /// Matched against the file extension, so `@xml` selects an Ivy descriptor.
    #[serde(rename = "type")]
    pub artifact_type: String,
}

const WILDCARD: &str = "*";

fn field_matches(pattern: &str, value: Option<&str>) -> bool {
    if pattern.is_empty() || pattern == WILDCARD {
        return true;
    }
    value == Some(pattern)
}

impl ArtifactSpec {
    /// A spec that matches every artifact.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn matches(&self, id: &ArtifactIdentity) -> bool {
        field_matches(&self.configuration, id.configuration.as_deref())
            && field_matches(&self.group, Some(&id.group))
            && field_matches(&self.name, Some(&id.name))
            && field_matches(&self.version, Some(&id.version))
            && field_matches(&self.classifier, id.classifier.as_deref())
            && field_matches(&self.artifact_type, Some(id.ext()))
    }
}

impl std::str::FromStr for ArtifactSpec {
    type Err = Error;

    /// Parse `[configuration ]group:name:version[:classifier][@type]`.
    ///
    /// Fields left out at the end are wildcards.
    fn from_str(notation: &str) -> Result<Self> {
        let notation = notation.trim();
        if notation.is_empty() {
            return Err(Error::PropertyResolution("empty artifact spec".to_string()));
        }

        let (configuration, coordinates) = match notation.split_once(char::is_whitespace) {
            Some((conf, rest)) => (conf.to_string(), rest.trim()),
            None => (String::new(), notation),
        };
        if coordinates.contains(char::is_whitespace) {
            return Err(Error::PropertyResolution(format!(
                "unexpected whitespace in '{notation}'"
            )));
        }

        let (coordinates, artifact_type) = match coordinates.split_once('@') {
            Some((_, "")) => {
                return Err(Error::PropertyResolution(format!(
                    "missing type after '@' in '{notation}'"
                )));
            }
            Some((coords, ty)) => (coords, ty.to_string()),
            None => (coordinates, String::new()),
        };

        let fields: Vec<&str> = coordinates.split(':').collect();
        if fields.len() > 4 {
            return Err(Error::PropertyResolution(format!(
                "too many coordinates in '{notation}' (expected group:name:version[:classifier])"
            )));
        }
        let field = |i: usize| fields.get(i).map(|s| s.to_string()).unwrap_or_default();

        Ok(Self {
            configuration,
            group: field(0),
            name: field(1),
            version: field(2),
            classifier: field(3),
            artifact_type,
        })
    }
}

/// Properties attached to every artifact a spec matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertySpec {
    pub spec: ArtifactSpec,
    /// Ordered entries; a key may repeat.
    pub properties: Vec<(String, String)>,
}

/// Ordered collection of property specs. Declaration order is significant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertySpecs {
    specs: Vec<PropertySpec>,
}

impl PropertySpecs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, spec: ArtifactSpec, properties: Vec<(String, String)>) {
        self.specs.push(PropertySpec { spec, properties });
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PropertySpec> {
        self.specs.iter()
    }

    /// Entries of every matching spec, in declaration order.
    pub fn matching<'a>(
        &'a self,
        id: &'a ArtifactIdentity,
    ) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.specs
            .iter()
            .filter(move |s| s.spec.matches(id))
            .flat_map(|s| s.properties.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jar() -> ArtifactIdentity {
        ArtifactIdentity::new("com.acme", "lib", "1.0", "jar").with_configuration("archives")
    }

    #[test]
    fn test_wildcard_spec_matches_everything() {
        assert!(ArtifactSpec::any().matches(&jar()));
        assert!(ArtifactSpec::any().matches(&jar().with_classifier("sources")));
    }

    #[test]
    fn test_exact_fields_are_case_sensitive() {
        let spec: ArtifactSpec = "com.acme:lib:1.0".parse().unwrap();
        assert!(spec.matches(&jar()));

        let spec: ArtifactSpec = "com.Acme:lib:1.0".parse().unwrap();
        assert!(!spec.matches(&jar()));
    }

    #[test]
    fn test_classifier_spec_needs_a_classifier() {
        let spec: ArtifactSpec = "*:*:*:sources".parse().unwrap();
        assert!(!spec.matches(&jar()));
        assert!(spec.matches(&jar().with_classifier("sources")));
    }

    #[test]
    fn test_configuration_and_type() {
        let spec: ArtifactSpec = "archives com.acme:*:*:*@jar".parse().unwrap();
        assert_eq!(spec.configuration, "archives");
        assert_eq!(spec.group, "com.acme");
        assert_eq!(spec.artifact_type, "jar");
        assert!(spec.matches(&jar()));

        let spec: ArtifactSpec = "published com.acme:*:*".parse().unwrap();
        assert!(!spec.matches(&jar()));
    }

    #[test]
    fn test_type_matches_extension() {
        let ivy = ArtifactIdentity::new("com.acme", "ivy", "1.0", "ivy").with_extension("xml");
        let spec: ArtifactSpec = "com.acme:*:*@xml".parse().unwrap();
        assert!(spec.matches(&ivy));
        let spec: ArtifactSpec = "com.acme:*:*@ivy".parse().unwrap();
        assert!(!spec.matches(&ivy));

        let sources = jar().with_classifier("sources");
        let spec: ArtifactSpec = "com.acme:lib:*:sources@jar".parse().unwrap();
        assert!(spec.matches(&sources));
    }

    #[test]
    fn test_matching_is_deterministic() {
        let spec: ArtifactSpec = "com.acme:lib:*@jar".parse().unwrap();
        let id = jar();
        let first = spec.matches(&id);
        for _ in 0..10 {
            assert_eq!(spec.matches(&id), first);
        }
    }

    #[test]
    fn test_malformed_notation() {
        assert!(matches!(
            "".parse::<ArtifactSpec>(),
            Err(Error::PropertyResolution(_))
        ));
        assert!("a:b:c:d:e".parse::<ArtifactSpec>().is_err());
        assert!("com.acme:lib@".parse::<ArtifactSpec>().is_err());
        assert!("archives com.acme:lib extra".parse::<ArtifactSpec>().is_err());
    }

    #[test]
    fn test_display_includes_classifier_and_extension() {
        let id = jar().with_classifier("sources");
        assert_eq!(id.to_string(), "com.acme:lib:1.0:sources@jar");
        assert_eq!(id.module_id(), "com.acme:lib:1.0");
    }
}
