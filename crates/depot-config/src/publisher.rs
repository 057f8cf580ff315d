//! Publisher configuration parsing.

use crate::{ConfigError, ConfigResult, VariableContext};
use chrono::{DateTime, Utc};
use depot_core::buildinfo::BuildMetadata;
use depot_core::checksum::ChecksumAlgorithm;
use depot_core::client::ProxyConfig;
use depot_core::filter::{IncludeExcludePatterns, split_patterns};
use depot_core::identity::{ArtifactSpec, PropertySpecs};
use depot_core::layout::{IVY_DESCRIPTOR_PATTERN, M2_ARTIFACT_PATTERN};
use depot_core::properties::PropertyResolver;
use kdl::{KdlDocument, KdlNode};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Where the build-info document is written when no `export` node is given.
pub const DEFAULT_EXPORT_PATH: &str = "build/build-info.json";

/// Environment variables never recorded unless an explicit `env-exclude` is set.
pub const DEFAULT_ENV_EXCLUDE: &str = "*PASSWORD*, *SECRET*, *TOKEN*, *KEY*";

/// Prefix of environment variables recorded in the build-info document.
pub const ENV_PROPERTY_PREFIX: &str = "buildInfo.env.";

/// A fully validated depot configuration.
#[derive(Debug, Clone)]
pub struct DepotConfig {
    pub publisher: PublisherSettings,
    pub build: BuildSettings,
    pub properties: PropertySettings,
    pub proxy: Option<ProxyConfig>,
    pub export_path: PathBuf,
}

/// Settings of the `publisher` node.
#[derive(Debug, Clone)]
pub struct PublisherSettings {
    pub context_url: Option<Url>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Default target repository.
    pub repository: String,
    pub artifact_pattern: String,
    pub ivy_pattern: String,
    pub m2_compatible: bool,
    pub publish_artifacts: bool,
    pub publish_build_info: bool,
    pub publish_pom: bool,
    pub publish_ivy: bool,
    pub patterns: IncludeExcludePatterns,
    /// Digests computed in addition to MD5 and SHA1.
    pub checksums: Vec<ChecksumAlgorithm>,
    /// Extra `[token]` values available to path templates.
    pub layout_tokens: BTreeMap<String, String>,
    /// Run deadline, checked between dispatches. In-flight calls are left to finish.
    pub timeout: Duration,
    /// Bound on a single remote call.
    pub io_timeout: Duration,
    pub retries: u32,
    pub concurrency: usize,
}

/// Settings of the `build` node.
#[derive(Debug, Clone)]
pub struct BuildSettings {
    pub name: String,
    pub number: String,
    pub started: DateTime<Utc>,
    pub url: Option<String>,
    pub vcs_revision: Option<String>,
    pub vcs_url: Option<String>,
    /// Seed `build.name`, `build.number` and `build.timestamp` into every artifact's properties.
    pub build_properties: bool,
    /// Environment variables selected by `env-include`/`env-exclude`, already prefixed.
    pub env_properties: BTreeMap<String, String>,
}

/// Contents of the `properties` node.
#[derive(Debug, Clone, Default)]
pub struct PropertySettings {
    /// Ordered global entries; keys may repeat.
    pub global: Vec<(String, String)>,
    pub specs: PropertySpecs,
}

impl DepotConfig {
    /// Global properties with the build parameters seeded first when enabled.
    pub fn global_properties(&self) -> Vec<(String, String)> {
        let mut global = Vec::with_capacity(self.properties.global.len() + 3);
        if self.build.build_properties {
            global.push(("build.name".to_string(), self.build.name.clone()));
            global.push(("build.number".to_string(), self.build.number.clone()));
            global.push((
                "build.timestamp".to_string(),
                self.build.started.timestamp_millis().to_string(),
            ));
        }
        global.extend(self.properties.global.iter().cloned());
        global
    }

    /// Resolver with the global properties merged once.
    pub fn property_resolver(&self) -> PropertyResolver {
        let global = self.global_properties();
        PropertyResolver::new(
            global.iter().map(|(k, v)| (k.as_str(), v.as_str())),
            self.properties.specs.clone(),
        )
    }

    pub fn build_metadata(&self) -> BuildMetadata {
        let mut build = BuildMetadata::new(&self.build.name, &self.build.number, self.build.started);
        build.url = self.build.url.clone();
        build.vcs_revision = self.build.vcs_revision.clone();
        build.vcs_url = self.build.vcs_url.clone();
        build.properties = self.build.env_properties.clone();
        build
    }

    /// Turn off both remote publication flags.
    pub fn disable_remote(&mut self) {
        self.publisher.publish_artifacts = false;
        self.publisher.publish_build_info = false;
    }

    pub fn remote_enabled(&self) -> bool {
        self.publisher.publish_artifacts || self.publisher.publish_build_info
    }
}

/// Read and parse a configuration file.
pub fn load_config(path: &Path, ctx: &VariableContext) -> ConfigResult<DepotConfig> {
    let text = std::fs::read_to_string(path)?;
    parse_config(&text, ctx)
}

/// Parse a configuration from KDL text.
///
/// String values are interpolated with `ctx` once the build name and number are known.
pub fn parse_config(kdl: &str, ctx: &VariableContext) -> ConfigResult<DepotConfig> {
    let doc: KdlDocument = kdl.parse()?;

    let build_node = single_node(&doc, "build")?
        .ok_or_else(|| ConfigError::MissingField("build".to_string()))?;
    let publisher_node = single_node(&doc, "publisher")?
        .ok_or_else(|| ConfigError::MissingField("publisher".to_string()))?;

    let mut ctx = ctx.clone();
    let name = Some(ctx.build.name.clone())
        .filter(|n| !n.is_empty())
        .or_else(|| get_string_prop(build_node, "name").map(|n| ctx.interpolate(&n)))
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ConfigError::MissingField("build name".to_string()))?;
    let number = Some(ctx.build.number.clone())
        .filter(|n| !n.is_empty())
        .or_else(|| get_string_prop(build_node, "number").map(|n| ctx.interpolate(&n)))
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ConfigError::MissingField("build number".to_string()))?;
    let started = ctx.build.started.unwrap_or_else(Utc::now);
    ctx.build.name = name.clone();
    ctx.build.number = number.clone();
    ctx.build.started = Some(started);

    let build = parse_build(build_node, name, number, started, &ctx)?;
    let publisher = parse_publisher(publisher_node, &ctx)?;

    let mut properties = PropertySettings::default();
    let mut proxy = None;
    let mut export_path = PathBuf::from(DEFAULT_EXPORT_PATH);

    for node in doc.nodes() {
        match node.name().value() {
            "properties" => parse_properties(node, &ctx, &mut properties)?,
            "proxy" => {
                if proxy.is_some() {
                    return Err(ConfigError::Duplicate("proxy".to_string()));
                }
                proxy = Some(parse_proxy(node, &ctx)?);
            }
            "export" => {
                let path = string_arg(node, &ctx)
                    .ok_or_else(|| ConfigError::MissingField("export path".to_string()))?;
                export_path = PathBuf::from(path);
            }
            _ => {} // publisher and build are handled above; unknown nodes are ignored
        }
    }

    Ok(DepotConfig {
        publisher,
        build,
        properties,
        proxy,
        export_path,
    })
}

fn single_node<'a>(doc: &'a KdlDocument, name: &str) -> ConfigResult<Option<&'a KdlNode>> {
    let mut found = doc.nodes().iter().filter(|n| n.name().value() == name);
    let first = found.next();
    if found.next().is_some() {
        return Err(ConfigError::Duplicate(name.to_string()));
    }
    Ok(first)
}

fn parse_publisher(node: &KdlNode, ctx: &VariableContext) -> ConfigResult<PublisherSettings> {
    let mut context_url = None;
    let mut username = None;
    let mut password = None;
    let mut repository = String::new();
    let mut artifact_pattern = M2_ARTIFACT_PATTERN.to_string();
    let mut ivy_pattern = IVY_DESCRIPTOR_PATTERN.to_string();
    let mut m2_compatible = true;
    let mut publish_artifacts = true;
    let mut publish_build_info = true;
    let mut publish_pom = true;
    let mut publish_ivy = false;
    let mut includes = Vec::new();
    let mut excludes = Vec::new();
    let mut checksums = Vec::new();
    let mut layout_tokens = BTreeMap::new();
    let mut timeout_secs = 300;
    let mut io_timeout_secs = 60;
    let mut retries = 0;
    let mut concurrency = 4;

    if let Some(children) = node.children() {
        for child in children.nodes() {
            let field = child.name().value();
            match field {
                "context-url" => {
                    let raw = required_string(child, ctx)?;
                    let url = Url::parse(&raw).map_err(|e| ConfigError::InvalidValue {
                        field: field.to_string(),
                        message: e.to_string(),
                    })?;
                    context_url = Some(url);
                }
                "username" => username = string_arg(child, ctx),
                "password" => password = string_arg(child, ctx),
                "repository" => repository = required_string(child, ctx)?,
                "artifact-pattern" => artifact_pattern = required_string(child, ctx)?,
                "ivy-pattern" => ivy_pattern = required_string(child, ctx)?,
                "m2-compatible" => m2_compatible = required_bool(child)?,
                "publish-artifacts" => publish_artifacts = required_bool(child)?,
                "publish-build-info" => publish_build_info = required_bool(child)?,
                "publish-pom" => publish_pom = required_bool(child)?,
                "publish-ivy" => publish_ivy = required_bool(child)?,
                "include" => {
                    for list in get_all_string_args(child) {
                        includes.extend(split_patterns(&ctx.interpolate(&list)));
                    }
                }
                "exclude" => {
                    for list in get_all_string_args(child) {
                        excludes.extend(split_patterns(&ctx.interpolate(&list)));
                    }
                }
                "checksums" => {
                    for name in get_all_string_args(child) {
                        let algorithm = name.parse::<ChecksumAlgorithm>().map_err(|message| {
                            ConfigError::InvalidValue {
                                field: field.to_string(),
                                message,
                            }
                        })?;
                        checksums.push(algorithm);
                    }
                }
                "layout-token" => {
                    let args = get_all_string_args(child);
                    let [token, value] = args.as_slice() else {
                        return Err(ConfigError::InvalidValue {
                            field: field.to_string(),
                            message: "expected a token name and a value".to_string(),
                        });
                    };
                    layout_tokens.insert(token.clone(), ctx.interpolate(value));
                }
                "timeout-secs" => timeout_secs = required_int(child)?,
                "io-timeout-secs" => io_timeout_secs = required_int(child)?,
                "retries" => retries = required_int(child)?,
                "concurrency" => concurrency = required_int(child)?,
                _ => {}
            }
        }
    }

    if repository.is_empty() {
        return Err(ConfigError::MissingField("publisher repository".to_string()));
    }
    if (publish_artifacts || publish_build_info) && context_url.is_none() {
        return Err(ConfigError::MissingField("publisher context-url".to_string()));
    }
    if concurrency == 0 {
        return Err(ConfigError::InvalidValue {
            field: "concurrency".to_string(),
            message: "must be at least 1".to_string(),
        });
    }
    if timeout_secs == 0 || io_timeout_secs == 0 {
        return Err(ConfigError::InvalidValue {
            field: "timeout-secs".to_string(),
            message: "timeouts must be positive".to_string(),
        });
    }

    Ok(PublisherSettings {
        context_url,
        username,
        password,
        repository,
        artifact_pattern,
        ivy_pattern,
        m2_compatible,
        publish_artifacts,
        publish_build_info,
        publish_pom,
        publish_ivy,
        patterns: IncludeExcludePatterns::new(includes, excludes)?,
        checksums,
        layout_tokens,
        timeout: Duration::from_secs(timeout_secs),
        io_timeout: Duration::from_secs(io_timeout_secs),
        retries: u32::try_from(retries).map_err(|_| invalid_int("retries", retries))?,
        concurrency: usize::try_from(concurrency)
            .map_err(|_| invalid_int("concurrency", concurrency))?,
    })
}

fn parse_build(
    node: &KdlNode,
    name: String,
    number: String,
    started: DateTime<Utc>,
    ctx: &VariableContext,
) -> ConfigResult<BuildSettings> {
    let mut url = None;
    let mut vcs_revision = None;
    let mut vcs_url = None;
    let mut build_properties = true;
    let mut env_include = Vec::new();
    let mut env_exclude = Vec::new();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "url" => url = string_arg(child, ctx),
                "vcs-revision" => vcs_revision = string_arg(child, ctx),
                "vcs-url" => vcs_url = string_arg(child, ctx),
                "build-properties" => build_properties = required_bool(child)?,
                "env-include" => {
                    for list in get_all_string_args(child) {
                        env_include.extend(split_patterns(&list));
                    }
                }
                "env-exclude" => {
                    for list in get_all_string_args(child) {
                        env_exclude.extend(split_patterns(&list));
                    }
                }
                _ => {}
            }
        }
    }

    let vcs_revision = vcs_revision
        .filter(|r| !r.is_empty())
        .or_else(|| Some(ctx.git.sha.clone()).filter(|s| !s.is_empty()));

    let mut env_properties = BTreeMap::new();
    if !env_include.is_empty() {
        if env_exclude.is_empty() {
            env_exclude = split_patterns(DEFAULT_ENV_EXCLUDE);
        }
        let patterns = IncludeExcludePatterns::new(env_include, env_exclude)?;
        for (key, value) in &ctx.env {
            if patterns.eligible(key) {
                env_properties.insert(format!("{ENV_PROPERTY_PREFIX}{key}"), value.clone());
            }
        }
    }

    Ok(BuildSettings {
        name,
        number,
        started,
        url,
        vcs_revision,
        vcs_url,
        build_properties,
        env_properties,
    })
}

fn parse_properties(
    node: &KdlNode,
    ctx: &VariableContext,
    settings: &mut PropertySettings,
) -> ConfigResult<()> {
    let Some(children) = node.children() else {
        return Ok(());
    };
    for child in children.nodes() {
        match child.name().value() {
            "prop" => settings.global.push(parse_prop(child, ctx)?),
            "spec" => {
                let notation = get_first_string_arg(child)
                    .ok_or_else(|| ConfigError::MissingField("spec notation".to_string()))?;
                let spec: ArtifactSpec = notation.parse()?;
                let mut entries = Vec::new();
                if let Some(grandchildren) = child.children() {
                    for gc in grandchildren.nodes() {
                        if gc.name().value() == "prop" {
                            entries.push(parse_prop(gc, ctx)?);
                        }
                    }
                }
                settings.specs.push(spec, entries);
            }
            other => {
                return Err(ConfigError::InvalidValue {
                    field: "properties".to_string(),
                    message: format!("unexpected node '{other}'"),
                });
            }
        }
    }
    Ok(())
}

fn parse_prop(node: &KdlNode, ctx: &VariableContext) -> ConfigResult<(String, String)> {
    match get_all_string_args(node).as_slice() {
        [key, value] if !key.is_empty() => Ok((key.clone(), ctx.interpolate(value))),
        _ => Err(ConfigError::InvalidValue {
            field: "prop".to_string(),
            message: "expected a key and a value".to_string(),
        }),
    }
}

fn parse_proxy(node: &KdlNode, ctx: &VariableContext) -> ConfigResult<ProxyConfig> {
    let host = get_string_prop(node, "host")
        .map(|h| ctx.interpolate(&h))
        .filter(|h| !h.is_empty())
        .ok_or_else(|| ConfigError::MissingField("proxy host".to_string()))?;
    let port = node
        .get("port")
        .and_then(|v| v.as_integer())
        .ok_or_else(|| ConfigError::MissingField("proxy port".to_string()))?;
    let port = u16::try_from(port)
        .ok()
        .filter(|p| *p > 0)
        .ok_or_else(|| invalid_int("proxy port", port))?;

    Ok(ProxyConfig {
        host,
        port,
        username: get_string_prop(node, "username").map(|u| ctx.interpolate(&u)),
        password: get_string_prop(node, "password").map(|p| ctx.interpolate(&p)),
    })
}

fn invalid_int(field: &str, value: impl std::fmt::Display) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: format!("out of range: {value}"),
    }
}

// Helper functions for extracting values from KDL nodes

fn string_arg(node: &KdlNode, ctx: &VariableContext) -> Option<String> {
    get_first_string_arg(node).map(|s| ctx.interpolate(&s))
}

fn required_string(node: &KdlNode, ctx: &VariableContext) -> ConfigResult<String> {
    string_arg(node, ctx)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ConfigError::MissingField(node.name().value().to_string()))
}

fn required_bool(node: &KdlNode) -> ConfigResult<bool> {
    first_arg(node)
        .and_then(|v| v.as_bool())
        .ok_or_else(|| ConfigError::InvalidValue {
            field: node.name().value().to_string(),
            message: "expected #true or #false".to_string(),
        })
}

fn required_int(node: &KdlNode) -> ConfigResult<u64> {
    let field = node.name().value();
    let value = first_arg(node)
        .and_then(|v| v.as_integer())
        .ok_or_else(|| ConfigError::InvalidValue {
            field: field.to_string(),
            message: "expected an integer".to_string(),
        })?;
    u64::try_from(value).map_err(|_| invalid_int(field, value))
}

fn first_arg(node: &KdlNode) -> Option<&kdl::KdlValue> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .map(|e| e.value())
}

fn get_first_string_arg(node: &KdlNode) -> Option<String> {
    first_arg(node)
        .and_then(|v| v.as_string())
        .map(|s| s.to_string())
}

fn get_all_string_args(node: &KdlNode) -> Vec<String> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .filter_map(|e| e.value().as_string())
        .map(|s| s.to_string())
        .collect()
}

fn get_string_prop(node: &KdlNode, name: &str) -> Option<String> {
    node.get(name)
        .and_then(|v| v.as_string())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VariableContextBuilder;
    use chrono::TimeZone;
    use depot_core::identity::ArtifactIdentity;

    const FULL: &str = r#"
        publisher {
            context-url "https://repo.example.com/artifactory"
            username "deployer"
            password "${env.DEPOT_PASSWORD}"
            repository "libs-release-local"
            m2-compatible #true
            publish-ivy #false
            include "com/acme/**"
            exclude "**/*-tests.jar, **/internal/**"
            timeout-secs 120
            retries 2
            concurrency 8
            checksums "sha-256"
            layout-token "stream" "${build.name}"
        }
        build name="acme-lib" number="42" {
            url "https://ci.example.com/job/${build.number}"
            vcs-revision "${env.GIT_COMMIT}"
            env-include "CI_*"
        }
        properties {
            prop "team" "platform"
            prop "release" "${build.name}-${build.number}"
            spec "archives com.acme:*:*:*@jar" {
                prop "quality" "gold"
            }
        }
        proxy host="proxy.internal" port=3128 username="u" password="p"
        export "out/build-info.json"
    "#;

    fn started() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap()
    }

    fn ctx() -> VariableContext {
        VariableContextBuilder::new()
            .with_env("DEPOT_PASSWORD", "hunter2")
            .with_env("GIT_COMMIT", "abc123")
            .with_env("CI_JOB", "build")
            .with_env("CI_TOKEN", "secret")
            .with_env("HOME", "/root")
            .with_build_started(started())
            .build()
    }

    const MINIMAL: &str = r#"
        publisher {
            context-url "https://repo.example.com/artifactory"
            repository "libs"
        }
        build name="acme-lib" number="1"
    "#;

    #[test]
    fn test_parse_full_config() {
        let config = parse_config(FULL, &ctx()).unwrap();

        let publisher = &config.publisher;
        assert_eq!(
            publisher.context_url.as_ref().map(Url::as_str),
            Some("https://repo.example.com/artifactory")
        );
        assert_eq!(publisher.password.as_deref(), Some("hunter2"));
        assert_eq!(publisher.repository, "libs-release-local");
        assert_eq!(publisher.patterns.includes(), ["com/acme/**"]);
        assert_eq!(publisher.patterns.excludes(), ["**/*-tests.jar", "**/internal/**"]);
        assert_eq!(publisher.timeout, Duration::from_secs(120));
        assert_eq!(publisher.io_timeout, Duration::from_secs(60));
        assert_eq!(publisher.retries, 2);
        assert_eq!(publisher.concurrency, 8);
        assert_eq!(publisher.checksums, vec![ChecksumAlgorithm::Sha256]);
        assert_eq!(publisher.layout_tokens["stream"], "acme-lib");

        assert_eq!(config.build.url.as_deref(), Some("https://ci.example.com/job/42"));
        assert_eq!(config.build.vcs_revision.as_deref(), Some("abc123"));
        assert_eq!(config.export_path, PathBuf::from("out/build-info.json"));

        let proxy = config.proxy.as_ref().unwrap();
        assert_eq!(proxy.host, "proxy.internal");
        assert_eq!(proxy.port, 3128);
    }

    #[test]
    fn test_defaults() {
        let config = parse_config(MINIMAL, &ctx()).unwrap();
        let publisher = &config.publisher;

        assert_eq!(publisher.artifact_pattern, M2_ARTIFACT_PATTERN);
        assert_eq!(publisher.ivy_pattern, IVY_DESCRIPTOR_PATTERN);
        assert!(publisher.m2_compatible);
        assert!(publisher.publish_artifacts);
        assert!(publisher.publish_build_info);
        assert!(publisher.publish_pom);
        assert!(!publisher.publish_ivy);
        assert!(publisher.patterns.is_empty());
        assert_eq!(publisher.timeout, Duration::from_secs(300));
        assert_eq!(publisher.retries, 0);
        assert_eq!(publisher.concurrency, 4);
        assert!(publisher.checksums.is_empty());
        assert!(publisher.layout_tokens.is_empty());
        assert_eq!(config.export_path, PathBuf::from(DEFAULT_EXPORT_PATH));
        assert!(config.proxy.is_none());
        assert!(config.build.build_properties);
        assert!(config.build.env_properties.is_empty());
    }

    #[test]
    fn test_property_values_are_interpolated_at_load() {
        let config = parse_config(FULL, &ctx()).unwrap();
        assert_eq!(
            config.properties.global,
            vec![
                ("team".to_string(), "platform".to_string()),
                ("release".to_string(), "acme-lib-42".to_string()),
            ]
        );
        assert_eq!(config.properties.specs.len(), 1);
    }

    #[test]
    fn test_build_properties_seeded_first() {
        let config = parse_config(FULL, &ctx()).unwrap();
        let global = config.global_properties();
        let keys: Vec<_> = global.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            keys,
            vec!["build.name", "build.number", "build.timestamp", "team", "release"]
        );
        assert_eq!(global[2].1, "1709296200000");

        let resolver = config.property_resolver();
        let jar = ArtifactIdentity::new("com.acme", "lib", "1.0", "jar").with_configuration("archives");
        let props = resolver.resolve(&jar);
        assert_eq!(props["quality"], "gold");
        assert_eq!(props["build.number"], "42");
    }

    #[test]
    fn test_context_build_number_overrides_file() {
        let ctx = VariableContextBuilder::new()
            .with_build_number("99")
            .with_build_started(started())
            .build();
        let config = parse_config(FULL, &ctx).unwrap();
        assert_eq!(config.build.number, "99");
        assert_eq!(config.build.url.as_deref(), Some("https://ci.example.com/job/99"));
    }

    #[test]
    fn test_env_properties_filtered() {
        let config = parse_config(FULL, &ctx()).unwrap();
        let env = &config.build.env_properties;
        assert_eq!(env.get("buildInfo.env.CI_JOB").map(String::as_str), Some("build"));
        assert!(!env.contains_key("buildInfo.env.CI_TOKEN"));
        assert!(!env.contains_key("buildInfo.env.HOME"));
        assert_eq!(config.build_metadata().properties, *env);
    }

    #[test]
    fn test_missing_repository() {
        let kdl = r#"
            publisher { context-url "https://repo.example.com" }
            build name="x" number="1"
        "#;
        let result = parse_config(kdl, &ctx());
        assert!(matches!(result, Err(ConfigError::MissingField(f)) if f.contains("repository")));
    }

    #[test]
    fn test_missing_build_number() {
        let kdl = r#"
            publisher {
                context-url "https://repo.example.com"
                repository "libs"
            }
            build name="x"
        "#;
        let result = parse_config(kdl, &ctx());
        assert!(matches!(result, Err(ConfigError::MissingField(f)) if f == "build number"));
    }

    #[test]
    fn test_context_url_optional_without_remote_publication() {
        let kdl = r#"
            publisher {
                repository "libs"
                publish-artifacts #false
                publish-build-info #false
            }
            build name="x" number="1"
        "#;
        let config = parse_config(kdl, &ctx()).unwrap();
        assert!(config.publisher.context_url.is_none());
        assert!(!config.remote_enabled());
    }

    #[test]
    fn test_invalid_url_rejected() {
        let kdl = r#"
            publisher {
                context-url "not a url"
                repository "libs"
            }
            build name="x" number="1"
        "#;
        let result = parse_config(kdl, &ctx());
        assert!(matches!(result, Err(ConfigError::InvalidValue { field, .. }) if field == "context-url"));
    }

    #[test]
    fn test_malformed_glob_rejected_at_load() {
        let kdl = MINIMAL.replace("repository \"libs\"", "repository \"libs\"\ninclude \"com/[acme\"");
        let result = parse_config(&kdl, &ctx());
        assert!(matches!(
            result,
            Err(ConfigError::Core(depot_core::Error::Filter { .. }))
        ));
    }

    #[test]
    fn test_malformed_spec_rejected_at_load() {
        let kdl = format!("{MINIMAL}\nproperties {{ spec \"a:b:c:d:e\" {{ prop \"k\" \"v\" }} }}");
        let result = parse_config(&kdl, &ctx());
        assert!(matches!(
            result,
            Err(ConfigError::Core(depot_core::Error::PropertyResolution(_)))
        ));
    }

    #[test]
    fn test_duplicate_publisher() {
        let kdl = format!("{MINIMAL}\npublisher {{ repository \"other\" }}");
        let result = parse_config(&kdl, &ctx());
        assert!(matches!(result, Err(ConfigError::Duplicate(n)) if n == "publisher"));
    }

    #[test]
    fn test_unknown_checksum_rejected() {
        let kdl = MINIMAL.replace("repository \"libs\"", "repository \"libs\"\n checksums \"crc32\"");
        let err = parse_config(&kdl, &ctx()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "checksums"));
    }

    #[test]
    fn test_layout_token_needs_name_and_value() {
        let kdl = MINIMAL.replace("repository \"libs\"", "repository \"libs\"\n layout-token \"stream\"");
        assert!(parse_config(&kdl, &ctx()).is_err());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let kdl = MINIMAL.replace("repository \"libs\"", "repository \"libs\"\nconcurrency 0");
        assert!(matches!(
            parse_config(&kdl, &ctx()),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_disable_remote() {
        let mut config = parse_config(MINIMAL, &ctx()).unwrap();
        assert!(config.remote_enabled());
        config.disable_remote();
        assert!(!config.remote_enabled());
    }
}
