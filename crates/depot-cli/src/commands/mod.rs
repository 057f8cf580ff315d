//! CLI command implementations.

pub mod plan;
pub mod publish;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use depot_config::{DepotConfig, VariableContext};
use depot_publisher::PublishInputs;

#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Path to the configuration file
    #[arg(long, short, env = "DEPOT_CONFIG", default_value = "depot.kdl")]
    pub config: PathBuf,

    /// Build number, overrides the configuration file
    #[arg(long, env = "DEPOT_BUILD_NUMBER")]
    pub build_number: Option<String>,

    /// Extra `${NAME}` variable for the configuration file (repeatable)
    #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_var)]
    pub vars: Vec<(String, String)>,
}

fn parse_var(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got '{raw}'")),
    }
}

/// Load the configuration with the process environment as variable context.
pub(crate) fn load(args: &ConfigArgs) -> Result<DepotConfig> {
    let mut ctx = VariableContext::from_env();
    if let Some(number) = &args.build_number {
        ctx.build.number = number.clone();
    }
    for (name, value) in &args.vars {
        ctx.set(name, value.clone());
    }
    depot_config::load_config(&args.config, &ctx)
        .with_context(|| format!("Failed to load config file: {}", args.config.display()))
}

/// Read the artifact manifest written by the build.
pub(crate) fn read_manifest(path: &Path) -> Result<PublishInputs> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse manifest: {}", path.display()))
}

pub fn validate(args: &ConfigArgs) -> Result<()> {
    match load(args) {
        Ok(config) => {
            println!("Configuration is valid");
            println!("  build: {} #{}", config.build.name, config.build.number);
            println!("  repository: {}", config.publisher.repository);
            println!("  remote publication: {}", config.remote_enabled());
            Ok(())
        }
        Err(e) => {
            println!("Configuration error: {e:#}");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifacts.json");
        std::fs::write(
            &path,
            r#"{"artifacts": [{"file": "lib.jar", "group": "com.acme", "module": "lib", "name": "lib",
                "version": "1.0", "type": "jar"}]}"#,
        )
        .unwrap();

        let inputs = read_manifest(&path).unwrap();
        assert_eq!(inputs.artifacts.len(), 1);
        assert!(inputs.descriptors.is_empty());
    }

    #[test]
    fn test_build_number_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("depot.kdl");
        std::fs::write(
            &path,
            r#"
            publisher {
                context-url "https://repo.example.com"
                repository "libs"
            }
            build name="acme" number="1"
            "#,
        )
        .unwrap();

        let args = ConfigArgs {
            config: path,
            build_number: Some("42".to_string()),
            vars: Vec::new(),
        };
        let config = load(&args).unwrap();
        assert_eq!(config.build.number, "42");
    }

    #[test]
    fn test_custom_variables_reach_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("depot.kdl");
        std::fs::write(
            &path,
            r#"
            publisher {
                context-url "https://repo.example.com"
                repository "libs-${channel}"
            }
            build name="acme" number="1"
            "#,
        )
        .unwrap();

        let args = ConfigArgs {
            config: path,
            build_number: None,
            vars: vec![parse_var("channel=stable").unwrap()],
        };
        assert_eq!(load(&args).unwrap().publisher.repository, "libs-stable");
    }

    #[test]
    fn test_parse_var() {
        assert_eq!(
            parse_var("a=b=c").unwrap(),
            ("a".to_string(), "b=c".to_string())
        );
        assert!(parse_var("novalue").is_err());
        assert!(parse_var("=x").is_err());
    }

    #[test]
    fn test_missing_config_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let args = ConfigArgs {
            config: dir.path().join("missing.kdl"),
            ..Default::default()
        };
        assert!(load(&args).is_err());
    }
}
