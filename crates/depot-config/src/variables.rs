//! Variable interpolation for configuration values.
//!
//! Supports variables like:
//! - `${build.name}` - Build name
//! - `${build.number}` - Build number
//! - `${build.timestamp}` - Build start time, epoch milliseconds
//! - `${git.sha}` - Commit SHA taken from the CI environment
//! - `${git.short_sha}` - Short (7 char) commit SHA
//! - `${git.branch}` - Branch name taken from the CI environment
//! - `${env.VAR_NAME}` - Environment variable
//! - `${timestamp}` - Unix timestamp
//! - `${date}` - ISO date (YYYY-MM-DD)
//! - `${datetime}` - ISO datetime
//!
//! Unknown variables are left in place.

use chrono::{DateTime, Utc};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Variable context containing all available variables for interpolation.
#[derive(Debug, Clone, Default)]
pub struct VariableContext {
    /// Build-related variables
    pub build: BuildContext,
    /// Git-related variables
    pub git: GitContext,
    /// Environment variables
    pub env: HashMap<String, String>,
    /// Custom variables defined by the caller
    pub custom: HashMap<String, String>,
}

/// Build context for variable interpolation.
///
/// Values set here take precedence over the ones in the configuration file.
#[derive(Debug, Clone, Default)]
pub struct BuildContext {
    pub name: String,
    pub number: String,
    pub started: Option<DateTime<Utc>>,
}

/// Git context for variable interpolation.
#[derive(Debug, Clone, Default)]
pub struct GitContext {
    pub sha: String,
    pub short_sha: String,
    pub branch: String,
}

static VAR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([a-zA-Z_][a-zA-Z0-9_]*(?:\.[a-zA-Z_][a-zA-Z0-9_]*)?)\}").unwrap()
});

impl VariableContext {
    /// Create a new empty variable context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context from the current process environment.
    pub fn from_env() -> Self {
        let mut ctx = Self::new();
        ctx.populate_env();
        ctx.populate_git_from_env();
        ctx
    }

    /// Populate environment variables from the current process environment.
    pub fn populate_env(&mut self) {
        for (key, value) in std::env::vars() {
            self.env.insert(key, value);
        }
    }

    /// Populate git context from the usual CI environment variables.
    pub fn populate_git_from_env(&mut self) {
        let lookup = |names: &[&str]| {
            names
                .iter()
                .find_map(|n| self.env.get(*n).filter(|v| !v.is_empty()).cloned())
                .unwrap_or_default()
        };

        let sha = lookup(&["GIT_COMMIT", "GITHUB_SHA", "CI_COMMIT_SHA"]);
        let branch = lookup(&["GIT_BRANCH", "GITHUB_REF_NAME", "CI_COMMIT_BRANCH"]);

        self.git.short_sha = sha.chars().take(7).collect();
        self.git.sha = sha;
        self.git.branch = branch;
    }

    /// Add a custom variable.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.custom.insert(name.to_string(), value.into());
    }

    /// Resolve a variable name to its value.
    pub fn resolve(&self, var_name: &str) -> Option<String> {
        let parts: Vec<&str> = var_name.split('.').collect();
        let non_empty = |s: &String| Some(s.clone()).filter(|v| !v.is_empty());

        match parts.as_slice() {
            ["build", "name"] => non_empty(&self.build.name),
            ["build", "number"] => non_empty(&self.build.number),
            ["build", "timestamp"] => self
                .build
                .started
                .map(|t| t.timestamp_millis().to_string()),

            ["git", "sha"] => non_empty(&self.git.sha),
            ["git", "short_sha"] => non_empty(&self.git.short_sha),
            ["git", "branch"] => non_empty(&self.git.branch),

            ["env", name] => self.env.get(*name).cloned(),

            ["timestamp"] => Some(Utc::now().timestamp().to_string()),
            ["date"] => Some(Utc::now().format("%Y-%m-%d").to_string()),
            ["datetime"] => Some(Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()),

            [name] => self.custom.get(*name).cloned(),

            _ => None,
        }
    }

    /// Interpolate all variables in a string.
    pub fn interpolate(&self, input: &str) -> String {
        VAR_REGEX
            .replace_all(input, |caps: &regex::Captures| {
                let var_name = &caps[1];
                self.resolve(var_name)
                    .unwrap_or_else(|| format!("${{{}}}", var_name))
            })
            .to_string()
    }
}

/// Builder for creating VariableContext.
pub struct VariableContextBuilder {
    ctx: VariableContext,
}

impl VariableContextBuilder {
    pub fn new() -> Self {
        Self {
            ctx: VariableContext::new(),
        }
    }

    pub fn with_build_name(mut self, name: impl Into<String>) -> Self {
        self.ctx.build.name = name.into();
        self
    }

    pub fn with_build_number(mut self, number: impl Into<String>) -> Self {
        self.ctx.build.number = number.into();
        self
    }

    pub fn with_build_started(mut self, started: DateTime<Utc>) -> Self {
        self.ctx.build.started = Some(started);
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.ctx.env.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> VariableContext {
        self.ctx
    }
}

impl Default for VariableContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}
