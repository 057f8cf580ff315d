//! Build-info document model.
//!
//! The document describes one build: its metadata, and per module the artifacts
//! that were deployed. It is serialized as camelCase JSON.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Version of the document format written by this crate.
pub const DOCUMENT_VERSION: &str = "1.0.1";

/// Timestamp format used for `started`.
pub const STARTED_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%z";

/// The tool that produced a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub name: String,
    pub version: String,
}

impl Default for Agent {
    fn default() -> Self {
        Self {
            name: "depot".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Build-level metadata supplied by configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildMetadata {
    pub name: String,
    pub number: String,
    pub started: DateTime<Utc>,
    pub url: Option<String>,
    pub vcs_revision: Option<String>,
    pub vcs_url: Option<String>,
    pub agent: Agent,
    pub properties: BTreeMap<String, String>,
}

impl BuildMetadata {
    pub fn new(name: impl Into<String>, number: impl Into<String>, started: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            number: number.into(),
            started,
            url: None,
            vcs_revision: None,
            vcs_url: None,
            agent: Agent::default(),
            properties: BTreeMap::new(),
        }
    }

    /// Start time in milliseconds since the epoch.
    pub fn timestamp_millis(&self) -> i64 {
        self.started.timestamp_millis()
    }

    pub fn started_string(&self) -> String {
        self.started.format(STARTED_FORMAT).to_string()
    }
}

/// One deployed file as recorded in the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildArtifact {
    pub name: String,
    #[serde(rename = "type")]
    pub artifact_type: String,
    pub path: String,
    pub repository: String,
    pub sha1: String,
    pub md5: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

/// A module and its artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildModule {
    /// `group:module:version`
    pub id: String,
    pub artifacts: Vec<BuildArtifact>,
}

/// The full build-info document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfoDocument {
    pub version: String,
    pub name: String,
    pub number: String,
    pub started: String,
    pub agent: Agent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vcs_revision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vcs_url: Option<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default)]
    pub modules: Vec<BuildModule>,
}

impl BuildInfoDocument {
    /// An empty document for a build.
    pub fn for_build(build: &BuildMetadata) -> Self {
        Self {
            version: DOCUMENT_VERSION.to_string(),
            name: build.name.clone(),
            number: build.number.clone(),
            started: build.started_string(),
            agent: build.agent.clone(),
            url: build.url.clone(),
            vcs_revision: build.vcs_revision.clone(),
            vcs_url: build.vcs_url.clone(),
            properties: build.properties.clone(),
            modules: Vec::new(),
        }
    }

    pub fn artifact_count(&self) -> usize {
        self.modules.iter().map(|m| m.artifacts.len()).sum()
    }
}
