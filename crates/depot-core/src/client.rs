//! Collaborator seams used by the publisher.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::buildinfo::{BuildInfoDocument, BuildMetadata};
use crate::deploy::{DeployDetail, DeploySet};

/// HTTP proxy settings applied to a client before any transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// A remote artifact repository.
///
/// `close` is called exactly once per session, after which other calls fail.
#[async_trait]
pub trait PublishClient: Send + Sync {
    /// Name of this client, for logs.
    fn name(&self) -> &'static str;

    /// Upload one file to `detail.target_repository()` at `detail.artifact_path()`.
    async fn upload(&self, detail: &DeployDetail) -> Result<()>;

    /// Publish a build-info document.
    async fn publish_build_info(&self, document: &BuildInfoDocument) -> Result<()>;

    /// Route subsequent requests through a proxy.
    fn configure_proxy(&mut self, proxy: &ProxyConfig) -> Result<()>;

    /// Release connections held by the client.
    fn close(&mut self);
}

/// Produces a build-info document from the details that were deployed.
pub trait BuildInfoExtractor: Send + Sync {
    fn extract(&self, deployed: &DeploySet, build: &BuildMetadata) -> Result<BuildInfoDocument>;
}

/// Persists a build-info document locally. Writing the same document twice
/// must leave identical content.
pub trait DocumentWriter: Send + Sync {
    fn write_document(&self, document: &BuildInfoDocument, path: &Path) -> Result<()>;
}
