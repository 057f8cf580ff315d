//! Deploy detail construction.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use depot_core::checksum::{self, ChecksumAlgorithm};
use depot_core::deploy::DeployDetail;
use depot_core::identity::ArtifactIdentity;
use depot_core::layout;
use depot_core::properties::PropertyResolver;
use thiserror::Error;

/// Step of detail construction that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStep {
    Checksum,
    Path,
    Properties,
}

impl std::fmt::Display for BuildStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BuildStep::Checksum => "checksum",
            BuildStep::Path => "path",
            BuildStep::Properties => "properties",
        };
        f.write_str(name)
    }
}

/// A detail could not be built for one artifact.
#[derive(Debug, Error)]
#[error("cannot build deploy detail for {artifact} at {step} step: {source}")]
pub struct DetailError {
    /// Identity of the artifact, as `group:name:version[:classifier]@ext`.
    pub artifact: String,
    pub file: PathBuf,
    pub step: BuildStep,
    #[source]
    pub source: depot_core::Error,
}

/// Builds deploy details: checksums, then path, then properties.
///
/// Cheap to clone; clones share the property resolver.
#[derive(Debug, Clone)]
pub struct DeployDetailBuilder {
    resolver: Arc<PropertyResolver>,
    m2_compatible: bool,
    algorithms: Vec<ChecksumAlgorithm>,
    extra_tokens: BTreeMap<String, String>,
}

impl DeployDetailBuilder {
    pub fn new(resolver: Arc<PropertyResolver>, m2_compatible: bool) -> Self {
        Self {
            resolver,
            m2_compatible,
            algorithms: ChecksumAlgorithm::REQUIRED.to_vec(),
            extra_tokens: BTreeMap::new(),
        }
    }

    /// Compute these digests in addition to MD5 and SHA1.
    pub fn with_algorithms(mut self, algorithms: &[ChecksumAlgorithm]) -> Self {
        self.algorithms.extend_from_slice(algorithms);
        self.algorithms.sort();
        self.algorithms.dedup();
        self
    }

    pub fn with_extra_token(mut self, token: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_tokens.insert(token.into(), value.into());
        self
    }

    /// Build the detail for one file. Blocks while the file is hashed.
    pub fn build(
        &self,
        file: &Path,
        identity: &ArtifactIdentity,
        template: &str,
        repository: &str,
    ) -> Result<DeployDetail, DetailError> {
        let fail = |step: BuildStep, source: depot_core::Error| DetailError {
            artifact: identity.to_string(),
            file: file.to_path_buf(),
            step,
            source,
        };

        let checksums = checksum::calculate(file, &self.algorithms)
            .map_err(|e| fail(BuildStep::Checksum, e))?;
        let path = layout::artifact_path(template, identity, self.m2_compatible, &self.extra_tokens)
            .map_err(|e| fail(BuildStep::Path, e))?;
        let properties = self.resolver.resolve(identity);

        DeployDetail::new(
            file.to_path_buf(),
            repository.to_string(),
            path,
            checksums,
            properties,
            identity.clone(),
        )
        .map_err(|e| fail(BuildStep::Checksum, e))
    }
}
