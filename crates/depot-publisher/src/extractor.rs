//! Default build-info extraction.

use std::collections::BTreeMap;

use depot_core::Result;
use depot_core::buildinfo::{BuildArtifact, BuildInfoDocument, BuildMetadata, BuildModule};
use depot_core::client::BuildInfoExtractor;
use depot_core::deploy::{DeployDetail, DeploySet};

/// Groups deployed files by module, `group:module:version`.
///
/// Modules are ordered by id; artifacts keep the deploy set's order.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModuleExtractor;

fn to_artifact(detail: &DeployDetail) -> BuildArtifact {
    let path = detail.artifact_path();
    let name = path.rsplit('/').next().unwrap_or(path);
    let checksums = detail.checksums();
    BuildArtifact {
        name: name.to_string(),
        artifact_type: detail.identity().artifact_type.clone(),
        path: path.to_string(),
        repository: detail.target_repository().to_string(),
        sha1: checksums.sha1().unwrap_or_default().to_string(),
        md5: checksums.md5().unwrap_or_default().to_string(),
        sha256: checksums.sha256().map(String::from),
        properties: detail.properties().clone(),
    }
}

impl BuildInfoExtractor for ModuleExtractor {
    fn extract(&self, deployed: &DeploySet, build: &BuildMetadata) -> Result<BuildInfoDocument> {
        let mut modules: BTreeMap<String, Vec<BuildArtifact>> = BTreeMap::new();
        for detail in deployed {
            modules
                .entry(detail.identity().module_id())
                .or_default()
                .push(to_artifact(detail));
        }

        let mut document = BuildInfoDocument::for_build(build);
        document.modules = modules
            .into_iter()
            .map(|(id, artifacts)| BuildModule { id, artifacts })
            .collect();
        Ok(document)
    }
}
