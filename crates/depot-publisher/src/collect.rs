//! Collection of artifacts and descriptors into a deploy set.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use depot_config::PublisherSettings;
use depot_core::deploy::DeploySet;
use depot_core::identity::ArtifactIdentity;
use depot_core::layout::MAVEN_DESCRIPTOR_PATTERN;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::builder::{BuildStep, DeployDetailBuilder, DetailError};

/// A produced file and its declared identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactInput {
    pub file: PathBuf,
    #[serde(flatten)]
    pub identity: ArtifactIdentity,
    /// Overrides the configured repository.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DescriptorKind {
    Pom,
    Ivy,
}

/// A generated module descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorInput {
    pub kind: DescriptorKind,
    pub file: PathBuf,
    pub group: String,
    pub module: String,
    pub version: String,
    /// Falls back to the configuration of the module's first artifact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<String>,
}

impl DescriptorInput {
    pub fn identity(&self) -> ArtifactIdentity {
        let (artifact_type, ext) = match self.kind {
            DescriptorKind::Pom => ("pom", "pom"),
            DescriptorKind::Ivy => ("ivy", "xml"),
        };
        let identity = ArtifactIdentity::new(&self.group, &self.module, &self.version, artifact_type)
            .with_extension(ext);
        match &self.configuration {
            Some(configuration) => identity.with_configuration(configuration),
            None => identity,
        }
    }
}

/// Everything a build produced, as handed over by the file enumerator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishInputs {
    #[serde(default)]
    pub artifacts: Vec<ArtifactInput>,
    #[serde(default)]
    pub descriptors: Vec<DescriptorInput>,
}

/// One file to turn into a deploy detail.
#[derive(Debug, Clone)]
pub(crate) struct WorkItem {
    pub file: PathBuf,
    pub identity: ArtifactIdentity,
    pub template: String,
    pub repository: String,
}

/// Work items for the artifacts and the enabled descriptors that exist on disk.
pub(crate) fn plan_work(inputs: PublishInputs, settings: &PublisherSettings) -> Vec<WorkItem> {
    let mut items = Vec::with_capacity(inputs.artifacts.len() + inputs.descriptors.len());

    let mut configurations: HashMap<String, String> = HashMap::new();
    for artifact in &inputs.artifacts {
        if let Some(configuration) = &artifact.identity.configuration {
            configurations
                .entry(artifact.identity.module_id())
                .or_insert_with(|| configuration.clone());
        }
    }

    for artifact in inputs.artifacts {
        items.push(WorkItem {
            file: artifact.file,
            identity: artifact.identity,
            template: settings.artifact_pattern.clone(),
            repository: artifact
                .repository
                .unwrap_or_else(|| settings.repository.clone()),
        });
    }

    for mut descriptor in inputs.descriptors {
        if descriptor.configuration.is_none() {
            let module_id = format!("{}:{}:{}", descriptor.group, descriptor.module, descriptor.version);
            descriptor.configuration = configurations.get(&module_id).cloned();
        }
        let (enabled, template) = match descriptor.kind {
            DescriptorKind::Pom => (settings.publish_pom, MAVEN_DESCRIPTOR_PATTERN),
            DescriptorKind::Ivy => (settings.publish_ivy, settings.ivy_pattern.as_str()),
        };
        if !enabled {
            debug!(file = %descriptor.file.display(), kind = ?descriptor.kind, "Descriptor publication disabled");
            continue;
        }
        if !descriptor.file.is_file() {
            info!(file = %descriptor.file.display(), kind = ?descriptor.kind, "Descriptor not found, skipping");
            continue;
        }
        items.push(WorkItem {
            identity: descriptor.identity(),
            file: descriptor.file,
            template: template.to_string(),
            repository: settings.repository.clone(),
        });
    }

    items
}

/// Build a detail for every item, up to `concurrency` at a time.
///
/// Results are inserted in input order so collisions are reported the same way
/// on every run.
pub(crate) async fn collect(
    items: Vec<WorkItem>,
    builder: DeployDetailBuilder,
    concurrency: usize,
    io_timeout: Duration,
    cancel: &CancellationToken,
) -> Result<DeploySet, CollectError> {
    if cancel.is_cancelled() {
        return Err(CollectError::Other(depot_core::Error::Cancelled));
    }
    let builds = futures::stream::iter(items).map(|item| {
        let builder = builder.clone();
        async move {
            let label = item.identity.to_string();
            let file = item.file.clone();
            let task = tokio::task::spawn_blocking(move || {
                builder.build(&item.file, &item.identity, &item.template, &item.repository)
            });
            match tokio::time::timeout(io_timeout, task).await {
                Ok(Ok(result)) => result.map_err(CollectError::Detail),
                Ok(Err(join)) => Err(CollectError::Other(depot_core::Error::Internal(format!(
                    "detail task for {label} failed: {join}"
                )))),
                Err(_) => Err(CollectError::Detail(DetailError {
                    artifact: label,
                    file: file.clone(),
                    step: BuildStep::Checksum,
                    source: depot_core::Error::Timeout(format!(
                        "hashing {} exceeded {io_timeout:?}",
                        file.display()
                    )),
                })),
            }
        }
    });
    let mut results = builds.buffered(concurrency.max(1));

    let mut set = DeploySet::new();
    while let Some(result) = results.next().await {
        if cancel.is_cancelled() {
            return Err(CollectError::Other(depot_core::Error::Cancelled));
        }
        let detail = result?;
        debug!(
            repository = %detail.target_repository(),
            path = %detail.artifact_path(),
            "Resolved deploy detail"
        );
        set.insert(detail).map_err(CollectError::Other)?;
    }
    Ok(set)
}

/// Failure while collecting.
#[derive(Debug)]
pub(crate) enum CollectError {
    /// Tied to one artifact.
    Detail(DetailError),
    Other(depot_core::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use depot_config::{VariableContextBuilder, parse_config};
    use depot_core::properties::PropertyResolver;
    use std::sync::Arc;

    fn settings(extra: &str) -> PublisherSettings {
        let kdl = format!(
            r#"
            publisher {{
                context-url "https://repo.example.com"
                repository "libs"
                {extra}
            }}
            build name="b" number="1"
        "#
        );
        parse_config(&kdl, &VariableContextBuilder::new().build())
            .unwrap()
            .publisher
    }

    fn descriptor(kind: DescriptorKind, file: PathBuf) -> DescriptorInput {
        DescriptorInput {
            kind,
            file,
            group: "com.acme".to_string(),
            module: "lib".to_string(),
            version: "1.0".to_string(),
            configuration: None,
        }
    }

    fn builder() -> DeployDetailBuilder {
        DeployDetailBuilder::new(Arc::new(PropertyResolver::default()), true)
    }

    #[test]
    fn test_manifest_deserialization() {
        let json = r#"{
            "artifacts": [
                {"file": "build/lib-1.0.jar", "group": "com.acme", "module": "lib",
                 "name": "lib", "version": "1.0", "type": "jar", "repository": "plugins"}
            ],
            "descriptors": [
                {"kind": "pom", "file": "build/pom.xml", "group": "com.acme",
                 "module": "lib", "version": "1.0"}
            ]
        }"#;
        let inputs: PublishInputs = serde_json::from_str(json).unwrap();
        assert_eq!(inputs.artifacts[0].identity.artifact_type, "jar");
        assert_eq!(inputs.artifacts[0].repository.as_deref(), Some("plugins"));
        assert_eq!(inputs.descriptors[0].kind, DescriptorKind::Pom);
    }

    #[test]
    fn test_descriptor_identity() {
        let ivy = descriptor(DescriptorKind::Ivy, PathBuf::from("ivy.xml")).identity();
        assert_eq!(ivy.name, "lib");
        assert_eq!(ivy.module, "lib");
        assert_eq!(ivy.artifact_type, "ivy");
        assert_eq!(ivy.ext(), "xml");
    }

    #[test]
    fn test_descriptors_respect_flags_and_existence() {
        let dir = tempfile::tempdir().unwrap();
        let pom = dir.path().join("lib-1.0.pom");
        let ivy = dir.path().join("ivy.xml");
        std::fs::write(&pom, b"<project/>").unwrap();
        std::fs::write(&ivy, b"<ivy-module/>").unwrap();

        let inputs = PublishInputs {
            artifacts: Vec::new(),
            descriptors: vec![
                descriptor(DescriptorKind::Pom, pom.clone()),
                descriptor(DescriptorKind::Ivy, ivy.clone()),
                descriptor(DescriptorKind::Pom, dir.path().join("missing.pom")),
            ],
        };

        let items = plan_work(inputs.clone(), &settings(""));
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].file, pom);
        assert_eq!(items[0].template, MAVEN_DESCRIPTOR_PATTERN);

        let items = plan_work(inputs, &settings("publish-ivy #true\npublish-pom #false"));
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].file, ivy);
    }

    #[tokio::test]
    async fn test_collect_preserves_order_and_rejects_collisions() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.jar");
        let b = dir.path().join("b.jar");
        std::fs::write(&a, b"a").unwrap();
        std::fs::write(&b, b"b").unwrap();
        let id = ArtifactIdentity::new("com.acme", "lib", "1.0", "jar");

        let inputs = PublishInputs {
            artifacts: vec![
                ArtifactInput { file: a.clone(), identity: id.clone(), repository: None },
                ArtifactInput { file: b.clone(), identity: id, repository: None },
            ],
            descriptors: Vec::new(),
        };
        let items = plan_work(inputs, &settings(""));

        let err = collect(items, builder(), 4, Duration::from_secs(5), &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            CollectError::Other(depot_core::Error::DuplicateDeployPath { first, second, .. }) => {
                assert_eq!(first, a.display().to_string());
                assert_eq!(second, b.display().to_string());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_collect_missing_file_is_detail_error() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = PublishInputs {
            artifacts: vec![ArtifactInput {
                file: dir.path().join("missing.jar"),
                identity: ArtifactIdentity::new("com.acme", "lib", "1.0", "jar"),
                repository: None,
            }],
            descriptors: Vec::new(),
        };
        let items = plan_work(inputs, &settings(""));

        let err = collect(items, builder(), 1, Duration::from_secs(5), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CollectError::Detail(DetailError { step: BuildStep::Checksum, .. })));
    }

    #[test]
    fn test_descriptor_inherits_module_configuration() {
        let dir = tempfile::tempdir().unwrap();
        let pom = dir.path().join("lib-1.0.pom");
        std::fs::write(&pom, b"<project/>").unwrap();

        let inputs = PublishInputs {
            artifacts: vec![ArtifactInput {
                file: dir.path().join("lib-1.0.jar"),
                identity: ArtifactIdentity::new("com.acme", "lib", "1.0", "jar")
                    .with_configuration("archives"),
                repository: None,
            }],
            descriptors: vec![descriptor(DescriptorKind::Pom, pom)],
        };
        let items = plan_work(inputs, &settings(""));
        assert_eq!(items[1].identity.configuration.as_deref(), Some("archives"));

        let spec: depot_core::identity::ArtifactSpec = "archives com.acme:*:*".parse().unwrap();
        assert!(spec.matches(&items[1].identity));
    }

    #[test]
    fn test_descriptor_configuration_is_kept() {
        let mut ivy = descriptor(DescriptorKind::Ivy, PathBuf::from("ivy.xml"));
        ivy.configuration = Some("published".to_string());
        assert_eq!(ivy.identity().configuration.as_deref(), Some("published"));
    }

    #[tokio::test]
    async fn test_collect_hashing_timeout_is_checksum_error() {
        let dir = tempfile::tempdir().unwrap();
        let big = dir.path().join("big.jar");
        std::fs::write(&big, vec![7u8; 64 * 1024 * 1024]).unwrap();
        let inputs = PublishInputs {
            artifacts: vec![ArtifactInput {
                file: big,
                identity: ArtifactIdentity::new("com.acme", "big", "1.0", "jar"),
                repository: None,
            }],
            descriptors: Vec::new(),
        };
        let items = plan_work(inputs, &settings(""));

        let err = collect(items, builder(), 1, Duration::from_micros(1), &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            CollectError::Detail(DetailError { step, artifact, source, .. }) => {
                assert_eq!(step, BuildStep::Checksum);
                assert_eq!(artifact, "com.acme:big:1.0@jar");
                assert!(matches!(source, depot_core::Error::Timeout(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_collect_stops_when_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.jar");
        std::fs::write(&a, b"a").unwrap();
        let inputs = PublishInputs {
            artifacts: vec![ArtifactInput {
                file: a,
                identity: ArtifactIdentity::new("com.acme", "a", "1.0", "jar"),
                repository: None,
            }],
            descriptors: Vec::new(),
        };
        let items = plan_work(inputs, &settings(""));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = collect(items, builder(), 1, Duration::from_secs(5), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, CollectError::Other(depot_core::Error::Cancelled)));
    }
}
