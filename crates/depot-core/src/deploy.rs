//! Deploy details and the deploy set.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::checksum::{ChecksumAlgorithm, Checksums};
use crate::identity::ArtifactIdentity;
use crate::{Error, Result};

/// A fully resolved deployment record for one file.
///
/// Instances are only produced complete; fields are read-only after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployDetail {
    source_file: PathBuf,
    target_repository: String,
    artifact_path: String,
    checksums: Checksums,
    properties: BTreeMap<String, String>,
    identity: ArtifactIdentity,
}

impl DeployDetail {
    /// Assemble a detail. Fails if the required digests are missing.
    pub fn new(
        source_file: PathBuf,
        target_repository: String,
        artifact_path: String,
        checksums: Checksums,
        properties: BTreeMap<String, String>,
        identity: ArtifactIdentity,
    ) -> Result<Self> {
        if let Some(missing) = ChecksumAlgorithm::REQUIRED
            .iter()
            .find(|a| checksums.get(**a).is_none())
        {
            return Err(Error::Checksum {
                path: source_file,
                message: format!("missing required {missing} digest"),
            });
        }
        Ok(Self {
            source_file,
            target_repository,
            artifact_path,
            checksums,
            properties,
            identity,
        })
    }

    pub fn source_file(&self) -> &Path {
        &self.source_file
    }

    pub fn target_repository(&self) -> &str {
        &self.target_repository
    }

    pub fn artifact_path(&self) -> &str {
        &self.artifact_path
    }

    pub fn checksums(&self) -> &Checksums {
        &self.checksums
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    pub fn identity(&self) -> &ArtifactIdentity {
        &self.identity
    }

    /// Key used for uniqueness within a deploy set.
    pub fn key(&self) -> DeployKey {
        DeployKey {
            repository: self.target_repository.clone(),
            path: self.artifact_path.clone(),
        }
    }
}

/// `(target repository, artifact path)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeployKey {
    pub repository: String,
    pub path: String,
}

impl std::fmt::Display for DeployKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.repository, self.path)
    }
}

/// Deploy details keyed by target. Iteration is ordered by key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploySet {
    details: BTreeMap<DeployKey, DeployDetail>,
}

impl DeploySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a detail. A second detail for the same target is rejected.
    pub fn insert(&mut self, detail: DeployDetail) -> Result<()> {
        match self.details.entry(detail.key()) {
            Entry::Occupied(existing) => Err(Error::DuplicateDeployPath {
                repository: detail.target_repository,
                path: detail.artifact_path,
                first: existing.get().source_file.display().to_string(),
                second: detail.source_file.display().to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(detail);
                Ok(())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.details.len()
    }

    pub fn is_empty(&self) -> bool {
        self.details.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeployDetail> {
        self.details.values()
    }
}

impl IntoIterator for DeploySet {
    type Item = DeployDetail;
    type IntoIter = std::collections::btree_map::IntoValues<DeployKey, DeployDetail>;

    fn into_iter(self) -> Self::IntoIter {
        self.details.into_values()
    }
}

impl<'a> IntoIterator for &'a DeploySet {
    type Item = &'a DeployDetail;
    type IntoIter = std::collections::btree_map::Values<'a, DeployKey, DeployDetail>;

    fn into_iter(self) -> Self::IntoIter {
        self.details.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checksums() -> Checksums {
        [
            (ChecksumAlgorithm::Md5, "aa".to_string()),
            (ChecksumAlgorithm::Sha1, "bb".to_string()),
        ]
        .into_iter()
        .collect()
    }

    fn detail(file: &str, repo: &str, path: &str) -> DeployDetail {
        DeployDetail::new(
            PathBuf::from(file),
            repo.to_string(),
            path.to_string(),
            checksums(),
            BTreeMap::new(),
            ArtifactIdentity::new("com.acme", "lib", "1.0", "jar"),
        )
        .unwrap()
    }

    #[test]
    fn test_duplicate_target_rejected() {
        let mut set = DeploySet::new();
        set.insert(detail("a.jar", "libs", "com/acme/lib.jar")).unwrap();

        let err = set
            .insert(detail("b.jar", "libs", "com/acme/lib.jar"))
            .unwrap_err();
        match err {
            Error::DuplicateDeployPath { first, second, .. } => {
                assert_eq!(first, "a.jar");
                assert_eq!(second, "b.jar");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(set.len(), 1);
        assert_eq!(set.iter().next().unwrap().source_file(), Path::new("a.jar"));
    }

    #[test]
    fn test_same_path_in_other_repository_is_distinct() {
        let mut set = DeploySet::new();
        set.insert(detail("a.jar", "libs", "p.jar")).unwrap();
        set.insert(detail("a.jar", "plugins", "p.jar")).unwrap();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_iteration_is_ordered_by_key() {
        let mut set = DeploySet::new();
        set.insert(detail("c", "libs", "c.jar")).unwrap();
        set.insert(detail("a", "libs", "a.jar")).unwrap();
        set.insert(detail("b", "libs", "b.jar")).unwrap();

        let paths: Vec<_> = set.iter().map(|d| d.artifact_path()).collect();
        assert_eq!(paths, vec!["a.jar", "b.jar", "c.jar"]);
    }

    #[test]
    fn test_detail_requires_md5_and_sha1() {
        let only_md5: Checksums = [(ChecksumAlgorithm::Md5, "aa".to_string())]
            .into_iter()
            .collect();
        let result = DeployDetail::new(
            PathBuf::from("a.jar"),
            "libs".to_string(),
            "a.jar".to_string(),
            only_md5,
            BTreeMap::new(),
            ArtifactIdentity::new("g", "a", "1", "jar"),
        );
        assert!(matches!(result, Err(Error::Checksum { .. })));
    }
}
