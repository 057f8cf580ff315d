//! File checksum calculation.
//!
//! All requested digests are computed in a single streaming pass over the file.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use tracing::trace;

use crate::{Error, Result};

const BUFFER_SIZE: usize = 64 * 1024;

/// Supported digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ChecksumAlgorithm {
    #[serde(rename = "MD5")]
    Md5,
    #[serde(rename = "SHA1")]
    Sha1,
    #[serde(rename = "SHA256")]
    Sha256,
}

impl ChecksumAlgorithm {
    /// The algorithms every deploy detail carries.
    pub const REQUIRED: [ChecksumAlgorithm; 2] = [ChecksumAlgorithm::Md5, ChecksumAlgorithm::Sha1];

    pub fn name(&self) -> &'static str {
        match self {
            ChecksumAlgorithm::Md5 => "MD5",
            ChecksumAlgorithm::Sha1 => "SHA1",
            ChecksumAlgorithm::Sha256 => "SHA256",
        }
    }
}

impl std::fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for ChecksumAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "MD5" => Ok(ChecksumAlgorithm::Md5),
            "SHA1" | "SHA-1" => Ok(ChecksumAlgorithm::Sha1),
            "SHA256" | "SHA-256" => Ok(ChecksumAlgorithm::Sha256),
            _ => Err(format!("unknown checksum algorithm '{s}'")),
        }
    }
}

/// Algorithm -> lowercase hex digest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checksums(BTreeMap<ChecksumAlgorithm, String>);

impl Checksums {
    pub fn get(&self, algorithm: ChecksumAlgorithm) -> Option<&str> {
        self.0.get(&algorithm).map(String::as_str)
    }

    pub fn md5(&self) -> Option<&str> {
        self.get(ChecksumAlgorithm::Md5)
    }

    pub fn sha1(&self) -> Option<&str> {
        self.get(ChecksumAlgorithm::Sha1)
    }

    pub fn sha256(&self) -> Option<&str> {
        self.get(ChecksumAlgorithm::Sha256)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ChecksumAlgorithm, &str)> {
        self.0.iter().map(|(a, d)| (*a, d.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(ChecksumAlgorithm, String)> for Checksums {
    fn from_iter<T: IntoIterator<Item = (ChecksumAlgorithm, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

enum Hasher {
    Md5(md5::Context),
    Sha1(Sha1),
    Sha256(Sha256),
}

impl Hasher {
    fn new(algorithm: ChecksumAlgorithm) -> Self {
        match algorithm {
            ChecksumAlgorithm::Md5 => Hasher::Md5(md5::Context::new()),
            ChecksumAlgorithm::Sha1 => Hasher::Sha1(Sha1::new()),
            ChecksumAlgorithm::Sha256 => Hasher::Sha256(Sha256::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Hasher::Md5(ctx) => ctx.consume(data),
            Hasher::Sha1(h) => h.update(data),
            Hasher::Sha256(h) => h.update(data),
        }
    }

    fn finish(self) -> String {
        match self {
            Hasher::Md5(ctx) => format!("{:x}", ctx.compute()),
            Hasher::Sha1(h) => hex::encode(h.finalize()),
            Hasher::Sha256(h) => hex::encode(h.finalize()),
        }
    }
}

/// Calculate checksums for `path` using algorithm names such as `"MD5"` and `"SHA1"`.
pub fn calculate_checksums(path: &Path, algorithms: &[&str]) -> Result<Checksums> {
    let parsed = algorithms
        .iter()
        .map(|name| {
            name.parse::<ChecksumAlgorithm>()
                .map_err(|message| Error::Checksum {
                    path: path.to_path_buf(),
                    message,
                })
        })
        .collect::<Result<Vec<_>>>()?;
    calculate(path, &parsed)
}

/// Calculate the given digests in a single pass over the file.
pub fn calculate(path: &Path, algorithms: &[ChecksumAlgorithm]) -> Result<Checksums> {
    let io_error = |e: std::io::Error| Error::Checksum {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let mut algorithms = algorithms.to_vec();
    algorithms.sort();
    algorithms.dedup();

    let mut file = File::open(path).map_err(io_error)?;
    let mut hashers: Vec<(ChecksumAlgorithm, Hasher)> =
        algorithms.iter().map(|a| (*a, Hasher::new(*a))).collect();

    let mut buf = vec![0u8; BUFFER_SIZE];
    loop {
        let n = file.read(&mut buf).map_err(io_error)?;
        if n == 0 {
            break;
        }
        for (_, hasher) in hashers.iter_mut() {
            hasher.update(&buf[..n]);
        }
    }

    let checksums: Checksums = hashers.into_iter().map(|(a, h)| (a, h.finish())).collect();
    trace!(path = %path.display(), algorithms = checksums.len(), "Calculated checksums");
    Ok(checksums)
}
