//! Include/exclude filtering of repository paths.

use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};

use crate::{Error, Result};

/// Compiled include and exclude globs.
///
/// A path is eligible when no exclude matches and either there are no includes
/// or at least one include matches. Patterns are validated when the filter is built.
#[derive(Debug, Clone)]
pub struct IncludeExcludePatterns {
    includes: Vec<String>,
    excludes: Vec<String>,
    include_set: GlobSet,
    exclude_set: GlobSet,
}

impl Default for IncludeExcludePatterns {
    fn default() -> Self {
        Self {
            includes: Vec::new(),
            excludes: Vec::new(),
            include_set: GlobSet::empty(),
            exclude_set: GlobSet::empty(),
        }
    }
}

fn compile(pattern: &str) -> Result<Glob> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|e| Error::Filter {
            pattern: pattern.to_string(),
            message: e.kind().to_string(),
        })
}

fn build_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(compile(pattern)?);
    }
    builder.build().map_err(|e| Error::Filter {
        pattern: patterns.join(", "),
        message: e.to_string(),
    })
}

/// Split a comma separated pattern list, dropping empty entries.
pub fn split_patterns(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}

impl IncludeExcludePatterns {
    pub fn new<I, E>(includes: I, excludes: E) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: Into<String>,
        E: IntoIterator,
        E::Item: Into<String>,
    {
        let includes: Vec<String> = includes.into_iter().map(Into::into).collect();
        let excludes: Vec<String> = excludes.into_iter().map(Into::into).collect();
        Ok(Self {
            include_set: build_set(&includes)?,
            exclude_set: build_set(&excludes)?,
            includes,
            excludes,
        })
    }

    pub fn includes(&self) -> &[String] {
        &self.includes
    }

    pub fn excludes(&self) -> &[String] {
        &self.excludes
    }

    pub fn is_empty(&self) -> bool {
        self.includes.is_empty() && self.excludes.is_empty()
    }

    pub fn eligible(&self, path: &str) -> bool {
        if self.exclude_set.is_match(path) {
            return false;
        }
        self.includes.is_empty() || self.include_set.is_match(path)
    }
}

/// Whether `path` may be deployed under `patterns`.
pub fn eligible(path: &str, patterns: &IncludeExcludePatterns) -> bool {
    patterns.eligible(path)
}
