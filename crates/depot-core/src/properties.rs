//! Property resolution.
//!
//! Global properties apply to every artifact. Property specs add more entries to
//! the artifacts they match. A key that appears more than once keeps every value,
//! joined with `", "` in evaluation order.

use std::collections::BTreeMap;

use crate::identity::{ArtifactIdentity, PropertySpecs};

/// Separator used when a key accumulates more than one value.
pub const VALUE_SEPARATOR: &str = ", ";

/// Merge `entries` into `target`, appending to existing keys instead of overwriting.
pub fn merge_properties<'a>(
    target: &mut BTreeMap<String, String>,
    entries: impl IntoIterator<Item = (&'a str, &'a str)>,
) {
    for (key, value) in entries {
        match target.get_mut(key) {
            Some(existing) => {
                existing.push_str(VALUE_SEPARATOR);
                existing.push_str(value);
            }
            None => {
                target.insert(key.to_string(), value.to_string());
            }
        }
    }
}

/// Resolves the final property map for each artifact.
///
/// Global properties are merged once at construction and reused for every artifact.
#[derive(Debug, Clone, Default)]
pub struct PropertyResolver {
    global: BTreeMap<String, String>,
    specs: PropertySpecs,
}

impl PropertyResolver {
    pub fn new<'a>(
        global: impl IntoIterator<Item = (&'a str, &'a str)>,
        specs: PropertySpecs,
    ) -> Self {
        let mut merged = BTreeMap::new();
        merge_properties(&mut merged, global);
        Self {
            global: merged,
            specs,
        }
    }

    pub fn global(&self) -> &BTreeMap<String, String> {
        &self.global
    }

    pub fn resolve(&self, id: &ArtifactIdentity) -> BTreeMap<String, String> {
        let mut props = self.global.clone();
        merge_properties(&mut props, self.specs.matching(id));
        props
    }
}
