//! Local export of the build-info document.

use std::io::Write;
use std::path::Path;

use depot_core::buildinfo::BuildInfoDocument;
use depot_core::client::DocumentWriter;
use depot_core::{Error, Result};
use tempfile::NamedTempFile;
use tracing::debug;

/// Writes documents as pretty-printed JSON.
///
/// The document is written to a uniquely named file next to its destination,
/// synced and then persisted over it. Readers see the old or the new document,
/// never a partial one.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFileWriter;

impl DocumentWriter for JsonFileWriter {
    fn write_document(&self, document: &BuildInfoDocument, path: &Path) -> Result<()> {
        let fail = |message: String| Error::Persistence {
            path: path.to_path_buf(),
            message,
        };

        let mut bytes = serde_json::to_vec_pretty(document).map_err(|e| fail(e.to_string()))?;
        bytes.push(b'\n');

        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        std::fs::create_dir_all(parent).map_err(|e| fail(e.to_string()))?;

        let mut tmp = NamedTempFile::new_in(parent).map_err(|e| fail(e.to_string()))?;
        tmp.write_all(&bytes).map_err(|e| fail(e.to_string()))?;
        tmp.as_file().sync_all().map_err(|e| fail(e.to_string()))?;
        tmp.persist(path).map_err(|e| fail(e.error.to_string()))?;

        debug!(path = %path.display(), bytes = bytes.len(), "Wrote build info");
        Ok(())
    }
}
