//! Schema discovery
//!
//! Walks a root directory recursively and loads every schema document found.
//! Entries whose name starts with `_` are skipped, together with everything
//! below them.

use std::path::{Path, PathBuf};

use strata_core::{DiscoveryErrorKind, Result, SchemaDocument, StrataError};
use tracing::{debug, error, info};
use walkdir::{DirEntry, WalkDir};

use super::yaml::SchemaLoader;

/// Prefix marking entries that discovery ignores
pub const HIDDEN_PREFIX: char = '_';

/// A document found by discovery, with the file it came from
#[derive(Debug, Clone)]
pub struct DiscoveredSchema {
    /// File the document was read from
    pub path: PathBuf,
    /// Decoded document
    pub document: SchemaDocument,
}

/// Walks a schema root with a loader
#[derive(Debug)]
pub struct SchemaDiscovery<L> {
    loader: L,
}

impl<L: SchemaLoader> SchemaDiscovery<L> {
    /// Create a walker using `loader` for every file
    pub fn new(loader: L) -> Self {
        Self { loader }
    }

    /// Discover documents under `root`.
    ///
    /// Files are visited in file-name order so results are stable.
    ///
    /// # Errors
    ///
    /// Returns `StrataError::Discovery` when `root` is unset, missing, not a
    /// directory or unreadable, and the loader's error for the first file
    /// that cannot be decoded.
    pub fn discover(&self, root: Option<&Path>) -> Result<Vec<DiscoveredSchema>> {
        let root = root.ok_or_else(|| fail(None, DiscoveryErrorKind::NotConfigured))?;
        check_root(root)?;
        info!(path = %root.display(), "Discovering schemas");

        let walker = WalkDir::new(root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));

        let mut found = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e.path().map_or_else(|| root.to_path_buf(), Path::to_path_buf);
                let kind = e
                    .io_error()
                    .map_or(DiscoveryErrorKind::Other, |io| DiscoveryErrorKind::from_io(io.kind()));
                fail(Some(path), kind)
            })?;

            if !entry.file_type().is_file() {
                continue;
            }
            if !self.loader.accepts(entry.path()) {
                debug!(path = %entry.path().display(), "Skipping non-schema file");
                continue;
            }

            info!(path = %entry.path().display(), "Importing schema");
            let document = self.loader.parse_file(entry.path()).inspect_err(|e| {
                error!(path = %entry.path().display(), error = %e, "Failed to import schema");
            })?;
            found.push(DiscoveredSchema {
                path: entry.into_path(),
                document,
            });
        }

        info!(
            path = %root.display(),
            schemas = found.len(),
            "Schema discovery finished"
        );
        Ok(found)
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with(HIDDEN_PREFIX))
}

fn check_root(root: &Path) -> Result<()> {
    let metadata = std::fs::metadata(root)
        .map_err(|e| fail(Some(root.to_path_buf()), DiscoveryErrorKind::from_io(e.kind())))?;
    if !metadata.is_dir() {
        return Err(fail(Some(root.to_path_buf()), DiscoveryErrorKind::NotADirectory));
    }
    // Listing once surfaces permission problems on the root itself
    std::fs::read_dir(root)
        .map_err(|e| fail(Some(root.to_path_buf()), DiscoveryErrorKind::from_io(e.kind())))?;
    Ok(())
}

fn fail(path: Option<PathBuf>, kind: DiscoveryErrorKind) -> StrataError {
    let err = StrataError::discovery(path, kind);
    error!(error = %err, "Schema discovery failed");
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::YamlSchemaLoader;
    use std::fs;

    fn schema(name: &str) -> String {
        format!("name: {name}\nversion: '1'\ndescription: ''\nproperties:\n  id:\n    type: int\n")
    }

    #[test]
    fn test_discover_recurses_and_skips_hidden() {
        let dir = tempfile::tempdir().expect("temp dir");
        fs::write(dir.path().join("a.yaml"), schema("A")).expect("write");
        fs::write(dir.path().join("_draft.yaml"), schema("Draft")).expect("write");
        fs::write(dir.path().join("README.md"), "# schemas").expect("write");
        fs::create_dir(dir.path().join("nested")).expect("mkdir");
        fs::write(dir.path().join("nested/b.yml"), schema("B")).expect("write");
        fs::create_dir(dir.path().join("_private")).expect("mkdir");
        fs::write(dir.path().join("_private/c.yaml"), schema("C")).expect("write");

        let found = SchemaDiscovery::new(YamlSchemaLoader::new())
            .discover(Some(dir.path()))
            .expect("Test operation failed");
        let names: Vec<&str> = found.iter().map(|d| d.document.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn test_root_errors_are_classified() {
        let discovery = SchemaDiscovery::new(YamlSchemaLoader::new());
        let err = discovery.discover(None).expect_err("unset root");
        assert!(matches!(
            err,
            StrataError::Discovery { kind: DiscoveryErrorKind::NotConfigured, .. }
        ));

        let err = discovery
            .discover(Some(Path::new("/invalid/path")))
            .expect_err("missing root");
        assert!(matches!(
            err,
            StrataError::Discovery { kind: DiscoveryErrorKind::NotFound, .. }
        ));

        let file = tempfile::NamedTempFile::new().expect("temp file");
        let err = discovery.discover(Some(file.path())).expect_err("file root");
        assert!(matches!(
            err,
            StrataError::Discovery { kind: DiscoveryErrorKind::NotADirectory, .. }
        ));
    }
}
