//! Deterministic ZIP assembly from a bundle's index.

use std::io::Write;
use std::path::{Path, PathBuf};

use dcp_store::{BlobStore, IndexStore};
use tracing::debug;
use zip::write::FileOptions;
use zip::{DateTime, ZipWriter};

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("bundle {0} has no index; build the index before archiving")]
    MissingIndex(String),

    #[error("bundle {bundle_id} references blob {blob_hash} for {path}, which is missing from the blob store")]
    MissingBlob {
        bundle_id: String,
        path: String,
        blob_hash: String,
    },

    #[error("store error: {0}")]
    Store(#[from] dcp_store::StoreError),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Packages per-bundle indexes into downloadable ZIP archives.
#[derive(Clone)]
pub struct BundleArchiver {
    bundles_dir: PathBuf,
}

impl BundleArchiver {
    pub fn new(bundles_dir: impl Into<PathBuf>) -> Self {
        Self {
            bundles_dir: bundles_dir.into(),
        }
    }

    /// Path the archive for `bundle_id` would live at, regardless of
    /// whether it has been built yet.
    fn path_for(&self, bundle_id: &str) -> PathBuf {
        self.bundles_dir.join(format!("{bundle_id}.zip"))
    }

    /// Path to an already-built archive, or `None` if it doesn't exist yet.
    pub fn path(&self, bundle_id: &str) -> Option<PathBuf> {
        let path = self.path_for(bundle_id);
        path.is_file().then_some(path)
    }

    /// Build (or rebuild) the archive for `bundle_id` from its index and
    /// the blobs it references. Entries are written in logical-path
    /// lexicographic order and with a fixed modification time, so two
    /// builds from the same index produce byte-identical archives.
    pub fn build(
        &self,
        bundle_id: &str,
        index_store: &IndexStore,
        blob_store: &BlobStore,
    ) -> Result<PathBuf, ArchiveError> {
        let index = index_store.load(bundle_id)?.ok_or_else(|| {
            let e = ArchiveError::MissingIndex(bundle_id.to_string());
            debug!("{e}");
            e
        })?;

        fs_err::create_dir_all(&self.bundles_dir).inspect_err(|e| debug!("{e}"))?;
        let tmp_path = self.bundles_dir.join(format!(".tmp-{bundle_id}.zip"));
        let final_path = self.path_for(bundle_id);

        {
            let file = fs_err::File::create(&tmp_path).inspect_err(|e| debug!("{e}"))?;
            let mut writer = ZipWriter::new(file);
            let options = FileOptions::default()
                .compression_method(zip::CompressionMethod::Deflated)
                .last_modified_time(DateTime::default())
                .unix_permissions(0o644);

            // `files` is a `BTreeMap`, so this iterates in sorted path order
            // already; the sort below is defensive in case that invariant
            // ever changes upstream.
            let mut entries: Vec<(&String, &String)> = index.files.iter().collect();
            entries.sort_unstable_by_key(|(path, _)| path.as_str());

            for (path, blob_hash) in entries {
                let content = blob_store.get(blob_hash)?.ok_or_else(|| {
                    let e = ArchiveError::MissingBlob {
                        bundle_id: bundle_id.to_string(),
                        path: path.clone(),
                        blob_hash: blob_hash.clone(),
                    };
                    debug!("{e}");
                    e
                })?;
                writer
                    .start_file(path, options)
                    .inspect_err(|e| debug!("failed to start zip entry {path}: {e}"))?;
                writer
                    .write_all(&content)
                    .inspect_err(|e| debug!("failed to write zip entry {path}: {e}"))?;
            }

            writer.finish().inspect_err(|e| debug!("{e}"))?;
        }

        fs_err::rename(&tmp_path, &final_path).inspect_err(|e| debug!("{e}"))?;
        Ok(final_path)
    }
}

impl AsRef<Path> for BundleArchiver {
    fn as_ref(&self) -> &Path {
        &self.bundles_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::io::Read;

    #[test]
    fn builds_archive_with_index_contents() {
        let dir = tempfile::tempdir().unwrap();
        let blob_store = BlobStore::new(dir.path().join("blobs"));
        let index_store = IndexStore::new(dir.path().join("indexes"));
        let archiver = BundleArchiver::new(dir.path().join("bundles"));

        let hash = blob_store.put(b"ok").unwrap();
        let mut files = BTreeMap::new();
        files.insert("node_modules/x/index.js".to_string(), hash);
        index_store
            .save("bundle1", "npm", "20.0.0_10.0.0", files)
            .unwrap();

        let archive_path = archiver.build("bundle1", &index_store, &blob_store).unwrap();
        assert_eq!(archiver.path("bundle1"), Some(archive_path.clone()));

        let file = fs_err::File::open(&archive_path).unwrap();
        let mut zip = zip::ZipArchive::new(file).unwrap();
        assert_eq!(zip.len(), 1);
        let mut entry = zip.by_index(0).unwrap();
        assert_eq!(entry.name(), "node_modules/x/index.js");
        let mut content = String::new();
        entry.read_to_string(&mut content).unwrap();
        assert_eq!(content, "ok");
    }

    #[test]
    fn missing_index_is_an_error_not_an_empty_archive() {
        let dir = tempfile::tempdir().unwrap();
        let blob_store = BlobStore::new(dir.path().join("blobs"));
        let index_store = IndexStore::new(dir.path().join("indexes"));
        let archiver = BundleArchiver::new(dir.path().join("bundles"));

        let err = archiver
            .build("missing", &index_store, &blob_store)
            .unwrap_err();
        assert!(matches!(err, ArchiveError::MissingIndex(_)));
    }

    #[test]
    fn rebuilding_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let blob_store = BlobStore::new(dir.path().join("blobs"));
        let index_store = IndexStore::new(dir.path().join("indexes"));
        let archiver = BundleArchiver::new(dir.path().join("bundles"));

        let hash = blob_store.put(b"ok").unwrap();
        let mut files = BTreeMap::new();
        files.insert("a".to_string(), hash);
        index_store.save("bundle1", "npm", "unknown", files).unwrap();

        let path = archiver.build("bundle1", &index_store, &blob_store).unwrap();
        let first = fs_err::read(&path).unwrap();
        let path2 = archiver.build("bundle1", &index_store, &blob_store).unwrap();
        let second = fs_err::read(&path2).unwrap();
        assert_eq!(first, second);
    }
}
