use std::path::{Path, PathBuf};

use tracing::debug;

use crate::atomic::write_atomic;
use crate::error::StoreError;

/// Content-addressed immutable file storage.
///
/// Blobs live at `<root>/<first 2 hex chars>/<remaining hex chars>`. The
/// two-level fanout caps any single directory at 256 entries regardless of
/// how many distinct blobs the store accumulates.
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve the on-disk path for a blob hash, without touching the
    /// filesystem.
    pub fn path_for(&self, hash: &str) -> PathBuf {
        let (prefix, rest) = hash.split_at(hash.len().min(2));
        self.root.join(prefix).join(rest)
    }

    pub fn has(&self, hash: &str) -> bool {
        self.path_for(hash).is_file()
    }

    /// Read a blob's bytes, or `Ok(None)` if it isn't present.
    pub fn get(&self, hash: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.path_for(hash);
        match fs_err::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => {
                let e = StoreError::io("read", path, e);
                debug!("{e}");
                Err(e)
            }
        }
    }

    /// Store `bytes`, returning its content hash. Idempotent: storing the
    /// same bytes twice is a no-op the second time (content-addressing
    /// guarantees the existing file is already identical).
    pub fn put(&self, bytes: &[u8]) -> Result<String, StoreError> {
        let hash = dcp_hash::hash_blob(bytes);
        if self.has(&hash) {
            return Ok(hash);
        }
        let path = self.path_for(&hash);
        write_atomic(&path, bytes)?;
        Ok(hash)
    }

    /// Resolve a blob's path for streaming purposes (e.g. into a ZIP
    /// writer) without reading it into memory. Callers must pair this with
    /// [`BlobStore::has`] or [`BlobStore::get`] if they need to know
    /// whether the blob exists.
    pub fn stream_path(&self, hash: &str) -> PathBuf {
        self.path_for(hash)
    }
}

impl AsRef<Path> for BlobStore {
    fn as_ref(&self) -> &Path {
        &self.root
    }
}
