use std::path::{Path, PathBuf};

use crate::error::StoreError;

/// The three top-level directories that make up the on-disk cache:
///
/// ```text
/// <cache_dir>/
///   blobs/<aa>/<bbbbb...>
///   indexes/<bundle_id>.json
///   bundles/<bundle_id>.zip
/// ```
#[derive(Debug, Clone)]
pub struct CacheRoot {
    root: PathBuf,
}

impl CacheRoot {
    /// Open (creating if necessary) a cache rooted at `root`.
    pub fn init(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        for dir in [
            root.clone(),
            root.join("blobs"),
            root.join("indexes"),
            root.join("bundles"),
        ] {
            fs_err::create_dir_all(&dir).map_err(|e| StoreError::io("create directory", dir, e))?;
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn blobs_dir(&self) -> PathBuf {
        self.root.join("blobs")
    }

    pub fn indexes_dir(&self) -> PathBuf {
        self.root.join("indexes")
    }

    pub fn bundles_dir(&self) -> PathBuf {
        self.root.join("bundles")
    }
}
