use std::collections::BTreeMap;
use std::path::PathBuf;

use dcp_archive::BundleArchiver;
use dcp_store::{BlobStore, CacheRoot, IndexStore, StoreError};

/// Facade tying the blob store, index store, and bundle archiver together
/// behind a fixed write order: all blobs are written before the index, and
/// the index before the archive.
///
/// A bundle only counts as present once both its index *and* its archive
/// exist, which would otherwise force `dcp-store` to depend on
/// `dcp-archive`. That dependency runs the other way (the archiver reads
/// the index store), so this facade — not `IndexStore` itself — is where
/// `has_bundle` actually lives.
#[derive(Clone)]
pub struct CacheStore {
    root: CacheRoot,
    blobs: BlobStore,
    indexes: IndexStore,
    archiver: BundleArchiver,
}

impl CacheStore {
    pub fn open(cache_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = CacheRoot::init(cache_dir)?;
        let blobs = BlobStore::new(root.blobs_dir());
        let indexes = IndexStore::new(root.indexes_dir());
        let archiver = BundleArchiver::new(root.bundles_dir());
        Ok(Self {
            root,
            blobs,
            indexes,
            archiver,
        })
    }

    pub fn root(&self) -> &CacheRoot {
        &self.root
    }

    /// True iff both the index and a materialized archive exist for
    /// `bundle_id`. A stale index with no archive is treated as a miss, so
    /// this checks archive presence too rather than stopping at the index.
    pub fn has_bundle(&self, bundle_id: &str) -> bool {
        self.indexes.has_bundle(bundle_id) && self.archiver.path(bundle_id).is_some()
    }

    pub fn archive_path(&self, bundle_id: &str) -> Option<PathBuf> {
        self.archiver.path(bundle_id)
    }

    /// Write every file's content as a blob, save the index, then build
    /// the archive — in that fixed order. Runs on a blocking-task pool
    /// since the underlying store APIs are synchronous filesystem calls.
    pub async fn store_bundle(
        &self,
        bundle_id: String,
        manager: String,
        manager_version: String,
        files: Vec<(String, Vec<u8>)>,
    ) -> Result<PathBuf, StoreBundleError> {
        let blobs = self.blobs.clone();
        let indexes = self.indexes.clone();
        let archiver = self.archiver.clone();

        tokio::task::spawn_blocking(move || -> Result<PathBuf, StoreBundleError> {
            let mut mapping = BTreeMap::new();
            for (path, content) in files {
                let hash = blobs.put(&content)?;
                mapping.insert(path, hash);
            }

            indexes.save(&bundle_id, &manager, &manager_version, mapping)?;

            let archive_path = archiver.build(&bundle_id, &indexes, &blobs)?;
            Ok(archive_path)
        })
        .await
        .expect("store_bundle worker panicked")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreBundleError {
    #[error(transparent)]
    Store(#[from] dcp_store::StoreError),
    #[error(transparent)]
    Archive(#[from] dcp_archive::ArchiveError),
}
