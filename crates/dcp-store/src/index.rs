use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::atomic::write_atomic;
use crate::error::StoreError;

/// A bundle-scoped record: the bundle id, manager tag, a diagnostic
/// manager-version descriptor, and the logical-path → blob-hash mapping
/// covering every file in the installed tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    pub bundle_hash: String,
    pub manager: String,
    pub manager_version: String,
    /// `BTreeMap` so serialized JSON key order is stable, matching the
    /// determinism the rest of the store cares about.
    pub files: BTreeMap<String, String>,
}

/// Per-bundle index storage: one JSON document per bundle at
/// `<root>/<bundle_id>.json`, written atomically.
#[derive(Debug, Clone)]
pub struct IndexStore {
    root: PathBuf,
}

impl IndexStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, bundle_id: &str) -> PathBuf {
        self.root.join(format!("{bundle_id}.json"))
    }

    pub fn has_bundle(&self, bundle_id: &str) -> bool {
        self.path_for(bundle_id).is_file()
    }

    pub fn save(
        &self,
        bundle_id: &str,
        manager: &str,
        manager_version: &str,
        files: BTreeMap<String, String>,
    ) -> Result<(), StoreError> {
        let index = Index {
            bundle_hash: bundle_id.to_string(),
            manager: manager.to_string(),
            manager_version: manager_version.to_string(),
            files,
        };
        let path = self.path_for(bundle_id);
        let bytes = serde_json::to_vec_pretty(&index)
            .expect("Index serialization is infallible for owned String/BTreeMap data");
        write_atomic(&path, &bytes)
    }

    pub fn load(&self, bundle_id: &str) -> Result<Option<Index>, StoreError> {
        let path = self.path_for(bundle_id);
        let bytes = match fs_err::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                let e = StoreError::io("read", path, e);
                debug!("{e}");
                return Err(e);
            }
        };
        let index = serde_json::from_slice(&bytes).map_err(|e| {
            let e = StoreError::Corrupt { path, source: e };
            debug!("{e}");
            e
        })?;
        Ok(Some(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_load_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::new(dir.path());
        let mut files = BTreeMap::new();
        files.insert("node_modules/x/index.js".to_string(), "abc123".to_string());

        store.save("bundle1", "npm", "20.0.0_10.0.0", files.clone()).unwrap();

        let loaded = store.load("bundle1").unwrap().unwrap();
        assert_eq!(loaded.bundle_hash, "bundle1");
        assert_eq!(loaded.manager, "npm");
        assert_eq!(loaded.manager_version, "20.0.0_10.0.0");
        assert_eq!(loaded.files, files);
    }

    #[test]
    fn missing_index_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::new(dir.path());
        assert!(store.load("missing").unwrap().is_none());
        assert!(!store.has_bundle("missing"));
    }
}
