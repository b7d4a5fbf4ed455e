use dcp_hash::{BundleId, VersionTuple};

/// A request to the orchestrator.
#[derive(Debug, Clone)]
pub struct CacheRequest {
    pub manager: String,
    pub versions: VersionTuple,
    /// Must be non-empty; checked at the start of `handle`.
    pub manifest_content: Vec<u8>,
    /// Empty means "no lockfile".
    pub lockfile_content: Vec<u8>,
    pub custom_args: Vec<String>,
}

/// The orchestrator's response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheResponse {
    pub bundle_id: BundleId,
    pub download_path: String,
    pub cache_hit: bool,
}

impl CacheResponse {
    pub fn new(bundle_id: BundleId, cache_hit: bool) -> Self {
        let download_path = format!("/download/{bundle_id}.zip");
        Self {
            bundle_id,
            download_path,
            cache_hit,
        }
    }
}
