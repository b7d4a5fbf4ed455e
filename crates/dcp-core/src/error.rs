/// The five error kinds the orchestrator can surface. `BadRequest` and
/// `NotFound` are client errors; the rest are server errors.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unsupported version for {manager}: {versions} and isolation is unavailable")]
    UnsupportedVersion { manager: String, versions: String },

    #[error("install failed: {0}")]
    InstallFailure(String),

    #[error("storage fault: {0}")]
    StorageFault(String),

    #[error("bundle {0} not found")]
    NotFound(String),
}

impl CacheError {
    /// Whether this error kind maps to a 4xx-shaped client error (vs. a
    /// 5xx-shaped server error). An HTTP layer (out of scope here) would
    /// use this to pick a status code.
    pub fn is_client_error(&self) -> bool {
        matches!(self, CacheError::BadRequest(_) | CacheError::NotFound(_))
    }
}

impl From<dcp_store::StoreError> for CacheError {
    fn from(err: dcp_store::StoreError) -> Self {
        CacheError::StorageFault(err.to_string())
    }
}

impl From<dcp_archive::ArchiveError> for CacheError {
    fn from(err: dcp_archive::ArchiveError) -> Self {
        CacheError::StorageFault(err.to_string())
    }
}

impl From<dcp_exec::ExecError> for CacheError {
    fn from(err: dcp_exec::ExecError) -> Self {
        match err {
            dcp_exec::ExecError::UnsupportedVersion { manager, versions } => {
                CacheError::UnsupportedVersion { manager, versions }
            }
            dcp_exec::ExecError::InstallFailure(msg) => CacheError::InstallFailure(msg),
            dcp_exec::ExecError::UnknownManager(manager) => {
                CacheError::BadRequest(format!("unknown manager: {manager}"))
            }
            dcp_exec::ExecError::Scratch(e) => CacheError::StorageFault(e.to_string()),
        }
    }
}
