//! Stages a dependency set in a scratch directory and runs the native or
//! isolated installer over it.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use dcp_hash::VersionTuple;
use dcp_installer::{InstallResult, InstallerRegistry, SupportedVersions};
use tracing::debug;

mod docker;
pub use docker::DockerIsolation;

#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("manager {0:?} is not registered with the installer registry")]
    UnknownManager(String),

    #[error("version {versions:?} is not supported for {manager} and isolation is unavailable")]
    UnsupportedVersion { manager: String, versions: String },

    #[error("install failed: {0}")]
    InstallFailure(String),

    #[error("scratch directory error: {0}")]
    Scratch(#[from] std::io::Error),
}

/// The method chosen to run an install, surfaced so the orchestrator can
/// log or report it without re-deriving the decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallMethod {
    Native,
    Isolated,
}

/// Capability that runs an installer inside a sandboxed environment,
/// selected when the host's native version policy rejects the request.
/// The core neither knows nor specifies how isolation is achieved.
#[async_trait]
pub trait IsolationCapability: Send + Sync {
    /// Whether this capability can currently accept work (e.g. the
    /// underlying container runtime is reachable).
    fn available(&self) -> bool;

    async fn install(
        &self,
        dir: &Path,
        manager: &str,
        versions: &VersionTuple,
        custom_args: &[String],
    ) -> InstallResult;
}

/// Request to materialize a dependency set's installed tree.
pub struct ExecRequest {
    pub manager: String,
    pub versions: VersionTuple,
    pub custom_args: Vec<String>,
    pub manifest_content: Vec<u8>,
    /// Empty means "no lockfile": the installer generates one.
    pub lockfile_content: Vec<u8>,
}

pub struct InstallExecutor {
    registry: Arc<InstallerRegistry>,
    supported: Arc<SupportedVersions>,
    isolation: Option<Arc<dyn IsolationCapability>>,
    isolation_enabled: bool,
    scratch_root: Option<std::path::PathBuf>,
}

impl InstallExecutor {
    pub fn new(registry: Arc<InstallerRegistry>, supported: Arc<SupportedVersions>) -> Self {
        Self {
            registry,
            supported,
            isolation: None,
            isolation_enabled: false,
            scratch_root: None,
        }
    }

    #[must_use]
    pub fn with_isolation(
        mut self,
        isolation: Arc<dyn IsolationCapability>,
        enabled: bool,
    ) -> Self {
        self.isolation = Some(isolation);
        self.isolation_enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_scratch_root(mut self, root: impl Into<std::path::PathBuf>) -> Self {
        self.scratch_root = Some(root.into());
        self
    }

    /// Decide whether `request` should run natively or isolated, without
    /// staging or running anything. Exposed so the orchestrator can log the
    /// decision before dispatch.
    pub fn choose_method(&self, request: &ExecRequest) -> Result<InstallMethod, ExecError> {
        if dcp_installer::is_supported(&self.supported, &request.manager, &request.versions) {
            return Ok(InstallMethod::Native);
        }
        match &self.isolation {
            Some(isolation) if self.isolation_enabled && isolation.available() => {
                Ok(InstallMethod::Isolated)
            }
            _ => Err(ExecError::UnsupportedVersion {
                manager: request.manager.clone(),
                versions: format!("{:?}", request.versions.iter().collect::<Vec<_>>()),
            }),
        }
    }

    /// Stage `request` in a scratch directory, run the chosen installer,
    /// and return the materialized file tree. The scratch directory is
    /// removed on every exit path, success or failure, because it is held
    /// as a local [`tempfile::TempDir`] whose `Drop` impl removes it
    /// unconditionally.
    pub async fn run(&self, request: ExecRequest) -> Result<Vec<(String, Vec<u8>)>, ExecError> {
        let method = self.choose_method(&request)?;

        let installer = self
            .registry
            .resolve(&request.manager, &request.versions, &request.custom_args)
            .ok_or_else(|| ExecError::UnknownManager(request.manager.clone()))?;

        let scratch = self.new_scratch_dir().inspect_err(|e| debug!("{e}"))?;
        let scratch_path = scratch.path();

        fs_err::tokio::write(
            scratch_path.join(installer.manifest_name()),
            &request.manifest_content,
        )
        .await
        .inspect_err(|e| debug!("{e}"))?;

        if !request.lockfile_content.is_empty() {
            fs_err::tokio::write(
                scratch_path.join(installer.lockfile_name()),
                &request.lockfile_content,
            )
            .await
            .inspect_err(|e| debug!("{e}"))?;
        }

        let result = match method {
            InstallMethod::Native => installer.install(scratch_path).await,
            InstallMethod::Isolated => {
                let isolation = self
                    .isolation
                    .as_ref()
                    .expect("choose_method only returns Isolated when isolation is configured");
                isolation
                    .install(
                        scratch_path,
                        &request.manager,
                        &request.versions,
                        &request.custom_args,
                    )
                    .await
            }
        };

        // `scratch` is dropped here (end of scope), removing the directory
        // regardless of which branch above executed.
        if result.success {
            Ok(result.files)
        } else {
            let e = ExecError::InstallFailure(
                result.error.unwrap_or_else(|| "installer reported failure with no message".to_string()),
            );
            debug!("{e}");
            Err(e)
        }
    }

    fn new_scratch_dir(&self) -> std::io::Result<tempfile::TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(&format!("dcp-{}-", nanoid::nanoid!(8)));
        match &self.scratch_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcp_installer::{Installer, InstallerRegistry};

    struct RecordingInstaller;

    #[async_trait]
    impl Installer for RecordingInstaller {
        fn manifest_name(&self) -> &str {
            "package.json"
        }
        fn lockfile_name(&self) -> &str {
            "package-lock.json"
        }
        async fn install(&self, work_dir: &Path) -> InstallResult {
            let out = work_dir.join("node_modules/x/index.js");
            std::fs::create_dir_all(out.parent().unwrap()).unwrap();
            std::fs::write(&out, b"ok").unwrap();
            let manifest = std::fs::read(work_dir.join("package.json")).unwrap();
            assert_eq!(manifest, b"{}");
            InstallResult::success(vec![
                ("package.json".to_string(), b"{}".to_vec()),
                ("node_modules/x/index.js".to_string(), b"ok".to_vec()),
            ])
        }
    }

    fn registry_with_recorder() -> Arc<InstallerRegistry> {
        let mut registry = InstallerRegistry::new();
        registry.register("npm", |_v, _a| Box::new(RecordingInstaller));
        Arc::new(registry)
    }

    #[tokio::test]
    async fn native_install_stages_manifest_and_returns_files() {
        let executor = InstallExecutor::new(registry_with_recorder(), Arc::new(SupportedVersions::new()));
        let request = ExecRequest {
            manager: "npm".to_string(),
            versions: VersionTuple::default(),
            custom_args: vec![],
            manifest_content: b"{}".to_vec(),
            lockfile_content: vec![],
        };
        let files = executor.run(request).await.unwrap();
        assert_eq!(files.len(), 2);
    }

    #[tokio::test]
    async fn unsupported_version_without_isolation_fails_fast() {
        let supported = SupportedVersions::with_entries(
            "npm",
            vec![[("runtime".to_string(), "18.0.0".to_string())]
                .into_iter()
                .collect()],
        );
        let executor = InstallExecutor::new(registry_with_recorder(), Arc::new(supported));
        let request = ExecRequest {
            manager: "npm".to_string(),
            versions: VersionTuple::new([("node".to_string(), "20.0.0".to_string())]),
            custom_args: vec![],
            manifest_content: b"{}".to_vec(),
            lockfile_content: vec![],
        };
        let err = executor.run(request).await.unwrap_err();
        assert!(matches!(err, ExecError::UnsupportedVersion { .. }));
    }

    struct AlwaysAvailableIsolation;

    #[async_trait]
    impl IsolationCapability for AlwaysAvailableIsolation {
        fn available(&self) -> bool {
            true
        }
        async fn install(
            &self,
            _dir: &Path,
            _manager: &str,
            _versions: &VersionTuple,
            _custom_args: &[String],
        ) -> InstallResult {
            InstallResult::success(vec![("README".to_string(), b"shared".to_vec())])
        }
    }

    #[tokio::test]
    async fn unsupported_version_with_isolation_enabled_runs_isolated() {
        let supported = SupportedVersions::with_entries(
            "npm",
            vec![[("runtime".to_string(), "18.0.0".to_string())]
                .into_iter()
                .collect()],
        );
        let executor = InstallExecutor::new(registry_with_recorder(), Arc::new(supported))
            .with_isolation(Arc::new(AlwaysAvailableIsolation), true);
        let request = ExecRequest {
            manager: "npm".to_string(),
            versions: VersionTuple::new([("node".to_string(), "20.0.0".to_string())]),
            custom_args: vec![],
            manifest_content: b"{}".to_vec(),
            lockfile_content: vec![],
        };
        let files = executor.run(request).await.unwrap();
        assert_eq!(files, vec![("README".to_string(), b"shared".to_vec())]);
    }

    #[tokio::test]
    async fn scratch_directory_is_removed_after_run() {
        let scratch_root = tempfile::tempdir().unwrap();
        let executor = InstallExecutor::new(registry_with_recorder(), Arc::new(SupportedVersions::new()))
            .with_scratch_root(scratch_root.path());
        let request = ExecRequest {
            manager: "npm".to_string(),
            versions: VersionTuple::default(),
            custom_args: vec![],
            manifest_content: b"{}".to_vec(),
            lockfile_content: vec![],
        };
        executor.run(request).await.unwrap();
        assert_eq!(std::fs::read_dir(scratch_root.path()).unwrap().count(), 0);
    }
}
