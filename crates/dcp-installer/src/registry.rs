use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use dcp_hash::VersionTuple;
use tracing::debug;

/// The outcome of running an installer inside a scratch directory.
#[derive(Debug, Clone)]
pub struct InstallResult {
    pub success: bool,
    /// `(logical_path, bytes)` pairs collected by walking the scratch
    /// directory after install, relative to it. Empty on failure.
    pub files: Vec<(String, Vec<u8>)>,
    pub error: Option<String>,
}

impl InstallResult {
    pub fn success(files: Vec<(String, Vec<u8>)>) -> Self {
        Self {
            success: true,
            files,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            files: Vec::new(),
            error: Some(error.into()),
        }
    }
}

/// Capability that, given a scratch directory already containing a
/// manifest (and optionally a lockfile), materializes the installed
/// dependency tree.
#[async_trait]
pub trait Installer: Send + Sync {
    /// Conventional filename of the input manifest, e.g. `package.json`.
    fn manifest_name(&self) -> &str;

    /// Conventional filename of the input lockfile, e.g. `package-lock.json`.
    fn lockfile_name(&self) -> &str;

    /// Run the package manager inside `work_dir`.
    async fn install(&self, work_dir: &Path) -> InstallResult;
}

/// Walk `work_dir` after a successful install and collect every file,
/// paths relative to `work_dir`, in the shape [`Installer::install`] must
/// return them.
///
/// Shared with `dcp-exec`'s docker-isolation path, which walks the same kind
/// of scratch-directory output tree.
pub async fn collect_output_tree(work_dir: &Path) -> std::io::Result<Vec<(String, Vec<u8>)>> {
    let work_dir = work_dir.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(&work_dir) {
            let entry = entry.map_err(|e| {
                debug!("failed to walk {}: {e}", work_dir.display());
                std::io::Error::from(e)
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&work_dir)
                .expect("walkdir entries are always under work_dir")
                .to_string_lossy()
                .replace(std::path::MAIN_SEPARATOR, "/");
            let content = fs_err::read(entry.path()).inspect_err(|e| debug!("{e}"))?;
            files.push((relative, content));
        }
        Ok(files)
    })
    .await
    .expect("collect_output_tree worker panicked")
}

/// Run `program` with `args` inside `work_dir`, then collect the resulting
/// tree on success. Shared by the three built-in shell-out installers.
async fn run_and_collect(
    program: &str,
    args: &[String],
    work_dir: &Path,
) -> InstallResult {
    let output = tokio::process::Command::new(program)
        .args(args)
        .current_dir(work_dir)
        .stdin(Stdio::null())
        .output()
        .await;

    let output = match output {
        Ok(output) => output,
        Err(e) => {
            debug!("failed to spawn {program}: {e}");
            return InstallResult::failure(format!("failed to spawn {program}: {e}"));
        }
    };

    if !output.status.success() {
        let message = format!(
            "{program} exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        );
        debug!("{message}");
        return InstallResult::failure(message);
    }

    match collect_output_tree(work_dir).await {
        Ok(files) => InstallResult::success(files),
        Err(e) => InstallResult::failure(format!("failed to collect output tree: {e}")),
    }
}

pub struct NpmInstaller {
    custom_args: Vec<String>,
}

#[async_trait]
impl Installer for NpmInstaller {
    fn manifest_name(&self) -> &str {
        "package.json"
    }

    fn lockfile_name(&self) -> &str {
        "package-lock.json"
    }

    async fn install(&self, work_dir: &Path) -> InstallResult {
        let mut args = vec!["install".to_string()];
        args.extend(self.custom_args.iter().cloned());
        run_and_collect("npm", &args, work_dir).await
    }
}

pub struct YarnInstaller {
    custom_args: Vec<String>,
}

#[async_trait]
impl Installer for YarnInstaller {
    fn manifest_name(&self) -> &str {
        "package.json"
    }

    fn lockfile_name(&self) -> &str {
        "yarn.lock"
    }

    async fn install(&self, work_dir: &Path) -> InstallResult {
        let mut args = vec!["install".to_string()];
        args.extend(self.custom_args.iter().cloned());
        run_and_collect("yarn", &args, work_dir).await
    }
}

pub struct ComposerInstaller {
    custom_args: Vec<String>,
}

#[async_trait]
impl Installer for ComposerInstaller {
    fn manifest_name(&self) -> &str {
        "composer.json"
    }

    fn lockfile_name(&self) -> &str {
        "composer.lock"
    }

    async fn install(&self, work_dir: &Path) -> InstallResult {
        let mut args = vec!["install".to_string()];
        args.extend(self.custom_args.iter().cloned());
        run_and_collect("composer", &args, work_dir).await
    }
}

type Factory = Box<dyn Fn(&VersionTuple, &[String]) -> Box<dyn Installer> + Send + Sync>;

/// Resolves `(manager, versions, custom_args)` to an [`Installer`]
/// capability. The version tuple is available to factories so a registry
/// could, in principle, pick different binaries/flags per runtime; the
/// built-in factories ignore it and rely on the ambient
/// `npm`/`yarn`/`composer` binaries on `PATH`.
pub struct InstallerRegistry {
    factories: HashMap<String, Factory>,
}

impl InstallerRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// A registry pre-populated with the `npm`, `yarn`, and `composer`
    /// installers.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("npm", |_versions, custom_args| {
            Box::new(NpmInstaller {
                custom_args: custom_args.to_vec(),
            }) as Box<dyn Installer>
        });
        registry.register("yarn", |_versions, custom_args| {
            Box::new(YarnInstaller {
                custom_args: custom_args.to_vec(),
            }) as Box<dyn Installer>
        });
        registry.register("composer", |_versions, custom_args| {
            Box::new(ComposerInstaller {
                custom_args: custom_args.to_vec(),
            }) as Box<dyn Installer>
        });
        registry
    }

    pub fn register(
        &mut self,
        manager: impl Into<String>,
        factory: impl Fn(&VersionTuple, &[String]) -> Box<dyn Installer> + Send + Sync + 'static,
    ) {
        self.factories.insert(manager.into(), Box::new(factory));
    }

    pub fn resolve(
        &self,
        manager: &str,
        versions: &VersionTuple,
        custom_args: &[String],
    ) -> Option<Box<dyn Installer>> {
        self.factories.get(manager).map(|f| f(versions, custom_args))
    }

    pub fn supports_manager(&self, manager: &str) -> bool {
        self.factories.contains_key(manager)
    }
}

impl Default for InstallerRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_resolves_known_managers() {
        let registry = InstallerRegistry::with_builtin();
        let versions = VersionTuple::default();
        let npm = registry.resolve("npm", &versions, &[]).unwrap();
        assert_eq!(npm.manifest_name(), "package.json");
        assert_eq!(npm.lockfile_name(), "package-lock.json");

        let yarn = registry.resolve("yarn", &versions, &[]).unwrap();
        assert_eq!(yarn.lockfile_name(), "yarn.lock");

        let composer = registry.resolve("composer", &versions, &[]).unwrap();
        assert_eq!(composer.manifest_name(), "composer.json");
    }

    #[test]
    fn unknown_manager_resolves_to_none() {
        let registry = InstallerRegistry::with_builtin();
        assert!(registry.resolve("pnpm", &VersionTuple::default(), &[]).is_none());
        assert!(!registry.supports_manager("pnpm"));
    }

    #[tokio::test]
    async fn collect_output_tree_finds_nested_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("node_modules/x")).unwrap();
        std::fs::write(dir.path().join("node_modules/x/index.js"), b"ok").unwrap();

        let files = collect_output_tree(dir.path()).await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].0, "node_modules/x/index.js");
        assert_eq!(files[0].1, b"ok");
    }
}
