//! A `docker`-backed [`IsolationCapability`], grounded in the original
//! Python source's `DockerUtils` collaborator: it runs the installer
//! inside a container image matching the requested manager/version tuple
//! when the host's native toolchain doesn't satisfy the version policy.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use dcp_hash::VersionTuple;
use dcp_installer::{collect_output_tree, InstallResult};
use tracing::debug;

use crate::IsolationCapability;

/// Runs installs inside `docker run`, mounting the scratch directory and
/// selecting an image tag from the manager + runtime version.
pub struct DockerIsolation {
    /// Image name template, e.g. `"node:{runtime}"` / `"composer:{runtime}"`.
    /// `{runtime}` is substituted with the request's runtime version, or
    /// `latest` if absent.
    image_template: String,
}

impl DockerIsolation {
    pub fn new(image_template: impl Into<String>) -> Self {
        Self {
            image_template: image_template.into(),
        }
    }

    fn image_for(&self, versions: &VersionTuple) -> String {
        let runtime = versions
            .get("node")
            .or_else(|| versions.get("runtime"))
            .or_else(|| versions.get("php"))
            .unwrap_or("latest");
        self.image_template.replace("{runtime}", runtime)
    }
}

#[async_trait]
impl IsolationCapability for DockerIsolation {
    fn available(&self) -> bool {
        // A real deployment would probe the docker daemon (e.g. `docker
        // info`); that probe is an external collaborator this crate only
        // sketches the interface for, so this conservatively reports
        // unavailable unless a daemon check is wired up by the embedder.
        which_docker().is_some()
    }

    async fn install(
        &self,
        dir: &Path,
        manager: &str,
        versions: &VersionTuple,
        custom_args: &[String],
    ) -> InstallResult {
        let image = self.image_for(versions);
        let mount = format!("{}:/work", dir.display());

        let mut args = vec![
            "run".to_string(),
            "--rm".to_string(),
            "-v".to_string(),
            mount,
            "-w".to_string(),
            "/work".to_string(),
            image,
            manager.to_string(),
            "install".to_string(),
        ];
        args.extend(custom_args.iter().cloned());

        let output = tokio::process::Command::new("docker")
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await;

        match output {
            Ok(output) if output.status.success() => match collect_output_tree(dir).await {
                Ok(files) => InstallResult::success(files),
                Err(e) => {
                    let message = format!("failed to collect output tree: {e}");
                    debug!("{message}");
                    InstallResult::failure(message)
                }
            },
            Ok(output) => {
                let message = format!(
                    "docker exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr)
                );
                debug!("{message}");
                InstallResult::failure(message)
            }
            Err(e) => {
                let message = format!("failed to spawn docker: {e}");
                debug!("{message}");
                InstallResult::failure(message)
            }
        }
    }
}

fn which_docker() -> Option<()> {
    std::env::var_os("PATH")?
        .to_str()?
        .split(':')
        .map(std::path::Path::new)
        .any(|dir| dir.join("docker").is_file())
        .then_some(())
}
