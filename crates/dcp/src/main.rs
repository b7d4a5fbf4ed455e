//! Thin CLI shell around `dcp-core`: drives the request orchestrator
//! end-to-end against the local filesystem, without an HTTP layer.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use dcp_core::{CacheRequest, Config, RequestOrchestrator};
use dcp_exec::{DockerIsolation, InstallExecutor};
use dcp_hash::VersionTuple;
use dcp_installer::InstallerRegistry;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Process a single dependency-cache request against a local cache
/// directory and print the resulting bundle id, download path, and
/// cache-hit flag as JSON.
#[derive(Debug, Parser)]
#[command(name = "dcp", version, about)]
struct Cli {
    /// Package manager tag: npm, yarn, or composer.
    #[arg(long)]
    manager: String,

    /// Path to the manifest file (package.json, composer.json, ...).
    #[arg(long)]
    manifest: PathBuf,

    /// Path to the lockfile, if any.
    #[arg(long)]
    lockfile: Option<PathBuf>,

    /// Version role=value pairs, e.g. `--version node=20.0.0 --version npm=10.0.0`.
    #[arg(long = "version", value_parser = parse_version_pair)]
    versions: Vec<(String, String)>,

    /// Custom args forwarded verbatim to the installer.
    #[arg(long = "custom-arg")]
    custom_args: Vec<String>,

    /// Cache root directory.
    #[arg(long, default_value = "./dcp-cache")]
    cache_dir: PathBuf,

    /// Optional TOML config file (supported-version table, isolation toggle).
    #[arg(long)]
    config: Option<PathBuf>,
}

fn parse_version_pair(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(role, value)| (role.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected role=value, got {s:?}"))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_tree::HierarchicalLayer::new(2))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => {
            let raw = fs_err::read_to_string(path).context("reading config file")?;
            Config::from_toml_str(&raw).context("parsing config file")?
        }
        None => Config::new(&cli.cache_dir),
    };

    let manifest_content =
        fs_err::read(&cli.manifest).with_context(|| format!("reading manifest {:?}", cli.manifest))?;
    if manifest_content.is_empty() {
        bail!("manifest at {:?} is empty", cli.manifest);
    }
    let lockfile_content = match &cli.lockfile {
        Some(path) => fs_err::read(path).with_context(|| format!("reading lockfile {path:?}"))?,
        None => Vec::new(),
    };

    let registry = std::sync::Arc::new(InstallerRegistry::with_builtin());
    let mut executor = InstallExecutor::new(
        registry.clone(),
        std::sync::Arc::new(config.supported_versions.clone()),
    );
    if let Some(root) = &config.scratch_root {
        executor = executor.with_scratch_root(root.clone());
    }
    executor = executor.with_isolation(
        std::sync::Arc::new(DockerIsolation::new(config.docker_image_template.clone())),
        config.use_isolation_on_mismatch,
    );
    let store = dcp_core::CacheStore::open(&config.cache_dir).context("opening cache store")?;
    let orchestrator = RequestOrchestrator::new(registry, executor, store, config.single_flight);

    let request = CacheRequest {
        manager: cli.manager,
        versions: VersionTuple::new(cli.versions),
        manifest_content,
        lockfile_content,
        custom_args: cli.custom_args,
    };

    let response = orchestrator.handle(request).await?;
    let json = serde_json::json!({
        "bundle_id": response.bundle_id.as_str(),
        "download_path": response.download_path,
        "cache_hit": response.cache_hit,
    });
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
