use std::collections::BTreeMap;
use std::path::PathBuf;

use dcp_installer::SupportedVersions;
use serde::Deserialize;

/// Tunables the orchestrator needs. Constructing a `Config` in code (tests,
/// embedding) or parsing one from a TOML string are both in scope; *finding*
/// the right TOML file on disk, environment-variable overlays, and hot
/// reload are left to the embedder.
#[derive(Debug, Clone)]
pub struct Config {
    pub cache_dir: PathBuf,
    pub supported_versions: SupportedVersions,
    pub use_isolation_on_mismatch: bool,
    pub single_flight: bool,
    pub scratch_root: Option<PathBuf>,
    pub docker_image_template: String,
}

impl Config {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            supported_versions: SupportedVersions::new(),
            use_isolation_on_mismatch: false,
            single_flight: false,
            scratch_root: None,
            docker_image_template: default_docker_image_template(),
        }
    }

    /// Parse a `Config` from a TOML document shaped like:
    ///
    /// ```toml
    /// cache_dir = "/var/cache/dcp"
    /// use_isolation_on_mismatch = true
    /// single_flight = false
    ///
    /// [supported_versions.npm]
    /// entries = [
    ///   { runtime = "18.0.0", package_manager = "9.0.0" },
    /// ]
    /// ```
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(s)?;
        let mut supported_versions = SupportedVersions::new();
        for (manager, entries) in raw.supported_versions {
            supported_versions.insert(manager, entries.entries);
        }
        Ok(Self {
            cache_dir: raw.cache_dir,
            supported_versions,
            use_isolation_on_mismatch: raw.use_isolation_on_mismatch,
            single_flight: raw.single_flight,
            scratch_root: raw.scratch_root,
            docker_image_template: raw
                .docker_image_template
                .unwrap_or_else(default_docker_image_template),
        })
    }
}

fn default_docker_image_template() -> String {
    "node:{runtime}".to_string()
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    cache_dir: PathBuf,
    #[serde(default)]
    supported_versions: BTreeMap<String, RawManagerEntries>,
    #[serde(default)]
    use_isolation_on_mismatch: bool,
    #[serde(default)]
    single_flight: bool,
    #[serde(default)]
    scratch_root: Option<PathBuf>,
    #[serde(default)]
    docker_image_template: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawManagerEntries {
    #[serde(default)]
    entries: Vec<BTreeMap<String, String>>,
}
