//! Installer capability resolution and native-version policy.

mod policy;
mod registry;

pub use policy::{is_supported, SupportEntry, SupportedVersions};
pub use registry::{
    collect_output_tree, ComposerInstaller, InstallResult, Installer, InstallerRegistry,
    NpmInstaller, YarnInstaller,
};
