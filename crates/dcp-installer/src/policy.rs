use std::collections::{BTreeMap, HashMap};

use dcp_hash::VersionTuple;

/// One entry in a manager's supported-version list: a partial set of
/// normalized role→value constraints that must *all* match for the entry
/// to apply. Missing keys are unconstrained.
pub type SupportEntry = BTreeMap<String, String>;

/// Per-manager lists of supported version combinations. A manager absent
/// from the map, or present with an empty list, accepts any version.
#[derive(Debug, Clone, Default)]
pub struct SupportedVersions(HashMap<String, Vec<SupportEntry>>);

impl SupportedVersions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(
        manager: impl Into<String>,
        entries: impl IntoIterator<Item = SupportEntry>,
    ) -> Self {
        let mut map = HashMap::new();
        map.insert(manager.into(), entries.into_iter().collect());
        Self(map)
    }

    pub fn insert(&mut self, manager: impl Into<String>, entries: Vec<SupportEntry>) {
        self.0.insert(manager.into(), entries);
    }

    fn entries_for(&self, manager: &str) -> Option<&[SupportEntry]> {
        self.0.get(manager).map(Vec::as_slice)
    }
}

/// Normalize a request's raw version tuple to the policy schema for
/// `manager`. Roles not recognized for the given manager pass through
/// unchanged under their original name (unknown managers are left
/// untouched entirely; any unmapped role within a known manager is simply
/// not present in the normalized set).
fn normalize(manager: &str, versions: &VersionTuple) -> BTreeMap<String, String> {
    let mut normalized = BTreeMap::new();
    match manager {
        "npm" | "yarn" => {
            if let Some(v) = versions.get("node").or_else(|| versions.get("runtime")) {
                normalized.insert("runtime".to_string(), v.to_string());
            }
            if let Some(v) = versions
                .get("npm")
                .or_else(|| versions.get("yarn"))
                .or_else(|| versions.get("package_manager"))
            {
                normalized.insert("package_manager".to_string(), v.to_string());
            }
        }
        "composer" => {
            if let Some(v) = versions.get("php").or_else(|| versions.get("runtime")) {
                normalized.insert("runtime".to_string(), v.to_string());
            }
        }
        _ => {
            for (role, value) in versions.iter() {
                normalized.insert(role.to_string(), value.to_string());
            }
        }
    }
    normalized
}

/// Decide whether `(manager, versions)` is natively supported. First
/// matching entry wins; an empty or absent entry list for the manager
/// means "accept anything".
pub fn is_supported(supported: &SupportedVersions, manager: &str, versions: &VersionTuple) -> bool {
    let Some(entries) = supported.entries_for(manager) else {
        return true;
    };
    if entries.is_empty() {
        return true;
    }

    let normalized = normalize(manager, versions);
    entries.iter().any(|entry| {
        entry
            .iter()
            .all(|(key, value)| normalized.get(key) == Some(value))
    })
}
