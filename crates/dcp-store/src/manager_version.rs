use dcp_hash::VersionTuple;

/// Derive the diagnostic manager-version descriptor stored alongside an
/// index. This is display-only: it is never fed back into
/// [`dcp_hash::fingerprint`], which hashes the raw version tuple directly.
pub fn describe(manager: &str, versions: &VersionTuple) -> String {
    match manager {
        "npm" | "yarn" => {
            let runtime = versions.get("node").or_else(|| versions.get("runtime"));
            let package_manager = versions
                .get("npm")
                .or_else(|| versions.get("yarn"))
                .or_else(|| versions.get("package_manager"));
            match (runtime, package_manager) {
                (Some(r), Some(p)) => format!("{r}_{p}"),
                _ => "unknown".to_string(),
            }
        }
        "composer" => versions
            .get("php")
            .or_else(|| versions.get("runtime"))
            .map(str::to_string)
            .unwrap_or_else(|| "unknown".to_string()),
        _ => "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn versions(pairs: &[(&str, &str)]) -> VersionTuple {
        VersionTuple::new(pairs.iter().map(|(r, v)| (r.to_string(), v.to_string())))
    }

    #[test]
    fn npm_both_present() {
        let v = versions(&[("node", "20.0.0"), ("npm", "10.0.0")]);
        assert_eq!(describe("npm", &v), "20.0.0_10.0.0");
    }

    #[test]
    fn npm_missing_one_is_unknown() {
        let v = versions(&[("node", "20.0.0")]);
        assert_eq!(describe("npm", &v), "unknown");
    }

    #[test]
    fn yarn_aliases_to_same_shape() {
        let v = versions(&[("node", "20.0.0"), ("yarn", "4.1.0")]);
        assert_eq!(describe("yarn", &v), "20.0.0_4.1.0");
    }

    #[test]
    fn composer_runtime_alias() {
        let v = versions(&[("runtime", "8.3.0")]);
        assert_eq!(describe("composer", &v), "8.3.0");
    }

    #[test]
    fn other_manager_is_unknown() {
        let v = versions(&[("whatever", "1.0.0")]);
        assert_eq!(describe("pnpm", &v), "unknown");
    }
}
