//! Deterministic fingerprinting of a dependency set.
//!
//! A [`DependencySet`] is the sole input to [`fingerprint`]; the resulting
//! [`BundleId`] is the cache key the rest of the system is built around.
//! See the canonicalization rules this module implements.

use std::fmt;

use sha2::{Digest, Sha256};

/// An open role→version mapping, e.g. `[("node", "20.0.0"), ("npm", "10.0.0")]`.
///
/// Roles are carried exactly as received: no alias normalization happens
/// here. Normalizing roles for version-policy lookups is a separate concern
/// (see `dcp-installer::policy`) that must not feed back into the
/// fingerprint, or semantically-identical requests under different role
/// spellings would collide.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionTuple(Vec<(String, String)>);

impl VersionTuple {
    /// Build a tuple from an arbitrary iterable of `(role, value)` pairs.
    /// Duplicate roles are preserved in insertion order; callers should not
    /// pass duplicates, but this type does not police it.
    pub fn new(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        Self(pairs.into_iter().collect())
    }

    /// Look up a role's value, if present.
    pub fn get(&self, role: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(r, _)| r == role)
            .map(|(_, v)| v.as_str())
    }

    /// Iterate over the raw `(role, value)` pairs in whatever order they
    /// were supplied.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(r, v)| (r.as_str(), v.as_str()))
    }

    /// Pairs sorted lexicographically by role, for canonicalization.
    fn sorted(&self) -> Vec<(&str, &str)> {
        let mut pairs: Vec<(&str, &str)> = self.iter().collect();
        pairs.sort_unstable_by(|a, b| a.0.cmp(b.0));
        pairs
    }
}

impl FromIterator<(String, String)> for VersionTuple {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self::new(iter)
    }
}

/// A single file in a dependency set: a POSIX-relative logical path paired
/// with opaque byte content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyFile {
    pub path: String,
    pub content: Vec<u8>,
}

impl DependencyFile {
    pub fn new(path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// The unordered collection of dependency files, manager tag, and version
/// tuple that together determine bundle identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencySet {
    pub manager: String,
    pub versions: VersionTuple,
    pub files: Vec<DependencyFile>,
}

impl DependencySet {
    pub fn new(
        manager: impl Into<String>,
        versions: VersionTuple,
        files: Vec<DependencyFile>,
    ) -> Self {
        Self {
            manager: manager.into(),
            versions,
            files,
        }
    }

    /// Files sorted lexicographically by logical path.
    fn sorted_files(&self) -> Vec<&DependencyFile> {
        let mut files: Vec<&DependencyFile> = self.files.iter().collect();
        files.sort_unstable_by(|a, b| a.path.cmp(&b.path));
        files
    }
}

/// A hex-encoded SHA-256 digest identifying a bundle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BundleId(String);

impl BundleId {
    /// Wrap an already-hex-encoded id, e.g. one read back from the index
    /// store. Does not validate hex-ness; callers that need to trust
    /// untrusted input should validate separately.
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BundleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for BundleId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Write a length-prefixed byte string: a fixed-width u64 big-endian length
/// followed by the bytes themselves.
fn write_length_prefixed(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
}

/// Compute the bundle id for a dependency set.
///
/// Canonicalization order:
/// 1. manager tag, length-prefixed
/// 2. version tuple, pairs sorted by role, each length-prefixed
/// 3. files, sorted by path, each as `(path, length(content), content)`
///
/// Pure and total: the same `DependencySet` value always yields the same
/// [`BundleId`], on any machine, in any process.
pub fn fingerprint(set: &DependencySet) -> BundleId {
    let mut hasher = Sha256::new();

    write_length_prefixed(&mut hasher, set.manager.as_bytes());

    for (role, value) in set.versions.sorted() {
        write_length_prefixed(&mut hasher, role.as_bytes());
        write_length_prefixed(&mut hasher, value.as_bytes());
    }

    for file in set.sorted_files() {
        write_length_prefixed(&mut hasher, file.path.as_bytes());
        write_length_prefixed(&mut hasher, &file.content);
    }

    BundleId(hex::encode(hasher.finalize()))
}

/// Content hash of a single blob, under the same algorithm [`fingerprint`]
/// uses: the hash algorithm is fixed once for the whole store.
pub fn hash_blob(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn versions(pairs: &[(&str, &str)]) -> VersionTuple {
        VersionTuple::new(
            pairs
                .iter()
                .map(|(r, v)| (r.to_string(), v.to_string())),
        )
    }

    #[test]
    fn deterministic_across_calls() {
        let set = DependencySet::new(
            "npm",
            versions(&[("node", "20.0.0"), ("npm", "10.0.0")]),
            vec![DependencyFile::new("package.json", b"{}".to_vec())],
        );
        assert_eq!(fingerprint(&set), fingerprint(&set));
    }

    #[test]
    fn sensitive_to_manifest_bytes() {
        let a = DependencySet::new(
            "npm",
            versions(&[("node", "20.0.0")]),
            vec![DependencyFile::new("package.json", b"{\"a\":1}".to_vec())],
        );
        let b = DependencySet::new(
            "npm",
            versions(&[("node", "20.0.0")]),
            vec![DependencyFile::new("package.json", b"{\"a\":2}".to_vec())],
        );
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn sensitive_to_version_value() {
        let a = DependencySet::new("npm", versions(&[("node", "20.0.0")]), vec![]);
        let b = DependencySet::new("npm", versions(&[("node", "20.0.1")]), vec![]);
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn sensitive_to_manager_tag() {
        let a = DependencySet::new("npm", VersionTuple::default(), vec![]);
        let b = DependencySet::new("yarn", VersionTuple::default(), vec![]);
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn file_order_in_request_does_not_matter() {
        let files_a = vec![
            DependencyFile::new("b.txt", b"B".to_vec()),
            DependencyFile::new("a.txt", b"A".to_vec()),
        ];
        let files_b = vec![
            DependencyFile::new("a.txt", b"A".to_vec()),
            DependencyFile::new("b.txt", b"B".to_vec()),
        ];
        let a = DependencySet::new("npm", VersionTuple::default(), files_a);
        let b = DependencySet::new("npm", VersionTuple::default(), files_b);
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn version_role_order_does_not_matter() {
        let a = DependencySet::new(
            "npm",
            versions(&[("node", "20.0.0"), ("npm", "10.0.0")]),
            vec![],
        );
        let b = DependencySet::new(
            "npm",
            versions(&[("npm", "10.0.0"), ("node", "20.0.0")]),
            vec![],
        );
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn raw_role_aliasing_still_changes_the_id() {
        // Policy-equivalent role spellings must still produce distinct
        // bundle ids: fingerprinting hashes raw roles, not normalized ones.
        let a = DependencySet::new(
            "npm",
            versions(&[("node", "20.0.0"), ("npm", "10.0.0")]),
            vec![],
        );
        let b = DependencySet::new(
            "npm",
            versions(&[("runtime", "20.0.0"), ("package_manager", "10.0.0")]),
            vec![],
        );
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn no_ambiguous_concatenation_across_adjacent_fields() {
        // path="ab", content="" vs path="a", content="b" must not collide
        // thanks to length prefixing.
        let a = DependencySet::new(
            "npm",
            VersionTuple::default(),
            vec![DependencyFile::new("ab", b"".to_vec())],
        );
        let b = DependencySet::new(
            "npm",
            VersionTuple::default(),
            vec![DependencyFile::new("a", b"b".to_vec())],
        );
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn hash_blob_matches_sha256() {
        let digest = hash_blob(b"ok");
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, hash_blob(b"ok"));
        assert_ne!(digest, hash_blob(b"no"));
    }
}
