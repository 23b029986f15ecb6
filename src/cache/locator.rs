//! Locator Module
//!
//! Maps an identifier and an expiration policy to the on-disk location of
//! its entry: `<root>/<namespace dir>/<sha256(identifier)>.<ext>`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use sha2::{Digest, Sha256};

use crate::cache::ExpirationPolicy;
use crate::config::Config;

// == Namespace ==
/// Storage subdivision selected by the expiration policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Entries that never expire
    Permanent,
    /// Entries with a bounded policy
    Expiring,
}

impl Namespace {
    /// Unbounded policies map to the permanent namespace, everything else expires.
    pub fn for_policy(policy: &ExpirationPolicy) -> Self {
        if policy.is_unbounded() {
            Namespace::Permanent
        } else {
            Namespace::Expiring
        }
    }

    /// Directory holding this namespace under the configured root.
    pub fn dir(self, config: &Config) -> PathBuf {
        let name = match self {
            Namespace::Permanent => &config.permanent_dir,
            Namespace::Expiring => &config.expiring_dir,
        };
        config.root.join(name)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Namespace::Permanent => f.write_str("permanent"),
            Namespace::Expiring => f.write_str("expiring"),
        }
    }
}

// == Storage Key ==
/// Hex-encoded SHA-256 digest of the identifier bytes.
pub fn storage_key(identifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(identifier.as_bytes());
    hex::encode(hasher.finalize())
}

/// Distinguishes concurrent staging files of one process.
static STAGING_SEQ: AtomicU64 = AtomicU64::new(0);

// == Location ==
/// Fully resolved position of one cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    namespace: Namespace,
    storage_key: String,
    dir: PathBuf,
    path: PathBuf,
}

impl Location {
    /// Resolves where `identifier` lives under `policy`. Performs no I/O.
    pub fn resolve(config: &Config, identifier: &str, policy: &ExpirationPolicy) -> Self {
        let namespace = Namespace::for_policy(policy);
        let storage_key = storage_key(identifier);
        let dir = namespace.dir(config);
        let path = dir.join(format!("{}.{}", storage_key, config.extension));

        Self {
            namespace,
            storage_key,
            dir,
            path,
        }
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    /// Namespace directory containing the entry.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the entry file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling path a write is staged at before being renamed into place.
    ///
    /// Unique per call, so concurrent pushes of one key never share a file.
    pub fn staging_path(&self) -> PathBuf {
        let seq = STAGING_SEQ.fetch_add(1, Ordering::Relaxed);
        self.dir.join(format!(
            ".{}.{}.{}.tmp",
            self.storage_key,
            std::process::id(),
            seq
        ))
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn bounded() -> ExpirationPolicy {
        ExpirationPolicy::parse("+1 hour").unwrap()
    }

    #[test]
    fn test_storage_key_is_fixed_width_hex() {
        let key = storage_key("user:42");
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_storage_key_known_digest() {
        assert_eq!(
            storage_key("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_storage_key_is_case_sensitive() {
        assert_ne!(storage_key("User:42"), storage_key("user:42"));
    }

    #[test]
    fn test_namespace_for_policy() {
        assert_eq!(
            Namespace::for_policy(&ExpirationPolicy::Unbounded),
            Namespace::Permanent
        );
        assert_eq!(Namespace::for_policy(&bounded()), Namespace::Expiring);
    }

    #[test]
    fn test_location_layout() {
        let config = Config::default().with_root("/srv/cache");
        let location = Location::resolve(&config, "user:42", &ExpirationPolicy::Unbounded);

        let expected = PathBuf::from("/srv/cache/static")
            .join(format!("{}.cache", storage_key("user:42")));
        assert_eq!(location.path(), expected.as_path());
        assert_eq!(location.dir(), Path::new("/srv/cache/static"));
        assert_eq!(location.namespace(), Namespace::Permanent);
    }

    #[test]
    fn test_same_identifier_different_policy_class() {
        let config = Config::default();
        let permanent = Location::resolve(&config, "report:7", &ExpirationPolicy::Unbounded);
        let expiring = Location::resolve(&config, "report:7", &bounded());

        assert_eq!(permanent.storage_key(), expiring.storage_key());
        assert_ne!(permanent.path(), expiring.path());
    }

    #[test]
    fn test_bounded_policies_share_location() {
        let config = Config::default();
        let hour = Location::resolve(&config, "report:7", &bounded());
        let day = Location::resolve(&config, "report:7", &ExpirationPolicy::parse("+1 day").unwrap());
        assert_eq!(hour, day);
    }

    #[test]
    fn test_staging_path_is_hidden_sibling() {
        let location = Location::resolve(&Config::default(), "x", &ExpirationPolicy::Unbounded);
        let staging = location.staging_path();
        assert_eq!(staging.parent(), Some(location.dir()));
        let name = staging.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with('.'));
        assert!(name.ends_with(".tmp"));
    }

    #[test]
    fn test_staging_path_unique_per_call() {
        let location = Location::resolve(&Config::default(), "x", &ExpirationPolicy::Unbounded);
        let first = location.staging_path();
        let second = location.staging_path();
        assert_ne!(first, second);
        assert_eq!(first.parent(), second.parent());
    }
}
