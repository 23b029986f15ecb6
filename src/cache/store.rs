//! Cache Store Module
//!
//! Per-identifier handle combining the locator, the codec pipeline and
//! freshness evaluation over blocking filesystem I/O.

use std::fs::{self, DirBuilder};
use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::cache::codec::{self, CodecError};
use crate::cache::freshness::{self, Freshness};
use crate::cache::{ExpirationPolicy, Location, Namespace};
use crate::config::Config;
use crate::error::{CacheError, Result};

// == Cache Store ==
/// Handle bound to one identifier and one expiration policy.
///
/// Constructing a store performs no I/O. Every `fetch` and `push` hits the
/// filesystem directly; nothing is cached in memory between calls.
#[derive(Debug, Clone)]
pub struct CacheStore {
    /// Caller-supplied identifier, unique per logical object
    identifier: String,
    /// Freshness policy, also selects the namespace
    policy: ExpirationPolicy,
    /// Resolved on-disk position
    location: Location,
    /// Mode for namespace directories created by `push`
    dir_mode: u32,
    /// Deflate level used by `push`
    compression_level: u32,
}

impl CacheStore {
    // == Constructor ==
    /// Creates a handle for `identifier` under `policy`.
    ///
    /// # Arguments
    /// * `config` - Storage root, namespace names and write settings
    /// * `identifier` - Opaque, case-sensitive name of the cached object
    /// * `policy` - Expiration policy; `Unbounded` never expires
    pub fn new(config: &Config, identifier: impl Into<String>, policy: ExpirationPolicy) -> Self {
        let identifier = identifier.into();
        let location = Location::resolve(config, &identifier, &policy);

        Self {
            identifier,
            policy,
            location,
            dir_mode: config.dir_mode,
            compression_level: config.compression_level,
        }
    }

    /// Creates a handle whose entries never expire.
    pub fn unbounded(config: &Config, identifier: impl Into<String>) -> Self {
        Self::new(config, identifier, ExpirationPolicy::Unbounded)
    }

    /// Parses `expression` and creates a handle bound to it.
    pub fn expiring(
        config: &Config,
        identifier: impl Into<String>,
        expression: &str,
    ) -> Result<Self> {
        let policy = ExpirationPolicy::parse(expression)?;
        Ok(Self::new(config, identifier, policy))
    }

    // == Accessors ==
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn policy(&self) -> &ExpirationPolicy {
        &self.policy
    }

    pub fn namespace(&self) -> Namespace {
        self.location.namespace()
    }

    pub fn storage_key(&self) -> &str {
        self.location.storage_key()
    }

    /// Path of the entry file.
    pub fn path(&self) -> &Path {
        self.location.path()
    }

    // == Last Written ==
    /// Modification time of the entry, or None if nothing is stored.
    pub fn last_written(&self) -> Result<Option<DateTime<Utc>>> {
        let path = self.location.path();
        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::storage(path, e)),
        };

        if !metadata.is_file() {
            return Ok(None);
        }

        let modified = metadata
            .modified()
            .map_err(|e| CacheError::storage(path, e))?;
        Ok(Some(DateTime::<Utc>::from(modified)))
    }

    // == Freshness ==
    /// Evaluates the entry state against the current wall clock.
    pub fn freshness(&self) -> Result<Freshness> {
        self.freshness_at(Utc::now())
    }

    /// Evaluates the entry state as of `now`.
    pub fn freshness_at(&self, now: DateTime<Utc>) -> Result<Freshness> {
        freshness::evaluate(&self.policy, self.last_written()?, now)
    }

    /// Instant after which the current entry turns stale.
    ///
    /// None when nothing is stored or the policy is unbounded.
    pub fn expires_at(&self) -> Result<Option<DateTime<Utc>>> {
        match self.last_written()? {
            Some(modified) => self.policy.expires_at(modified),
            None => Ok(None),
        }
    }

    // == Fetch ==
    /// Returns the stored value if present and fresh, `Ok(None)` on a miss.
    ///
    /// A fresh entry that fails to decode yields `CacheError::CorruptEntry`.
    pub fn fetch<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        self.fetch_at(Utc::now())
    }

    /// Same as [`CacheStore::fetch`], evaluating freshness as of `now`.
    pub fn fetch_at<T: DeserializeOwned>(&self, now: DateTime<Utc>) -> Result<Option<T>> {
        let state = self.freshness_at(now)?;
        if !state.is_fresh() {
            debug!(key = %self.storage_key(), namespace = %self.namespace(), %state, "cache miss");
            return Ok(None);
        }

        let path = self.location.path();
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            // Removed between the freshness check and the read
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::storage(path, e)),
        };

        let value = codec::decode(&bytes).map_err(|e| CacheError::corrupt(path, e))?;
        debug!(key = %self.storage_key(), namespace = %self.namespace(), bytes = bytes.len(), "cache hit");
        Ok(Some(value))
    }

    // == Push ==
    /// Serializes, compresses and writes `value`, replacing any previous entry.
    ///
    /// Serialization happens before any filesystem access, so an unsupported
    /// value leaves the disk untouched.
    pub fn push<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        let bytes = codec::encode(value, self.compression_level).map_err(|e| match e {
            CodecError::Serialize(source) => CacheError::UnsupportedValue(source),
            other => CacheError::storage(self.location.path(), io::Error::other(other)),
        })?;

        self.ensure_dir()?;

        // Stage next to the entry and rename so readers never see a partial file
        let staging = self.location.staging_path();
        fs::write(&staging, &bytes).map_err(|e| {
            let _ = fs::remove_file(&staging);
            CacheError::storage(&staging, e)
        })?;

        let path = self.location.path();
        fs::rename(&staging, path).map_err(|e| {
            let _ = fs::remove_file(&staging);
            CacheError::storage(path, e)
        })?;

        debug!(key = %self.storage_key(), namespace = %self.namespace(), bytes = bytes.len(), "cache write");
        Ok(())
    }

    /// Creates the namespace directory (and parents) with the configured mode.
    fn ensure_dir(&self) -> Result<()> {
        let dir = self.location.dir();
        let mut builder = DirBuilder::new();
        builder.recursive(true);

        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(self.dir_mode);
        }

        builder
            .create(dir)
            .map_err(|e| CacheError::storage(dir, e))
    }
}
