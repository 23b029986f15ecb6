//! Expired Entry Sweep
//!
//! Housekeeping pass that deletes stale files from the expiring namespace.
//! The read path never deletes; this runs only when a caller asks for it.

use std::fs;
use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::cache::{evaluate, ExpirationPolicy, Freshness, Namespace};
use crate::config::Config;
use crate::error::{CacheError, Result};

// == Sweep Report ==
/// Outcome of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Entry files examined
    pub scanned: usize,
    /// Entry files deleted as stale
    pub removed: usize,
    /// Total size of deleted files in bytes
    pub reclaimed_bytes: u64,
}

impl SweepReport {
    fn record_scanned(&mut self) {
        self.scanned += 1;
    }

    fn record_removed(&mut self, bytes: u64) {
        self.removed += 1;
        self.reclaimed_bytes += bytes;
    }
}

/// Removes expiring-namespace entries that are stale under `policy` at `now`.
///
/// Only files carrying the configured extension are considered. An
/// unbounded policy never removes anything, and a missing namespace
/// directory yields an empty report.
///
/// # Arguments
/// * `config` - Locates the expiring namespace and the entry extension
/// * `policy` - Expiration applied to every entry's modification time
/// * `now` - Instant the entries are judged against
pub fn sweep_expired(
    config: &Config,
    policy: &ExpirationPolicy,
    now: DateTime<Utc>,
) -> Result<SweepReport> {
    let dir = Namespace::Expiring.dir(config);
    let mut report = SweepReport::default();

    if policy.is_unbounded() {
        debug!(dir = %dir.display(), "unbounded policy, nothing to sweep");
        return Ok(report);
    }

    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(report),
        Err(e) => return Err(CacheError::storage(&dir, e)),
    };

    for entry in entries {
        let entry = entry.map_err(|e| CacheError::storage(&dir, e))?;
        let path = entry.path();
        if !is_entry_file(&path, &config.extension) {
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => continue,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(CacheError::storage(&path, e)),
        };
        report.record_scanned();

        let modified = metadata
            .modified()
            .map_err(|e| CacheError::storage(&path, e))?;
        if evaluate(policy, Some(DateTime::<Utc>::from(modified)), now)? != Freshness::Stale {
            continue;
        }

        match fs::remove_file(&path) {
            Ok(()) => report.record_removed(metadata.len()),
            // Already gone, another sweeper got there first
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(CacheError::storage(&path, e)),
        }
    }

    if report.removed > 0 {
        info!(
            "Sweep: removed {} of {} entries ({} bytes)",
            report.removed, report.scanned, report.reclaimed_bytes
        );
    } else {
        debug!("Sweep: no stale entries among {} scanned", report.scanned);
    }

    Ok(report)
}

/// Matches `<stem>.<extension>` on the whole file name, so multi-part
/// extensions like `spock.gz` are recognised. Hidden names are staging files.
fn is_entry_file(path: &Path, extension: &str) -> bool {
    let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
        return false;
    };
    if name.starts_with('.') {
        return false;
    }

    name.strip_suffix(extension)
        .and_then(|rest| rest.strip_suffix('.'))
        .map_or(false, |stem| !stem.is_empty())
}
