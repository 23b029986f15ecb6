//! Configuration Module
//!
//! Handles loading and managing cache configuration from environment variables.

use std::env;
use std::path::PathBuf;

/// Default storage root, relative to the working directory
pub const DEFAULT_ROOT: &str = "cache";
/// Default directory name for entries that never expire
pub const DEFAULT_PERMANENT_DIR: &str = "static";
/// Default directory name for entries with an expiration policy
pub const DEFAULT_EXPIRING_DIR: &str = "temp";
/// Default file suffix for cache entries
pub const DEFAULT_EXTENSION: &str = "cache";
/// Default permission mode for created namespace directories
pub const DEFAULT_DIR_MODE: u32 = 0o755;
/// Default deflate level (0 = store, 9 = best)
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Storage root shared by both namespaces
    pub root: PathBuf,
    /// Subdirectory holding unbounded entries
    pub permanent_dir: String,
    /// Subdirectory holding expiring entries
    pub expiring_dir: String,
    /// File suffix identifying the cache format
    pub extension: String,
    /// Permission mode used when creating namespace directories (unix only)
    pub dir_mode: u32,
    /// Deflate compression level
    pub compression_level: u32,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `DISKSTASH_ROOT` - Storage root (default: cache)
    /// - `DISKSTASH_PERMANENT_DIR` - Permanent namespace directory (default: static)
    /// - `DISKSTASH_EXPIRING_DIR` - Expiring namespace directory (default: temp)
    /// - `DISKSTASH_EXTENSION` - Entry file suffix (default: cache)
    /// - `DISKSTASH_DIR_MODE` - Octal directory mode (default: 755)
    /// - `DISKSTASH_COMPRESSION_LEVEL` - Deflate level 0-9 (default: 6)
    pub fn from_env() -> Self {
        Self {
            root: env::var("DISKSTASH_ROOT")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ROOT)),
            permanent_dir: env::var("DISKSTASH_PERMANENT_DIR")
                .ok()
                .filter(|v| is_plain_dir_name(v))
                .unwrap_or_else(|| DEFAULT_PERMANENT_DIR.to_string()),
            expiring_dir: env::var("DISKSTASH_EXPIRING_DIR")
                .ok()
                .filter(|v| is_plain_dir_name(v))
                .unwrap_or_else(|| DEFAULT_EXPIRING_DIR.to_string()),
            extension: env::var("DISKSTASH_EXTENSION")
                .ok()
                .map(|v| v.trim_start_matches('.').to_string())
                .filter(|v| is_plain_dir_name(v))
                .unwrap_or_else(|| DEFAULT_EXTENSION.to_string()),
            dir_mode: env::var("DISKSTASH_DIR_MODE")
                .ok()
                .and_then(|v| u32::from_str_radix(v.trim_start_matches("0o"), 8).ok())
                .unwrap_or(DEFAULT_DIR_MODE),
            compression_level: env::var("DISKSTASH_COMPRESSION_LEVEL")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|level| *level <= 9)
                .unwrap_or(DEFAULT_COMPRESSION_LEVEL),
        }
    }

    /// Returns a copy of this config rooted at `root`.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_ROOT),
            permanent_dir: DEFAULT_PERMANENT_DIR.to_string(),
            expiring_dir: DEFAULT_EXPIRING_DIR.to_string(),
            extension: DEFAULT_EXTENSION.to_string(),
            dir_mode: DEFAULT_DIR_MODE,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

/// A namespace or suffix must be a single path component.
fn is_plain_dir_name(value: &str) -> bool {
    !value.is_empty()
        && value != "."
        && value != ".."
        && !value.contains('/')
        && !value.contains('\\')
}
