//! diskstash - A persistent file-backed object cache
//!
//! Stores serializable values under a hashed identifier, compressed on
//! disk, with optional relative time expiration.

pub mod cache;
pub mod capture;
pub mod config;
pub mod error;
pub mod tasks;

pub use cache::{CacheStore, ExpirationPolicy, Freshness, Namespace};
pub use capture::{replay_or_capture, OutputCapture};
pub use config::Config;
pub use error::{CacheError, Result};
pub use tasks::{sweep_expired, SweepReport};
