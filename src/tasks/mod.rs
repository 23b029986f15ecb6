//! Housekeeping Tasks Module
//!
//! Caller-invoked maintenance over the on-disk cache.
//!
//! # Tasks
//! - Sweep: Removes stale entries from the expiring namespace

mod sweep;

pub use sweep::{sweep_expired, SweepReport};
