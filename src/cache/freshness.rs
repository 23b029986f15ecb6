//! Freshness Module
//!
//! Lazily evaluated entry state. There is no stored transition: an entry is
//! Fresh or Stale purely as a function of its mtime, the policy and `now`.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::cache::ExpirationPolicy;
use crate::error::Result;

// == Freshness ==
/// State of an entry at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// No entry on disk
    Absent,
    /// Entry exists and is within its validity window
    Fresh,
    /// Entry exists but its expiration instant has passed
    Stale,
}

impl Freshness {
    pub fn is_fresh(self) -> bool {
        self == Freshness::Fresh
    }
}

impl fmt::Display for Freshness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Freshness::Absent => "absent",
            Freshness::Fresh => "fresh",
            Freshness::Stale => "stale",
        };
        f.write_str(label)
    }
}

// == Evaluate ==
/// Classifies an entry last modified at `modified` (None = absent).
///
/// The boundary is inclusive: an entry is still fresh at exactly its
/// expiration instant.
pub fn evaluate(
    policy: &ExpirationPolicy,
    modified: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<Freshness> {
    let Some(modified) = modified else {
        return Ok(Freshness::Absent);
    };

    match policy.expires_at(modified)? {
        None => Ok(Freshness::Fresh),
        Some(expires) if now <= expires => Ok(Freshness::Fresh),
        Some(_) => Ok(Freshness::Stale),
    }
}
