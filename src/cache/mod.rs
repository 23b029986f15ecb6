//! Cache Module
//!
//! Provides a persistent file-backed cache with relative time expiration.

pub mod codec;
mod freshness;
mod locator;
mod policy;
mod store;


// Re-export public types
pub use freshness::{evaluate, Freshness};
pub use locator::{storage_key, Location, Namespace};
pub use policy::{ExpirationPolicy, RelativeExpr};
pub use store::CacheStore;
