//! Integration Tests for the Disk Cache
//!
//! Exercises the public API end to end against a temporary storage root.
//! Clock advances are simulated by back-dating an entry's modification time.

use std::fs::{self, OpenOptions};
use std::path::Path;
use std::time::{Duration, SystemTime};

use diskstash::{
    replay_or_capture, sweep_expired, CacheError, CacheStore, Config, ExpirationPolicy, Freshness,
    Namespace,
};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

// == Helper Functions ==

fn test_config(dir: &TempDir) -> Config {
    Config::default().with_root(dir.path())
}

/// Moves the entry's modification time `age` into the past.
fn age_entry(path: &Path, age: Duration) {
    let file = OpenOptions::new().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() - age).unwrap();
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct User {
    name: String,
}

// == Concrete Scenarios ==

#[test]
fn test_user_profile_unbounded() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);

    let store = CacheStore::unbounded(&config, "user:42");
    store
        .push(&User {
            name: "Ana".to_string(),
        })
        .unwrap();

    assert!(store.path().starts_with(dir.path().join("static")));

    // Five seconds later, and much later, the entry is still served
    age_entry(store.path(), Duration::from_secs(5));
    let fetched: Option<User> = CacheStore::unbounded(&config, "user:42").fetch().unwrap();
    assert_eq!(fetched.map(|u| u.name).as_deref(), Some("Ana"));

    age_entry(store.path(), Duration::from_secs(10 * 365 * 86_400));
    assert_eq!(store.freshness().unwrap(), Freshness::Fresh);
}

#[test]
fn test_report_expires_after_an_hour() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let report: Vec<u8> = (0..4096).map(|i| (i % 251) as u8).collect();

    let store = CacheStore::expiring(&config, "report:7", "+1 hour").unwrap();
    assert_eq!(store.namespace(), Namespace::Expiring);
    store.push(&report).unwrap();

    let fetched: Option<Vec<u8>> = store.fetch().unwrap();
    assert_eq!(fetched.as_ref(), Some(&report));

    age_entry(store.path(), Duration::from_secs(2 * 3_600));
    let fetched: Option<Vec<u8>> = store.fetch().unwrap();
    assert!(fetched.is_none());
    assert_eq!(store.freshness().unwrap(), Freshness::Stale);
    assert!(store.path().exists(), "stale entries stay on disk");
}

// == Properties ==

#[test]
fn test_namespace_separation() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);

    CacheStore::unbounded(&config, "shared").push("permanent").unwrap();

    let bounded = CacheStore::expiring(&config, "shared", "+1 day").unwrap();
    assert_eq!(bounded.fetch::<String>().unwrap(), None);
    assert_eq!(bounded.freshness().unwrap(), Freshness::Absent);

    bounded.push("expiring").unwrap();
    let permanent: Option<String> = CacheStore::unbounded(&config, "shared").fetch().unwrap();
    assert_eq!(permanent.as_deref(), Some("permanent"));
}

#[test]
fn test_push_refreshes_stale_entry() {
    let dir = TempDir::new().unwrap();
    let store = CacheStore::expiring(&test_config(&dir), "feed", "+10 minutes").unwrap();

    store.push("old").unwrap();
    age_entry(store.path(), Duration::from_secs(3_600));
    assert_eq!(store.fetch::<String>().unwrap(), None);

    store.push("new").unwrap();
    assert_eq!(store.fetch::<String>().unwrap().as_deref(), Some("new"));
}

#[test]
fn test_truncated_entry_is_corrupt() {
    let dir = TempDir::new().unwrap();
    let store = CacheStore::unbounded(&test_config(&dir), "page");
    let page = User {
        name: "x".repeat(512),
    };
    store.push(&page).unwrap();

    let bytes = fs::read(store.path()).unwrap();
    fs::write(store.path(), &bytes[..bytes.len() / 2]).unwrap();

    let result = store.fetch::<User>();
    assert!(matches!(result, Err(CacheError::CorruptEntry { .. })));
}

#[test]
fn test_empty_entry_is_corrupt() {
    let dir = TempDir::new().unwrap();
    let store = CacheStore::unbounded(&test_config(&dir), "page");
    store.push("content").unwrap();

    fs::write(store.path(), b"").unwrap();
    let result = store.fetch::<String>();
    assert!(matches!(result, Err(CacheError::CorruptEntry { .. })));
}

#[test]
fn test_corrupt_but_stale_entry_is_a_miss() {
    let dir = TempDir::new().unwrap();
    let store = CacheStore::expiring(&test_config(&dir), "page", "+1 minute").unwrap();
    store.push("content").unwrap();

    fs::write(store.path(), [0xffu8; 8]).unwrap();
    age_entry(store.path(), Duration::from_secs(600));

    assert_eq!(store.fetch::<String>().unwrap(), None);
}

#[test]
fn test_custom_layout_from_config() {
    let dir = TempDir::new().unwrap();
    let config = Config {
        root: dir.path().to_path_buf(),
        permanent_dir: "forever".to_string(),
        expiring_dir: "volatile".to_string(),
        extension: "blob".to_string(),
        dir_mode: 0o750,
        compression_level: 9,
    };

    let store = CacheStore::expiring(&config, "k", "+1 week").unwrap();
    store.push(&42u64).unwrap();

    let path = store.path();
    assert_eq!(path.parent().unwrap(), dir.path().join("volatile"));
    assert_eq!(path.extension().unwrap(), "blob");
    assert_eq!(store.fetch::<u64>().unwrap(), Some(42));
}

// == Capture And Housekeeping ==

#[test]
fn test_rendered_view_is_replayed() {
    let dir = TempDir::new().unwrap();
    let store = CacheStore::expiring(&test_config(&dir), "view:/home", "+5 minutes").unwrap();

    let mut first = Vec::new();
    replay_or_capture(&store, &mut first, |out| {
        use std::io::Write;
        write!(out, "<html>{}</html>", 1 + 1)
    })
    .unwrap();

    let mut second = Vec::new();
    replay_or_capture(&store, &mut second, |_| panic!("must not re-render")).unwrap();

    assert_eq!(first, b"<html>2</html>");
    assert_eq!(second, first);
}

#[test]
fn test_sweep_after_expiry() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let policy = ExpirationPolicy::parse("+1 hour").unwrap();

    let old = CacheStore::new(&config, "old", policy.clone());
    let recent = CacheStore::new(&config, "recent", policy.clone());
    old.push("a").unwrap();
    recent.push("b").unwrap();
    age_entry(old.path(), Duration::from_secs(3 * 3_600));

    let report = sweep_expired(&config, &policy, chrono::Utc::now()).unwrap();
    assert_eq!(report.scanned, 2);
    assert_eq!(report.removed, 1);
    assert!(!old.path().exists());
    assert_eq!(recent.fetch::<String>().unwrap().as_deref(), Some("b"));
}
