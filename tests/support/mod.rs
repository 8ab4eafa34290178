#![allow(dead_code)]

pub mod restaurant;

use sourced_es::{EventStore, FileStorage, MemoryStorage};
use tempfile::TempDir;

/// Runs `check` against the in-memory and the redb backend.
pub fn each_backend(check: impl Fn(EventStore)) {
    check(EventStore::new(MemoryStorage::new()));

    let dir = TempDir::new().unwrap();
    let file = FileStorage::open(dir.path().join("events.redb")).unwrap();
    check(EventStore::new(file));
}
