#![allow(dead_code)]

use lijo::model::Clock;
use lijo::repository::TaskRepository;
use lijo::storage::SqliteStore;
use std::sync::Arc;
use std::sync::Once;
use std::sync::atomic::{AtomicI64, Ordering};
use tempfile::TempDir;

pub mod cli;

static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        lijo::logging::init_test_logging();
    });
}

pub fn test_store() -> SqliteStore {
    init_test_logging();
    SqliteStore::open_memory().expect("Failed to create test database")
}

pub fn test_store_with_dir() -> (SqliteStore, TempDir) {
    init_test_logging();
    let dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = dir.path().join("data").join("lijo.db");
    let store = SqliteStore::open(&db_path).expect("Failed to create test database");
    (store, dir)
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock(AtomicI64);

impl ManualClock {
    pub fn set(&self, millis: i64) {
        self.0.store(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

pub fn test_repo() -> (TaskRepository, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::default());
    let repo = TaskRepository::with_clock(test_store(), clock.clone());
    (repo, clock)
}
