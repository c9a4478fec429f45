//! Table-level change tracking.
//!
//! Every committed write bumps the generation of the tables it touched.
//! Live queries hold a receiver and re-run when a table they read from moves.

use serde::Serialize;
use std::fmt;
use tokio::sync::watch;

/// Tables a query can depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Table {
    Lists,
    Items,
}

impl Table {
    pub const ALL: [Self; 2] = [Self::Lists, Self::Items];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lists => "lists",
            Self::Items => "items",
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::Lists => 0,
            Self::Items => 1,
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-table write counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Generation([u64; 2]);

impl Generation {
    #[must_use]
    pub const fn of(&self, table: Table) -> u64 {
        self.0[table.index()]
    }

    /// Whether any of `tables` moved between `earlier` and `self`.
    #[must_use]
    pub fn changed_since(&self, earlier: &Self, tables: &[Table]) -> bool {
        tables.iter().any(|t| self.of(*t) != earlier.of(*t))
    }

    fn bump(&mut self, table: Table) {
        self.0[table.index()] += 1;
    }
}

/// Publishes table generations to any number of watchers.
#[derive(Debug)]
pub struct InvalidationTracker {
    tx: watch::Sender<Generation>,
}

impl InvalidationTracker {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Generation::default());
        Self { tx }
    }

    /// Record a committed change to `tables`. No-op for an empty slice.
    pub fn notify(&self, tables: &[Table]) {
        if tables.is_empty() {
            return;
        }
        self.tx.send_modify(|generation| {
            for table in tables {
                generation.bump(*table);
            }
        });
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Generation> {
        self.tx.subscribe()
    }

    #[must_use]
    pub fn current(&self) -> Generation {
        *self.tx.borrow()
    }
}

impl Default for InvalidationTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notify_bumps_only_touched_tables() {
        let tracker = InvalidationTracker::new();
        let before = tracker.current();
        tracker.notify(&[Table::Items]);
        let after = tracker.current();

        assert_eq!(after.of(Table::Items), 1);
        assert_eq!(after.of(Table::Lists), 0);
        assert!(after.changed_since(&before, &[Table::Items]));
        assert!(!after.changed_since(&before, &[Table::Lists]));
        assert!(after.changed_since(&before, &Table::ALL));
    }

    #[test]
    fn empty_notify_is_silent() {
        let tracker = InvalidationTracker::new();
        let rx = tracker.subscribe();
        tracker.notify(&[]);
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn subscribers_wake_on_change() {
        let tracker = InvalidationTracker::new();
        let mut rx = tracker.subscribe();
        tracker.notify(&[Table::Lists, Table::Items]);
        rx.changed().await.unwrap();
        let generation = *rx.borrow_and_update();
        assert_eq!(generation.of(Table::Lists), 1);
        assert_eq!(generation.of(Table::Items), 1);
    }
}
