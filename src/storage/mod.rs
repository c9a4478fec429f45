//! `SQLite` storage layer for `lijo`.
//!
//! This module provides the persistence layer using `SQLite` with:
//! - Foreign keys with cascading delete from lists to items
//! - Immediate transactions for every write
//! - Table-level change tracking that drives live queries
//!
//! # Submodules
//!
//! - [`schema`] - Database schema definitions and migrations
//! - [`sqlite`] - Main `SQLite` storage implementation
//! - [`tracker`] - Per-table change generations

pub mod schema;
pub mod sqlite;
pub mod tracker;

pub use sqlite::{MutationContext, SqliteStore};
pub use tracker::{Generation, InvalidationTracker, Table};
