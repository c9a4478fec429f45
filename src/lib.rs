//! `lijo` - local to-do lists backed by `SQLite`
//!
//! This crate provides the data layer behind the `lijo` CLI: named lists of
//! items with completion state, live views that re-emit after every write,
//! and a small preference store for the theme.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`storage`] - `SQLite` schema, queries and change tracking
//! - [`live`] - Live queries and shared subscriber-counted state
//! - [`repository`] - Domain operations (create, toggle, reorder)
//! - [`prefs`] - JSON-backed preferences and the theme flag
//! - [`model`] - Data types (`TaskList`, `ListItem`)
//! - [`cli`] - Command-line interface using clap
//! - [`config`] - Configuration management
//! - [`format`] - Output formatting (text, JSON)
//! - [`error`] - Error types and handling

pub mod cli;
pub mod config;
pub mod error;
pub mod format;
pub mod live;
pub mod logging;
pub mod model;
pub mod prefs;
pub mod repository;
pub mod storage;

pub use error::{LijoError, Result};
pub use live::{LiveQuery, SharedState, Subscription};
pub use model::{Clock, ListItem, SystemClock, TaskList, TaskListWithCount};
pub use prefs::{PreferenceStore, ThemeManager};
pub use repository::TaskRepository;
pub use storage::SqliteStore;
