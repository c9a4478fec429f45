//! Data types for task lists and their items.
//!
//! Timestamps are epoch milliseconds. An `id` of `0` marks a value that has
//! not been inserted yet; the store assigns the real id on insert.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named container of items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskList {
    pub id: i64,
    pub name: String,
    /// Packed ARGB color.
    pub color: Option<i64>,
    /// Symbolic icon name.
    pub icon: Option<String>,
    /// Display order key; lower sorts first.
    pub position: i32,
    pub created_at: i64,
}

impl TaskList {
    #[must_use]
    pub fn new(name: impl Into<String>, created_at: i64) -> Self {
        Self {
            id: 0,
            name: name.into(),
            color: None,
            icon: None,
            position: 0,
            created_at,
        }
    }

    #[must_use]
    pub fn with_color(mut self, color: Option<i64>) -> Self {
        self.color = color;
        self
    }

    #[must_use]
    pub fn with_icon(mut self, icon: Option<String>) -> Self {
        self.icon = icon;
        self
    }
}

/// A single task belonging to exactly one list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListItem {
    pub id: i64,
    pub list_id: i64,
    pub title: String,
    pub is_completed: bool,
    /// Reserved for manual ordering; no query sorts by it yet.
    pub position: i32,
    pub created_at: i64,
    /// Present exactly when `is_completed` is true.
    pub completed_at: Option<i64>,
}

impl ListItem {
    #[must_use]
    pub fn new(list_id: i64, title: impl Into<String>, created_at: i64) -> Self {
        Self {
            id: 0,
            list_id,
            title: title.into(),
            is_completed: false,
            position: 0,
            created_at,
            completed_at: None,
        }
    }

    /// Copy of this item with the completion flag flipped.
    ///
    /// Completing stamps `completed_at` with `now`; reopening clears it.
    #[must_use]
    pub fn toggled(&self, now: i64) -> Self {
        let is_completed = !self.is_completed;
        Self {
            is_completed,
            completed_at: is_completed.then_some(now),
            ..self.clone()
        }
    }
}

/// A list together with the number of items it owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskListWithCount {
    #[serde(flatten)]
    pub list: TaskList,
    pub item_count: i64,
}

/// Source of "now" for anything the repository stamps.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Render an epoch-millisecond timestamp for humans.
#[must_use]
pub fn format_millis(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis).map_or_else(
        || millis.to_string(),
        |dt| dt.format("%Y-%m-%d %H:%M").to_string(),
    )
}
