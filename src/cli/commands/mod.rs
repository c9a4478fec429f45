//! Command implementations.

pub mod items;
pub mod lists;
pub mod theme;
pub mod watch;

use crate::cli::AppContext;
use crate::error::{LijoError, Result};
use crate::model::{ListItem, TaskList};
use serde_json::json;

/// Blank names and titles are not an error; there is simply nothing to store.
fn nothing_to_do(ctx: &AppContext) -> Result<()> {
    ctx.output
        .emit(&json!({ "changed": false }), || "nothing to do".to_string())
}

async fn require_list(ctx: &AppContext, id: i64) -> Result<TaskList> {
    ctx.repo
        .get_list(id)
        .await?
        .ok_or(LijoError::ListNotFound { id })
}

async fn require_item(ctx: &AppContext, id: i64) -> Result<ListItem> {
    ctx.repo
        .get_item(id)
        .await?
        .ok_or(LijoError::ItemNotFound { id })
}
