//! Item commands.

use super::{nothing_to_do, require_item, require_list};
use crate::cli::{AppContext, ItemCommands};
use crate::error::Result;
use crate::format::{format_item_line, format_lines};
use serde_json::json;
use tracing::{debug, info};

/// Show one list's items in display order.
///
/// # Errors
///
/// Returns `ListNotFound` for an unknown list, or the query's error.
pub async fn show(list_id: i64, ctx: &AppContext) -> Result<()> {
    let list = require_list(ctx, list_id).await?;
    let items = ctx.repo.items(list_id).next().await?;
    info!(list_id, count = items.len(), "Loaded items");
    ctx.output.emit(&items, || {
        format!(
            "{}\n{}",
            list.name,
            format_lines(&items, "No items.", format_item_line)
        )
    })
}

/// Execute an `item` subcommand.
///
/// # Errors
///
/// Returns an error if an id is unknown or the write fails.
pub async fn execute(cmd: &ItemCommands, ctx: &AppContext) -> Result<()> {
    match cmd {
        ItemCommands::Add { list_id, title } => add(*list_id, title, ctx).await,
        ItemCommands::Toggle { item_id } => toggle(*item_id, ctx).await,
        ItemCommands::Edit { item_id, title } => edit(*item_id, title, ctx).await,
        ItemCommands::Delete { item_id } => delete(*item_id, ctx).await,
    }
}

async fn add(list_id: i64, title: &str, ctx: &AppContext) -> Result<()> {
    let title = title.trim();
    if title.is_empty() {
        return nothing_to_do(ctx);
    }
    require_list(ctx, list_id).await?;

    let id = ctx.repo.add_item(list_id, title).await?;
    let item = require_item(ctx, id).await?;
    ctx.output
        .emit(&item, || format!("Added item {id}: {}", item.title))
}

async fn toggle(item_id: i64, ctx: &AppContext) -> Result<()> {
    let item = require_item(ctx, item_id).await?;
    let toggled = ctx.repo.toggle_item_completion(&item).await?;
    ctx.output.emit(&toggled, || {
        let verb = if toggled.is_completed {
            "Completed"
        } else {
            "Reopened"
        };
        format!("{verb} item {item_id}: {}", toggled.title)
    })
}

async fn edit(item_id: i64, title: &str, ctx: &AppContext) -> Result<()> {
    let title = title.trim();
    if title.is_empty() {
        return nothing_to_do(ctx);
    }
    let mut item = require_item(ctx, item_id).await?;
    item.title = title.to_string();
    ctx.repo.update_item(&item).await?;
    debug!(item_id, "Edited item");
    ctx.output
        .emit(&item, || format!("Updated item {item_id}: {}", item.title))
}

async fn delete(item_id: i64, ctx: &AppContext) -> Result<()> {
    let item = require_item(ctx, item_id).await?;
    ctx.repo.delete_item(item.id).await?;
    ctx.output.emit(&json!({ "deleted": item_id }), || {
        format!("Deleted item {item_id}: {}", item.title)
    })
}
