//! List commands: show, create, edit, delete and reorder.

use super::{nothing_to_do, require_list};
use crate::cli::{AppContext, ListCommands, ListEditArgs, ListNewArgs};
use crate::error::{LijoError, Result};
use crate::format::{format_lines, format_list_line, parse_color};
use crate::model::TaskList;
use serde_json::json;
use std::collections::HashSet;
use tracing::{debug, info};

/// Show every list with its item count.
///
/// # Errors
///
/// Returns an error if the query fails.
pub async fn show(ctx: &AppContext) -> Result<()> {
    let lists = ctx.repo.lists().next().await?;
    info!(count = lists.len(), "Loaded lists");
    ctx.output
        .emit(&lists, || format_lines(&lists, "No lists yet.", format_list_line))
}

/// Execute a `list` subcommand.
///
/// # Errors
///
/// Returns an error if an id is unknown, an argument is malformed, or the write fails.
pub async fn execute(cmd: &ListCommands, ctx: &AppContext) -> Result<()> {
    match cmd {
        ListCommands::New(args) => create(args, ctx).await,
        ListCommands::Edit(args) => edit(args, ctx).await,
        ListCommands::Delete { id } => delete(*id, ctx).await,
        ListCommands::Reorder { ids } => reorder(ids, ctx).await,
    }
}

async fn create(args: &ListNewArgs, ctx: &AppContext) -> Result<()> {
    let name = args.name.trim();
    if name.is_empty() {
        return nothing_to_do(ctx);
    }
    let color = args.color.as_deref().map(parse_color).transpose()?;

    let id = ctx.repo.create_list(name, color, args.icon.clone()).await?;
    let list = require_list(ctx, id).await?;
    ctx.output
        .emit(&list, || format!("Created list {id}: {}", list.name))
}

async fn edit(args: &ListEditArgs, ctx: &AppContext) -> Result<()> {
    let mut list = require_list(ctx, args.id).await?;

    if let Some(name) = &args.name {
        let name = name.trim();
        if name.is_empty() {
            return nothing_to_do(ctx);
        }
        list.name = name.to_string();
    }
    if args.clear_color {
        list.color = None;
    } else if let Some(raw) = &args.color {
        list.color = Some(parse_color(raw)?);
    }
    if args.clear_icon {
        list.icon = None;
    } else if let Some(icon) = &args.icon {
        list.icon = Some(icon.clone());
    }

    ctx.repo.update_list(&list).await?;
    debug!(list_id = list.id, "Edited list");
    ctx.output
        .emit(&list, || format!("Updated list {}: {}", list.id, list.name))
}

async fn delete(id: i64, ctx: &AppContext) -> Result<()> {
    let list = require_list(ctx, id).await?;
    ctx.repo.delete_list(&list).await?;
    ctx.output.emit(&json!({ "deleted": id }), || {
        format!("Deleted list {id}: {}", list.name)
    })
}

async fn reorder(ids: &[i64], ctx: &AppContext) -> Result<()> {
    let current = ctx.repo.all_lists().await?;
    let ordered = reorder_plan(current, ids)?;
    ctx.repo.reorder_lists(&ordered).await?;
    info!(moved = ids.len(), total = ordered.len(), "Reordered lists");
    show(ctx).await
}

/// Named lists first in the given order, then the rest in their current order.
fn reorder_plan(current: Vec<TaskList>, ids: &[i64]) -> Result<Vec<TaskList>> {
    let mut seen = HashSet::with_capacity(ids.len());
    for id in ids {
        if !seen.insert(*id) {
            return Err(LijoError::validation(
                "ids",
                format!("list {id} appears more than once"),
            ));
        }
    }

    let (mut named, rest): (Vec<TaskList>, Vec<TaskList>) =
        current.into_iter().partition(|list| seen.contains(&list.id));
    if let Some(missing) = ids.iter().find(|id| !named.iter().any(|l| l.id == **id)) {
        return Err(LijoError::ListNotFound { id: *missing });
    }

    named.sort_by_key(|list| ids.iter().position(|id| *id == list.id));
    named.extend(rest);
    Ok(named)
}
