//! Watch command: print a live view every time it changes.

use super::require_list;
use crate::cli::{AppContext, WatchCommands};
use crate::error::Result;
use crate::format::{OutputContext, format_item_line, format_lines, format_list_line};
use crate::live::SharedState;
use serde::Serialize;
use tracing::{debug, info};

/// Execute a `watch` subcommand.
///
/// Without `--count` this runs until the process is interrupted.
///
/// # Errors
///
/// Returns an error if the list is unknown or a query fails.
pub async fn execute(cmd: &WatchCommands, ctx: &AppContext) -> Result<()> {
    let grace = ctx.settings.subscription_grace;
    match cmd {
        WatchCommands::Lists { count } => {
            let repo = ctx.repo.clone();
            let state = SharedState::new("lists", Vec::new(), grace, move || repo.lists())?;
            print_updates(&state, *count, ctx.output, |lists| {
                format_lines(lists, "No lists yet.", format_list_line)
            })
            .await
        }
        WatchCommands::Items { list_id, count } => {
            let list_id = *list_id;
            require_list(ctx, list_id).await?;
            let repo = ctx.repo.clone();
            let state = SharedState::new("items", Vec::new(), grace, move || {
                repo.items(list_id)
            })?;
            print_updates(&state, *count, ctx.output, |items| {
                format_lines(items, "No items.", format_item_line)
            })
            .await
        }
    }
}

async fn print_updates<T>(
    state: &SharedState<T>,
    count: Option<usize>,
    output: OutputContext,
    render: impl Fn(&T) -> String,
) -> Result<()>
where
    T: Clone + Send + Sync + Serialize + 'static,
{
    let mut subscription = state.subscribe();
    info!(limit = ?count, "Watching for changes");

    let mut printed = 0usize;
    while count.is_none_or(|limit| printed < limit) {
        let value = subscription.changed().await?;
        if printed > 0 && !output.is_json() {
            println!();
        }
        output.emit(&value, || render(&value))?;
        printed += 1;
        debug!(printed, "Printed update");
    }
    Ok(())
}
