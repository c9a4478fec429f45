//! Command-line interface for `lijo`.
//!
//! Argument definitions live here; each command group has its own module
//! under [`commands`].

pub mod commands;

use crate::config::{self, CliOverrides, Settings};
use crate::error::Result;
use crate::format::OutputContext;
use crate::repository::TaskRepository;
use crate::storage::SqliteStore;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(
    name = "lijo",
    author,
    version,
    about = "Local to-do lists with live views, backed by SQLite."
)]
pub struct Cli {
    /// Directory holding the database, preferences and config.yaml.
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Database path (relative paths resolve inside the data directory).
    #[arg(long, global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Print JSON instead of text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Also write JSON logs to this file.
    #[arg(long, global = true, env = "LIJO_LOG_FILE", value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show lists with their item counts.
    Lists,
    /// Create, edit, delete or reorder lists.
    #[command(subcommand)]
    List(ListCommands),
    /// Show a list's items, open ones first.
    Items {
        list_id: i64,
    },
    /// Add, toggle, edit or delete items.
    #[command(subcommand)]
    Item(ItemCommands),
    /// Show or change the theme preference.
    Theme {
        #[arg(value_enum, default_value_t = ThemeAction::Show)]
        action: ThemeAction,
    },
    /// Print every update of a live view.
    #[command(subcommand)]
    Watch(WatchCommands),
}

#[derive(Subcommand, Debug)]
pub enum ListCommands {
    /// Create a list.
    New(ListNewArgs),
    /// Rename a list or change its color or icon.
    Edit(ListEditArgs),
    /// Delete a list and all of its items.
    Delete { id: i64 },
    /// Put the given lists first, in this order.
    Reorder {
        #[arg(required = true)]
        ids: Vec<i64>,
    },
}

#[derive(Args, Debug)]
pub struct ListNewArgs {
    pub name: String,

    /// Color as #RRGGBB, #AARRGGBB or a decimal ARGB value.
    #[arg(long)]
    pub color: Option<String>,

    /// Icon name (Work, Home, Shopping, Favorite, Star, List).
    #[arg(long)]
    pub icon: Option<String>,
}

#[derive(Args, Debug)]
pub struct ListEditArgs {
    pub id: i64,

    #[arg(long)]
    pub name: Option<String>,

    #[arg(long, conflicts_with = "clear_color")]
    pub color: Option<String>,

    #[arg(long, conflicts_with = "clear_icon")]
    pub icon: Option<String>,

    #[arg(long)]
    pub clear_color: bool,

    #[arg(long)]
    pub clear_icon: bool,
}

#[derive(Subcommand, Debug)]
pub enum ItemCommands {
    /// Add an item to a list.
    Add { list_id: i64, title: String },
    /// Mark an item done, or open it again.
    Toggle { item_id: i64 },
    /// Change an item's title.
    Edit { item_id: i64, title: String },
    /// Delete an item.
    Delete { item_id: i64 },
}

#[derive(Subcommand, Debug)]
pub enum WatchCommands {
    /// Watch lists and their item counts.
    Lists {
        /// Stop after this many updates.
        #[arg(long)]
        count: Option<usize>,
    },
    /// Watch one list's items.
    Items {
        list_id: i64,
        /// Stop after this many updates.
        #[arg(long)]
        count: Option<usize>,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum ThemeAction {
    Show,
    Dark,
    Light,
    Toggle,
}

/// Everything a command needs: resolved settings, the repository and the output mode.
#[derive(Debug)]
pub struct AppContext {
    pub settings: Settings,
    pub repo: TaskRepository,
    pub output: OutputContext,
}

impl AppContext {
    /// Open the store described by `settings`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(settings: Settings, json: bool) -> Result<Self> {
        let store = SqliteStore::open(&settings.db_path)?;
        Ok(Self {
            settings,
            repo: TaskRepository::new(store),
            output: OutputContext::from_flags(json),
        })
    }
}

impl Cli {
    #[must_use]
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            data_dir: self.data_dir.clone(),
            db: self.db.clone(),
        }
    }
}

/// Resolve settings, open the store and run the selected command.
///
/// # Errors
///
/// Returns the command's error; see [`crate::LijoError::exit_code`].
pub async fn run(cli: Cli) -> Result<()> {
    let settings = config::load_settings(&cli.overrides())?;
    debug!(?settings, "Resolved settings");
    let ctx = AppContext::open(settings, cli.json)?;

    match &cli.command {
        Commands::Lists => commands::lists::show(&ctx).await,
        Commands::List(cmd) => commands::lists::execute(cmd, &ctx).await,
        Commands::Items { list_id } => commands::items::show(*list_id, &ctx).await,
        Commands::Item(cmd) => commands::items::execute(cmd, &ctx).await,
        Commands::Theme { action } => commands::theme::execute(*action, &ctx).await,
        Commands::Watch(cmd) => commands::watch::execute(cmd, &ctx).await,
    }
}
