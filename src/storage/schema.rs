//! Database schema definitions and migration logic.

use crate::error::{LijoError, Result};
use rusqlite::Connection;
use tracing::{debug, info};

pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// The complete SQL schema for the task database.
///
/// Column names match the databases written by earlier releases of the app.
pub const SCHEMA_SQL: &str = r"
    -- Task lists
    CREATE TABLE IF NOT EXISTS lists (
        listId INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
        name TEXT NOT NULL,
        color INTEGER,
        icon TEXT,
        position INTEGER NOT NULL DEFAULT 0,
        createdAt INTEGER NOT NULL
    );

    -- Items owned by a list
    CREATE TABLE IF NOT EXISTS items (
        itemId INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
        listId INTEGER NOT NULL,
        title TEXT NOT NULL,
        isCompleted INTEGER NOT NULL DEFAULT 0,
        position INTEGER NOT NULL DEFAULT 0,
        createdAt INTEGER NOT NULL,
        completedAt INTEGER,
        -- Completed-at invariant: completed items carry a completion time, open items never do
        CHECK (
            (isCompleted = 1 AND completedAt IS NOT NULL) OR
            (isCompleted = 0 AND completedAt IS NULL)
        ),
        FOREIGN KEY (listId) REFERENCES lists(listId) ON DELETE CASCADE
    );
    CREATE INDEX IF NOT EXISTS index_items_listId ON items(listId);
";

/// Columns added to `lists` after version 1.
const LIST_COLUMNS: &[(&str, &str)] = &[
    ("icon", "TEXT"),
    ("position", "INTEGER NOT NULL DEFAULT 0"),
];

/// Apply the schema to the database, migrating older layouts in place.
///
/// # Errors
///
/// Returns an error if the stored schema is newer than this build understands,
/// or if any DDL or pragma fails.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    // Enforced per connection, so it must be set on every open.
    conn.pragma_update(None, "foreign_keys", "ON")?;

    let found = schema_version(conn)?;
    if found > CURRENT_SCHEMA_VERSION {
        return Err(LijoError::SchemaTooNew {
            found,
            supported: CURRENT_SCHEMA_VERSION,
        });
    }

    if found == CURRENT_SCHEMA_VERSION && table_exists(conn, "lists") {
        debug!(version = found, "Schema up to date");
    } else {
        run_migrations(conn, found)?;
        conn.execute_batch(SCHEMA_SQL)?;
        conn.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION)?;
    }

    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;

    Ok(())
}

/// Read `PRAGMA user_version`.
///
/// # Errors
///
/// Returns an error if the pragma cannot be read.
pub fn schema_version(conn: &Connection) -> Result<i32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

fn table_exists(conn: &Connection, table: &str) -> bool {
    conn.prepare("SELECT 1 FROM sqlite_master WHERE type='table' AND name=?")
        .and_then(|mut stmt| stmt.exists([table]))
        .unwrap_or(false)
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> bool {
    // pragma_table_info() needs the table name inline; callers only pass known tables.
    let sql = format!("SELECT 1 FROM pragma_table_info('{table}') WHERE name = ?");
    conn.prepare(&sql)
        .and_then(|mut stmt| stmt.exists([column]))
        .unwrap_or(false)
}

fn ensure_columns(conn: &Connection, table: &str, columns: &[(&str, &str)]) -> Result<usize> {
    if !table_exists(conn, table) {
        return Ok(0);
    }

    let mut added = 0;
    for (name, definition) in columns {
        if !column_exists(conn, table, name) {
            let sql = format!("ALTER TABLE {table} ADD COLUMN {name} {definition}");
            conn.execute(&sql, [])?;
            added += 1;
        }
    }

    Ok(added)
}

/// Bring an existing database up to the current layout.
///
/// Every step is additive and keyed on what is actually present, so a
/// partially migrated file converges too.
fn run_migrations(conn: &Connection, from_version: i32) -> Result<()> {
    // 1 -> 2: icon and position on lists
    let added = ensure_columns(conn, "lists", LIST_COLUMNS)?;
    if added > 0 {
        info!(
            from_version,
            to_version = CURRENT_SCHEMA_VERSION,
            columns = added,
            "Migrated lists table"
        );
    }
    Ok(())
}
