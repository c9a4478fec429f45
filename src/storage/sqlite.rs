//! `SQLite` storage implementation.

use crate::error::Result;
use crate::live::LiveQuery;
use crate::model::{ListItem, TaskList, TaskListWithCount};
use crate::storage::schema::apply_schema;
use crate::storage::tracker::{Generation, InvalidationTracker, Table};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

const LIST_COLUMNS: &str = "listId, name, color, icon, position, createdAt";
const ITEM_COLUMNS: &str = "itemId, listId, title, isCompleted, position, createdAt, completedAt";

/// SQLite-backed store for lists and items.
///
/// Cloning is cheap; all clones share one connection and one change tracker.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    inner: Arc<StoreInner>,
}

#[derive(Debug)]
struct StoreInner {
    conn: Mutex<Connection>,
    tracker: InvalidationTracker,
}

/// Context for a mutation, collecting the tables it changed.
#[derive(Debug)]
pub struct MutationContext {
    pub op_name: String,
    pub touched: Vec<Table>,
}

impl MutationContext {
    #[must_use]
    pub fn new(op_name: &str) -> Self {
        Self {
            op_name: op_name.to_string(),
            touched: Vec::new(),
        }
    }

    pub fn touch(&mut self, table: Table) {
        if !self.touched.contains(&table) {
            self.touched.push(table);
        }
    }

    /// Touch `tables` when `rows` is non-zero.
    pub fn touch_if_changed(&mut self, rows: usize, tables: &[Table]) {
        if rows > 0 {
            for table in tables {
                self.touch(*table);
            }
        }
    }
}

impl SqliteStore {
    /// Open (creating if needed) the database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema application fails.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        apply_schema(&conn)?;
        debug!(path = %path.display(), "Opened task database");
        Ok(Self::from_connection(conn))
    }

    /// Open an in-memory database for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                conn: Mutex::new(conn),
                tracker: InvalidationTracker::new(),
            }),
        }
    }

    /// Run a read against the connection.
    ///
    /// # Errors
    ///
    /// Returns whatever `f` returns.
    pub fn read<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> Result<R>,
    {
        let conn = self.inner.conn.lock();
        f(&conn)
    }

    /// Execute a mutation inside an immediate transaction.
    ///
    /// Tables recorded on the context are published to live queries only
    /// after the commit succeeds. On error the transaction is rolled back
    /// and nothing is published.
    ///
    /// # Errors
    ///
    /// Returns an error if any statement or the commit fails.
    pub fn mutate<F, R>(&self, op: &str, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction, &mut MutationContext) -> Result<R>,
    {
        let (result, ctx) = {
            let mut conn = self.inner.conn.lock();
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let mut ctx = MutationContext::new(op);
            let result = f(&tx, &mut ctx)?;
            tx.commit()?;
            (result, ctx)
        };

        debug!(op = %ctx.op_name, tables = ?ctx.touched, "Committed mutation");
        self.inner.tracker.notify(&ctx.touched);
        Ok(result)
    }

    /// Receiver for table generations, used by live queries.
    #[must_use]
    pub fn subscribe_changes(&self) -> watch::Receiver<Generation> {
        self.inner.tracker.subscribe()
    }

    // ----------------------------------------------------------------------
    // Lists
    // ----------------------------------------------------------------------

    /// Lists with their item counts, in display order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn list_all_with_counts(&self) -> Result<Vec<TaskListWithCount>> {
        self.read(query_lists_with_counts)
    }

    /// Live version of [`Self::list_all_with_counts`]; re-emits on any list or item change.
    #[must_use]
    pub fn observe_lists_with_counts(&self) -> LiveQuery<Vec<TaskListWithCount>> {
        LiveQuery::new(self.clone(), &Table::ALL, query_lists_with_counts)
    }

    /// All lists in display order, without counts.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn all_lists(&self) -> Result<Vec<TaskList>> {
        self.read(query_all_lists)
    }

    /// Live version of [`Self::all_lists`].
    #[must_use]
    pub fn observe_all_lists(&self) -> LiveQuery<Vec<TaskList>> {
        LiveQuery::new(self.clone(), &[Table::Lists], query_all_lists)
    }

    /// Get a list by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn get_list(&self, id: i64) -> Result<Option<TaskList>> {
        self.read(|conn| query_list(conn, id))
    }

    /// Insert a list, returning its id. An id of 0 is assigned fresh; any
    /// other id replaces the existing row.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn insert_list(&self, list: &TaskList) -> Result<i64> {
        self.mutate("insert_list", |tx, ctx| {
            tx.execute(
                &format!(
                    "INSERT OR REPLACE INTO lists ({LIST_COLUMNS}) VALUES (NULLIF(?, 0), ?, ?, ?, ?, ?)"
                ),
                rusqlite::params![
                    list.id,
                    list.name,
                    list.color,
                    list.icon,
                    list.position,
                    list.created_at,
                ],
            )?;
            ctx.touch(Table::Lists);
            if list.id != 0 {
                // A replaced row may have taken its items with it.
                ctx.touch(Table::Items);
            }
            Ok(tx.last_insert_rowid())
        })
    }

    /// Update a list by primary key. Returns the number of rows changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub fn update_list(&self, list: &TaskList) -> Result<usize> {
        self.mutate("update_list", |tx, ctx| {
            let rows = update_list_row(tx, list)?;
            ctx.touch_if_changed(rows, &[Table::Lists]);
            Ok(rows)
        })
    }

    /// Update many lists in one transaction. Readers see all of the batch or none of it.
    ///
    /// # Errors
    ///
    /// Returns an error if any update fails; the whole batch is rolled back.
    pub fn update_lists(&self, lists: &[TaskList]) -> Result<usize> {
        if lists.is_empty() {
            return Ok(0);
        }
        self.mutate("update_lists", |tx, ctx| {
            let mut rows = 0;
            for list in lists {
                rows += update_list_row(tx, list)?;
            }
            ctx.touch_if_changed(rows, &[Table::Lists]);
            Ok(rows)
        })
    }

    /// Delete a list and, through the foreign key, all of its items.
    /// Deleting an unknown id is a silent no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn delete_list(&self, id: i64) -> Result<usize> {
        self.mutate("delete_list", |tx, ctx| {
            let rows = tx.execute("DELETE FROM lists WHERE listId = ?", [id])?;
            ctx.touch_if_changed(rows, &Table::ALL);
            Ok(rows)
        })
    }

    // ----------------------------------------------------------------------
    // Items
    // ----------------------------------------------------------------------

    /// Items of one list: open items newest first, then completed items in
    /// the order they were completed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn items_for_list(&self, list_id: i64) -> Result<Vec<ListItem>> {
        self.read(|conn| query_items_for_list(conn, list_id))
    }

    /// Live version of [`Self::items_for_list`]; re-emits on any item change.
    #[must_use]
    pub fn observe_items(&self, list_id: i64) -> LiveQuery<Vec<ListItem>> {
        LiveQuery::new(self.clone(), &[Table::Items], move |conn| {
            query_items_for_list(conn, list_id)
        })
    }

    /// Get an item by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn get_item(&self, id: i64) -> Result<Option<ListItem>> {
        self.read(|conn| {
            let item = conn
                .query_row(
                    &format!("SELECT {ITEM_COLUMNS} FROM items WHERE itemId = ?"),
                    [id],
                    item_from_row,
                )
                .optional()?;
            Ok(item)
        })
    }

    /// Insert an item, returning its id.
    ///
    /// # Errors
    ///
    /// Returns `ConstraintViolation` if the owning list does not exist.
    pub fn insert_item(&self, item: &ListItem) -> Result<i64> {
        self.mutate("insert_item", |tx, ctx| {
            tx.execute(
                &format!(
                    "INSERT OR REPLACE INTO items ({ITEM_COLUMNS}) VALUES (NULLIF(?, 0), ?, ?, ?, ?, ?, ?)"
                ),
                rusqlite::params![
                    item.id,
                    item.list_id,
                    item.title,
                    item.is_completed,
                    item.position,
                    item.created_at,
                    item.completed_at,
                ],
            )?;
            ctx.touch(Table::Items);
            Ok(tx.last_insert_rowid())
        })
    }

    /// Update an item by primary key. Returns the number of rows changed.
    ///
    /// # Errors
    ///
    /// Returns `ConstraintViolation` if the item now points at a missing list
    /// or breaks the completion invariant.
    pub fn update_item(&self, item: &ListItem) -> Result<usize> {
        self.mutate("update_item", |tx, ctx| {
            let rows = tx.execute(
                "UPDATE items SET listId = ?, title = ?, isCompleted = ?, position = ?,
                                  createdAt = ?, completedAt = ?
                 WHERE itemId = ?",
                rusqlite::params![
                    item.list_id,
                    item.title,
                    item.is_completed,
                    item.position,
                    item.created_at,
                    item.completed_at,
                    item.id,
                ],
            )?;
            ctx.touch_if_changed(rows, &[Table::Items]);
            Ok(rows)
        })
    }

    /// Delete an item. Deleting an unknown id is a silent no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn delete_item(&self, id: i64) -> Result<usize> {
        self.mutate("delete_item", |tx, ctx| {
            let rows = tx.execute("DELETE FROM items WHERE itemId = ?", [id])?;
            ctx.touch_if_changed(rows, &[Table::Items]);
            Ok(rows)
        })
    }
}

fn update_list_row(tx: &Transaction<'_>, list: &TaskList) -> Result<usize> {
    let rows = tx.execute(
        "UPDATE lists SET name = ?, color = ?, icon = ?, position = ?, createdAt = ?
         WHERE listId = ?",
        rusqlite::params![
            list.name,
            list.color,
            list.icon,
            list.position,
            list.created_at,
            list.id,
        ],
    )?;
    Ok(rows)
}

fn query_lists_with_counts(conn: &Connection) -> Result<Vec<TaskListWithCount>> {
    let mut stmt = conn.prepare_cached(
        r"SELECT lists.listId, lists.name, lists.color, lists.icon, lists.position,
                 lists.createdAt, COUNT(items.itemId) AS taskCount
          FROM lists
          LEFT JOIN items ON lists.listId = items.listId
          GROUP BY lists.listId
          ORDER BY lists.position ASC, lists.createdAt DESC",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(TaskListWithCount {
                list: list_from_row(row)?,
                item_count: row.get(6)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn query_all_lists(conn: &Connection) -> Result<Vec<TaskList>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {LIST_COLUMNS} FROM lists ORDER BY position ASC, createdAt DESC"
    ))?;
    let lists = stmt
        .query_map([], list_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(lists)
}

pub(crate) fn query_list(conn: &Connection, id: i64) -> Result<Option<TaskList>> {
    let list = conn
        .query_row(
            &format!("SELECT {LIST_COLUMNS} FROM lists WHERE listId = ?"),
            [id],
            list_from_row,
        )
        .optional()?;
    Ok(list)
}

fn query_items_for_list(conn: &Connection, list_id: i64) -> Result<Vec<ListItem>> {
    // Open items first (newest created on top), completed items last
    // (earliest completed on top). Each CASE is NULL for the other segment.
    let mut stmt = conn.prepare_cached(&format!(
        r"SELECT {ITEM_COLUMNS} FROM items
          WHERE listId = ?
          ORDER BY
            isCompleted ASC,
            CASE WHEN isCompleted = 1 THEN completedAt END ASC,
            CASE WHEN isCompleted = 0 THEN createdAt END DESC"
    ))?;
    let items = stmt
        .query_map([list_id], item_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(items)
}

fn list_from_row(row: &rusqlite::Row) -> rusqlite::Result<TaskList> {
    Ok(TaskList {
        id: row.get(0)?,
        name: row.get(1)?,
        color: row.get(2)?,
        icon: row.get(3)?,
        position: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn item_from_row(row: &rusqlite::Row) -> rusqlite::Result<ListItem> {
    Ok(ListItem {
        id: row.get(0)?,
        list_id: row.get(1)?,
        title: row.get(2)?,
        is_completed: row.get(3)?,
        position: row.get(4)?,
        created_at: row.get(5)?,
        completed_at: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LijoError;

    fn store_with_list(name: &str) -> (SqliteStore, i64) {
        let store = SqliteStore::open_memory().unwrap();
        let id = store.insert_list(&TaskList::new(name, 10)).unwrap();
        (store, id)
    }

    #[test]
    fn test_open_memory() {
        let store = SqliteStore::open_memory();
        assert!(store.is_ok());
    }

    #[test]
    fn test_insert_and_get_list() {
        let store = SqliteStore::open_memory().unwrap();
        let list = TaskList::new("Groceries", 100)
            .with_color(Some(0xFF00_FF00))
            .with_icon(Some("cart".to_string()));
        let id = store.insert_list(&list).unwrap();
        assert_eq!(id, 1);

        let loaded = store.get_list(id).unwrap().unwrap();
        assert_eq!(loaded.name, "Groceries");
        assert_eq!(loaded.color, Some(0xFF00_FF00));
        assert_eq!(loaded.icon.as_deref(), Some("cart"));
        assert_eq!(loaded.position, 0);
        assert_eq!(loaded.created_at, 100);
    }

    #[test]
    fn test_insert_item_requires_list() {
        let store = SqliteStore::open_memory().unwrap();
        let err = store.insert_item(&ListItem::new(99, "orphan", 1)).unwrap_err();
        assert!(err.is_constraint_violation(), "got {err:?}");
        assert!(store.items_for_list(99).unwrap().is_empty());
    }

    #[test]
    fn test_update_item_to_missing_list_fails() {
        let (store, list_id) = store_with_list("L");
        let id = store.insert_item(&ListItem::new(list_id, "a", 1)).unwrap();
        let mut item = store.get_item(id).unwrap().unwrap();
        item.list_id = 404;
        let err = store.update_item(&item).unwrap_err();
        assert!(matches!(err, LijoError::ConstraintViolation { .. }));
    }

    #[test]
    fn test_update_unknown_rows_is_noop() {
        let store = SqliteStore::open_memory().unwrap();
        let mut ghost = TaskList::new("ghost", 1);
        ghost.id = 42;
        assert_eq!(store.update_list(&ghost).unwrap(), 0);
        assert_eq!(store.delete_list(42).unwrap(), 0);
        assert_eq!(store.delete_item(42).unwrap(), 0);
    }

    #[test]
    fn test_transaction_rollback_on_error() {
        let (store, list_id) = store_with_list("L");
        let before = store.subscribe_changes();
        let generation = *before.borrow();

        let result: Result<()> = store.mutate("test_fail", |tx, ctx| {
            tx.execute(
                "INSERT INTO items (listId, title, createdAt) VALUES (?, 'kept?', 1)",
                [list_id],
            )?;
            ctx.touch(Table::Items);
            // Unknown list: the FK check aborts the whole transaction.
            tx.execute(
                "INSERT INTO items (listId, title, createdAt) VALUES (999, 'bad', 2)",
                [],
            )?;
            Ok(())
        });

        assert!(result.is_err());
        assert!(store.items_for_list(list_id).unwrap().is_empty());
        assert_eq!(*before.borrow(), generation, "failed mutation must not publish");
    }

    #[test]
    fn test_writes_publish_touched_tables() {
        let (store, list_id) = store_with_list("L");
        let rx = store.subscribe_changes();
        let start = *rx.borrow();

        store.insert_item(&ListItem::new(list_id, "a", 1)).unwrap();
        let after_item = *rx.borrow();
        assert!(after_item.changed_since(&start, &[Table::Items]));
        assert!(!after_item.changed_since(&start, &[Table::Lists]));

        store.delete_list(list_id).unwrap();
        let after_delete = *rx.borrow();
        assert!(after_delete.changed_since(&after_item, &[Table::Lists]));
        assert!(after_delete.changed_since(&after_item, &[Table::Items]));

        store.delete_item(12345).unwrap();
        assert_eq!(*rx.borrow(), after_delete, "no-op delete must not publish");
    }

    #[test]
    fn test_update_lists_rolls_back_as_a_unit() {
        let store = SqliteStore::open_memory().unwrap();
        let a = store.insert_list(&TaskList::new("A", 1)).unwrap();
        let mut moved = store.get_list(a).unwrap().unwrap();
        moved.position = 5;

        let err = store.mutate("reorder_then_fail", |tx, ctx| {
            update_list_row(tx, &moved)?;
            ctx.touch(Table::Lists);
            tx.execute("UPDATE lists SET name = NULL WHERE listId = ?", [a])?;
            Ok(())
        });
        assert!(err.unwrap_err().is_constraint_violation());

        let reloaded = store.get_list(a).unwrap().unwrap();
        assert_eq!(reloaded.position, 0);
        assert_eq!(reloaded.name, "A");
    }

    #[test]
    fn test_update_lists_applies_every_row() {
        let store = SqliteStore::open_memory().unwrap();
        store.insert_list(&TaskList::new("A", 1)).unwrap();
        store.insert_list(&TaskList::new("B", 2)).unwrap();
        let mut lists = store.all_lists().unwrap();
        for list in &mut lists {
            list.position = 7;
        }
        assert_eq!(store.update_lists(&lists).unwrap(), 2);
        assert!(store.all_lists().unwrap().iter().all(|l| l.position == 7));
        assert_eq!(store.update_lists(&[]).unwrap(), 0);
    }
}
