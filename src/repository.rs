//! Domain-level operations over the task store.
//!
//! The repository composes store operations into the actions the app offers.
//! It performs no validation of names or titles; callers decide what to submit.
//! Every method is async and runs its store work on tokio's blocking pool.

use crate::error::Result;
use crate::live::LiveQuery;
use crate::model::{Clock, ListItem, SystemClock, TaskList, TaskListWithCount};
use crate::storage::sqlite::query_list;
use crate::storage::{SqliteStore, Table};
use std::sync::Arc;
use tracing::{debug, info};

/// Async façade over [`SqliteStore`].
#[derive(Clone)]
pub struct TaskRepository {
    store: SqliteStore,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for TaskRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRepository")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl TaskRepository {
    #[must_use]
    pub fn new(store: SqliteStore) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(store: SqliteStore, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    #[must_use]
    pub const fn store(&self) -> &SqliteStore {
        &self.store
    }

    async fn blocking<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&SqliteStore) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || f(&store)).await?
    }

    // Reads

    /// Lists with item counts, re-emitted on every change.
    #[must_use]
    pub fn lists(&self) -> LiveQuery<Vec<TaskListWithCount>> {
        self.store.observe_lists_with_counts()
    }

    /// Items of one list in display order, re-emitted on every item change.
    #[must_use]
    pub fn items(&self, list_id: i64) -> LiveQuery<Vec<ListItem>> {
        self.store.observe_items(list_id)
    }

    /// Name of one list, `None` once it is gone.
    #[must_use]
    pub fn list_name(&self, list_id: i64) -> LiveQuery<Option<String>> {
        LiveQuery::new(self.store.clone(), &[Table::Lists], move |conn| {
            Ok(query_list(conn, list_id)?.map(|list| list.name))
        })
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn all_lists(&self) -> Result<Vec<TaskList>> {
        self.blocking(SqliteStore::all_lists).await
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get_list(&self, id: i64) -> Result<Option<TaskList>> {
        self.blocking(move |store| store.get_list(id)).await
    }

    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get_item(&self, id: i64) -> Result<Option<ListItem>> {
        self.blocking(move |store| store.get_item(id)).await
    }

    // Lists

    /// Create a list at position 0 stamped with the current time.
    ///
    /// New lists are not appended after existing ones; with equal positions
    /// the newest list sorts first.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn create_list(
        &self,
        name: &str,
        color: Option<i64>,
        icon: Option<String>,
    ) -> Result<i64> {
        let list = TaskList::new(name, self.clock.now_millis())
            .with_color(color)
            .with_icon(icon);
        let id = self.blocking(move |store| store.insert_list(&list)).await?;
        info!(list_id = id, "Created list");
        Ok(id)
    }

    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn update_list(&self, list: &TaskList) -> Result<()> {
        let list = list.clone();
        self.blocking(move |store| store.update_list(&list)).await?;
        Ok(())
    }

    /// Delete a list together with its items.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn delete_list(&self, list: &TaskList) -> Result<()> {
        let id = list.id;
        let rows = self.blocking(move |store| store.delete_list(id)).await?;
        debug!(list_id = id, rows, "Deleted list");
        Ok(())
    }

    /// Persist `ordered` with `position` set to each list's index.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch fails; no position changes in that case.
    pub async fn reorder_lists(&self, ordered: &[TaskList]) -> Result<()> {
        let batch: Vec<TaskList> = ordered
            .iter()
            .zip(0..)
            .map(|(list, position)| TaskList {
                position,
                ..list.clone()
            })
            .collect();
        let rows = self.blocking(move |store| store.update_lists(&batch)).await?;
        debug!(rows, "Reordered lists");
        Ok(())
    }

    // Items

    /// Add an open item to a list, stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns `ConstraintViolation` if the list does not exist.
    pub async fn add_item(&self, list_id: i64, title: &str) -> Result<i64> {
        let item = ListItem::new(list_id, title, self.clock.now_millis());
        let id = self.blocking(move |store| store.insert_item(&item)).await?;
        debug!(list_id, item_id = id, "Added item");
        Ok(id)
    }

    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn update_item(&self, item: &ListItem) -> Result<()> {
        let item = item.clone();
        self.blocking(move |store| store.update_item(&item)).await?;
        Ok(())
    }

    /// Flip an item's completion and persist the whole item.
    ///
    /// Completing stamps the completion time; reopening clears it. The
    /// display order follows from the query, not from `position`.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn toggle_item_completion(&self, item: &ListItem) -> Result<ListItem> {
        let toggled = item.toggled(self.clock.now_millis());
        let persisted = toggled.clone();
        self.blocking(move |store| store.update_item(&persisted))
            .await?;
        debug!(
            item_id = toggled.id,
            completed = toggled.is_completed,
            "Toggled item"
        );
        Ok(toggled)
    }

    /// Delete one item. Unknown ids are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn delete_item(&self, item_id: i64) -> Result<()> {
        self.blocking(move |store| store.delete_item(item_id))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};

    struct StepClock(AtomicI64);

    impl Clock for StepClock {
        fn now_millis(&self) -> i64 {
            self.0.fetch_add(100, Ordering::SeqCst)
        }
    }

    fn repo() -> TaskRepository {
        let store = SqliteStore::open_memory().unwrap();
        TaskRepository::with_clock(store, Arc::new(StepClock(AtomicI64::new(100))))
    }

    #[tokio::test]
    async fn create_list_stamps_clock_and_position_zero() {
        let repo = repo();
        let id = repo
            .create_list("Groceries", Some(7), Some("cart".to_string()))
            .await
            .unwrap();
        let list = repo.get_list(id).await.unwrap().unwrap();
        assert_eq!(list.created_at, 100);
        assert_eq!(list.position, 0);
        assert_eq!(list.color, Some(7));
        assert_eq!(list.icon.as_deref(), Some("cart"));
    }

    #[tokio::test]
    async fn repository_does_not_validate_names() {
        let repo = repo();
        let id = repo.create_list("   ", None, None).await.unwrap();
        assert_eq!(repo.get_list(id).await.unwrap().unwrap().name, "   ");
    }

    #[tokio::test]
    async fn toggle_round_trip_clears_completion() {
        let repo = repo();
        let list = repo.create_list("L", None, None).await.unwrap();
        let item_id = repo.add_item(list, "Milk").await.unwrap();
        let item = repo.get_item(item_id).await.unwrap().unwrap();

        let done = repo.toggle_item_completion(&item).await.unwrap();
        let stored = repo.get_item(item_id).await.unwrap().unwrap();
        assert!(stored.is_completed);
        assert_eq!(stored.completed_at, done.completed_at);
        assert!(stored.completed_at.is_some());

        repo.toggle_item_completion(&stored).await.unwrap();
        let reopened = repo.get_item(item_id).await.unwrap().unwrap();
        assert!(!reopened.is_completed);
        assert_eq!(reopened.completed_at, None);
    }

    #[tokio::test]
    async fn add_item_to_missing_list_is_constraint_violation() {
        let repo = repo();
        let err = repo.add_item(404, "nope").await.unwrap_err();
        assert!(err.is_constraint_violation());
    }

    #[tokio::test]
    async fn list_name_follows_renames_and_deletes() {
        let repo = repo();
        let id = repo.create_list("Old", None, None).await.unwrap();
        let mut name = repo.list_name(id);
        assert_eq!(name.next().await.unwrap().as_deref(), Some("Old"));

        let mut list = repo.get_list(id).await.unwrap().unwrap();
        list.name = "New".to_string();
        repo.update_list(&list).await.unwrap();
        assert_eq!(name.next().await.unwrap().as_deref(), Some("New"));

        repo.delete_list(&list).await.unwrap();
        assert_eq!(name.next().await.unwrap(), None);
    }
}
