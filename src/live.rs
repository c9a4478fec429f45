//! Live queries over the task store.
//!
//! A [`LiveQuery`] yields its result once, then again every time one of the
//! tables it reads from changes. Bursts of writes between two polls collapse
//! into a single re-query.
//!
//! [`SharedState`] shares one live query among any number of subscribers. The
//! query starts with the first subscriber and stops a grace period after the
//! last one leaves, so a subscriber that drops and comes straight back (a
//! screen being rebuilt) does not restart it.

use crate::error::{LijoError, Result};
use crate::storage::{Generation, SqliteStore, Table};
use futures::Stream;
use parking_lot::Mutex;
use rusqlite::Connection;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error};

type QueryFn<T> = dyn Fn(&Connection) -> Result<T> + Send + Sync;

/// A query that re-runs whenever the tables it depends on change.
pub struct LiveQuery<T> {
    store: SqliteStore,
    tables: Vec<Table>,
    query: Arc<QueryFn<T>>,
    changes: watch::Receiver<Generation>,
    seen: Option<Generation>,
}

impl<T> std::fmt::Debug for LiveQuery<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveQuery")
            .field("tables", &self.tables)
            .field("seen", &self.seen)
            .finish_non_exhaustive()
    }
}

impl<T: Send + 'static> LiveQuery<T> {
    pub fn new<F>(store: SqliteStore, tables: &[Table], query: F) -> Self
    where
        F: Fn(&Connection) -> Result<T> + Send + Sync + 'static,
    {
        let changes = store.subscribe_changes();
        Self {
            store,
            tables: tables.to_vec(),
            query: Arc::new(query),
            changes,
            seen: None,
        }
    }

    /// Wait for the next result.
    ///
    /// The first call returns immediately with the current result. Later
    /// calls wait for a committed write to one of this query's tables.
    ///
    /// # Errors
    ///
    /// Returns the query's error, or `StoreClosed` if the change feed ends.
    pub async fn next(&mut self) -> Result<T> {
        let generation = match self.seen {
            None => self.latest(),
            Some(seen) => loop {
                self.changes
                    .changed()
                    .await
                    .map_err(|_| LijoError::StoreClosed)?;
                let current = self.latest();
                if current.changed_since(&seen, &self.tables) {
                    break current;
                }
            },
        };
        self.seen = Some(generation);
        self.run().await
    }

    fn latest(&mut self) -> Generation {
        *self.changes.borrow_and_update()
    }

    async fn run(&self) -> Result<T> {
        let store = self.store.clone();
        let query = Arc::clone(&self.query);
        tokio::task::spawn_blocking(move || store.read(|conn| query(conn))).await?
    }

    /// Turn the query into an endless stream of results.
    pub fn into_stream(self) -> impl Stream<Item = Result<T>> + Send {
        futures::stream::unfold(self, |mut query| async move {
            let item = query.next().await;
            Some((item, query))
        })
    }
}

/// One live query shared by many subscribers, kept running only while observed.
pub struct SharedState<T> {
    inner: Arc<SharedInner<T>>,
}

struct SharedInner<T> {
    tx: watch::Sender<Shared<T>>,
    source: Box<dyn Fn() -> LiveQuery<T> + Send + Sync>,
    lifecycle: Arc<Lifecycle>,
}

/// Last value plus the error that ended the upstream query, if any.
struct Shared<T> {
    value: T,
    failed: Option<Arc<LijoError>>,
}

impl<T: Clone> Shared<T> {
    fn result(&self, name: &str) -> Result<T> {
        match &self.failed {
            Some(err) => Err(LijoError::LiveViewFailed {
                name: name.to_string(),
                source: Arc::clone(err),
            }),
            None => Ok(self.value.clone()),
        }
    }
}

/// Subscriber bookkeeping, independent of the value type.
struct Lifecycle {
    name: String,
    grace: Duration,
    runtime: Handle,
    upstream: Mutex<Upstream>,
}

#[derive(Default)]
struct Upstream {
    subscribers: usize,
    task: Option<JoinHandle<()>>,
    stop: Option<JoinHandle<()>>,
}

impl<T: Clone + Send + Sync + 'static> SharedState<T> {
    /// Create a shared state that holds `initial` until the query first emits.
    ///
    /// # Errors
    ///
    /// Returns `Background` when called outside a tokio runtime.
    pub fn new<F>(name: &str, initial: T, grace: Duration, source: F) -> Result<Self>
    where
        F: Fn() -> LiveQuery<T> + Send + Sync + 'static,
    {
        let runtime = Handle::try_current().map_err(|e| LijoError::Background(e.to_string()))?;
        let (tx, _) = watch::channel(Shared {
            value: initial,
            failed: None,
        });
        Ok(Self {
            inner: Arc::new(SharedInner {
                tx,
                source: Box::new(source),
                lifecycle: Arc::new(Lifecycle {
                    name: name.to_string(),
                    grace,
                    runtime,
                    upstream: Mutex::new(Upstream::default()),
                }),
            }),
        })
    }

    /// Start observing. Starts the query if it is not already running and
    /// cancels any pending shutdown.
    #[must_use]
    pub fn subscribe(&self) -> Subscription<T> {
        let lifecycle = &self.inner.lifecycle;
        // Subscribe before starting so the first emission is observed as a change.
        let rx = self.inner.tx.subscribe();
        let mut upstream = lifecycle.upstream.lock();
        upstream.subscribers += 1;
        if let Some(stop) = upstream.stop.take() {
            stop.abort();
        }
        if !upstream.is_running() {
            debug!(state = %lifecycle.name, "Starting shared query");
            // A restart gets a fresh chance; clear any earlier failure quietly.
            self.inner.tx.send_if_modified(|shared| {
                shared.failed = None;
                false
            });
            let live = (self.inner.source)();
            upstream.task = Some(
                lifecycle
                    .runtime
                    .spawn(run_upstream(Arc::downgrade(&self.inner), live)),
            );
        }
        drop(upstream);

        Subscription {
            rx,
            lifecycle: Arc::clone(lifecycle),
        }
    }

    /// Latest value, or the initial value if the query never emitted.
    #[must_use]
    pub fn value(&self) -> T {
        self.inner.tx.borrow().value.clone()
    }

    /// Whether the upstream query is currently running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner.lifecycle.upstream.lock().is_running()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.lifecycle.upstream.lock().subscribers
    }
}

async fn run_upstream<T>(owner: Weak<SharedInner<T>>, mut live: LiveQuery<T>)
where
    T: Send + Sync + 'static,
{
    loop {
        let result = live.next().await;
        let Some(inner) = owner.upgrade() else {
            break;
        };
        match result {
            Ok(value) => {
                inner.tx.send_modify(|shared| shared.value = value);
            }
            Err(err) => {
                error!(state = %inner.lifecycle.name, error = %err, "Shared query failed");
                inner
                    .tx
                    .send_modify(|shared| shared.failed = Some(Arc::new(err)));
                break;
            }
        }
    }
}

impl Upstream {
    fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Lifecycle {
    fn stop_if_idle(&self) {
        let mut upstream = self.upstream.lock();
        upstream.stop = None;
        if upstream.subscribers == 0 {
            if let Some(task) = upstream.task.take() {
                debug!(state = %self.name, "Stopping idle shared query");
                task.abort();
            }
        }
    }

    fn release(self: &Arc<Self>) {
        let mut upstream = self.upstream.lock();
        upstream.subscribers = upstream.subscribers.saturating_sub(1);
        if upstream.subscribers == 0 && upstream.task.is_some() {
            let lifecycle = Arc::downgrade(self);
            let grace = self.grace;
            upstream.stop = Some(self.runtime.spawn(async move {
                tokio::time::sleep(grace).await;
                if let Some(lifecycle) = lifecycle.upgrade() {
                    lifecycle.stop_if_idle();
                }
            }));
        }
    }
}

impl<T> Drop for SharedInner<T> {
    fn drop(&mut self) {
        let mut upstream = self.lifecycle.upstream.lock();
        for handle in [upstream.task.take(), upstream.stop.take()]
            .into_iter()
            .flatten()
        {
            handle.abort();
        }
    }
}

/// A handle on a [`SharedState`]; dropping it ends this observation.
pub struct Subscription<T> {
    rx: watch::Receiver<Shared<T>>,
    lifecycle: Arc<Lifecycle>,
}

impl<T: Clone> Subscription<T> {
    #[must_use]
    pub fn current(&self) -> T {
        self.rx.borrow().value.clone()
    }

    /// Wait for the next value.
    ///
    /// # Errors
    ///
    /// Returns `LiveViewFailed` once the upstream query has failed, or
    /// `StoreClosed` if the shared state is gone.
    pub async fn changed(&mut self) -> Result<T> {
        if !self.has_failed() {
            self.rx.changed().await.map_err(|_| LijoError::StoreClosed)?;
        }
        self.rx.borrow_and_update().result(&self.lifecycle.name)
    }

    /// Wait until the value satisfies `predicate`.
    ///
    /// # Errors
    ///
    /// Returns `LiveViewFailed` if the upstream query fails first, or
    /// `StoreClosed` if the shared state is gone.
    pub async fn wait_for(&mut self, mut predicate: impl FnMut(&T) -> bool) -> Result<T> {
        let shared = self
            .rx
            .wait_for(|shared| shared.failed.is_some() || predicate(&shared.value))
            .await
            .map_err(|_| LijoError::StoreClosed)?;
        shared.result(&self.lifecycle.name)
    }

    fn has_failed(&self) -> bool {
        self.rx.borrow().failed.is_some()
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.lifecycle.release();
    }
}
