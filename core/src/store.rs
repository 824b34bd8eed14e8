use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::db::Database;
use crate::error::{Result, StoreError};
use crate::models::Recipe;
use crate::repository::RecipeStorage;
use crate::subscription::{Snapshot, SubscriberSet, Subscription};

/// How often a file-backed store checks for commits made by other connections.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

struct Shared {
    // `None` once closed. Every write and every broadcast happens under this lock,
    // so subscribers see snapshots in commit order.
    db: Mutex<Option<Database>>,
    subscribers: SubscriberSet,
    // Running only while a file-backed store has subscribers.
    poller: Mutex<Option<JoinHandle<()>>>,
    poll_interval: Duration,
}

impl Shared {
    fn lock_db(&self) -> MutexGuard<'_, Option<Database>> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_poller(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.poller.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn broadcast(&self, db: &Database) {
        if self.subscribers.is_empty() {
            return;
        }
        match db.list_recipes() {
            Ok(recipes) => self.subscribers.publish(&Snapshot::from(recipes)),
            Err(e) => tracing::warn!(error = %e, "failed to re-query recipes for subscribers"),
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let poller = self.poller.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(task) = poller.take() {
            task.abort();
        }
    }
}

/// SQLite-backed recipe storage with push updates.
///
/// Cloning is cheap; clones share the connection and the subscriber set. All
/// SQLite work runs on tokio's blocking pool. While a file-backed store has
/// subscribers it also polls for commits made by other connections to the same
/// file and re-broadcasts the list when one lands.
#[derive(Clone)]
pub struct RecipeStore {
    shared: Arc<Shared>,
}

impl RecipeStore {
    pub fn new(db: Database) -> Self {
        Self::with_poll_interval(db, DEFAULT_POLL_INTERVAL)
    }

    pub fn with_poll_interval(db: Database, poll_interval: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                db: Mutex::new(Some(db)),
                subscribers: SubscriberSet::new(),
                poller: Mutex::new(None),
                poll_interval,
            }),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.len()
    }

    /// Whether the external-change poller is currently running.
    pub fn is_polling(&self) -> bool {
        self.shared
            .lock_poller()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Close the database. Pending subscriptions end and later calls fail with `Closed`.
    pub async fn close(&self) -> Result<()> {
        if let Some(task) = self.shared.lock_poller().take() {
            task.abort();
        }
        let shared = Arc::clone(&self.shared);
        tokio::task::spawn_blocking(move || {
            let db = shared.lock_db().take();
            shared.subscribers.clear();
            match db {
                Some(db) => {
                    tracing::debug!("closing recipe database");
                    db.close()
                }
                None => Ok(()),
            }
        })
        .await?
    }

    fn ensure_poller(&self, baseline: i64) {
        let mut slot = self.shared.lock_poller();
        if slot.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }
        let interval = self.shared.poll_interval;
        tracing::debug!(?interval, "polling for external recipe changes");
        *slot = Some(tokio::spawn(poll_external(
            Arc::downgrade(&self.shared),
            baseline,
            interval,
        )));
    }

    async fn read<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let shared = Arc::clone(&self.shared);
        tokio::task::spawn_blocking(move || {
            let guard = shared.lock_db();
            let db = guard.as_ref().ok_or(StoreError::Closed)?;
            f(db)
        })
        .await?
    }

    /// Run a write, then push the new snapshot before releasing the connection.
    async fn write<T, F>(&self, op: &'static str, f: F) -> Result<T>
    where
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let shared = Arc::clone(&self.shared);
        tokio::task::spawn_blocking(move || {
            let guard = shared.lock_db();
            let db = guard.as_ref().ok_or(StoreError::Closed)?;
            let value = f(db).inspect_err(|e| tracing::debug!(op, error = %e, "write failed"))?;
            shared.broadcast(db);
            Ok(value)
        })
        .await?
    }
}

/// Watch SQLite's `data_version`, which only moves when another connection
/// commits. Writes through this store are broadcast directly and never show up here.
///
/// Exits once the store is dropped or closed, or the last subscriber goes away.
async fn poll_external(shared: Weak<Shared>, mut last: i64, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let Some(strong) = shared.upgrade() else {
            break;
        };
        {
            // Checked under the poller lock so a concurrent subscribe either sees
            // this task still running or finds the slot empty and starts a new one.
            let mut slot = strong.lock_poller();
            if strong.subscribers.is_empty() {
                tracing::debug!("no subscribers left, stopping external change poll");
                *slot = None;
                break;
            }
        }

        let checked = tokio::task::spawn_blocking(move || {
            let guard = strong.lock_db();
            let db = guard.as_ref().ok_or(StoreError::Closed)?;
            let version = db.data_version()?;
            if version != last {
                tracing::debug!(version, "recipes changed by another connection");
                strong.broadcast(db);
            }
            Ok::<_, StoreError>(version)
        })
        .await;

        match checked {
            Ok(Ok(version)) => last = version,
            Ok(Err(StoreError::Closed)) => break,
            Ok(Err(e)) => tracing::warn!(error = %e, "failed to poll for external changes"),
            Err(e) => {
                tracing::warn!(error = %e, "external change poll aborted");
                break;
            }
        }
    }
}

impl RecipeStorage for RecipeStore {
    async fn insert(&self, recipe: Recipe) -> Result<Recipe> {
        let saved = self.write("insert", move |db| db.insert_recipe(&recipe)).await?;
        tracing::debug!(id = saved.id, "inserted recipe");
        Ok(saved)
    }

    async fn update(&self, recipe: Recipe) -> Result<Recipe> {
        let saved = self.write("update", move |db| db.update_recipe(&recipe)).await?;
        tracing::debug!(id = saved.id, "updated recipe");
        Ok(saved)
    }

    async fn delete(&self, recipe: Recipe) -> Result<bool> {
        let id = recipe.id;
        let removed = self.write("delete", move |db| db.delete_recipe(id)).await?;
        tracing::debug!(id, removed, "deleted recipe");
        Ok(removed)
    }

    async fn get(&self, id: i64) -> Result<Recipe> {
        self.read(move |db| db.get_recipe(id)).await
    }

    async fn list_all(&self) -> Result<Vec<Recipe>> {
        self.read(Database::list_recipes).await
    }

    async fn subscribe(&self) -> Result<Subscription> {
        let shared = Arc::clone(&self.shared);
        let (subscription, baseline) = tokio::task::spawn_blocking(move || {
            // Holding the connection lock means no write can slip between the
            // initial snapshot and registration. The `data_version` baseline is
            // read under the same lock so an external commit cannot fall between
            // the snapshot and the baseline either.
            let guard = shared.lock_db();
            let db = guard.as_ref().ok_or(StoreError::Closed)?;
            let initial = Snapshot::from(db.list_recipes()?);
            let baseline = if db.is_in_memory() {
                None
            } else {
                Some(db.data_version()?)
            };
            Ok::<_, StoreError>((shared.subscribers.subscribe(initial), baseline))
        })
        .await??;

        if let Some(baseline) = baseline {
            self.ensure_poller(baseline);
        }
        Ok(subscription)
    }
}
