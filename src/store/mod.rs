pub mod memory;
pub mod sqlite;

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::models::Task;

pub use memory::MemoryKvStore;
pub use sqlite::SqliteKvStore;

/// Key under which the whole task collection is stored.
pub const TASKS_KEY: &str = "tasks";

/// Durable key-value storage holding JSON documents.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, AppError>;
    async fn set(&self, key: &str, value: Value) -> Result<(), AppError>;
}

/// The task collection, read and written as one document.
///
/// Every mutation re-reads the collection and writes it back whole. Within
/// one process (and all clones of a store) mutations are serialized; two
/// processes writing the same storage resolve as last writer wins.
#[derive(Clone)]
pub struct TaskStore {
    kv: Arc<dyn KeyValueStore>,
    writes: Arc<Mutex<()>>,
}

impl TaskStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            writes: Arc::new(Mutex::new(())),
        }
    }

    pub async fn try_list(&self) -> Result<Vec<Task>, AppError> {
        match self.kv.get(TASKS_KEY).await? {
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(value) => Ok(serde_json::from_value(value)?),
        }
    }

    /// All stored tasks; a storage fault reads as an empty collection.
    pub async fn list(&self) -> Vec<Task> {
        match self.try_list().await {
            Ok(tasks) => tasks,
            Err(e) => {
                warn!("failed to read task collection, treating as empty: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn get(&self, id: i64) -> Result<Option<Task>, AppError> {
        Ok(self.try_list().await?.into_iter().find(|t| t.id == id))
    }

    /// Appends `task`. The caller guarantees the id is not taken.
    pub async fn add(&self, task: Task) -> Result<(), AppError> {
        let _guard = self.writes.lock().await;
        let mut tasks = self.try_list().await?;
        debug!("adding task {}", task.id);
        tasks.push(task);
        self.write(&tasks).await
    }

    /// Appends the task built by `build` under the first free id at or
    /// above `first_id`. The id is picked and the record written under the
    /// same write lock, so concurrent callers never share an id.
    pub async fn add_new<F>(&self, first_id: i64, build: F) -> Result<Task, AppError>
    where
        F: FnOnce(i64) -> Result<Task, AppError>,
    {
        let _guard = self.writes.lock().await;
        let mut tasks = self.try_list().await?;

        let taken: HashSet<i64> = tasks.iter().map(|t| t.id).collect();
        let mut id = first_id;
        while taken.contains(&id) {
            id += 1;
        }

        let task = build(id)?;
        debug!("adding task {}", task.id);
        tasks.push(task.clone());
        self.write(&tasks).await?;
        Ok(task)
    }

    /// Replaces the record with the same id. Returns `false` and writes
    /// nothing when no record matches.
    pub async fn update(&self, task: Task) -> Result<bool, AppError> {
        let _guard = self.writes.lock().await;
        let mut tasks = self.try_list().await?;
        let Some(slot) = tasks.iter_mut().find(|t| t.id == task.id) else {
            debug!("update skipped, task {} not found", task.id);
            return Ok(false);
        };
        *slot = task;
        self.write(&tasks).await?;
        Ok(true)
    }

    pub async fn remove(&self, id: i64) -> Result<bool, AppError> {
        let _guard = self.writes.lock().await;
        let mut tasks = self.try_list().await?;
        let before = tasks.len();
        tasks.retain(|t| t.id != id);
        if tasks.len() == before {
            return Ok(false);
        }
        self.write(&tasks).await?;
        Ok(true)
    }

    async fn write(&self, tasks: &[Task]) -> Result<(), AppError> {
        self.kv.set(TASKS_KEY, serde_json::to_value(tasks)?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;
    use chrono::{TimeZone, Utc};

    fn task(id: i64, content: &str) -> Task {
        let due = Utc.with_ymd_and_hms(2026, 10, 20, 9, 0, 0).unwrap();
        Task::new(id, content, due, Priority::Medium)
    }

    fn store() -> TaskStore {
        TaskStore::new(Arc::new(MemoryKvStore::new()))
    }

    struct BrokenKv;

    #[async_trait]
    impl KeyValueStore for BrokenKv {
        async fn get(&self, _key: &str) -> Result<Option<Value>, AppError> {
            Err(AppError::InternalServerError)
        }

        async fn set(&self, _key: &str, _value: Value) -> Result<(), AppError> {
            Err(AppError::InternalServerError)
        }
    }

    /// Yields around every access so interleaved callers actually overlap.
    #[derive(Default)]
    struct YieldingKv {
        inner: MemoryKvStore,
    }

    #[async_trait]
    impl KeyValueStore for YieldingKv {
        async fn get(&self, key: &str) -> Result<Option<Value>, AppError> {
            tokio::task::yield_now().await;
            let value = self.inner.get(key).await;
            tokio::task::yield_now().await;
            value
        }

        async fn set(&self, key: &str, value: Value) -> Result<(), AppError> {
            tokio::task::yield_now().await;
            self.inner.set(key, value).await
        }
    }

    #[tokio::test]
    async fn empty_store_lists_nothing() {
        assert!(store().list().await.is_empty());
    }

    #[tokio::test]
    async fn add_keeps_insertion_order() {
        let store = store();
        store.add(task(1, "a")).await.unwrap();
        store.add(task(2, "b")).await.unwrap();

        let ids: Vec<i64> = store.list().await.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn update_replaces_exactly_one_record() {
        let store = store();
        store.add(task(1, "a")).await.unwrap();
        store.add(task(2, "b")).await.unwrap();

        let mut edited = task(2, "b edited");
        edited.priority = Priority::High;
        assert!(store.update(edited.clone()).await.unwrap());

        let tasks = store.list().await;
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0], task(1, "a"));
        assert_eq!(tasks[1], edited);
    }

    #[tokio::test]
    async fn update_of_unknown_id_is_a_noop() {
        let store = store();
        store.add(task(1, "a")).await.unwrap();

        assert!(!store.update(task(99, "ghost")).await.unwrap());
        assert_eq!(store.list().await, vec![task(1, "a")]);
    }

    #[tokio::test]
    async fn remove_deletes_only_the_matching_record() {
        let store = store();
        for id in 1..=3 {
            store.add(task(id, &format!("t{id}"))).await.unwrap();
        }

        assert!(store.remove(2).await.unwrap());
        assert!(!store.remove(2).await.unwrap());

        let tasks = store.list().await;
        assert_eq!(tasks, vec![task(1, "t1"), task(3, "t3")]);
        assert_eq!(store.get(3).await.unwrap(), Some(task(3, "t3")));
        assert_eq!(store.get(2).await.unwrap(), None);
    }

    #[tokio::test]
    async fn storage_fault_lists_as_empty_but_mutations_fail() {
        let store = TaskStore::new(Arc::new(BrokenKv));

        assert!(store.list().await.is_empty());
        assert!(store.try_list().await.is_err());
        assert!(store.add(task(1, "a")).await.is_err());
    }

    #[tokio::test]
    async fn concurrent_adds_both_survive() {
        let store = TaskStore::new(Arc::new(YieldingKv::default()));

        let (a, b) = tokio::join!(store.add(task(1, "a")), store.add(task(2, "b")));
        a.unwrap();
        b.unwrap();

        let mut ids: Vec<i64> = store.list().await.iter().map(|t| t.id).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn add_new_picks_distinct_ids_under_contention() {
        let store = TaskStore::new(Arc::new(YieldingKv::default()));

        let (a, b) = tokio::join!(
            store.add_new(100, |id| Ok(task(id, "a"))),
            store.add_new(100, |id| Ok(task(id, "b"))),
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_ne!(a.id, b.id);
        let mut ids: Vec<i64> = store.list().await.iter().map(|t| t.id).collect();
        ids.sort();
        assert_eq!(ids, vec![100, 101]);
    }

    #[tokio::test]
    async fn add_new_writes_nothing_when_build_fails() {
        let store = store();

        let result = store
            .add_new(1, |_| Err(AppError::BadRequest("rejected".to_string())))
            .await;

        assert!(result.is_err());
        assert!(store.list().await.is_empty());
    }
}
