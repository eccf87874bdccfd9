#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use serde_json::Value;

use taskminder::alarms::{AlarmClock, PendingAlarm};
use taskminder::clock::FixedClock;
use taskminder::error::AppError;
use taskminder::notify::FeedNotifier;
use taskminder::services::{ReminderScheduler, TaskService};
use taskminder::state::AppState;
use taskminder::store::{KeyValueStore, MemoryKvStore, TaskStore};

/// Alarm clock that only records what is armed; nothing ever fires on its own.
#[derive(Default)]
pub struct RecordingAlarms {
    pending: Mutex<BTreeMap<String, DateTime<Utc>>>,
}

impl RecordingAlarms {
    pub fn snapshot(&self) -> BTreeMap<String, DateTime<Utc>> {
        self.pending.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlarmClock for RecordingAlarms {
    async fn arm(&self, key: &str, fire_at: DateTime<Utc>) -> Result<(), AppError> {
        self.pending.lock().unwrap().insert(key.to_string(), fire_at);
        Ok(())
    }

    async fn cancel(&self, key: &str) -> Result<bool, AppError> {
        Ok(self.pending.lock().unwrap().remove(key).is_some())
    }

    async fn cancel_all(&self) -> Result<(), AppError> {
        self.pending.lock().unwrap().clear();
        Ok(())
    }

    async fn pending(&self) -> Result<Vec<PendingAlarm>, AppError> {
        let mut alarms: Vec<PendingAlarm> = self
            .snapshot()
            .into_iter()
            .map(|(key, fire_at)| PendingAlarm { key, fire_at })
            .collect();
        alarms.sort_by_key(|a| a.fire_at);
        Ok(alarms)
    }
}

/// In-memory store that yields to the scheduler around every access, so
/// concurrent callers interleave between their read and their write.
#[derive(Default)]
pub struct YieldingKv {
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

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
}

pub fn utc() -> FixedOffset {
    FixedOffset::east_opt(0).unwrap()
}

pub struct Harness {
    pub clock: Arc<FixedClock>,
    pub alarms: Arc<RecordingAlarms>,
    pub feed: Arc<FeedNotifier>,
    pub store: TaskStore,
    pub scheduler: Arc<ReminderScheduler>,
    pub tasks: Arc<TaskService>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_kv(Arc::new(MemoryKvStore::new()))
    }

    pub fn with_kv(kv: Arc<dyn KeyValueStore>) -> Self {
        let clock = Arc::new(FixedClock::new(now()));
        let alarms = Arc::new(RecordingAlarms::default());
        let feed = Arc::new(FeedNotifier::new(100));
        let store = TaskStore::new(kv);

        let scheduler = Arc::new(ReminderScheduler::new(
            alarms.clone(),
            feed.clone(),
            clock.clone(),
            utc(),
        ));
        let tasks = Arc::new(TaskService::new(
            store.clone(),
            scheduler.clone(),
            clock.clone(),
            utc(),
        ));

        Self {
            clock,
            alarms,
            feed,
            store,
            scheduler,
            tasks,
        }
    }

    pub fn state(&self) -> AppState {
        AppState {
            tasks: self.tasks.clone(),
            feed: self.feed.clone(),
        }
    }
}
