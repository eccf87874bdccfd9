//! One-shot wake-ups identified by string keys.
//!
//! An [`AlarmClock`] holds at most one pending alarm per key. When an alarm
//! comes due its key is delivered to whoever owns the receiving end of the
//! implementation's channel; the alarm clock itself knows nothing about tasks.

pub mod tokio_alarms;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::AppError;

pub use tokio_alarms::TokioAlarms;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingAlarm {
    pub key: String,
    pub fire_at: DateTime<Utc>,
}

#[async_trait]
pub trait AlarmClock: Send + Sync {
    /// Arms `key` to fire at `fire_at`, replacing any alarm already under that key.
    async fn arm(&self, key: &str, fire_at: DateTime<Utc>) -> Result<(), AppError>;

    /// Returns whether an alarm was pending under `key`.
    async fn cancel(&self, key: &str) -> Result<bool, AppError>;

    async fn cancel_all(&self) -> Result<(), AppError>;

    /// Pending alarms ordered by fire time.
    async fn pending(&self) -> Result<Vec<PendingAlarm>, AppError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReminderKind {
    /// Fires ahead of the due time by the reminder lead.
    PreDue,
    Due,
}

impl ReminderKind {
    pub const ALL: [ReminderKind; 2] = [ReminderKind::PreDue, ReminderKind::Due];

    fn as_str(self) -> &'static str {
        match self {
            ReminderKind::PreDue => "pre-due",
            ReminderKind::Due => "due",
        }
    }
}

/// Alarm key for one reminder of one task: `task:<id>:<kind>`.
///
/// Keys depend only on the task id, so the same key can be rebuilt at
/// cancel time without knowing what the task looked like when it was armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AlarmKey {
    pub task_id: i64,
    pub kind: ReminderKind,
}

impl AlarmKey {
    pub fn new(task_id: i64, kind: ReminderKind) -> Self {
        Self { task_id, kind }
    }
}

impl fmt::Display for AlarmKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task:{}:{}", self.task_id, self.kind.as_str())
    }
}

impl FromStr for AlarmKey {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AppError::Alarm(format!("unrecognized alarm key: {s}"));

        let rest = s.strip_prefix("task:").ok_or_else(invalid)?;
        let (id, kind) = rest.split_once(':').ok_or_else(invalid)?;
        let task_id = id.parse::<i64>().map_err(|_| invalid())?;
        let kind = match kind {
            "pre-due" => ReminderKind::PreDue,
            "due" => ReminderKind::Due,
            _ => return Err(invalid()),
        };

        Ok(Self { task_id, kind })
    }
}
