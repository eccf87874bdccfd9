use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, Utc};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

use crate::alarms::{AlarmClock, AlarmKey, PendingAlarm, ReminderKind};
use crate::clock::Clock;
use crate::error::AppError;
use crate::models::Task;
use crate::notify::{Notification, Notifier};
use crate::store::TaskStore;

pub const REMINDER_LEAD_MINUTES: i64 = 15;
pub const NOTIFICATION_TITLE: &str = "Task Reminder";

pub fn reminder_lead() -> Duration {
    Duration::minutes(REMINDER_LEAD_MINUTES)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    Armed {
        pre_due: DateTime<Utc>,
        due: DateTime<Utc>,
    },
    /// Due at or before scheduling time; nothing armed.
    PastDue,
    /// The stored due date does not parse; nothing armed.
    InvalidDueDate,
}

/// Turns task due dates into alarms and alarms into notifications.
///
/// Each task with a future due date gets two alarms, one
/// [`REMINDER_LEAD_MINUTES`] before the due time and one at it. Alarms are
/// keyed by task id, and the scheduler keeps a snapshot of every armed task
/// so a fired key can be rendered without going back to the store.
pub struct ReminderScheduler {
    alarms: Arc<dyn AlarmClock>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    tz: FixedOffset,
    armed: Mutex<HashMap<i64, Task>>,
}

impl ReminderScheduler {
    pub fn new(
        alarms: Arc<dyn AlarmClock>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        tz: FixedOffset,
    ) -> Self {
        Self {
            alarms,
            notifier,
            clock,
            tz,
            armed: Mutex::new(HashMap::new()),
        }
    }

    /// Arms both reminders for `task`, replacing any reminders already armed
    /// for its id.
    pub async fn schedule(&self, task: &Task) -> Result<ScheduleOutcome, AppError> {
        let mut armed = self.armed.lock().await;

        if armed.remove(&task.id).is_some() {
            self.cancel_keys(task.id).await?;
        }

        let Some(due) = task.due_at() else {
            warn!("task {} has an unparseable due date {:?}, not scheduling", task.id, task.due_date);
            return Ok(ScheduleOutcome::InvalidDueDate);
        };

        let now = self.clock.now();
        if due <= now {
            debug!("task {} is already due ({}), not scheduling", task.id, due);
            return Ok(ScheduleOutcome::PastDue);
        }

        let pre_due = due - reminder_lead();
        self.alarms
            .arm(&AlarmKey::new(task.id, ReminderKind::PreDue).to_string(), pre_due)
            .await?;
        self.alarms
            .arm(&AlarmKey::new(task.id, ReminderKind::Due).to_string(), due)
            .await?;
        armed.insert(task.id, task.clone());

        info!("scheduled reminders for task {} at {} and {}", task.id, pre_due, due);
        Ok(ScheduleOutcome::Armed { pre_due, due })
    }

    /// Cancels both reminders of task `id`. Returns whether anything was armed.
    pub async fn cancel(&self, id: i64) -> Result<bool, AppError> {
        let mut armed = self.armed.lock().await;
        let known = armed.remove(&id).is_some();
        let cancelled = self.cancel_keys(id).await?;

        if known || cancelled {
            info!("cancelled reminders for task {}", id);
        }
        Ok(known || cancelled)
    }

    /// Clears every alarm, then schedules each stored task afresh.
    /// Returns how many tasks ended up armed.
    pub async fn rearm_all(&self, store: &TaskStore) -> Result<usize, AppError> {
        {
            let mut armed = self.armed.lock().await;
            self.alarms.cancel_all().await?;
            armed.clear();
        }

        let tasks = store.list().await;
        let mut count = 0;
        for task in &tasks {
            if let ScheduleOutcome::Armed { .. } = self.schedule(task).await? {
                count += 1;
            }
        }

        info!("re-armed reminders for {} of {} tasks", count, tasks.len());
        Ok(count)
    }

    /// Handles a fired alarm key. Returns whether a notification was sent.
    pub async fn on_fire(&self, key: &str) -> Result<bool, AppError> {
        let key = match key.parse::<AlarmKey>() {
            Ok(key) => key,
            Err(e) => {
                warn!("ignoring fired alarm: {}", e);
                return Ok(false);
            }
        };

        let task = {
            let mut armed = self.armed.lock().await;
            let task = match key.kind {
                ReminderKind::Due => armed.remove(&key.task_id),
                ReminderKind::PreDue => armed.get(&key.task_id).cloned(),
            };
            match task {
                Some(task) => task,
                None => {
                    debug!("alarm {} fired for a task that is no longer armed", key);
                    return Ok(false);
                }
            }
        };

        let notification = build_notification(&task, &self.tz, self.clock.now());
        if let Err(e) = self.notifier.notify(notification).await {
            warn!("failed to show reminder for task {}: {}", task.id, e);
            return Ok(false);
        }
        Ok(true)
    }

    pub async fn pending(&self) -> Result<Vec<PendingAlarm>, AppError> {
        self.alarms.pending().await
    }

    /// Consumes fired alarm keys until the sending side is dropped.
    pub async fn run(self: Arc<Self>, mut fired: mpsc::UnboundedReceiver<String>) {
        info!("Starting reminder scheduler");

        while let Some(key) = fired.recv().await {
            if let Err(e) = self.on_fire(&key).await {
                // Keep running; one bad alarm must not stop the rest.
                warn!("handling alarm {} failed: {:?}", key, e);
            }
        }

        info!("Reminder scheduler stopped");
    }

    async fn cancel_keys(&self, id: i64) -> Result<bool, AppError> {
        let mut any = false;
        for kind in ReminderKind::ALL {
            any |= self.alarms.cancel(&AlarmKey::new(id, kind).to_string()).await?;
        }
        Ok(any)
    }
}

pub fn build_notification(task: &Task, tz: &FixedOffset, now: DateTime<Utc>) -> Notification {
    Notification {
        title: NOTIFICATION_TITLE.to_string(),
        body: format!(
            "Task: {}\nDue: {}\nPriority: {}",
            task.content,
            task.format_due(tz),
            task.priority.label()
        ),
        shown_at: now,
    }
}
