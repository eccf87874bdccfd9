use std::sync::Arc;

use chrono::FixedOffset;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::error::AppError;
use crate::models::{EditorMode, Task, TaskForm};
use crate::services::scheduler::{ReminderScheduler, ScheduleOutcome};
use crate::store::TaskStore;

/// The add / edit / delete actions of the task list, keeping the store and
/// the reminder alarms in step.
///
/// Mutations run one at a time, store write and alarm update together, so
/// a delete cannot land between an edit's write and its re-arm.
pub struct TaskService {
    store: TaskStore,
    scheduler: Arc<ReminderScheduler>,
    clock: Arc<dyn Clock>,
    tz: FixedOffset,
    mutations: Mutex<()>,
}

impl TaskService {
    pub fn new(
        store: TaskStore,
        scheduler: Arc<ReminderScheduler>,
        clock: Arc<dyn Clock>,
        tz: FixedOffset,
    ) -> Self {
        Self {
            store,
            scheduler,
            clock,
            tz,
            mutations: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    pub fn scheduler(&self) -> &Arc<ReminderScheduler> {
        &self.scheduler
    }

    pub fn timezone(&self) -> &FixedOffset {
        &self.tz
    }

    pub async fn list(&self) -> Vec<Task> {
        self.store.list().await
    }

    pub async fn get(&self, id: i64) -> Result<Task, AppError> {
        self.store.get(id).await?.ok_or(AppError::NotFound)
    }

    /// The form pre-filled for editing task `id`.
    pub async fn edit_form(&self, id: i64) -> Result<TaskForm, AppError> {
        let task = self.get(id).await?;
        Ok(TaskForm::from_task(&task, &self.tz))
    }

    /// Applies a form submission. Adding stores a new task under a fresh id;
    /// editing overwrites the task with the given id, keeping that id.
    /// Either way the task's reminders are (re)armed.
    pub async fn submit(&self, form: TaskForm, mode: EditorMode) -> Result<Task, AppError> {
        let _guard = self.mutations.lock().await;

        let task = match mode {
            EditorMode::Adding => {
                // Creation time in epoch milliseconds, bumped past taken ids.
                let first_id = self.clock.now().timestamp_millis();
                let tz = self.tz;
                let task = self
                    .store
                    .add_new(first_id, |id| Ok(form.into_task(id, &tz)?))
                    .await?;
                info!("added task {}", task.id);
                task
            }
            EditorMode::Editing { id } => {
                let task = form.into_task(id, &self.tz)?;
                if !self.store.update(task.clone()).await? {
                    return Err(AppError::NotFound);
                }
                info!("updated task {}", task.id);
                task
            }
        };

        self.arm(&task).await;
        Ok(task)
    }

    /// Removes task `id` and cancels its reminders.
    pub async fn delete(&self, id: i64) -> Result<(), AppError> {
        let _guard = self.mutations.lock().await;
        let removed = self.store.remove(id).await?;

        // Alarms can outlive the record if another writer removed it first.
        if let Err(e) = self.scheduler.cancel(id).await {
            warn!("failed to cancel reminders for task {}: {}", id, e);
        }

        if !removed {
            return Err(AppError::NotFound);
        }
        info!("deleted task {}", id);
        Ok(())
    }

    pub async fn rearm(&self) -> Result<usize, AppError> {
        let _guard = self.mutations.lock().await;
        self.scheduler.rearm_all(&self.store).await
    }

    async fn arm(&self, task: &Task) {
        match self.scheduler.schedule(task).await {
            Ok(ScheduleOutcome::Armed { .. }) => {}
            Ok(outcome) => info!("no reminders for task {}: {:?}", task.id, outcome),
            Err(e) => warn!("failed to schedule reminders for task {}: {}", task.id, e),
        }
    }
}
