use chrono::{FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::task::{Priority, Task, encode_due_date};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("task content must not be empty")]
    EmptyContent,

    #[error("a due date and a due time are both required")]
    MissingDueDate,

    #[error("invalid due date/time: {0}")]
    InvalidDueDate(String),
}

/// Whether a form submission creates a new task or overwrites an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditorMode {
    #[default]
    Adding,
    Editing { id: i64 },
}

/// The add/edit form as the popup submits it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskForm {
    #[serde(default)]
    pub content: String,
    /// `YYYY-MM-DD`
    #[serde(default)]
    pub due_date: String,
    /// `HH:MM`, or `HH:MM:SS[.fff]` for times not on a whole minute
    #[serde(default)]
    pub due_time: String,
    #[serde(default = "default_priority_code")]
    pub priority: String,
}

fn default_priority_code() -> String {
    Priority::Low.code().to_string()
}

impl TaskForm {
    /// Validates the form and builds the task record it describes.
    ///
    /// Date and time are read as wall-clock values in `tz` and stored in UTC.
    pub fn into_task(self, id: i64, tz: &FixedOffset) -> Result<Task, ValidationError> {
        let content = self.content.trim();
        if content.is_empty() {
            return Err(ValidationError::EmptyContent);
        }

        let date = self.due_date.trim();
        let time = self.due_time.trim();
        if date.is_empty() || time.is_empty() {
            return Err(ValidationError::MissingDueDate);
        }

        let naive = parse_local(date, time)?;
        let due = tz
            .from_local_datetime(&naive)
            .single()
            .ok_or_else(|| ValidationError::InvalidDueDate(format!("{date}T{time}")))?
            .with_timezone(&Utc);

        Ok(Task {
            id,
            content: content.to_string(),
            due_date: encode_due_date(due),
            priority: Priority::from_code(&self.priority),
        })
    }

    /// Pre-fills the form with an existing task for editing.
    pub fn from_task(task: &Task, tz: &FixedOffset) -> Self {
        let (due_date, due_time) = match task.due_at() {
            Some(due) => {
                let local = due.with_timezone(tz);
                // Round-trip exactly, or an untouched edit would move the due date.
                let time_format = if local.nanosecond() != 0 {
                    "%H:%M:%S%.3f"
                } else if local.second() != 0 {
                    "%H:%M:%S"
                } else {
                    "%H:%M"
                };
                (
                    local.format("%Y-%m-%d").to_string(),
                    local.format(time_format).to_string(),
                )
            }
            None => (String::new(), String::new()),
        };

        Self {
            content: task.content.clone(),
            due_date,
            due_time,
            priority: task.priority.code().to_string(),
        }
    }
}

fn parse_local(date: &str, time: &str) -> Result<NaiveDateTime, ValidationError> {
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|e| ValidationError::InvalidDueDate(format!("{date}: {e}")))?;
    let time = NaiveTime::parse_from_str(time, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(time, "%H:%M:%S"))
        .or_else(|_| NaiveTime::parse_from_str(time, "%H:%M:%S%.f"))
        .map_err(|e| ValidationError::InvalidDueDate(format!("{time}: {e}")))?;
    Ok(date.and_time(time))
}
