use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// A user-authored reminder item.
///
/// `due_date` is kept in its serialized form so that records written by
/// other surfaces with malformed timestamps still load and list; use
/// [`Task::due_at`] to get the parsed instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: i64,
    pub content: String,
    pub due_date: String,
    pub priority: Priority,
}

impl Task {
    pub fn new(id: i64, content: impl Into<String>, due: DateTime<Utc>, priority: Priority) -> Self {
        Self {
            id,
            content: content.into(),
            due_date: encode_due_date(due),
            priority,
        }
    }

    /// Parsed due instant, or `None` when the stored value is not a valid timestamp.
    pub fn due_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.due_date)
            .ok()
            .map(|d| d.with_timezone(&Utc))
    }

    /// Human-readable due date in the given offset, e.g. `10/19/2026, 8:20:00 PM`.
    pub fn format_due(&self, tz: &FixedOffset) -> String {
        match self.due_at() {
            Some(due) => format_local(due, tz),
            None => "Invalid Date".to_string(),
        }
    }
}

pub fn encode_due_date(due: DateTime<Utc>) -> String {
    due.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn format_local(at: DateTime<Utc>, tz: &FixedOffset) -> String {
    at.with_timezone(tz)
        .format("%-m/%-d/%Y, %-I:%M:%S %p")
        .to_string()
}

/// Task priority, persisted as the string codes `"1"`, `"2"`, `"3"`.
///
/// Any other code is kept verbatim as `Unknown` so that it survives a
/// read-modify-write of the collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "RawPriority", into = "String")]
pub enum Priority {
    Low,
    Medium,
    High,
    Unknown(String),
}

impl Priority {
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "1" => Priority::Low,
            "2" => Priority::Medium,
            "3" => Priority::High,
            _ => Priority::Unknown(code.to_string()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            Priority::Low => "1",
            Priority::Medium => "2",
            Priority::High => "3",
            Priority::Unknown(code) => code,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Priority::Low => "Low Priority",
            Priority::Medium => "Medium Priority",
            Priority::High => "High Priority",
            Priority::Unknown(_) => "Unknown Priority",
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Low
    }
}

impl From<Priority> for String {
    fn from(priority: Priority) -> Self {
        priority.code().to_string()
    }
}

// Older writers stored the select value as a number.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawPriority {
    Text(String),
    Number(i64),
    Other(serde_json::Value),
}

impl From<RawPriority> for Priority {
    fn from(raw: RawPriority) -> Self {
        match raw {
            RawPriority::Text(code) => Priority::from_code(&code),
            RawPriority::Number(n) => Priority::from_code(&n.to_string()),
            RawPriority::Other(value) => Priority::Unknown(value.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn priority_labels_cover_every_code() {
        assert_eq!(Priority::from_code("1").label(), "Low Priority");
        assert_eq!(Priority::from_code("2").label(), "Medium Priority");
        assert_eq!(Priority::from_code("3").label(), "High Priority");
        assert_eq!(Priority::from_code("4").label(), "Unknown Priority");
        assert_eq!(Priority::from_code("").label(), "Unknown Priority");
        assert_eq!(Priority::from_code("high").label(), "Unknown Priority");
    }

    #[test]
    fn task_serializes_to_stored_layout() {
        let due = Utc.with_ymd_and_hms(2026, 10, 19, 20, 20, 0).unwrap();
        let task = Task::new(1760900000000, "Pay rent", due, Priority::High);

        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "id": 1760900000000_i64,
                "content": "Pay rent",
                "dueDate": "2026-10-19T20:20:00.000Z",
                "priority": "3"
            })
        );
    }

    #[test]
    fn unknown_and_numeric_priorities_are_read() {
        let numeric: Task = serde_json::from_value(serde_json::json!({
            "id": 1, "content": "a", "dueDate": "2026-01-01T00:00:00.000Z", "priority": 2
        }))
        .unwrap();
        assert_eq!(numeric.priority, Priority::Medium);

        let unknown: Task = serde_json::from_value(serde_json::json!({
            "id": 2, "content": "b", "dueDate": "2026-01-01T00:00:00.000Z", "priority": "9"
        }))
        .unwrap();
        assert_eq!(unknown.priority, Priority::Unknown("9".to_string()));
        assert_eq!(serde_json::to_value(&unknown).unwrap()["priority"], "9");
    }

    #[test]
    fn malformed_due_date_is_kept_but_not_parsed() {
        let task: Task = serde_json::from_value(serde_json::json!({
            "id": 3, "content": "c", "dueDate": "not a date", "priority": "1"
        }))
        .unwrap();

        assert_eq!(task.due_at(), None);
        assert_eq!(task.format_due(&FixedOffset::east_opt(0).unwrap()), "Invalid Date");
    }

    #[test]
    fn formats_due_in_local_offset() {
        let due = Utc.with_ymd_and_hms(2026, 10, 19, 20, 5, 9).unwrap();
        let task = Task::new(1, "x", due, Priority::Low);
        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();

        assert_eq!(task.format_due(&tokyo), "10/20/2026, 5:05:09 AM");
    }
}
