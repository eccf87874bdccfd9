pub mod scheduler;
pub mod tasks;

pub use scheduler::{ReminderScheduler, ScheduleOutcome};
pub use tasks::TaskService;
