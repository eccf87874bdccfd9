pub mod form;
pub mod task;

pub use form::{EditorMode, TaskForm, ValidationError};
pub use task::{Priority, Task};
