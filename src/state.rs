use std::sync::Arc;

use crate::notify::FeedNotifier;
use crate::services::TaskService;

#[derive(Clone)]
pub struct AppState {
    pub tasks: Arc<TaskService>,
    pub feed: Arc<FeedNotifier>,
}
