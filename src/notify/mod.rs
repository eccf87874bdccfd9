use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub shown_at: DateTime<Utc>,
}

/// Displays a notification to the user. Delivery is best effort; callers
/// never retry.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<(), AppError>;
}

pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), AppError> {
        info!(title = %notification.title, "{}", notification.body.replace('\n', " | "));
        Ok(())
    }
}

/// Logs each notification and keeps the most recent ones for the HTTP surface.
pub struct FeedNotifier {
    capacity: usize,
    recent: Mutex<VecDeque<Notification>>,
}

impl FeedNotifier {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            recent: Mutex::new(VecDeque::new()),
        }
    }

    /// Newest first.
    pub fn recent(&self) -> Vec<Notification> {
        let recent = self.recent.lock().unwrap_or_else(|e| e.into_inner());
        recent.iter().rev().cloned().collect()
    }
}

#[async_trait]
impl Notifier for FeedNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), AppError> {
        LogNotifier.notify(notification.clone()).await?;

        let mut recent = self.recent.lock().unwrap_or_else(|e| e.into_inner());
        if recent.len() == self.capacity {
            recent.pop_front();
        }
        recent.push_back(notification);
        Ok(())
    }
}
