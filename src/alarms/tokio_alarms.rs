use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::{AlarmClock, PendingAlarm};
use crate::clock::Clock;
use crate::error::AppError;

struct Armed {
    fire_at: DateTime<Utc>,
    generation: u64,
    handle: JoinHandle<()>,
}

type PendingMap = Arc<Mutex<HashMap<String, Armed>>>;

/// Alarms backed by tokio timers.
///
/// Each armed key owns a spawned task that sleeps until the fire time and
/// then sends the key on the channel returned by [`TokioAlarms::new`].
/// Alarms whose time has already passed fire right away.
pub struct TokioAlarms {
    clock: Arc<dyn Clock>,
    fired: mpsc::UnboundedSender<String>,
    pending: PendingMap,
    next_generation: AtomicU64,
}

impl TokioAlarms {
    pub fn new(clock: Arc<dyn Clock>) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (fired, rx) = mpsc::unbounded_channel();
        let alarms = Self {
            clock,
            fired,
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(0),
        };
        (alarms, rx)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Armed>> {
        lock_pending(&self.pending)
    }
}

fn lock_pending(pending: &PendingMap) -> MutexGuard<'_, HashMap<String, Armed>> {
    pending.lock().unwrap_or_else(|e| e.into_inner())
}

#[async_trait]
impl AlarmClock for TokioAlarms {
    async fn arm(&self, key: &str, fire_at: DateTime<Utc>) -> Result<(), AppError> {
        let delay = (fire_at - self.clock.now()).to_std().unwrap_or_default();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);

        let shared = Arc::clone(&self.pending);
        let fired = self.fired.clone();
        let owned_key = key.to_string();

        // Hold the map while spawning so a zero-delay timer cannot look
        // itself up before it has been recorded.
        let mut pending = self.lock();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            // A replacement or cancel may have raced the timer; only the
            // generation still on record may fire.
            let still_armed = {
                let mut pending = lock_pending(&shared);
                match pending.get(&owned_key) {
                    Some(armed) if armed.generation == generation => {
                        pending.remove(&owned_key);
                        true
                    }
                    _ => false,
                }
            };

            if still_armed {
                trace!("alarm {} fired", owned_key);
                if fired.send(owned_key).is_err() {
                    debug!("alarm receiver dropped, fired key discarded");
                }
            }
        });

        let replaced = pending.insert(
            key.to_string(),
            Armed {
                fire_at,
                generation,
                handle,
            },
        );
        drop(pending);

        if let Some(old) = replaced {
            old.handle.abort();
            debug!("re-armed alarm {} (was {})", key, old.fire_at);
        } else {
            debug!("armed alarm {} at {}", key, fire_at);
        }

        Ok(())
    }

    async fn cancel(&self, key: &str) -> Result<bool, AppError> {
        match self.lock().remove(key) {
            Some(armed) => {
                armed.handle.abort();
                debug!("cancelled alarm {}", key);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn cancel_all(&self) -> Result<(), AppError> {
        let mut pending = self.lock();
        let count = pending.len();
        for (_, armed) in pending.drain() {
            armed.handle.abort();
        }
        debug!("cancelled all {} pending alarms", count);
        Ok(())
    }

    async fn pending(&self) -> Result<Vec<PendingAlarm>, AppError> {
        let mut alarms: Vec<PendingAlarm> = self
            .lock()
            .iter()
            .map(|(key, armed)| PendingAlarm {
                key: key.clone(),
                fire_at: armed.fire_at,
            })
            .collect();
        alarms.sort_by(|a, b| a.fire_at.cmp(&b.fire_at).then_with(|| a.key.cmp(&b.key)));
        Ok(alarms)
    }
}
