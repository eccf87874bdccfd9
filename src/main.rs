use std::sync::Arc;

use sqlx::sqlite::SqlitePoolOptions;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use taskminder::alarms::TokioAlarms;
use taskminder::api::router;
use taskminder::clock::{Clock, SystemClock};
use taskminder::config::Config;
use taskminder::notify::FeedNotifier;
use taskminder::services::{ReminderScheduler, TaskService};
use taskminder::state::AppState;
use taskminder::store::{SqliteKvStore, TaskStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::new_from_env()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.log_filter))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;

    let kv = SqliteKvStore::new(pool);
    kv.migrate().await?;
    let store = TaskStore::new(Arc::new(kv));

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let (alarms, fired) = TokioAlarms::new(clock.clone());
    let feed = Arc::new(FeedNotifier::new(config.feed_capacity));

    let scheduler = Arc::new(ReminderScheduler::new(
        Arc::new(alarms),
        feed.clone(),
        clock.clone(),
        config.utc_offset,
    ));
    let tasks = Arc::new(TaskService::new(
        store,
        scheduler.clone(),
        clock,
        config.utc_offset,
    ));

    // Alarms do not survive a restart; rebuild them from the stored tasks.
    match tasks.rearm().await {
        Ok(armed) => info!("startup re-arm complete, {} tasks armed", armed),
        Err(e) => warn!("startup re-arm failed: {}", e),
    }
    tokio::spawn(scheduler.run(fired));

    let app = router(AppState { tasks, feed });

    info!("listening on http://{}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
