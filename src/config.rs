use std::env;
use std::net::SocketAddr;

use chrono::{FixedOffset, Local, Offset};

use crate::error::AppError;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    /// Offset used to read form dates and to print due times.
    pub utc_offset: FixedOffset,
    pub feed_capacity: usize,
    pub log_filter: String,
}

impl Config {
    pub fn new_from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .unwrap_or_else(|| "sqlite://taskminder.db?mode=rwc".to_string());

        let bind_addr = match lookup("BIND_ADDR") {
            Some(raw) => raw
                .parse()
                .map_err(|e| AppError::Config(format!("BIND_ADDR {raw:?}: {e}")))?,
            None => SocketAddr::from(([127, 0, 0, 1], 3000)),
        };

        let utc_offset = match lookup("TASKMINDER_UTC_OFFSET_MINUTES") {
            Some(raw) => {
                let minutes: i32 = raw.trim().parse().map_err(|e| {
                    AppError::Config(format!("TASKMINDER_UTC_OFFSET_MINUTES {raw:?}: {e}"))
                })?;
                minutes
                    .checked_mul(60)
                    .and_then(FixedOffset::east_opt)
                    .ok_or_else(|| {
                        AppError::Config(format!("TASKMINDER_UTC_OFFSET_MINUTES out of range: {minutes}"))
                    })?
            }
            None => Local::now().offset().fix(),
        };

        let feed_capacity = match lookup("NOTIFICATION_FEED_CAPACITY") {
            Some(raw) => raw.trim().parse().map_err(|e| {
                AppError::Config(format!("NOTIFICATION_FEED_CAPACITY {raw:?}: {e}"))
            })?,
            None => 50,
        };

        let log_filter = lookup("RUST_LOG").unwrap_or_else(|| "taskminder=debug".to_string());

        Ok(Self {
            database_url,
            bind_addr,
            utc_offset,
            feed_capacity,
            log_filter,
        })
    }
}
