use anyhow::{Context, Result};
use quota_core::domain::value_objects::calendar::QuotaCalendar;

use super::config_model::{Cleanup, Database, DotEnvyConfig, Quota, WorkerServer};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let worker_server = WorkerServer {
        port: std::env::var("SERVER_PORT_WORKER")
            .expect("SERVER_PORT_WORKER is invalid")
            .parse()?,
        body_limit: std::env::var("SERVER_BODY_LIMIT")
            .expect("SERVER_BODY_LIMIT is invalid")
            .parse()?,
        timeout: std::env::var("SERVER_TIMEOUT")
            .expect("SERVER_TIMEOUT is invalid")
            .parse()?,
    };

    let database = Database {
        url: std::env::var("DATABASE_URL").expect("DATABASE_URL is invalid"),
        max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(10),
    };

    let cleanup = Cleanup {
        internal_token: std::env::var("INTERNAL_CLEANUP_TOKEN").ok().and_then(|v| {
            let trimmed = v.trim().to_string();
            (!trimmed.is_empty()).then_some(trimmed)
        }),
        interval_seconds: std::env::var("CLEANUP_INTERVAL_SECONDS")
            .unwrap_or_else(|_| "3600".to_string())
            .parse::<u64>()
            .context("CLEANUP_INTERVAL_SECONDS is invalid")?
            .max(1),
        batch_limit: std::env::var("CLEANUP_BATCH_LIMIT")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(500),
    };

    let quota = Quota {
        reference_utc_offset: std::env::var("QUOTA_REFERENCE_UTC_OFFSET")
            .unwrap_or_else(|_| "+05:30".to_string()),
    };
    QuotaCalendar::from_offset_str(&quota.reference_utc_offset)
        .context("QUOTA_REFERENCE_UTC_OFFSET is invalid")?;

    Ok(DotEnvyConfig {
        worker_server,
        database,
        cleanup,
        quota,
    })
}
