use anyhow::{Context, Result};
use quota_core::domain::value_objects::calendar::QuotaCalendar;

use super::config_model::{Auth, BackendServer, Database, DotEnvyConfig, Quota};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let backend_server = BackendServer {
        port: std::env::var("SERVER_PORT_BACKEND")
            .expect("SERVER_PORT_BACKEND is invalid")
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

    let auth = get_auth_secret()?;

    let quota = Quota {
        reference_utc_offset: std::env::var("QUOTA_REFERENCE_UTC_OFFSET")
            .unwrap_or_else(|_| "+05:30".to_string()),
    };
    // Fail at startup rather than on the first request.
    QuotaCalendar::from_offset_str(&quota.reference_utc_offset)
        .context("QUOTA_REFERENCE_UTC_OFFSET is invalid")?;

    Ok(DotEnvyConfig {
        backend_server,
        database,
        auth,
        quota,
    })
}

pub fn get_auth_secret() -> Result<Auth> {
    dotenvy::dotenv().ok();

    Ok(Auth {
        jwt_secret: std::env::var("AUTH_JWT_SECRET").expect("AUTH_JWT_SECRET is invalid"),
    })
}
