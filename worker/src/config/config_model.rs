#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub worker_server: WorkerServer,
    pub database: Database,
    pub cleanup: Cleanup,
    pub quota: Quota,
}

#[derive(Debug, Clone)]
pub struct WorkerServer {
    pub port: u16,
    pub timeout: u64,
    pub body_limit: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct Cleanup {
    pub internal_token: Option<String>,
    pub interval_seconds: u64,
    pub batch_limit: i64,
}

#[derive(Debug, Clone)]
pub struct Quota {
    pub reference_utc_offset: String,
}
