use anyhow::Result;
use quota_core::domain::{
    repositories::{
        entitlements::EntitlementRepository, saved_documents::SavedDocumentRepository,
    },
    value_objects::calendar::QuotaCalendar,
};
use quota_core::infra::db::{
    postgres::postgres_connection,
    repositories::{entitlements::EntitlementPostgres, saved_documents::SavedDocumentPostgres},
};
use std::{sync::Arc, time::Duration};
use tracing::{error, info};
use worker::{
    axum_http, config, services,
    usecases::cleanup_expired_documents::CleanupExpiredDocumentsUseCase,
};

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(error) = run().await {
        error!("Worker exited with error: {}", error);
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    quota_core::observability::init_observability("worker")?;

    let dotenvy_env = Arc::new(config::config_loader::load()?);
    info!("ENV has been loaded");

    let postgres_pool = postgres_connection::establish_connection(
        &dotenvy_env.database.url,
        dotenvy_env.database.max_connections,
    )?;
    info!("Postgres connection has been established");

    let db_pool_arc = Arc::new(postgres_pool);
    let calendar = QuotaCalendar::from_offset_str(&dotenvy_env.quota.reference_utc_offset)?;

    let saved_document_repository: Arc<dyn SavedDocumentRepository + Send + Sync> =
        Arc::new(SavedDocumentPostgres::new(Arc::clone(&db_pool_arc)));
    let entitlement_repository: Arc<dyn EntitlementRepository + Send + Sync> =
        Arc::new(EntitlementPostgres::new(Arc::clone(&db_pool_arc)));

    let cleanup_usecase = Arc::new(CleanupExpiredDocumentsUseCase::new(
        saved_document_repository,
        entitlement_repository,
        calendar,
        dotenvy_env.cleanup.batch_limit,
    ));

    if dotenvy_env.cleanup.internal_token.is_none() {
        info!("INTERNAL_CLEANUP_TOKEN is not set; the cleanup endpoint will reject requests");
    }

    // Spawn background loop
    let sweep_loop = tokio::spawn(services::sweep_loop::run_sweep_loop(
        Arc::clone(&cleanup_usecase),
        Duration::from_secs(dotenvy_env.cleanup.interval_seconds),
    ));

    let server_config = Arc::clone(&dotenvy_env);
    let http_server = tokio::spawn(async move {
        axum_http::http_serve::start(server_config, cleanup_usecase).await
    });

    tokio::select! {
        result = sweep_loop => result??,
        result = http_server => result??,
    };
    Ok(())
}
