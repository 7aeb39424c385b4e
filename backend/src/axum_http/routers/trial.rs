use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    response::IntoResponse,
    routing::{get, post},
};
use quota_core::{
    domain::value_objects::enums::trial_kinds::TrialKind,
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::trial_usages::TrialUsagePostgres,
    },
};
use serde::Deserialize;

use crate::{
    axum_http::{client_ip::ClientIp, error_responses::AppError},
    usecases::trial_quota::TrialQuotaUseCase,
};

type PgTrialQuota = TrialQuotaUseCase<TrialUsagePostgres>;

pub fn routes(db_pool: Arc<PgPoolSquad>) -> Router {
    let trial_usage_repository = TrialUsagePostgres::new(Arc::clone(&db_pool));
    let trial_quota_usecase = TrialQuotaUseCase::new(Arc::new(trial_usage_repository));

    Router::new()
        .route("/summary", get(summary))
        .route("/check", post(check))
        .route("/consume", post(consume))
        .with_state(Arc::new(trial_quota_usecase))
}

#[derive(Debug, Deserialize)]
pub struct TrialRequest {
    pub kind: TrialKind,
}

pub async fn summary(
    State(trial_quota_usecase): State<Arc<PgTrialQuota>>,
    ClientIp(ip_address): ClientIp,
) -> impl IntoResponse {
    Json(trial_quota_usecase.summary(&ip_address).await)
}

pub async fn check(
    State(trial_quota_usecase): State<Arc<PgTrialQuota>>,
    ClientIp(ip_address): ClientIp,
    Json(request): Json<TrialRequest>,
) -> impl IntoResponse {
    Json(trial_quota_usecase.check(&ip_address, request.kind).await)
}

pub async fn consume(
    State(trial_quota_usecase): State<Arc<PgTrialQuota>>,
    ClientIp(ip_address): ClientIp,
    Json(request): Json<TrialRequest>,
) -> Result<impl IntoResponse, AppError> {
    let consumption = trial_quota_usecase
        .consume(&ip_address, request.kind)
        .await?;
    Ok(Json(consumption))
}
