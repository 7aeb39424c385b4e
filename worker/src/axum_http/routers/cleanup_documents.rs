use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::post,
};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use uuid::Uuid;

use crate::{
    config::config_model::DotEnvyConfig,
    usecases::cleanup_expired_documents::{
        CleanupExpiredDocumentsParams, CleanupExpiredDocumentsUseCase,
    },
};

// Run example
//   curl -X POST "http://localhost:$SERVER_PORT_WORKER/internal/v1/cleanup/documents" \
//     -H "Authorization: Bearer $INTERNAL_CLEANUP_TOKEN" \
//     -H "Content-Type: application/json" \
//     -d '{"limit":100}'

#[derive(Clone)]
pub struct CleanupRouteState {
    config: Arc<DotEnvyConfig>,
    usecase: Arc<CleanupExpiredDocumentsUseCase>,
}

pub fn routes(config: Arc<DotEnvyConfig>, usecase: Arc<CleanupExpiredDocumentsUseCase>) -> Router {
    Router::new()
        .route("/documents", post(cleanup_documents))
        .with_state(CleanupRouteState { config, usecase })
}

#[derive(Debug, Default, Deserialize)]
pub struct CleanupDocumentsRequest {
    pub limit: Option<i64>,
    pub skip_day_pass_reconcile: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct CleanupDocumentsResponse {
    pub deleted: usize,
    pub deleted_ids: Vec<Uuid>,
    pub reconciled_day_passes: usize,
    pub reconcile_failed: bool,
}

pub async fn cleanup_documents(
    State(state): State<CleanupRouteState>,
    headers: HeaderMap,
    payload: Option<Json<CleanupDocumentsRequest>>,
) -> Response {
    let expected_token = match state.config.cleanup.internal_token.as_deref() {
        Some(token) => token,
        None => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                "cleanup token is not configured",
            )
                .into_response();
        }
    };

    if let Err(status) = authorize_bearer(&headers, expected_token) {
        warn!("cleanup_documents: rejected request with bad bearer token");
        return (status, "unauthorized").into_response();
    }

    let payload = payload.map(|Json(body)| body).unwrap_or_default();
    let params = CleanupExpiredDocumentsParams {
        limit: payload.limit,
        skip_day_pass_reconcile: payload.skip_day_pass_reconcile.unwrap_or(false),
    };

    match state.usecase.run(params).await {
        Ok(result) => Json(CleanupDocumentsResponse {
            deleted: result.deleted,
            deleted_ids: result.deleted_ids,
            reconciled_day_passes: result.reconciled_day_passes,
            reconcile_failed: result.reconcile_failed,
        })
        .into_response(),
        Err(err) => {
            error!(error = ?err, "cleanup_documents: usecase failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "cleanup failed").into_response()
        }
    }
}

fn authorize_bearer(headers: &HeaderMap, expected_token: &str) -> Result<(), StatusCode> {
    let auth = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = auth
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if token == expected_token {
        Ok(())
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}
