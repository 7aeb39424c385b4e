use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
};
use quota_core::{
    domain::value_objects::calendar::QuotaCalendar,
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{
            entitlements::EntitlementPostgres, saved_documents::SavedDocumentPostgres,
        },
    },
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::AuthUser, axum_http::error_responses::AppError,
    usecases::storage_limits::StorageLimitUseCase,
};

type PgStorageLimits = StorageLimitUseCase<EntitlementPostgres, SavedDocumentPostgres>;

pub fn routes(db_pool: Arc<PgPoolSquad>, calendar: QuotaCalendar) -> Router {
    let entitlement_repository = EntitlementPostgres::new(Arc::clone(&db_pool));
    let saved_document_repository = SavedDocumentPostgres::new(Arc::clone(&db_pool));
    let storage_limit_usecase = StorageLimitUseCase::new(
        Arc::new(entitlement_repository),
        Arc::new(saved_document_repository),
        calendar,
    );

    Router::new()
        .route("/", get(list).post(save))
        .route("/latest", get(latest))
        .route("/can-save", get(can_save))
        .route("/:document_id", delete(remove))
        .with_state(Arc::new(storage_limit_usecase))
}

#[derive(Debug, Deserialize)]
pub struct SaveDocumentRequest {
    pub payload: serde_json::Value,
    pub template: String,
}

pub async fn list(
    State(storage_limit_usecase): State<Arc<PgStorageLimits>>,
    auth: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(storage_limit_usecase.list(auth.user_id).await?))
}

pub async fn latest(
    State(storage_limit_usecase): State<Arc<PgStorageLimits>>,
    auth: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    storage_limit_usecase
        .latest(auth.user_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("No saved document".to_string()))
}

pub async fn can_save(
    State(storage_limit_usecase): State<Arc<PgStorageLimits>>,
    auth: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(storage_limit_usecase.can_save(auth.user_id).await?))
}

pub async fn save(
    State(storage_limit_usecase): State<Arc<PgStorageLimits>>,
    auth: AuthUser,
    Json(request): Json<SaveDocumentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let template = request.template.trim().to_string();
    if template.is_empty() {
        return Err(AppError::BadRequest("template is required".to_string()));
    }

    let insertion = storage_limit_usecase
        .save(auth.user_id, request.payload, template)
        .await?;
    Ok((StatusCode::CREATED, Json(insertion)))
}

pub async fn remove(
    State(storage_limit_usecase): State<Arc<PgStorageLimits>>,
    auth: AuthUser,
    Path(document_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    if storage_limit_usecase
        .delete(auth.user_id, document_id)
        .await?
    {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("Document not found".to_string()))
    }
}
