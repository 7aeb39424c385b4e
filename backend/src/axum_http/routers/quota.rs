use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    response::IntoResponse,
    routing::{get, post},
};
use quota_core::{
    domain::value_objects::{
        calendar::QuotaCalendar,
        enums::quota_actions::{DownloadFormat, QuotaAction},
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{entitlements::EntitlementPostgres, usage_events::UsageEventPostgres},
    },
};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::{
    auth::{AuthUser, OptionalAuthUser},
    axum_http::error_responses::{AppError, denial_status},
    usecases::{
        credit_consumer::CreditConsumer, quota_checker::QuotaChecker, quota_gate::QuotaGate,
        usage_ledger::UsageLedger, usage_summary::UsageSummaryUseCase,
    },
};

type PgQuotaChecker = QuotaChecker<EntitlementPostgres, UsageEventPostgres>;
type PgCreditConsumer = CreditConsumer<EntitlementPostgres>;
type PgUsageLedger = UsageLedger<UsageEventPostgres>;
type PgQuotaGate = QuotaGate<EntitlementPostgres, UsageEventPostgres>;
type PgUsageSummary = UsageSummaryUseCase<EntitlementPostgres, UsageEventPostgres>;

pub struct QuotaRouteState {
    checker: PgQuotaChecker,
    consumer: PgCreditConsumer,
    ledger: PgUsageLedger,
    gate: PgQuotaGate,
    summary: PgUsageSummary,
}

pub fn routes(db_pool: Arc<PgPoolSquad>, calendar: QuotaCalendar) -> Router {
    let entitlement_repository = Arc::new(EntitlementPostgres::new(Arc::clone(&db_pool)));
    let usage_event_repository = Arc::new(UsageEventPostgres::new(Arc::clone(&db_pool)));

    let state = QuotaRouteState {
        checker: QuotaChecker::new(
            Arc::clone(&entitlement_repository),
            Arc::clone(&usage_event_repository),
            calendar,
        ),
        consumer: CreditConsumer::new(Arc::clone(&entitlement_repository), calendar),
        ledger: UsageLedger::new(Arc::clone(&usage_event_repository)),
        gate: QuotaGate::new(
            Arc::clone(&entitlement_repository),
            Arc::clone(&usage_event_repository),
            calendar,
        ),
        summary: UsageSummaryUseCase::new(entitlement_repository, usage_event_repository, calendar),
    };

    Router::new()
        .route("/summary", get(summary))
        .route("/check", post(check))
        .route("/consume", post(consume))
        .route("/acquire", post(acquire))
        .route("/release", post(release))
        .with_state(Arc::new(state))
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Generation,
    Download,
}

#[derive(Debug, Deserialize)]
pub struct QuotaActionRequest {
    pub action: ActionKind,
    pub format: Option<DownloadFormat>,
}

impl TryFrom<QuotaActionRequest> for QuotaAction {
    type Error = AppError;

    fn try_from(request: QuotaActionRequest) -> Result<Self, Self::Error> {
        match (request.action, request.format) {
            (ActionKind::Generation, None) => Ok(QuotaAction::Generation),
            (ActionKind::Generation, Some(_)) => Err(AppError::BadRequest(
                "format only applies to downloads".to_string(),
            )),
            (ActionKind::Download, format) => Ok(QuotaAction::Download(format.unwrap_or_default())),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ConsumeResponse {
    pub consumed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ReleaseRequest {
    pub event_id: Uuid,
}

pub async fn summary(
    State(state): State<Arc<QuotaRouteState>>,
    auth: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let summary = state.summary.summary(auth.user_id).await?;
    Ok(Json(summary))
}

pub async fn check(
    State(state): State<Arc<QuotaRouteState>>,
    OptionalAuthUser(auth): OptionalAuthUser,
    Json(request): Json<QuotaActionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let action = QuotaAction::try_from(request)?;
    let decision = state
        .checker
        .check_availability(auth.map(|auth| auth.user_id), action)
        .await;
    Ok(Json(decision))
}

/// Called after the gated action succeeded: charge the credit, then log the event.
pub async fn consume(
    State(state): State<Arc<QuotaRouteState>>,
    auth: AuthUser,
    Json(request): Json<QuotaActionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let action = QuotaAction::try_from(request)?;
    let consumed = state.consumer.consume(auth.user_id, action).await?;

    let event_id = if consumed {
        state.ledger.record(auth.user_id, action.usage_route()).await
    } else {
        warn!(user_id = %auth.user_id, %action, "quota: consume refused; event not recorded");
        None
    };

    Ok(Json(ConsumeResponse { consumed, event_id }))
}

pub async fn acquire(
    State(state): State<Arc<QuotaRouteState>>,
    OptionalAuthUser(auth): OptionalAuthUser,
    Json(request): Json<QuotaActionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let action = QuotaAction::try_from(request)?;
    let admission = state
        .gate
        .acquire(auth.map(|auth| auth.user_id), action)
        .await;
    Ok((denial_status(admission.decision.reason), Json(admission)))
}

pub async fn release(
    State(state): State<Arc<QuotaRouteState>>,
    auth: AuthUser,
    Json(request): Json<ReleaseRequest>,
) -> Result<impl IntoResponse, AppError> {
    match state.gate.release(auth.user_id, request.event_id).await? {
        Some(released) => Ok(Json(released)),
        None => Err(AppError::NotFound(
            "No releasable reservation with that id".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: serde_json::Value) -> QuotaActionRequest {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn download_defaults_to_pdf() {
        let action =
            QuotaAction::try_from(request(serde_json::json!({ "action": "download" }))).unwrap();
        assert_eq!(action, QuotaAction::Download(DownloadFormat::Pdf));

        let action = QuotaAction::try_from(request(
            serde_json::json!({ "action": "download", "format": "docx" }),
        ))
        .unwrap();
        assert_eq!(action, QuotaAction::Download(DownloadFormat::Docx));
    }

    #[test]
    fn generation_rejects_a_format() {
        let result = QuotaAction::try_from(request(
            serde_json::json!({ "action": "generation", "format": "pdf" }),
        ));
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }
}
