use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use quota_core::domain::value_objects::quota::DenialReason;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Internal(err) => {
                tracing::error!(error = ?err, "http: internal error");
                // Don't leak internal error detail to client
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            code: status.as_u16(),
            message,
        });

        (status, body).into_response()
    }
}

/// Status for a denied admission, so clients can branch without parsing the body.
pub fn denial_status(reason: Option<DenialReason>) -> StatusCode {
    match reason {
        None => StatusCode::OK,
        Some(DenialReason::AuthenticationRequired) => StatusCode::UNAUTHORIZED,
        Some(DenialReason::FormatNotIncluded) => StatusCode::FORBIDDEN,
        Some(DenialReason::StoreUnavailable) => StatusCode::SERVICE_UNAVAILABLE,
        Some(
            DenialReason::WeeklyCreditsExhausted
            | DenialReason::DailyCapExceeded
            | DenialReason::MonthlyGenerationCapExceeded
            | DenialReason::MonthlyDownloadCapExceeded
            | DenialReason::TrialLimitReached,
        ) => StatusCode::TOO_MANY_REQUESTS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_errors_do_not_leak_details() {
        let response =
            AppError::Internal(anyhow::anyhow!("password authentication failed")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn denials_map_to_distinct_statuses() {
        assert_eq!(denial_status(None), StatusCode::OK);
        assert_eq!(
            denial_status(Some(DenialReason::AuthenticationRequired)),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            denial_status(Some(DenialReason::MonthlyDownloadCapExceeded)),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            denial_status(Some(DenialReason::StoreUnavailable)),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
