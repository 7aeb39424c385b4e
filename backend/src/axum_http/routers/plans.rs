use axum::{Json, Router, response::IntoResponse, routing::get};
use quota_core::domain::value_objects::plans::PlanDefinition;

pub fn routes() -> Router {
    Router::new().route("/", get(list_plans))
}

pub async fn list_plans() -> impl IntoResponse {
    Json(PlanDefinition::catalog())
}
