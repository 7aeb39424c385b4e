use anyhow::Result;
use chrono::{DateTime, Utc};
use quota_core::domain::{
    repositories::{
        entitlements::EntitlementRepository, saved_documents::SavedDocumentRepository,
    },
    value_objects::{calendar::QuotaCalendar, enums::plan_ids::PlanId},
};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

/// Ids echoed back in a sweep result are capped to keep responses small.
const MAX_REPORTED_IDS: usize = 20;

#[derive(Debug, Clone, Default)]
pub struct CleanupExpiredDocumentsParams {
    pub limit: Option<i64>,
    pub skip_day_pass_reconcile: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupExpiredDocumentsResult {
    pub deleted: usize,
    pub deleted_ids: Vec<Uuid>,
    pub reconciled_day_passes: usize,
    pub reconcile_failed: bool,
}

/// Storage hygiene. Request-path reads already ignore expired documents and lapsed
/// passes, so this only reclaims rows and keeps stored plans tidy.
pub struct CleanupExpiredDocumentsUseCase {
    saved_document_repository: Arc<dyn SavedDocumentRepository + Send + Sync>,
    entitlement_repository: Arc<dyn EntitlementRepository + Send + Sync>,
    calendar: QuotaCalendar,
    default_limit: i64,
}

impl CleanupExpiredDocumentsUseCase {
    pub fn new(
        saved_document_repository: Arc<dyn SavedDocumentRepository + Send + Sync>,
        entitlement_repository: Arc<dyn EntitlementRepository + Send + Sync>,
        calendar: QuotaCalendar,
        default_limit: i64,
    ) -> Self {
        Self {
            saved_document_repository,
            entitlement_repository,
            calendar,
            default_limit,
        }
    }

    pub async fn run(
        &self,
        params: CleanupExpiredDocumentsParams,
    ) -> Result<CleanupExpiredDocumentsResult> {
        self.run_at(params, Utc::now()).await
    }

    pub async fn run_at(
        &self,
        params: CleanupExpiredDocumentsParams,
        now: DateTime<Utc>,
    ) -> Result<CleanupExpiredDocumentsResult> {
        let limit = params
            .limit
            .filter(|l| *l > 0)
            .unwrap_or(self.default_limit);

        let deleted_ids = self
            .saved_document_repository
            .delete_expired(now, limit)
            .await?;

        let mut result = CleanupExpiredDocumentsResult {
            deleted: deleted_ids.len(),
            deleted_ids: deleted_ids.into_iter().take(MAX_REPORTED_IDS).collect(),
            ..Default::default()
        };

        if !params.skip_day_pass_reconcile {
            let allowance = PlanId::Free.definition().weekly_credits_or_default();
            match self
                .entitlement_repository
                .reconcile_expired_day_passes(now, self.calendar.week_start(now), allowance)
                .await
            {
                Ok(reconciled) => result.reconciled_day_passes = reconciled,
                Err(err) => {
                    // Reads reconcile lazily anyway; report and keep the sweep result.
                    error!(db_error = ?err, "cleanup_documents: day pass reconcile failed");
                    result.reconcile_failed = true;
                }
            }
        }

        info!(
            deleted = result.deleted,
            limit,
            reconciled_day_passes = result.reconciled_day_passes,
            reconcile_failed = result.reconcile_failed,
            "cleanup_documents: completed"
        );

        Ok(result)
    }
}
