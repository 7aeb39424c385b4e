use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use quota_core::domain::{
    entities::saved_documents::{
        InsertSavedDocumentEntity, SavedDocumentEntity, SavedDocumentInsertion,
    },
    repositories::{
        entitlements::EntitlementRepository, saved_documents::SavedDocumentRepository,
    },
    value_objects::{calendar::QuotaCalendar, enums::plan_ids::PlanId, storage::SaveCapacity},
};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::usecases::{plan_resolver::effective_plan_for, reset_scheduler::ResetScheduler};

pub struct StorageLimitUseCase<E, S>
where
    E: EntitlementRepository + Send + Sync + 'static,
    S: SavedDocumentRepository + Send + Sync + 'static,
{
    reset_scheduler: ResetScheduler<E>,
    saved_document_repository: Arc<S>,
}

impl<E, S> StorageLimitUseCase<E, S>
where
    E: EntitlementRepository + Send + Sync + 'static,
    S: SavedDocumentRepository + Send + Sync + 'static,
{
    pub fn new(
        entitlement_repository: Arc<E>,
        saved_document_repository: Arc<S>,
        calendar: QuotaCalendar,
    ) -> Self {
        Self {
            reset_scheduler: ResetScheduler::new(entitlement_repository, calendar),
            saved_document_repository,
        }
    }

    pub async fn can_save(&self, user_id: Uuid) -> Result<SaveCapacity> {
        let now = Utc::now();
        let entitlement = self.reset_scheduler.load_current(user_id, now).await?;
        let plan = effective_plan_for(&entitlement, now);

        let current_count = self
            .saved_document_repository
            .count_active(user_id, now)
            .await?;

        Ok(SaveCapacity::new(current_count, plan.definition().max_saved_resumes))
    }

    pub async fn save(
        &self,
        user_id: Uuid,
        payload: serde_json::Value,
        template: String,
    ) -> Result<SavedDocumentInsertion> {
        self.save_at(user_id, payload, template, Utc::now()).await
    }

    /// Stores a document as the user's latest, evicting their oldest active one first
    /// when they are at the plan's cap.
    pub async fn save_at(
        &self,
        user_id: Uuid,
        payload: serde_json::Value,
        template: String,
        now: DateTime<Utc>,
    ) -> Result<SavedDocumentInsertion> {
        let entitlement = self.reset_scheduler.load_current(user_id, now).await?;
        let plan = effective_plan_for(&entitlement, now);
        let definition = plan.definition();

        let insert_saved_document_entity = InsertSavedDocumentEntity {
            user_id,
            payload,
            template,
            created_at: now,
            expires_at: Some(retention_expiry(plan, entitlement.expires_at, now)),
            is_latest: true,
        };

        let insertion = self
            .saved_document_repository
            .insert_with_eviction(insert_saved_document_entity, definition.max_saved_resumes, now)
            .await?;

        if let Some(evicted_id) = insertion.evicted_id {
            info!(
                %user_id,
                %plan,
                %evicted_id,
                max_saved = definition.max_saved_resumes,
                "storage_limits: evicted oldest document to make room"
            );
        }
        debug!(
            %user_id,
            document_id = %insertion.document.id,
            expires_at = ?insertion.document.expires_at,
            "storage_limits: document saved"
        );

        Ok(insertion)
    }

    pub async fn list(&self, user_id: Uuid) -> Result<Vec<SavedDocumentEntity>> {
        self.saved_document_repository
            .list_active(user_id, Utc::now())
            .await
    }

    pub async fn latest(&self, user_id: Uuid) -> Result<Option<SavedDocumentEntity>> {
        self.saved_document_repository
            .find_latest(user_id, Utc::now())
            .await
    }

    pub async fn delete(&self, user_id: Uuid, document_id: Uuid) -> Result<bool> {
        let deleted = self
            .saved_document_repository
            .delete_for_user(user_id, document_id)
            .await?;
        if deleted {
            info!(%user_id, %document_id, "storage_limits: document deleted by owner");
        }
        Ok(deleted)
    }
}

/// Retention runs from now, or from the end of an active day pass.
pub fn retention_expiry(
    plan: PlanId,
    pass_expires_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    let base = match (plan, pass_expires_at) {
        (PlanId::DayPass, Some(expires_at)) => expires_at.max(now),
        _ => now,
    };
    base + Duration::days(plan.definition().retention_days)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quota_core::domain::{
        entities::entitlements::EntitlementEntity,
        repositories::{
            entitlements::MockEntitlementRepository,
            saved_documents::MockSavedDocumentRepository,
        },
        value_objects::{enums::entitlement_statuses::EntitlementStatus, plans::EntitlementFeatures},
    };

    fn entitlement(user_id: Uuid, plan: PlanId, now: DateTime<Utc>) -> EntitlementEntity {
        EntitlementEntity {
            user_id,
            plan,
            status: EntitlementStatus::Active,
            free_weekly_credits_remaining: 10,
            free_monthly_credits_remaining: 0,
            credit_balance: 0,
            last_weekly_reset: Some(QuotaCalendar::default().week_start(now)),
            last_monthly_reset: None,
            expires_at: None,
            features: EntitlementFeatures::for_plan(plan),
            created_at: now - Duration::days(3),
            updated_at: now,
        }
    }

    fn entitlements_returning(row: EntitlementEntity) -> MockEntitlementRepository {
        let mut repository = MockEntitlementRepository::new();
        repository
            .expect_find_or_create()
            .returning(move |_| Ok(row.clone()));
        repository
    }

    fn document(user_id: Uuid, created_at: DateTime<Utc>, is_latest: bool) -> SavedDocumentEntity {
        SavedDocumentEntity {
            id: Uuid::new_v4(),
            user_id,
            payload: serde_json::json!({ "name": "Ada" }),
            template: "classic".to_string(),
            created_at,
            expires_at: Some(created_at + Duration::days(90)),
            is_latest,
        }
    }

    #[test]
    fn day_pass_retention_starts_at_pass_expiry() {
        let now = Utc::now();
        let pass_end = now + Duration::hours(20);
        assert_eq!(
            retention_expiry(PlanId::DayPass, Some(pass_end), now),
            pass_end + Duration::days(30)
        );
        assert_eq!(
            retention_expiry(PlanId::ProAnnual, Some(pass_end), now),
            now + Duration::days(365)
        );
        assert_eq!(retention_expiry(PlanId::Free, None, now), now + Duration::days(7));
    }

    #[tokio::test]
    async fn can_save_compares_active_count_with_plan_cap() {
        let user_id = Uuid::new_v4();
        let now = Utc::now();

        let mut documents = MockSavedDocumentRepository::new();
        documents.expect_count_active().returning(|_, _| Ok(5));

        let usecase = StorageLimitUseCase::new(
            Arc::new(entitlements_returning(entitlement(user_id, PlanId::ProMonthly, now))),
            Arc::new(documents),
            QuotaCalendar::default(),
        );

        let capacity = usecase.can_save(user_id).await.unwrap();
        assert_eq!(
            capacity,
            SaveCapacity {
                allowed: false,
                current_count: 5,
                max_allowed: 5,
            }
        );
    }

    #[tokio::test]
    async fn sixth_save_at_a_cap_of_five_evicts_the_oldest() {
        let user_id = Uuid::new_v4();
        let now = Utc::now();
        let oldest_id = Uuid::new_v4();
        let saved = document(user_id, now, true);
        let saved_id = saved.id;

        let mut documents = MockSavedDocumentRepository::new();
        documents
            .expect_insert_with_eviction()
            .withf(move |insert, max_saved, _| {
                insert.user_id == user_id
                    && insert.is_latest
                    && insert.template == "modern"
                    && insert.expires_at == Some(now + Duration::days(90))
                    && *max_saved == 5
            })
            .times(1)
            .returning(move |_, _, _| {
                Ok(SavedDocumentInsertion {
                    document: saved.clone(),
                    evicted_id: Some(oldest_id),
                })
            });

        let usecase = StorageLimitUseCase::new(
            Arc::new(entitlements_returning(entitlement(user_id, PlanId::ProMonthly, now))),
            Arc::new(documents),
            QuotaCalendar::default(),
        );

        let insertion = usecase
            .save_at(user_id, serde_json::json!({ "name": "Ada" }), "modern".to_string(), now)
            .await
            .unwrap();

        assert_eq!(insertion.evicted_id, Some(oldest_id));
        assert_eq!(insertion.document.id, saved_id);
        assert!(insertion.document.is_latest);
    }

    #[tokio::test]
    async fn lapsed_day_pass_saves_with_free_limits() {
        let user_id = Uuid::new_v4();
        let now = Utc::now();
        let mut row = entitlement(user_id, PlanId::DayPass, now);
        row.expires_at = Some(now - Duration::minutes(5));
        let reconciled = entitlement(user_id, PlanId::Free, now);

        let mut entitlements = MockEntitlementRepository::new();
        entitlements
            .expect_find_or_create()
            .returning(move |_| Ok(row.clone()));
        entitlements
            .expect_apply_refresh()
            .times(1)
            .returning(move |_, _| Ok(reconciled.clone()));

        let saved = document(user_id, now, true);
        let mut documents = MockSavedDocumentRepository::new();
        documents
            .expect_insert_with_eviction()
            .withf(move |insert, max_saved, _| {
                *max_saved == 1 && insert.expires_at == Some(now + Duration::days(7))
            })
            .times(1)
            .returning(move |_, _, _| {
                Ok(SavedDocumentInsertion {
                    document: saved.clone(),
                    evicted_id: None,
                })
            });

        let usecase = StorageLimitUseCase::new(
            Arc::new(entitlements),
            Arc::new(documents),
            QuotaCalendar::default(),
        );

        usecase
            .save_at(user_id, serde_json::json!({}), "classic".to_string(), now)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn delete_is_scoped_to_the_owner() {
        let user_id = Uuid::new_v4();
        let document_id = Uuid::new_v4();

        let mut documents = MockSavedDocumentRepository::new();
        documents
            .expect_delete_for_user()
            .with(
                mockall::predicate::eq(user_id),
                mockall::predicate::eq(document_id),
            )
            .times(1)
            .returning(|_, _| Ok(false));

        let usecase = StorageLimitUseCase::new(
            Arc::new(MockEntitlementRepository::new()),
            Arc::new(documents),
            QuotaCalendar::default(),
        );

        assert!(!usecase.delete(user_id, document_id).await.unwrap());
    }
}
