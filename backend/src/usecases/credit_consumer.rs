use anyhow::Result;
use chrono::{DateTime, Utc};
use quota_core::domain::{
    repositories::entitlements::EntitlementRepository,
    value_objects::{
        calendar::QuotaCalendar,
        enums::{plan_ids::PlanId, quota_actions::QuotaAction},
    },
};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::usecases::{plan_resolver::effective_plan_for, reset_scheduler::ResetScheduler};

/// Charges the free tier's weekly counter once a gated action has succeeded.
pub struct CreditConsumer<E>
where
    E: EntitlementRepository + Send + Sync + 'static,
{
    entitlement_repository: Arc<E>,
    reset_scheduler: ResetScheduler<E>,
}

impl<E> CreditConsumer<E>
where
    E: EntitlementRepository + Send + Sync + 'static,
{
    pub fn new(entitlement_repository: Arc<E>, calendar: QuotaCalendar) -> Self {
        Self {
            reset_scheduler: ResetScheduler::new(Arc::clone(&entitlement_repository), calendar),
            entitlement_repository,
        }
    }

    pub async fn consume(&self, user_id: Uuid, action: QuotaAction) -> Result<bool> {
        self.consume_at(user_id, action, Utc::now()).await
    }

    /// `false` when the free counter was already zero. Other plans are limited by the
    /// ledger and always succeed without a write.
    pub async fn consume_at(
        &self,
        user_id: Uuid,
        action: QuotaAction,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let entitlement = self.reset_scheduler.load_current(user_id, now).await?;
        let plan = effective_plan_for(&entitlement, now);

        if plan != PlanId::Free {
            debug!(%user_id, %plan, %action, "credit_consumer: nothing to charge");
            return Ok(true);
        }

        match self
            .entitlement_repository
            .decrement_weekly_credit(user_id, now)
            .await?
        {
            Some(remaining) => {
                info!(%user_id, %action, remaining, "credit_consumer: weekly credit consumed");
                Ok(true)
            }
            None => {
                warn!(%user_id, %action, "credit_consumer: no weekly credits left to consume");
                Ok(false)
            }
        }
    }
}
