use anyhow::Result;
use chrono::{DateTime, Utc};
use quota_core::domain::{
    repositories::{entitlements::EntitlementRepository, usage_events::UsageEventRepository},
    value_objects::{
        calendar::QuotaCalendar,
        enums::{plan_ids::PlanId, usage_routes::UsageRoute},
        usage_summary::UsageSummary,
    },
};
use std::sync::Arc;

use crate::usecases::{plan_resolver::effective_plan_for, reset_scheduler::ResetScheduler};

pub struct UsageSummaryUseCase<E, U>
where
    E: EntitlementRepository + Send + Sync + 'static,
    U: UsageEventRepository + Send + Sync + 'static,
{
    reset_scheduler: ResetScheduler<E>,
    usage_event_repository: Arc<U>,
}

impl<E, U> UsageSummaryUseCase<E, U>
where
    E: EntitlementRepository + Send + Sync + 'static,
    U: UsageEventRepository + Send + Sync + 'static,
{
    pub fn new(
        entitlement_repository: Arc<E>,
        usage_event_repository: Arc<U>,
        calendar: QuotaCalendar,
    ) -> Self {
        Self {
            reset_scheduler: ResetScheduler::new(entitlement_repository, calendar),
            usage_event_repository,
        }
    }

    pub async fn summary(&self, user_id: uuid::Uuid) -> Result<UsageSummary> {
        self.summary_at(user_id, Utc::now()).await
    }

    pub async fn summary_at(
        &self,
        user_id: uuid::Uuid,
        now: DateTime<Utc>,
    ) -> Result<UsageSummary> {
        let entitlement = self.reset_scheduler.load_current(user_id, now).await?;
        let plan = effective_plan_for(&entitlement, now);
        let calendar = self.reset_scheduler.calendar();
        let month_start = calendar.month_start(now);

        let generations_today = self
            .usage_event_repository
            .count_since(user_id, vec![UsageRoute::Generation], calendar.day_start(now))
            .await?;
        let generations_this_month = self
            .usage_event_repository
            .count_since(user_id, vec![UsageRoute::Generation], month_start)
            .await?;
        let downloads_this_month = self
            .usage_event_repository
            .count_since(user_id, UsageRoute::DOWNLOADS.to_vec(), month_start)
            .await?;

        let on_free = plan == PlanId::Free;
        let definition = plan.definition();

        Ok(UsageSummary {
            stored_plan: entitlement.plan,
            effective_plan: plan,
            status: entitlement.status,
            weekly_credits_remaining: on_free.then_some(entitlement.free_weekly_credits_remaining),
            weekly_credits_allowance: definition.weekly_credits,
            next_weekly_reset: on_free.then(|| calendar.next_week_start(now)),
            legacy_monthly_credits_remaining: entitlement.free_monthly_credits_remaining,
            credit_balance: entitlement.credit_balance,
            generations_today,
            generations_this_month,
            downloads_this_month,
            day_pass_expires_at: (plan == PlanId::DayPass)
                .then_some(entitlement.expires_at)
                .flatten(),
            features: entitlement.features,
            limits: definition.clone(),
        })
    }
}
