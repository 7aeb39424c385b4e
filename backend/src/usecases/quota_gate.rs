use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use quota_core::domain::{
    repositories::{entitlements::EntitlementRepository, usage_events::UsageEventRepository},
    value_objects::{
        calendar::QuotaCalendar,
        enums::{plan_ids::PlanId, quota_actions::QuotaAction},
        quota::{QuotaDecision, QuotaError, QuotaWindow, ReleasedReservation, UsageReservation},
    },
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::usecases::{
    plan_resolver::effective_plan_for,
    quota_checker::{format_denial, usage_caps},
    reset_scheduler::ResetScheduler,
};

/// How long after admission a reservation can still be released.
pub const RELEASE_WINDOW_MINUTES: i64 = 15;

/// Result of an admission attempt. `event_id` identifies the reservation and is present
/// only when the action was admitted.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct QuotaAdmission {
    #[serde(flatten)]
    pub decision: QuotaDecision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<Uuid>,
}

impl QuotaAdmission {
    fn denied(decision: QuotaDecision) -> Self {
        Self {
            decision,
            event_id: None,
        }
    }
}

/// Check-and-charge in one storage transaction, so two concurrent requests cannot both
/// spend the last unit of quota. A failed action hands its reservation back through
/// `release`.
pub struct QuotaGate<E, U>
where
    E: EntitlementRepository + Send + Sync + 'static,
    U: UsageEventRepository + Send + Sync + 'static,
{
    reset_scheduler: ResetScheduler<E>,
    usage_event_repository: Arc<U>,
}

impl<E, U> QuotaGate<E, U>
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

    pub async fn acquire(&self, user_id: Option<Uuid>, action: QuotaAction) -> QuotaAdmission {
        self.acquire_at(user_id, action, Utc::now()).await
    }

    pub async fn acquire_at(
        &self,
        user_id: Option<Uuid>,
        action: QuotaAction,
        now: DateTime<Utc>,
    ) -> QuotaAdmission {
        let Some(user_id) = user_id else {
            return QuotaAdmission::denied(QuotaDecision::deny(
                None,
                &QuotaError::AuthenticationRequired,
            ));
        };

        match self.reserve(user_id, action, now).await {
            Ok(admission) => admission,
            Err(err) => {
                error!(
                    %user_id,
                    %action,
                    db_error = ?err,
                    "quota_gate: reservation failed; denying"
                );
                QuotaAdmission::denied(QuotaDecision::deny(
                    None,
                    &QuotaError::StoreUnavailable(err),
                ))
            }
        }
    }

    async fn reserve(
        &self,
        user_id: Uuid,
        action: QuotaAction,
        now: DateTime<Utc>,
    ) -> Result<QuotaAdmission> {
        let entitlement = self.reset_scheduler.load_current(user_id, now).await?;
        let plan = effective_plan_for(&entitlement, now);

        if let Some(error) = format_denial(plan, action) {
            return Ok(QuotaAdmission::denied(QuotaDecision::deny(Some(plan), &error)));
        }

        let route = action.usage_route();
        let (reservation, limit, window) = if plan == PlanId::Free {
            let allowance = plan.definition().weekly_credits_or_default();
            let reservation = self
                .usage_event_repository
                .reserve_weekly_credit(user_id, route, allowance, now)
                .await?;
            (
                reservation,
                Some(i64::from(allowance)),
                Some(QuotaWindow::WeeklyCredits),
            )
        } else {
            let caps = usage_caps(self.reset_scheduler.calendar(), plan, action, now);
            let reservation = self
                .usage_event_repository
                .reserve_counted(user_id, route, caps, now)
                .await?;
            (reservation, None, None)
        };

        match reservation {
            UsageReservation::Reserved {
                event_id,
                remaining,
            } => {
                info!(
                    %user_id,
                    %plan,
                    %action,
                    %event_id,
                    remaining = ?remaining,
                    "quota_gate: action admitted"
                );
                Ok(QuotaAdmission {
                    decision: QuotaDecision::allow(plan, remaining, limit, window),
                    event_id: Some(event_id),
                })
            }
            UsageReservation::Exhausted {
                window,
                used,
                limit,
            } => {
                info!(
                    %user_id,
                    %plan,
                    %action,
                    window = ?window,
                    used,
                    limit,
                    "quota_gate: action denied"
                );
                Ok(QuotaAdmission::denied(QuotaDecision::deny(
                    Some(plan),
                    &QuotaError::QuotaExhausted {
                        window,
                        used,
                        limit,
                    },
                )))
            }
        }
    }

    /// Hands back a reservation whose action failed. Each reservation can be released
    /// once, and only within `RELEASE_WINDOW_MINUTES` of admission.
    pub async fn release(
        &self,
        user_id: Uuid,
        event_id: Uuid,
    ) -> Result<Option<ReleasedReservation>> {
        let not_before = Utc::now() - Duration::minutes(RELEASE_WINDOW_MINUTES);
        let allowance = PlanId::Free.definition().weekly_credits_or_default();

        let released = self
            .usage_event_repository
            .release(user_id, event_id, not_before, allowance)
            .await?;

        match &released {
            Some(released) => info!(
                %user_id,
                %event_id,
                refunded_credit = released.refunded_credit,
                "quota_gate: reservation released"
            ),
            None => warn!(
                %user_id,
                %event_id,
                "quota_gate: no releasable reservation found"
            ),
        }

        Ok(released)
    }
}
