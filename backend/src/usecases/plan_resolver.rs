use chrono::{DateTime, Utc};
use quota_core::domain::{
    entities::entitlements::EntitlementEntity, value_objects::enums::plan_ids::PlanId,
};

/// Plan in force at `now`. A day pass past its expiry, or one without an expiry at all,
/// counts as free. Every limit decision goes through this instead of the stored plan.
pub fn effective_plan(
    plan: PlanId,
    expires_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> PlanId {
    match (plan, expires_at) {
        (PlanId::DayPass, Some(expires_at)) if now <= expires_at => PlanId::DayPass,
        (PlanId::DayPass, _) => PlanId::Free,
        (other, _) => other,
    }
}

pub fn effective_plan_for(entitlement: &EntitlementEntity, now: DateTime<Utc>) -> PlanId {
    effective_plan(entitlement.plan, entitlement.expires_at, now)
}
