use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{
    enums::{entitlement_statuses::EntitlementStatus, plan_ids::PlanId},
    plans::{EntitlementFeatures, PlanDefinition},
};

/// Read-only view of a user's entitlement and window usage, for display.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UsageSummary {
    pub stored_plan: PlanId,
    pub effective_plan: PlanId,
    pub status: EntitlementStatus,
    pub weekly_credits_remaining: Option<i32>,
    pub weekly_credits_allowance: Option<i32>,
    pub next_weekly_reset: Option<DateTime<Utc>>,
    pub legacy_monthly_credits_remaining: i32,
    pub credit_balance: i32,
    pub generations_today: i64,
    pub generations_this_month: i64,
    pub downloads_this_month: i64,
    pub day_pass_expires_at: Option<DateTime<Utc>>,
    pub features: EntitlementFeatures,
    pub limits: PlanDefinition,
}
