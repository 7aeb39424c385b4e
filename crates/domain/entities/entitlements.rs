use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    domain::value_objects::{
        enums::{entitlement_statuses::EntitlementStatus, plan_ids::PlanId},
        plans::EntitlementFeatures,
    },
    infra::db::postgres::schema::entitlements,
};

/// Per-user plan and credit state. `plan` is the stored tier; the tier in force
/// is derived from it together with `expires_at` and the current time.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitlementEntity {
    pub user_id: Uuid,
    pub plan: PlanId,
    pub status: EntitlementStatus,
    pub free_weekly_credits_remaining: i32,
    pub free_monthly_credits_remaining: i32,
    pub credit_balance: i32,
    pub last_weekly_reset: Option<DateTime<Utc>>,
    pub last_monthly_reset: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub features: EntitlementFeatures,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw row used for Diesel queries. Plan and status stay as text until validated.
#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = entitlements, primary_key(user_id))]
pub struct EntitlementRow {
    pub user_id: Uuid,
    pub plan: String,
    pub status: String,
    pub free_weekly_credits_remaining: i32,
    pub free_monthly_credits_remaining: i32,
    pub credit_balance: i32,
    pub last_weekly_reset: Option<DateTime<Utc>>,
    pub last_monthly_reset: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub features: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<EntitlementRow> for EntitlementEntity {
    type Error = anyhow::Error;

    fn try_from(value: EntitlementRow) -> Result<Self> {
        let plan = PlanId::try_from(value.plan.as_str())
            .with_context(|| format!("entitlement for user {} has invalid plan", value.user_id))?;
        let features = serde_json::from_value(value.features).unwrap_or_default();

        Ok(Self {
            user_id: value.user_id,
            plan,
            status: EntitlementStatus::from_str(&value.status),
            free_weekly_credits_remaining: value.free_weekly_credits_remaining,
            free_monthly_credits_remaining: value.free_monthly_credits_remaining,
            credit_balance: value.credit_balance,
            last_weekly_reset: value.last_weekly_reset,
            last_monthly_reset: value.last_monthly_reset,
            expires_at: value.expires_at,
            features,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = entitlements)]
pub struct InsertEntitlementEntity {
    pub user_id: Uuid,
    pub plan: String,
    pub status: String,
    pub free_weekly_credits_remaining: i32,
    pub free_monthly_credits_remaining: i32,
    pub credit_balance: i32,
    pub last_weekly_reset: Option<DateTime<Utc>>,
    pub last_monthly_reset: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub features: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InsertEntitlementEntity {
    /// Default row for a user seen for the first time: free tier with a full weekly allowance
    /// that counts as already reset for the current window.
    pub fn free_for_new_user(
        user_id: Uuid,
        now: DateTime<Utc>,
        week_start: DateTime<Utc>,
    ) -> Self {
        let definition = PlanId::Free.definition();
        Self {
            user_id,
            plan: PlanId::Free.to_string(),
            status: EntitlementStatus::Active.to_string(),
            free_weekly_credits_remaining: definition.weekly_credits_or_default(),
            free_monthly_credits_remaining: 0,
            credit_balance: 0,
            last_weekly_reset: Some(week_start),
            last_monthly_reset: None,
            expires_at: None,
            features: EntitlementFeatures::for_plan(PlanId::Free).to_json(),
            created_at: now,
            updated_at: now,
        }
    }
}
