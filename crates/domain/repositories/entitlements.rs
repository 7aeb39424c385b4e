use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::{
    entities::entitlements::{EntitlementEntity, InsertEntitlementEntity},
    value_objects::entitlement_refresh::EntitlementRefresh,
};

#[automock]
#[async_trait]
pub trait EntitlementRepository {
    /// Returns the user's entitlement, inserting `defaults` first if the user has none.
    async fn find_or_create(&self, defaults: InsertEntitlementEntity) -> Result<EntitlementEntity>;

    /// Applies the rollover in one transaction and returns the row as committed.
    async fn apply_refresh(
        &self,
        user_id: Uuid,
        refresh: EntitlementRefresh,
    ) -> Result<EntitlementEntity>;

    /// Decrements the weekly counter only if it is positive. `None` when it was already zero.
    async fn decrement_weekly_credit(&self, user_id: Uuid, now: DateTime<Utc>)
    -> Result<Option<i32>>;

    /// Reverts lapsed day passes in bulk. Returns the number of rows reconciled.
    async fn reconcile_expired_day_passes(
        &self,
        now: DateTime<Utc>,
        window_start: DateTime<Utc>,
        weekly_allowance: i32,
    ) -> Result<usize>;
}
