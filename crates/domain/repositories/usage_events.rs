use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::{
    entities::usage_events::InsertUsageEventEntity,
    value_objects::{
        enums::usage_routes::UsageRoute,
        quota::{ReleasedReservation, UsageCap, UsageReservation},
    },
};

#[automock]
#[async_trait]
pub trait UsageEventRepository {
    async fn record(&self, insert_usage_event_entity: InsertUsageEventEntity) -> Result<Uuid>;

    async fn count_since(
        &self,
        user_id: Uuid,
        routes: Vec<UsageRoute>,
        since: DateTime<Utc>,
    ) -> Result<i64>;

    /// Free tier: decrement-if-positive on the weekly counter and append a charged event,
    /// in one transaction.
    async fn reserve_weekly_credit(
        &self,
        user_id: Uuid,
        route: UsageRoute,
        weekly_allowance: i32,
        now: DateTime<Utc>,
    ) -> Result<UsageReservation>;

    /// Counted tiers: under a lock on the user's entitlement row, re-count every cap and
    /// append the event only if all are below their limit.
    async fn reserve_counted(
        &self,
        user_id: Uuid,
        route: UsageRoute,
        caps: Vec<UsageCap>,
        now: DateTime<Utc>,
    ) -> Result<UsageReservation>;

    /// Deletes a reserved event created at or after `not_before`, refunding its weekly
    /// credit if it was charged. `None` when no such event exists.
    async fn release(
        &self,
        user_id: Uuid,
        event_id: Uuid,
        not_before: DateTime<Utc>,
        weekly_allowance: i32,
    ) -> Result<Option<ReleasedReservation>>;
}
