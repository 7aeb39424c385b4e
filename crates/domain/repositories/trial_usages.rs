use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;

use crate::domain::{
    entities::trial_usages::TrialUsageEntity, value_objects::enums::trial_kinds::TrialKind,
};

#[automock]
#[async_trait]
pub trait TrialUsageRepository {
    async fn find_by_ip(&self, ip_address: &str) -> Result<Option<TrialUsageEntity>>;

    /// Upserts the row for `ip_address` and increments the counter for `kind` if it is
    /// still below `limit`. `None` when the counter was already at the limit.
    async fn increment(
        &self,
        ip_address: &str,
        kind: TrialKind,
        limit: i32,
        now: DateTime<Utc>,
    ) -> Result<Option<TrialUsageEntity>>;
}
