use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::usage_events;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = usage_events)]
pub struct UsageEventEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub route: String,
    pub charged_credit: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = usage_events)]
pub struct InsertUsageEventEntity {
    pub user_id: Uuid,
    pub route: String,
    /// Set when the event reserved a free weekly credit, so releasing it refunds exactly once.
    pub charged_credit: bool,
    pub created_at: DateTime<Utc>,
}
