use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::{
    domain::value_objects::enums::trial_kinds::TrialKind,
    infra::db::postgres::schema::trial_usages,
};

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = trial_usages, primary_key(ip_address))]
pub struct TrialUsageEntity {
    pub ip_address: String,
    pub parses_used: i32,
    pub generations_used: i32,
    pub downloads_used: i32,
    pub updated_at: DateTime<Utc>,
}

impl TrialUsageEntity {
    pub fn used(&self, kind: TrialKind) -> i32 {
        match kind {
            TrialKind::Parse => self.parses_used,
            TrialKind::Generation => self.generations_used,
            TrialKind::Download => self.downloads_used,
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = trial_usages)]
pub struct InsertTrialUsageEntity {
    pub ip_address: String,
    pub parses_used: i32,
    pub generations_used: i32,
    pub downloads_used: i32,
    pub updated_at: DateTime<Utc>,
}

impl InsertTrialUsageEntity {
    pub fn empty(ip_address: &str, now: DateTime<Utc>) -> Self {
        Self {
            ip_address: ip_address.to_string(),
            parses_used: 0,
            generations_used: 0,
            downloads_used: 0,
            updated_at: now,
        }
    }
}
