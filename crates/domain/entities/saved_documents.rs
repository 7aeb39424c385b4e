use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::infra::db::postgres::schema::saved_documents;

#[derive(Debug, Clone, PartialEq, Serialize, Identifiable, Selectable, Queryable)]
#[diesel(table_name = saved_documents)]
pub struct SavedDocumentEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub payload: serde_json::Value,
    pub template: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_latest: bool,
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = saved_documents)]
pub struct InsertSavedDocumentEntity {
    pub user_id: Uuid,
    pub payload: serde_json::Value,
    pub template: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_latest: bool,
}

/// A stored document together with the record evicted to make room for it, if any.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavedDocumentInsertion {
    pub document: SavedDocumentEntity,
    pub evicted_id: Option<Uuid>,
}
