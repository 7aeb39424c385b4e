use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::saved_documents::{
    InsertSavedDocumentEntity, SavedDocumentEntity, SavedDocumentInsertion,
};

#[automock]
#[async_trait]
pub trait SavedDocumentRepository {
    async fn count_active(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<i64>;

    /// Evicts the oldest active document when the user holds `max_saved` or more, clears
    /// the previous latest flag and inserts the new document, all in one transaction.
    async fn insert_with_eviction(
        &self,
        insert_saved_document_entity: InsertSavedDocumentEntity,
        max_saved: i64,
        now: DateTime<Utc>,
    ) -> Result<SavedDocumentInsertion>;

    async fn list_active(&self, user_id: Uuid, now: DateTime<Utc>)
    -> Result<Vec<SavedDocumentEntity>>;

    async fn find_latest(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<SavedDocumentEntity>>;

    async fn delete_for_user(&self, user_id: Uuid, document_id: Uuid) -> Result<bool>;

    /// Deletes up to `limit` documents whose `expires_at` has passed. Returns their ids.
    async fn delete_expired(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<Uuid>>;
}
