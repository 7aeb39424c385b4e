use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{RunQueryDsl, delete, insert_into, prelude::*, update};
use std::sync::Arc;
use tokio::task;
use uuid::Uuid;

use crate::{
    domain::{
        entities::saved_documents::{
            InsertSavedDocumentEntity, SavedDocumentEntity, SavedDocumentInsertion,
        },
        repositories::saved_documents::SavedDocumentRepository,
        value_objects::storage::eviction_candidate,
    },
    infra::db::postgres::{
        postgres_connection::PgPoolSquad,
        schema::{entitlements, saved_documents},
    },
};

pub struct SavedDocumentPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl SavedDocumentPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl SavedDocumentRepository for SavedDocumentPostgres {
    async fn count_active(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<i64> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<i64> {
            let mut conn = db_pool.get()?;

            let count = saved_documents::table
                .filter(saved_documents::user_id.eq(user_id))
                .filter(
                    saved_documents::expires_at
                        .is_null()
                        .or(saved_documents::expires_at.gt(now)),
                )
                .count()
                .get_result::<i64>(&mut conn)?;

            Ok(count)
        })
        .await??)
    }

    async fn insert_with_eviction(
        &self,
        insert_saved_document_entity: InsertSavedDocumentEntity,
        max_saved: i64,
        now: DateTime<Utc>,
    ) -> Result<SavedDocumentInsertion> {
        let db_pool = Arc::clone(&self.db_pool);
        let user_id = insert_saved_document_entity.user_id;

        Ok(task::spawn_blocking(move || -> Result<SavedDocumentInsertion> {
            let mut conn = db_pool.get()?;

            let insertion = conn.transaction::<SavedDocumentInsertion, diesel::result::Error, _>(
                |conn| {
                    // Serialise saves per user on the entitlement row.
                    entitlements::table
                        .find(user_id)
                        .select(entitlements::user_id)
                        .for_update()
                        .first::<Uuid>(conn)
                        .optional()?;

                    let active = saved_documents::table
                        .filter(saved_documents::user_id.eq(user_id))
                        .filter(
                            saved_documents::expires_at
                                .is_null()
                                .or(saved_documents::expires_at.gt(now)),
                        )
                        .select((saved_documents::id, saved_documents::created_at))
                        .load::<(Uuid, DateTime<Utc>)>(conn)?;

                    let evicted_id = eviction_candidate(&active, max_saved);
                    if let Some(oldest_id) = evicted_id {
                        delete(saved_documents::table.find(oldest_id)).execute(conn)?;
                    }

                    update(
                        saved_documents::table
                            .filter(saved_documents::user_id.eq(user_id))
                            .filter(saved_documents::is_latest.eq(true)),
                    )
                    .set(saved_documents::is_latest.eq(false))
                    .execute(conn)?;

                    let document = insert_into(saved_documents::table)
                        .values(&insert_saved_document_entity)
                        .returning(SavedDocumentEntity::as_select())
                        .get_result::<SavedDocumentEntity>(conn)?;

                    Ok(SavedDocumentInsertion {
                        document,
                        evicted_id,
                    })
                },
            )?;

            Ok(insertion)
        })
        .await??)
    }

    async fn list_active(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<SavedDocumentEntity>> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<Vec<SavedDocumentEntity>> {
            let mut conn = db_pool.get()?;

            let documents = saved_documents::table
                .filter(saved_documents::user_id.eq(user_id))
                .filter(
                    saved_documents::expires_at
                        .is_null()
                        .or(saved_documents::expires_at.gt(now)),
                )
                .order(saved_documents::created_at.desc())
                .select(SavedDocumentEntity::as_select())
                .load::<SavedDocumentEntity>(&mut conn)?;

            Ok(documents)
        })
        .await??)
    }

    async fn find_latest(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<SavedDocumentEntity>> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<Option<SavedDocumentEntity>> {
            let mut conn = db_pool.get()?;

            let document = saved_documents::table
                .filter(saved_documents::user_id.eq(user_id))
                .filter(saved_documents::is_latest.eq(true))
                .filter(
                    saved_documents::expires_at
                        .is_null()
                        .or(saved_documents::expires_at.gt(now)),
                )
                .select(SavedDocumentEntity::as_select())
                .first::<SavedDocumentEntity>(&mut conn)
                .optional()?;

            Ok(document)
        })
        .await??)
    }

    async fn delete_for_user(&self, user_id: Uuid, document_id: Uuid) -> Result<bool> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<bool> {
            let mut conn = db_pool.get()?;

            let deleted = delete(
                saved_documents::table
                    .filter(saved_documents::id.eq(document_id))
                    .filter(saved_documents::user_id.eq(user_id)),
            )
            .execute(&mut conn)?;

            Ok(deleted > 0)
        })
        .await??)
    }

    async fn delete_expired(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<Uuid>> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<Vec<Uuid>> {
            let mut conn = db_pool.get()?;

            let deleted_ids = conn.transaction::<Vec<Uuid>, diesel::result::Error, _>(|conn| {
                let expired_ids = saved_documents::table
                    .filter(saved_documents::expires_at.lt(now))
                    .order(saved_documents::expires_at.asc())
                    .limit(limit)
                    .select(saved_documents::id)
                    .for_update()
                    .skip_locked()
                    .load::<Uuid>(conn)?;

                if expired_ids.is_empty() {
                    return Ok(Vec::new());
                }

                delete(saved_documents::table.filter(saved_documents::id.eq_any(&expired_ids)))
                    .returning(saved_documents::id)
                    .get_results::<Uuid>(conn)
            })?;

            Ok(deleted_ids)
        })
        .await??)
    }
}
