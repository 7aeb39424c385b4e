use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;
use tokio::task;

use crate::{
    domain::{
        entities::trial_usages::{InsertTrialUsageEntity, TrialUsageEntity},
        repositories::trial_usages::TrialUsageRepository,
        value_objects::enums::trial_kinds::TrialKind,
    },
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::trial_usages},
};

pub struct TrialUsagePostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl TrialUsagePostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl TrialUsageRepository for TrialUsagePostgres {
    async fn find_by_ip(&self, ip_address: &str) -> Result<Option<TrialUsageEntity>> {
        let db_pool = Arc::clone(&self.db_pool);
        let ip_address = ip_address.to_string();

        Ok(task::spawn_blocking(move || -> Result<Option<TrialUsageEntity>> {
            let mut conn = db_pool.get()?;

            let usage = trial_usages::table
                .find(ip_address)
                .select(TrialUsageEntity::as_select())
                .first::<TrialUsageEntity>(&mut conn)
                .optional()?;

            Ok(usage)
        })
        .await??)
    }

    async fn increment(
        &self,
        ip_address: &str,
        kind: TrialKind,
        limit: i32,
        now: DateTime<Utc>,
    ) -> Result<Option<TrialUsageEntity>> {
        let db_pool = Arc::clone(&self.db_pool);
        let ip_address = ip_address.to_string();

        Ok(task::spawn_blocking(move || -> Result<Option<TrialUsageEntity>> {
            let mut conn = db_pool.get()?;

            let usage = conn.transaction::<Option<TrialUsageEntity>, diesel::result::Error, _>(
                |conn| {
                    insert_into(trial_usages::table)
                        .values(&InsertTrialUsageEntity::empty(&ip_address, now))
                        .on_conflict(trial_usages::ip_address)
                        .do_nothing()
                        .execute(conn)?;

                    let target =
                        trial_usages::table.filter(trial_usages::ip_address.eq(&ip_address));

                    // Increment only while below the limit, so counters never pass it.
                    match kind {
                        TrialKind::Parse => {
                            update(target.filter(trial_usages::parses_used.lt(limit)))
                                .set((
                                    trial_usages::parses_used.eq(trial_usages::parses_used + 1),
                                    trial_usages::updated_at.eq(now),
                                ))
                                .returning(TrialUsageEntity::as_select())
                                .get_result::<TrialUsageEntity>(conn)
                                .optional()
                        }
                        TrialKind::Generation => {
                            update(target.filter(trial_usages::generations_used.lt(limit)))
                                .set((
                                    trial_usages::generations_used
                                        .eq(trial_usages::generations_used + 1),
                                    trial_usages::updated_at.eq(now),
                                ))
                                .returning(TrialUsageEntity::as_select())
                                .get_result::<TrialUsageEntity>(conn)
                                .optional()
                        }
                        TrialKind::Download => {
                            update(target.filter(trial_usages::downloads_used.lt(limit)))
                                .set((
                                    trial_usages::downloads_used
                                        .eq(trial_usages::downloads_used + 1),
                                    trial_usages::updated_at.eq(now),
                                ))
                                .returning(TrialUsageEntity::as_select())
                                .get_result::<TrialUsageEntity>(conn)
                                .optional()
                        }
                    }
                },
            )?;

            Ok(usage)
        })
        .await??)
    }
}
