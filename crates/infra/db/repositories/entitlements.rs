use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;
use tokio::task;
use uuid::Uuid;

use crate::{
    domain::{
        entities::entitlements::{EntitlementEntity, EntitlementRow, InsertEntitlementEntity},
        repositories::entitlements::EntitlementRepository,
        value_objects::{
            entitlement_refresh::EntitlementRefresh, enums::plan_ids::PlanId,
            plans::EntitlementFeatures,
        },
    },
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::entitlements},
};

pub struct EntitlementPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl EntitlementPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl EntitlementRepository for EntitlementPostgres {
    async fn find_or_create(&self, defaults: InsertEntitlementEntity) -> Result<EntitlementEntity> {
        // Diesel is synchronous; keep DB work on the blocking threadpool.
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<EntitlementEntity> {
            let mut conn = db_pool.get()?;
            let user_id = defaults.user_id;

            insert_into(entitlements::table)
                .values(&defaults)
                .on_conflict(entitlements::user_id)
                .do_nothing()
                .execute(&mut conn)?;

            let row = entitlements::table
                .find(user_id)
                .select(EntitlementRow::as_select())
                .first::<EntitlementRow>(&mut conn)?;

            EntitlementEntity::try_from(row)
        })
        .await??)
    }

    async fn apply_refresh(
        &self,
        user_id: Uuid,
        refresh: EntitlementRefresh,
    ) -> Result<EntitlementEntity> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<EntitlementEntity> {
            let mut conn = db_pool.get()?;
            let free_features = EntitlementFeatures::for_plan(PlanId::Free).to_json();

            let row = conn.transaction::<EntitlementRow, diesel::result::Error, _>(|conn| {
                if refresh.reconcile_day_pass {
                    // Guarded by the same expiry predicate the resolver uses, so a pass
                    // renewed concurrently by billing is left alone.
                    update(
                        entitlements::table
                            .filter(entitlements::user_id.eq(user_id))
                            .filter(entitlements::plan.eq(PlanId::DayPass.to_string()))
                            .filter(
                                entitlements::expires_at
                                    .is_null()
                                    .or(entitlements::expires_at.lt(refresh.now)),
                            ),
                    )
                    .set((
                        entitlements::plan.eq(PlanId::Free.to_string()),
                        entitlements::free_weekly_credits_remaining.eq(refresh.weekly_allowance),
                        entitlements::last_weekly_reset.eq(Some(refresh.window_start)),
                        entitlements::expires_at.eq(None::<DateTime<Utc>>),
                        entitlements::features.eq(free_features),
                        entitlements::updated_at.eq(refresh.now),
                    ))
                    .execute(conn)?;
                }

                if refresh.weekly_reset {
                    update(
                        entitlements::table
                            .filter(entitlements::user_id.eq(user_id))
                            .filter(entitlements::plan.eq(PlanId::Free.to_string()))
                            .filter(
                                entitlements::last_weekly_reset
                                    .is_null()
                                    .or(entitlements::last_weekly_reset.lt(refresh.window_start)),
                            ),
                    )
                    .set((
                        entitlements::free_weekly_credits_remaining.eq(refresh.weekly_allowance),
                        entitlements::last_weekly_reset.eq(Some(refresh.window_start)),
                        entitlements::updated_at.eq(refresh.now),
                    ))
                    .execute(conn)?;
                }

                entitlements::table
                    .find(user_id)
                    .select(EntitlementRow::as_select())
                    .first::<EntitlementRow>(conn)
            })?;

            EntitlementEntity::try_from(row)
        })
        .await??)
    }

    async fn decrement_weekly_credit(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<i32>> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<Option<i32>> {
            let mut conn = db_pool.get()?;

            let remaining = update(
                entitlements::table
                    .filter(entitlements::user_id.eq(user_id))
                    .filter(entitlements::free_weekly_credits_remaining.gt(0)),
            )
            .set((
                entitlements::free_weekly_credits_remaining
                    .eq(entitlements::free_weekly_credits_remaining - 1),
                entitlements::updated_at.eq(now),
            ))
            .returning(entitlements::free_weekly_credits_remaining)
            .get_result::<i32>(&mut conn)
            .optional()?;

            Ok(remaining)
        })
        .await??)
    }

    async fn reconcile_expired_day_passes(
        &self,
        now: DateTime<Utc>,
        window_start: DateTime<Utc>,
        weekly_allowance: i32,
    ) -> Result<usize> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<usize> {
            let mut conn = db_pool.get()?;
            let free_features = EntitlementFeatures::for_plan(PlanId::Free).to_json();

            let reconciled = update(
                entitlements::table
                    .filter(entitlements::plan.eq(PlanId::DayPass.to_string()))
                    .filter(
                        entitlements::expires_at
                            .is_null()
                            .or(entitlements::expires_at.lt(now)),
                    ),
            )
            .set((
                entitlements::plan.eq(PlanId::Free.to_string()),
                entitlements::free_weekly_credits_remaining.eq(weekly_allowance),
                entitlements::last_weekly_reset.eq(Some(window_start)),
                entitlements::expires_at.eq(None::<DateTime<Utc>>),
                entitlements::features.eq(free_features),
                entitlements::updated_at.eq(now),
            ))
            .execute(&mut conn)?;

            Ok(reconciled)
        })
        .await??)
    }
}
