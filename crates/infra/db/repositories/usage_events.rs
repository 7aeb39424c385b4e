use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{RunQueryDsl, delete, insert_into, prelude::*, update};
use std::sync::Arc;
use tokio::task;
use uuid::Uuid;

use crate::{
    domain::{
        entities::usage_events::InsertUsageEventEntity,
        repositories::usage_events::UsageEventRepository,
        value_objects::{
            enums::usage_routes::UsageRoute,
            quota::{
                QuotaWindow, ReleasedReservation, UsageCap, UsageReservation, evaluate_caps,
                refund_weekly_credit,
            },
        },
    },
    infra::db::postgres::{
        postgres_connection::PgPoolSquad,
        schema::{entitlements, usage_events},
    },
};

pub struct UsageEventPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl UsageEventPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

fn route_tags(routes: &[UsageRoute]) -> Vec<String> {
    routes.iter().map(ToString::to_string).collect()
}

fn count_routes_since(
    conn: &mut PgConnection,
    user_id: Uuid,
    routes: &[UsageRoute],
    since: DateTime<Utc>,
) -> QueryResult<i64> {
    usage_events::table
        .filter(usage_events::user_id.eq(user_id))
        .filter(usage_events::route.eq_any(route_tags(routes)))
        .filter(usage_events::created_at.ge(since))
        .count()
        .get_result::<i64>(conn)
}

#[async_trait]
impl UsageEventRepository for UsageEventPostgres {
    async fn record(&self, insert_usage_event_entity: InsertUsageEventEntity) -> Result<Uuid> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<Uuid> {
            let mut conn = db_pool.get()?;

            let event_id = insert_into(usage_events::table)
                .values(&insert_usage_event_entity)
                .returning(usage_events::id)
                .get_result::<Uuid>(&mut conn)?;

            Ok(event_id)
        })
        .await??)
    }

    async fn count_since(
        &self,
        user_id: Uuid,
        routes: Vec<UsageRoute>,
        since: DateTime<Utc>,
    ) -> Result<i64> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<i64> {
            let mut conn = db_pool.get()?;
            Ok(count_routes_since(&mut conn, user_id, &routes, since)?)
        })
        .await??)
    }

    async fn reserve_weekly_credit(
        &self,
        user_id: Uuid,
        route: UsageRoute,
        weekly_allowance: i32,
        now: DateTime<Utc>,
    ) -> Result<UsageReservation> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<UsageReservation> {
            let mut conn = db_pool.get()?;

            let reservation = conn.transaction::<UsageReservation, diesel::result::Error, _>(
                |conn| {
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
                    .get_result::<i32>(conn)
                    .optional()?;

                    let Some(remaining) = remaining else {
                        let allowance = i64::from(weekly_allowance);
                        return Ok(UsageReservation::Exhausted {
                            window: QuotaWindow::WeeklyCredits,
                            used: allowance,
                            limit: allowance,
                        });
                    };

                    let event_id = insert_into(usage_events::table)
                        .values(&InsertUsageEventEntity {
                            user_id,
                            route: route.to_string(),
                            charged_credit: true,
                            created_at: now,
                        })
                        .returning(usage_events::id)
                        .get_result::<Uuid>(conn)?;

                    Ok(UsageReservation::Reserved {
                        event_id,
                        remaining: Some(i64::from(remaining)),
                    })
                },
            )?;

            Ok(reservation)
        })
        .await??)
    }

    async fn reserve_counted(
        &self,
        user_id: Uuid,
        route: UsageRoute,
        caps: Vec<UsageCap>,
        now: DateTime<Utc>,
    ) -> Result<UsageReservation> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<UsageReservation> {
            let mut conn = db_pool.get()?;

            let reservation = conn.transaction::<UsageReservation, diesel::result::Error, _>(
                |conn| {
                    // The entitlement row serialises concurrent admissions for one user.
                    entitlements::table
                        .find(user_id)
                        .select(entitlements::user_id)
                        .for_update()
                        .first::<Uuid>(conn)?;

                    let mut counts = Vec::with_capacity(caps.len());
                    for cap in &caps {
                        let used = count_routes_since(conn, user_id, &cap.routes, cap.since)?;
                        counts.push((cap, used));
                    }

                    let headroom = match evaluate_caps(&counts) {
                        Ok(headroom) => headroom,
                        Err(exhausted) => {
                            return Ok(UsageReservation::Exhausted {
                                window: exhausted.window,
                                used: exhausted.used,
                                limit: exhausted.limit,
                            });
                        }
                    };
                    // The event inserted below takes one slot of the headroom.
                    let remaining = headroom.map(|h| h.remaining - 1);

                    let event_id = insert_into(usage_events::table)
                        .values(&InsertUsageEventEntity {
                            user_id,
                            route: route.to_string(),
                            charged_credit: false,
                            created_at: now,
                        })
                        .returning(usage_events::id)
                        .get_result::<Uuid>(conn)?;

                    Ok(UsageReservation::Reserved {
                        event_id,
                        remaining,
                    })
                },
            )?;

            Ok(reservation)
        })
        .await??)
    }

    async fn release(
        &self,
        user_id: Uuid,
        event_id: Uuid,
        not_before: DateTime<Utc>,
        weekly_allowance: i32,
    ) -> Result<Option<ReleasedReservation>> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<Option<ReleasedReservation>> {
            let mut conn = db_pool.get()?;

            let released = conn
                .transaction::<Option<ReleasedReservation>, diesel::result::Error, _>(|conn| {
                    let charged_credit = delete(
                        usage_events::table
                            .filter(usage_events::id.eq(event_id))
                            .filter(usage_events::user_id.eq(user_id))
                            .filter(usage_events::created_at.ge(not_before)),
                    )
                    .returning(usage_events::charged_credit)
                    .get_result::<bool>(conn)
                    .optional()?;

                    let Some(charged_credit) = charged_credit else {
                        return Ok(None);
                    };

                    let mut refunded = false;
                    if charged_credit {
                        let current = entitlements::table
                            .find(user_id)
                            .select(entitlements::free_weekly_credits_remaining)
                            .for_update()
                            .first::<i32>(conn)
                            .optional()?;

                        let refunded_to = current.and_then(|remaining| {
                            refund_weekly_credit(remaining, weekly_allowance)
                        });
                        if let Some(refunded_to) = refunded_to {
                            update(entitlements::table.find(user_id))
                                .set((
                                    entitlements::free_weekly_credits_remaining.eq(refunded_to),
                                    entitlements::updated_at.eq(Utc::now()),
                                ))
                                .execute(conn)?;
                            refunded = true;
                        }
                    }

                    Ok(Some(ReleasedReservation {
                        event_id,
                        refunded_credit: refunded,
                    }))
                })?;

            Ok(released)
        })
        .await??)
    }
}
