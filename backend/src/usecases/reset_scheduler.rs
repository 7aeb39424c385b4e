use anyhow::Result;
use chrono::{DateTime, Utc};
use quota_core::domain::{
    entities::entitlements::{EntitlementEntity, InsertEntitlementEntity},
    repositories::entitlements::EntitlementRepository,
    value_objects::{
        calendar::QuotaCalendar, entitlement_refresh::EntitlementRefresh,
        enums::plan_ids::PlanId,
    },
};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::usecases::plan_resolver::effective_plan_for;

/// Loads entitlements and rolls their lazily reset counters forward on read.
pub struct ResetScheduler<E>
where
    E: EntitlementRepository + Send + Sync + 'static,
{
    entitlement_repository: Arc<E>,
    calendar: QuotaCalendar,
}

impl<E> ResetScheduler<E>
where
    E: EntitlementRepository + Send + Sync + 'static,
{
    pub fn new(entitlement_repository: Arc<E>, calendar: QuotaCalendar) -> Self {
        Self {
            entitlement_repository,
            calendar,
        }
    }

    pub fn calendar(&self) -> &QuotaCalendar {
        &self.calendar
    }

    /// Returns the user's entitlement as of `now`, creating a free one for new users and
    /// persisting any pending day-pass reconciliation or weekly reset first.
    pub async fn load_current(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<EntitlementEntity> {
        let week_start = self.calendar.week_start(now);
        let entitlement = self
            .entitlement_repository
            .find_or_create(InsertEntitlementEntity::free_for_new_user(
                user_id, now, week_start,
            ))
            .await?;

        let Some(refresh) = plan_refresh(&entitlement, &self.calendar, now) else {
            return Ok(entitlement);
        };

        info!(
            %user_id,
            stored_plan = %entitlement.plan,
            reconcile_day_pass = refresh.reconcile_day_pass,
            weekly_reset = refresh.weekly_reset,
            window_start = %refresh.window_start,
            "reset_scheduler: applying entitlement refresh"
        );

        let refreshed = self
            .entitlement_repository
            .apply_refresh(user_id, refresh)
            .await?;

        debug!(
            %user_id,
            plan = %refreshed.plan,
            weekly_remaining = refreshed.free_weekly_credits_remaining,
            "reset_scheduler: entitlement refreshed"
        );

        Ok(refreshed)
    }
}

/// Works out which rollovers `entitlement` is due at `now`. `None` when the row is current.
pub fn plan_refresh(
    entitlement: &EntitlementEntity,
    calendar: &QuotaCalendar,
    now: DateTime<Utc>,
) -> Option<EntitlementRefresh> {
    let effective = effective_plan_for(entitlement, now);
    let window_start = calendar.week_start(now);

    let reconcile_day_pass = entitlement.plan == PlanId::DayPass && effective == PlanId::Free;
    let weekly_reset = effective == PlanId::Free
        && entitlement
            .last_weekly_reset
            .is_none_or(|last_reset| last_reset < window_start);

    if !reconcile_day_pass && !weekly_reset {
        return None;
    }

    Some(EntitlementRefresh {
        reconcile_day_pass,
        weekly_reset,
        window_start,
        weekly_allowance: PlanId::Free.definition().weekly_credits_or_default(),
        now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use mockall::predicate::eq;
    use quota_core::domain::{
        repositories::entitlements::MockEntitlementRepository,
        value_objects::{enums::entitlement_statuses::EntitlementStatus, plans::EntitlementFeatures},
    };

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn entitlement(user_id: Uuid, plan: PlanId, now: DateTime<Utc>) -> EntitlementEntity {
        EntitlementEntity {
            user_id,
            plan,
            status: EntitlementStatus::Active,
            free_weekly_credits_remaining: 10,
            free_monthly_credits_remaining: 0,
            credit_balance: 0,
            last_weekly_reset: Some(QuotaCalendar::default().week_start(now)),
            last_monthly_reset: None,
            expires_at: None,
            features: EntitlementFeatures::for_plan(plan),
            created_at: now - Duration::days(30),
            updated_at: now - Duration::days(1),
        }
    }

    #[test]
    fn current_free_row_needs_no_refresh() {
        let now = utc("2024-05-15T10:00:00Z");
        let row = entitlement(Uuid::new_v4(), PlanId::Free, now);
        assert_eq!(plan_refresh(&row, &QuotaCalendar::default(), now), None);
    }

    #[test]
    fn free_row_from_last_week_is_reset_to_window_start() {
        let now = utc("2024-05-15T10:00:00Z");
        let calendar = QuotaCalendar::default();
        let mut row = entitlement(Uuid::new_v4(), PlanId::Free, now);
        row.free_weekly_credits_remaining = 0;
        row.last_weekly_reset = Some(calendar.week_start(now) - Duration::seconds(1));

        let refresh = plan_refresh(&row, &calendar, now).unwrap();
        assert!(refresh.weekly_reset);
        assert!(!refresh.reconcile_day_pass);
        assert_eq!(refresh.window_start, utc("2024-05-12T18:30:00Z"));
        assert_eq!(refresh.weekly_allowance, 10);
    }

    #[test]
    fn paid_plans_never_reset_weekly_credits() {
        let now = utc("2024-05-15T10:00:00Z");
        let calendar = QuotaCalendar::default();
        for plan in [PlanId::ProMonthly, PlanId::ProAnnual] {
            let mut row = entitlement(Uuid::new_v4(), plan, now);
            row.last_weekly_reset = None;
            assert_eq!(plan_refresh(&row, &calendar, now), None);
        }

        let mut day_pass = entitlement(Uuid::new_v4(), PlanId::DayPass, now);
        day_pass.expires_at = Some(now + Duration::hours(5));
        day_pass.last_weekly_reset = None;
        assert_eq!(plan_refresh(&day_pass, &calendar, now), None);
    }

    #[test]
    fn lapsed_day_pass_is_reconciled() {
        let now = utc("2024-05-15T10:00:00Z");
        let mut row = entitlement(Uuid::new_v4(), PlanId::DayPass, now);
        row.expires_at = Some(now - Duration::hours(1));

        let refresh = plan_refresh(&row, &QuotaCalendar::default(), now).unwrap();
        assert!(refresh.reconcile_day_pass);
        assert_eq!(refresh.weekly_allowance, 10);
    }

    #[tokio::test]
    async fn load_current_reconciles_expired_day_pass() {
        let user_id = Uuid::new_v4();
        let now = Utc::now();
        let mut stored = entitlement(user_id, PlanId::DayPass, now);
        stored.expires_at = Some(now - Duration::hours(1));
        stored.free_weekly_credits_remaining = 0;

        let mut reconciled = entitlement(user_id, PlanId::Free, now);
        reconciled.free_weekly_credits_remaining = 10;

        let mut entitlement_repository = MockEntitlementRepository::new();
        entitlement_repository
            .expect_find_or_create()
            .times(1)
            .returning(move |_| Ok(stored.clone()));
        entitlement_repository
            .expect_apply_refresh()
            .withf(move |id, refresh| *id == user_id && refresh.reconcile_day_pass)
            .times(1)
            .returning(move |_, _| Ok(reconciled.clone()));

        let scheduler = ResetScheduler::new(
            Arc::new(entitlement_repository),
            QuotaCalendar::default(),
        );

        let loaded = scheduler.load_current(user_id, now).await.unwrap();
        assert_eq!(loaded.plan, PlanId::Free);
        assert_eq!(loaded.free_weekly_credits_remaining, 10);
        assert_eq!(loaded.expires_at, None);
    }

    #[tokio::test]
    async fn second_load_in_the_same_window_writes_nothing() {
        let user_id = Uuid::new_v4();
        let now = utc("2024-05-15T10:00:00Z");
        let calendar = QuotaCalendar::default();
        let mut stale = entitlement(user_id, PlanId::Free, now);
        stale.free_weekly_credits_remaining = 2;
        stale.last_weekly_reset = Some(calendar.week_start(now) - Duration::days(7));

        let mut fresh = stale.clone();
        fresh.free_weekly_credits_remaining = 10;
        fresh.last_weekly_reset = Some(calendar.week_start(now));

        let mut first_repository = MockEntitlementRepository::new();
        first_repository
            .expect_find_or_create()
            .returning(move |_| Ok(stale.clone()));
        let after_first = fresh.clone();
        first_repository
            .expect_apply_refresh()
            .with(eq(user_id), mockall::predicate::always())
            .times(1)
            .returning(move |_, _| Ok(after_first.clone()));

        let first = ResetScheduler::new(Arc::new(first_repository), calendar)
            .load_current(user_id, now)
            .await
            .unwrap();

        let mut second_repository = MockEntitlementRepository::new();
        let stored = first.clone();
        second_repository
            .expect_find_or_create()
            .returning(move |_| Ok(stored.clone()));
        second_repository.expect_apply_refresh().never();

        let second = ResetScheduler::new(Arc::new(second_repository), calendar)
            .load_current(user_id, now + Duration::hours(2))
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(second.free_weekly_credits_remaining, 10);
    }

    #[tokio::test]
    async fn new_users_are_created_on_the_free_plan() {
        let user_id = Uuid::new_v4();
        let now = utc("2024-05-15T10:00:00Z");
        let created = entitlement(user_id, PlanId::Free, now);

        let mut entitlement_repository = MockEntitlementRepository::new();
        entitlement_repository
            .expect_find_or_create()
            .withf(move |defaults| {
                defaults.user_id == user_id
                    && defaults.plan == "free"
                    && defaults.free_weekly_credits_remaining == 10
                    && defaults.last_weekly_reset == Some(utc("2024-05-12T18:30:00Z"))
            })
            .times(1)
            .returning(move |_| Ok(created.clone()));
        entitlement_repository.expect_apply_refresh().never();

        let scheduler = ResetScheduler::new(
            Arc::new(entitlement_repository),
            QuotaCalendar::default(),
        );
        let loaded = scheduler.load_current(user_id, now).await.unwrap();
        assert_eq!(loaded.plan, PlanId::Free);
    }
}
