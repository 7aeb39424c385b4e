use anyhow::Result;
use chrono::{DateTime, Utc};
use quota_core::domain::{
    repositories::{entitlements::EntitlementRepository, usage_events::UsageEventRepository},
    value_objects::{
        calendar::QuotaCalendar,
        enums::{
            plan_ids::PlanId,
            quota_actions::{DownloadFormat, QuotaAction},
            usage_routes::UsageRoute,
        },
        quota::{QuotaDecision, QuotaError, QuotaWindow, UsageCap, evaluate_caps},
    },
};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::usecases::{plan_resolver::effective_plan_for, reset_scheduler::ResetScheduler};

/// Decides whether a user may perform a gated action right now. Read only: nothing is
/// reserved, so callers that act on the answer should go through `QuotaGate` instead.
pub struct QuotaChecker<E, U>
where
    E: EntitlementRepository + Send + Sync + 'static,
    U: UsageEventRepository + Send + Sync + 'static,
{
    reset_scheduler: ResetScheduler<E>,
    usage_event_repository: Arc<U>,
}

impl<E, U> QuotaChecker<E, U>
where
    E: EntitlementRepository + Send + Sync + 'static,
    U: UsageEventRepository + Send + Sync + 'static,
{
    pub fn new(
        entitlement_repository: Arc<E>,
        usage_event_repository: Arc<U>,
        calendar: QuotaCalendar,
    ) -> Self {
        Self {
            reset_scheduler: ResetScheduler::new(entitlement_repository, calendar),
            usage_event_repository,
        }
    }

    pub async fn check_availability(
        &self,
        user_id: Option<Uuid>,
        action: QuotaAction,
    ) -> QuotaDecision {
        self.check_availability_at(user_id, action, Utc::now()).await
    }

    /// Never returns an allow on failure: a missing identity or an unreachable store
    /// both come back as denials.
    pub async fn check_availability_at(
        &self,
        user_id: Option<Uuid>,
        action: QuotaAction,
        now: DateTime<Utc>,
    ) -> QuotaDecision {
        let Some(user_id) = user_id else {
            info!(%action, "quota_checker: anonymous request denied");
            return QuotaDecision::deny(None, &QuotaError::AuthenticationRequired);
        };

        match self.evaluate(user_id, action, now).await {
            Ok(decision) => {
                if !decision.allowed {
                    info!(
                        %user_id,
                        %action,
                        plan = ?decision.plan,
                        reason = ?decision.reason,
                        "quota_checker: action denied"
                    );
                }
                decision
            }
            Err(err) => {
                error!(
                    %user_id,
                    %action,
                    db_error = ?err,
                    "quota_checker: entitlement store unavailable; denying"
                );
                QuotaDecision::deny(None, &QuotaError::StoreUnavailable(err))
            }
        }
    }

    async fn evaluate(
        &self,
        user_id: Uuid,
        action: QuotaAction,
        now: DateTime<Utc>,
    ) -> Result<QuotaDecision> {
        let entitlement = self.reset_scheduler.load_current(user_id, now).await?;
        let plan = effective_plan_for(&entitlement, now);

        if let Some(error) = format_denial(plan, action) {
            return Ok(QuotaDecision::deny(Some(plan), &error));
        }

        if plan == PlanId::Free {
            // The stored counter is authoritative for the free tier.
            let allowance = plan.definition().weekly_credits_or_default();
            let remaining = entitlement.free_weekly_credits_remaining.max(0);
            if remaining > 0 {
                return Ok(QuotaDecision::allow(
                    plan,
                    Some(i64::from(remaining)),
                    Some(i64::from(allowance)),
                    Some(QuotaWindow::WeeklyCredits),
                ));
            }
            return Ok(QuotaDecision::deny(
                Some(plan),
                &QuotaError::QuotaExhausted {
                    window: QuotaWindow::WeeklyCredits,
                    used: i64::from(allowance - remaining),
                    limit: i64::from(allowance),
                },
            ));
        }

        let caps = usage_caps(self.reset_scheduler.calendar(), plan, action, now);
        let mut counts = Vec::with_capacity(caps.len());
        for cap in &caps {
            let used = self
                .usage_event_repository
                .count_since(user_id, cap.routes.clone(), cap.since)
                .await?;
            counts.push((cap, used));
        }

        Ok(match evaluate_caps(&counts) {
            Ok(Some(headroom)) => QuotaDecision::allow(
                plan,
                Some(headroom.remaining),
                Some(headroom.limit),
                Some(headroom.window),
            ),
            Ok(None) => QuotaDecision::allow(plan, None, None, None),
            Err(exhausted) => QuotaDecision::deny(Some(plan), &QuotaError::from(exhausted)),
        })
    }
}

/// DOCX is a plan feature; PDF downloads are open to every tier.
pub fn format_denial(plan: PlanId, action: QuotaAction) -> Option<QuotaError> {
    match action {
        QuotaAction::Download(DownloadFormat::Docx) if !plan.definition().docx_allowed => {
            Some(QuotaError::FormatNotIncluded(DownloadFormat::Docx))
        }
        _ => None,
    }
}

/// Ledger-counted limits that apply to `action` on `plan`. Empty for the free tier,
/// which is limited by its stored counter instead.
///
/// Day passes only cap generations, even for download actions. Monthly plans always
/// check the generation cap and add the download cap for downloads.
pub fn usage_caps(
    calendar: &QuotaCalendar,
    plan: PlanId,
    action: QuotaAction,
    now: DateTime<Utc>,
) -> Vec<UsageCap> {
    let definition = plan.definition();
    let mut caps = Vec::new();

    match plan {
        PlanId::Free => {}
        PlanId::DayPass => {
            if let Some(limit) = definition.daily_generation_cap {
                caps.push(UsageCap {
                    window: QuotaWindow::DailyGenerations,
                    routes: vec![UsageRoute::Generation],
                    since: calendar.day_start(now),
                    limit,
                });
            }
        }
        PlanId::ProMonthly | PlanId::ProAnnual => {
            let month_start = calendar.month_start(now);
            if let Some(limit) = definition.monthly_generation_cap {
                caps.push(UsageCap {
                    window: QuotaWindow::MonthlyGenerations,
                    routes: vec![UsageRoute::Generation],
                    since: month_start,
                    limit,
                });
            }
            if action.is_download() {
                if let Some(limit) = definition.monthly_download_cap {
                    caps.push(UsageCap {
                        window: QuotaWindow::MonthlyDownloads,
                        routes: UsageRoute::DOWNLOADS.to_vec(),
                        since: month_start,
                        limit,
                    });
                }
            }
        }
    }

    caps
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use mockall::predicate::{always, eq};
    use quota_core::domain::{
        entities::entitlements::EntitlementEntity,
        repositories::{
            entitlements::MockEntitlementRepository, usage_events::MockUsageEventRepository,
        },
        value_objects::{
            enums::entitlement_statuses::EntitlementStatus, plans::EntitlementFeatures,
            quota::DenialReason,
        },
    };

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn entitlement(
        user_id: Uuid,
        plan: PlanId,
        weekly_remaining: i32,
        now: DateTime<Utc>,
    ) -> EntitlementEntity {
        EntitlementEntity {
            user_id,
            plan,
            status: EntitlementStatus::Active,
            free_weekly_credits_remaining: weekly_remaining,
            free_monthly_credits_remaining: 0,
            credit_balance: 0,
            last_weekly_reset: Some(QuotaCalendar::default().week_start(now)),
            last_monthly_reset: None,
            expires_at: None,
            features: EntitlementFeatures::for_plan(plan),
            created_at: now - Duration::days(60),
            updated_at: now,
        }
    }

    fn entitlements_returning(row: EntitlementEntity) -> MockEntitlementRepository {
        let mut repository = MockEntitlementRepository::new();
        repository
            .expect_find_or_create()
            .returning(move |_| Ok(row.clone()));
        repository
    }

    fn checker(
        entitlements: MockEntitlementRepository,
        usage_events: MockUsageEventRepository,
    ) -> QuotaChecker<MockEntitlementRepository, MockUsageEventRepository> {
        QuotaChecker::new(
            Arc::new(entitlements),
            Arc::new(usage_events),
            QuotaCalendar::default(),
        )
    }

    #[tokio::test]
    async fn anonymous_callers_need_to_authenticate() {
        let mut entitlements = MockEntitlementRepository::new();
        entitlements.expect_find_or_create().never();

        let decision = checker(entitlements, MockUsageEventRepository::new())
            .check_availability(None, QuotaAction::Generation)
            .await;

        assert!(!decision.allowed);
        assert_eq!(decision.reason, Some(DenialReason::AuthenticationRequired));
        assert_eq!(decision.plan, None);
    }

    #[tokio::test]
    async fn free_user_after_ten_generations_is_denied_weekly() {
        let user_id = Uuid::new_v4();
        let now = utc("2024-05-15T10:00:00Z");
        let mut usage_events = MockUsageEventRepository::new();
        usage_events.expect_count_since().never();

        let decision = checker(
            entitlements_returning(entitlement(user_id, PlanId::Free, 0, now)),
            usage_events,
        )
        .check_availability_at(Some(user_id), QuotaAction::Generation, now)
        .await;

        assert!(!decision.allowed);
        assert_eq!(decision.reason, Some(DenialReason::WeeklyCreditsExhausted));
        assert_eq!(decision.plan, Some(PlanId::Free));
        assert_eq!(decision.remaining, Some(0));
        assert_eq!(decision.limit, Some(10));
    }

    #[tokio::test]
    async fn free_user_with_one_credit_is_allowed() {
        let user_id = Uuid::new_v4();
        let now = utc("2024-05-15T10:00:00Z");

        let decision = checker(
            entitlements_returning(entitlement(user_id, PlanId::Free, 1, now)),
            MockUsageEventRepository::new(),
        )
        .check_availability_at(Some(user_id), QuotaAction::Download(DownloadFormat::Pdf), now)
        .await;

        assert!(decision.allowed);
        assert_eq!(decision.remaining, Some(1));
        assert_eq!(decision.window, Some(QuotaWindow::WeeklyCredits));
    }

    #[tokio::test]
    async fn free_user_cannot_download_docx() {
        let user_id = Uuid::new_v4();
        let now = utc("2024-05-15T10:00:00Z");

        let decision = checker(
            entitlements_returning(entitlement(user_id, PlanId::Free, 5, now)),
            MockUsageEventRepository::new(),
        )
        .check_availability_at(Some(user_id), QuotaAction::Download(DownloadFormat::Docx), now)
        .await;

        assert!(!decision.allowed);
        assert_eq!(decision.reason, Some(DenialReason::FormatNotIncluded));
    }

    #[tokio::test]
    async fn pro_monthly_generation_cap_is_enforced_at_three_hundred() {
        let user_id = Uuid::new_v4();
        let now = utc("2024-05-15T10:00:00Z");
        let month_start = QuotaCalendar::default().month_start(now);

        let mut usage_events = MockUsageEventRepository::new();
        usage_events
            .expect_count_since()
            .with(eq(user_id), eq(vec![UsageRoute::Generation]), eq(month_start))
            .times(1)
            .returning(|_, _, _| Ok(300));

        let decision = checker(
            entitlements_returning(entitlement(user_id, PlanId::ProMonthly, 0, now)),
            usage_events,
        )
        .check_availability_at(Some(user_id), QuotaAction::Generation, now)
        .await;

        assert!(!decision.allowed);
        assert_eq!(decision.reason, Some(DenialReason::MonthlyGenerationCapExceeded));
        assert_eq!(decision.limit, Some(300));
    }

    #[tokio::test]
    async fn pro_monthly_allows_the_three_hundredth_generation() {
        let user_id = Uuid::new_v4();
        let now = utc("2024-05-15T10:00:00Z");

        let mut usage_events = MockUsageEventRepository::new();
        usage_events
            .expect_count_since()
            .times(1)
            .returning(|_, _, _| Ok(299));

        let decision = checker(
            entitlements_returning(entitlement(user_id, PlanId::ProMonthly, 0, now)),
            usage_events,
        )
        .check_availability_at(Some(user_id), QuotaAction::Generation, now)
        .await;

        assert!(decision.allowed);
        assert_eq!(decision.remaining, Some(1));
        assert_eq!(decision.limit, Some(300));
        assert_eq!(decision.window, Some(QuotaWindow::MonthlyGenerations));
    }

    #[tokio::test]
    async fn pro_monthly_download_checks_the_download_cap_too() {
        let user_id = Uuid::new_v4();
        let now = utc("2024-05-15T10:00:00Z");

        let mut usage_events = MockUsageEventRepository::new();
        usage_events
            .expect_count_since()
            .with(eq(user_id), eq(vec![UsageRoute::Generation]), always())
            .returning(|_, _, _| Ok(120));
        usage_events
            .expect_count_since()
            .with(eq(user_id), eq(UsageRoute::DOWNLOADS.to_vec()), always())
            .times(1)
            .returning(|_, _, _| Ok(500));

        let decision = checker(
            entitlements_returning(entitlement(user_id, PlanId::ProMonthly, 0, now)),
            usage_events,
        )
        .check_availability_at(Some(user_id), QuotaAction::Download(DownloadFormat::Docx), now)
        .await;

        assert!(!decision.allowed);
        assert_eq!(decision.reason, Some(DenialReason::MonthlyDownloadCapExceeded));
        assert_eq!(decision.window, Some(QuotaWindow::MonthlyDownloads));
    }

    #[tokio::test]
    async fn pro_download_reports_the_tighter_remaining_cap() {
        let user_id = Uuid::new_v4();
        let now = utc("2024-05-15T10:00:00Z");

        let mut usage_events = MockUsageEventRepository::new();
        usage_events
            .expect_count_since()
            .with(eq(user_id), eq(vec![UsageRoute::Generation]), always())
            .returning(|_, _, _| Ok(10));
        usage_events
            .expect_count_since()
            .with(eq(user_id), eq(UsageRoute::DOWNLOADS.to_vec()), always())
            .returning(|_, _, _| Ok(999));

        let decision = checker(
            entitlements_returning(entitlement(user_id, PlanId::ProAnnual, 0, now)),
            usage_events,
        )
        .check_availability_at(Some(user_id), QuotaAction::Download(DownloadFormat::Pdf), now)
        .await;

        assert!(decision.allowed);
        assert_eq!(decision.remaining, Some(1));
        assert_eq!(decision.limit, Some(1000));
        assert_eq!(decision.window, Some(QuotaWindow::MonthlyDownloads));
    }

    #[tokio::test]
    async fn day_pass_counts_generations_since_local_midnight() {
        let user_id = Uuid::new_v4();
        let now = utc("2024-05-15T10:00:00Z");
        let mut row = entitlement(user_id, PlanId::DayPass, 0, now);
        row.expires_at = Some(now + Duration::hours(12));

        let mut usage_events = MockUsageEventRepository::new();
        usage_events
            .expect_count_since()
            .with(
                eq(user_id),
                eq(vec![UsageRoute::Generation]),
                eq(utc("2024-05-14T18:30:00Z")),
            )
            .times(1)
            .returning(|_, _, _| Ok(50));

        let decision = checker(entitlements_returning(row), usage_events)
            .check_availability_at(Some(user_id), QuotaAction::Generation, now)
            .await;

        assert!(!decision.allowed);
        assert_eq!(decision.reason, Some(DenialReason::DailyCapExceeded));
        assert_eq!(decision.plan, Some(PlanId::DayPass));
    }

    #[tokio::test]
    async fn store_failure_denies_with_a_generic_reason() {
        let user_id = Uuid::new_v4();
        let mut entitlements = MockEntitlementRepository::new();
        entitlements
            .expect_find_or_create()
            .returning(|_| Err(anyhow::anyhow!("connection pool timed out")));

        let decision = checker(entitlements, MockUsageEventRepository::new())
            .check_availability(Some(user_id), QuotaAction::Generation)
            .await;

        assert!(!decision.allowed);
        assert_eq!(decision.reason, Some(DenialReason::StoreUnavailable));
        assert_eq!(
            decision.message.as_deref(),
            Some("Service temporarily unavailable")
        );
    }

    #[tokio::test]
    async fn ledger_failure_on_counted_tiers_also_denies() {
        let user_id = Uuid::new_v4();
        let now = utc("2024-05-15T10:00:00Z");
        let mut usage_events = MockUsageEventRepository::new();
        usage_events
            .expect_count_since()
            .returning(|_, _, _| Err(anyhow::anyhow!("relation does not exist")));

        let decision = checker(
            entitlements_returning(entitlement(user_id, PlanId::ProAnnual, 0, now)),
            usage_events,
        )
        .check_availability_at(Some(user_id), QuotaAction::Generation, now)
        .await;

        assert!(!decision.allowed);
        assert_eq!(decision.reason, Some(DenialReason::StoreUnavailable));
    }

    #[test]
    fn day_pass_downloads_only_check_the_generation_cap() {
        let now = utc("2024-05-15T10:00:00Z");
        let caps = usage_caps(
            &QuotaCalendar::default(),
            PlanId::DayPass,
            QuotaAction::Download(DownloadFormat::Pdf),
            now,
        );
        assert_eq!(caps.len(), 1);
        assert_eq!(caps[0].window, QuotaWindow::DailyGenerations);
        assert_eq!(caps[0].limit, 50);
    }

    #[test]
    fn free_tier_has_no_counted_caps() {
        let caps = usage_caps(
            &QuotaCalendar::default(),
            PlanId::Free,
            QuotaAction::Generation,
            Utc::now(),
        );
        assert!(caps.is_empty());
    }
}
