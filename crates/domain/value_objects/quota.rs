use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use super::enums::{
    plan_ids::PlanId, quota_actions::DownloadFormat, trial_kinds::TrialKind,
    usage_routes::UsageRoute,
};

/// Machine-readable reason attached to every denial so callers can pick
/// "sign up", "upgrade" or "wait until reset" messaging.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    AuthenticationRequired,
    WeeklyCreditsExhausted,
    DailyCapExceeded,
    MonthlyGenerationCapExceeded,
    MonthlyDownloadCapExceeded,
    TrialLimitReached,
    FormatNotIncluded,
    StoreUnavailable,
}

/// The time window a limit is measured over.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuotaWindow {
    WeeklyCredits,
    DailyGenerations,
    MonthlyGenerations,
    MonthlyDownloads,
    Trial,
}

impl QuotaWindow {
    pub fn denial_reason(&self) -> DenialReason {
        match self {
            QuotaWindow::WeeklyCredits => DenialReason::WeeklyCreditsExhausted,
            QuotaWindow::DailyGenerations => DenialReason::DailyCapExceeded,
            QuotaWindow::MonthlyGenerations => DenialReason::MonthlyGenerationCapExceeded,
            QuotaWindow::MonthlyDownloads => DenialReason::MonthlyDownloadCapExceeded,
            QuotaWindow::Trial => DenialReason::TrialLimitReached,
        }
    }
}

#[derive(Debug, Error)]
pub enum QuotaError {
    #[error("authentication required")]
    AuthenticationRequired,
    #[error("{window:?} quota exhausted: {used} of {limit} used")]
    QuotaExhausted {
        window: QuotaWindow,
        used: i64,
        limit: i64,
    },
    #[error("{0:?} downloads are not included in the current plan")]
    FormatNotIncluded(DownloadFormat),
    #[error("entitlement store unavailable")]
    StoreUnavailable(#[source] anyhow::Error),
}

impl QuotaError {
    pub fn denial_reason(&self) -> DenialReason {
        match self {
            QuotaError::AuthenticationRequired => DenialReason::AuthenticationRequired,
            QuotaError::QuotaExhausted { window, .. } => window.denial_reason(),
            QuotaError::FormatNotIncluded(_) => DenialReason::FormatNotIncluded,
            QuotaError::StoreUnavailable(_) => DenialReason::StoreUnavailable,
        }
    }

    /// Message safe to show a caller. Store failures never expose the underlying error.
    pub fn public_message(&self) -> String {
        match self {
            QuotaError::StoreUnavailable(_) => "Service temporarily unavailable".to_string(),
            other => other.to_string(),
        }
    }
}

/// Outcome of an availability check.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct QuotaDecision {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<DenialReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub plan: Option<PlanId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<QuotaWindow>,
}

impl QuotaDecision {
    pub fn allow(
        plan: PlanId,
        remaining: Option<i64>,
        limit: Option<i64>,
        window: Option<QuotaWindow>,
    ) -> Self {
        Self {
            allowed: true,
            reason: None,
            message: None,
            plan: Some(plan),
            remaining,
            limit,
            window,
        }
    }

    pub fn deny(plan: Option<PlanId>, error: &QuotaError) -> Self {
        let (remaining, limit, window) = match error {
            QuotaError::QuotaExhausted { window, used, limit } => {
                (Some((limit - used).max(0)), Some(*limit), Some(*window))
            }
            _ => (None, None, None),
        };

        Self {
            allowed: false,
            reason: Some(error.denial_reason()),
            message: Some(error.public_message()),
            plan,
            remaining,
            limit,
            window,
        }
    }
}

/// A ledger-counted limit: at most `limit` events with one of `routes` since `since`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageCap {
    pub window: QuotaWindow,
    pub routes: Vec<UsageRoute>,
    pub since: DateTime<Utc>,
    pub limit: i64,
}

/// Room left under the tightest cap once every cap has been counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapHeadroom {
    pub window: QuotaWindow,
    pub limit: i64,
    pub remaining: i64,
}

/// First cap whose window is already full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapExhausted {
    pub window: QuotaWindow,
    pub used: i64,
    pub limit: i64,
}

impl From<CapExhausted> for QuotaError {
    fn from(exhausted: CapExhausted) -> Self {
        QuotaError::QuotaExhausted {
            window: exhausted.window,
            used: exhausted.used,
            limit: exhausted.limit,
        }
    }
}

/// Checks counted usage against each cap in order. A cap admits one more event while
/// `used < limit`. Returns the smallest headroom, or `None` when no cap applies.
pub fn evaluate_caps(counts: &[(&UsageCap, i64)]) -> Result<Option<CapHeadroom>, CapExhausted> {
    let mut tightest: Option<CapHeadroom> = None;

    for (cap, used) in counts {
        if *used >= cap.limit {
            return Err(CapExhausted {
                window: cap.window,
                used: *used,
                limit: cap.limit,
            });
        }

        let remaining = cap.limit - used;
        if tightest.is_none_or(|current| remaining < current.remaining) {
            tightest = Some(CapHeadroom {
                window: cap.window,
                limit: cap.limit,
                remaining,
            });
        }
    }

    Ok(tightest)
}

/// Counter value after refunding one weekly credit, or `None` when the counter is
/// already at the allowance and nothing may be refunded.
pub fn refund_weekly_credit(remaining: i32, weekly_allowance: i32) -> Option<i32> {
    (remaining < weekly_allowance).then(|| (remaining.max(0) + 1).min(weekly_allowance))
}

/// Result of an atomic check-and-reserve against the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsageReservation {
    Reserved {
        event_id: Uuid,
        remaining: Option<i64>,
    },
    Exhausted {
        window: QuotaWindow,
        used: i64,
        limit: i64,
    },
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct ReleasedReservation {
    pub event_id: Uuid,
    pub refunded_credit: bool,
}

/// Anonymous trial decision for one counter.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct TrialDecision {
    pub kind: TrialKind,
    pub allowed: bool,
    pub remaining: i32,
    pub limit: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<DenialReason>,
}

impl TrialDecision {
    pub fn from_used(kind: TrialKind, used: i32, limit: i32) -> Self {
        let allowed = used < limit;
        Self {
            kind,
            allowed,
            remaining: (limit - used).max(0),
            limit,
            reason: (!allowed).then_some(DenialReason::TrialLimitReached),
        }
    }

    pub fn fail_secure(kind: TrialKind, limit: i32) -> Self {
        Self {
            kind,
            allowed: false,
            remaining: 0,
            limit,
            reason: Some(DenialReason::StoreUnavailable),
        }
    }
}
