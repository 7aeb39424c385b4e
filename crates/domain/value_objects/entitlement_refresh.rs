use chrono::{DateTime, Utc};

/// Lazy rollover to apply to one entitlement row. Each step is written as a conditional
/// update, so applying the same refresh twice leaves the row unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntitlementRefresh {
    /// Stored plan is `day_pass` but the pass has lapsed: revert to free with a full allowance.
    pub reconcile_day_pass: bool,
    /// `last_weekly_reset` precedes `window_start`: restore the weekly allowance.
    pub weekly_reset: bool,
    pub window_start: DateTime<Utc>,
    pub weekly_allowance: i32,
    pub now: DateTime<Utc>,
}
