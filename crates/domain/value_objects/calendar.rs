use anyhow::{Result, anyhow};
use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc,
};

/// Window boundaries (week, day, month) measured in the product's reference timezone
/// rather than UTC or the caller's timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaCalendar {
    offset: FixedOffset,
}

/// +05:30
const DEFAULT_OFFSET_SECONDS: i32 = 5 * 3600 + 30 * 60;

impl Default for QuotaCalendar {
    fn default() -> Self {
        Self {
            offset: FixedOffset::east_opt(DEFAULT_OFFSET_SECONDS).unwrap_or_else(|| Utc.fix()),
        }
    }
}

impl QuotaCalendar {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Parses offsets of the form `+05:30`, `-0800` or `Z`.
    pub fn from_offset_str(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("z") || value.eq_ignore_ascii_case("utc") {
            return Ok(Self::new(Utc.fix()));
        }

        let offset = value
            .parse::<FixedOffset>()
            .map_err(|err| anyhow!("invalid UTC offset {value:?}: {err}"))?;
        Ok(Self::new(offset))
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Most recent Monday 00:00 in the reference timezone.
    pub fn week_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let local = self.local_date(now);
        let days_since_monday = i64::from(local.weekday().num_days_from_monday());
        self.midnight_utc(local - Duration::days(days_since_monday))
    }

    pub fn next_week_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.week_start(now) + Duration::days(7)
    }

    pub fn day_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.midnight_utc(self.local_date(now))
    }

    /// First day of the current calendar month, 00:00.
    pub fn month_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let local = self.local_date(now);
        self.midnight_utc(local - Duration::days(i64::from(local.day0())))
    }

    fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.offset).date_naive()
    }

    fn midnight_utc(&self, date: NaiveDate) -> DateTime<Utc> {
        let local_midnight = date.and_time(NaiveTime::MIN);
        let utc = local_midnight - Duration::seconds(i64::from(self.offset.local_minus_utc()));
        Utc.from_utc_datetime(&utc)
    }
}
