use anyhow::{bail, Result};
use chrono::{DateTime, Days, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serialize;

/// Half-open time range `[start, end)` that a refresh covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DayWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DayWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start >= end {
            bail!("window start {start} must be before end {end}");
        }
        Ok(Self { start, end })
    }

    /// The last `days` calendar days up to `now`, starting at local midnight.
    pub fn last_days<Tz: TimeZone>(days: u32, now: DateTime<Utc>, tz: &Tz) -> Result<Self> {
        let today = day_of(&now, tz);
        let first_day = today
            .checked_sub_days(Days::new(u64::from(days)))
            .ok_or_else(|| anyhow::anyhow!("{days} days before {today} is out of range"))?;
        Self::new(start_of_day(first_day, tz), now)
    }

    pub fn contains(&self, at: &DateTime<Utc>) -> bool {
        *at >= self.start && *at < self.end
    }

    /// First and last calendar day touched by the window, both inclusive.
    pub fn day_range<Tz: TimeZone>(&self, tz: &Tz) -> (NaiveDate, NaiveDate) {
        let last_instant = self.end - chrono::Duration::nanoseconds(1);
        (day_of(&self.start, tz), day_of(&last_instant, tz))
    }
}

/// Calendar day of an instant in the given timezone.
pub fn day_of<Tz: TimeZone>(at: &DateTime<Utc>, tz: &Tz) -> NaiveDate {
    at.with_timezone(tz).date_naive()
}

/// Instant of local midnight. Days whose midnight is skipped by a DST jump
/// start at the first hour that exists.
pub fn start_of_day<Tz: TimeZone>(day: NaiveDate, tz: &Tz) -> DateTime<Utc> {
    let midnight = day.and_time(NaiveTime::MIN);
    match tz.from_local_datetime(&midnight) {
        LocalResult::Single(at) => at.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => {
            let one_am = midnight + chrono::Duration::hours(1);
            tz.from_local_datetime(&one_am)
                .earliest()
                .map(|at| at.with_timezone(&Utc))
                .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
        }
    }
}
