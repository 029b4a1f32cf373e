//! Date-range view over ledger records.
//!
//! Bounds are calendar dates interpreted in a time zone (the operator's
//! local zone by default): `start` includes records from 00:00:00 of that
//! day, `end` includes every record before 00:00:00 of the following day.
//! Both calendar days are inclusive and applied independently.

use chrono::{DateTime, Local, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

use crate::types::OrderRecord;

/// Optional inclusive calendar-day bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// Resolve the bounds to instants in `tz`: an inclusive lower bound and
    /// an exclusive upper bound (the start of the day after `end`).
    pub fn bounds_in<Tz: TimeZone>(&self, tz: &Tz) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        (
            self.start.map(|d| start_of_day(d, tz)),
            self.end
                .and_then(|d| d.succ_opt())
                .map(|next| start_of_day(next, tz)),
        )
    }

    pub fn contains_in<Tz: TimeZone>(&self, tz: &Tz, at: &DateTime<Utc>) -> bool {
        let (lower, upper) = self.bounds_in(tz);
        lower.map_or(true, |l| *at >= l) && upper.map_or(true, |u| *at < u)
    }
}

/// Filter `records` by `range` using the local time zone.
pub fn filter_by_date(records: &[OrderRecord], range: DateRange) -> Vec<&OrderRecord> {
    filter_by_date_in(records, range, &Local)
}

/// Filter `records` by `range` with day boundaries taken in `tz`.
///
/// Order is preserved; an unbounded range returns every record.
pub fn filter_by_date_in<'a, Tz: TimeZone>(
    records: &'a [OrderRecord],
    range: DateRange,
    tz: &Tz,
) -> Vec<&'a OrderRecord> {
    if range.is_unbounded() {
        return records.iter().collect();
    }
    let (lower, upper) = range.bounds_in(tz);
    records
        .iter()
        .filter(|r| lower.map_or(true, |l| r.created_at >= l))
        .filter(|r| upper.map_or(true, |u| r.created_at < u))
        .collect()
}

/// First instant of `date` in `tz` (00:00:00.000 local).
pub fn start_of_day<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> DateTime<Utc> {
    resolve_local(tz, date.and_time(NaiveTime::MIN), true)
}

/// Map a wall-clock time to an instant.
///
/// Ambiguous times (DST fall-back) take the earliest or latest mapping; a
/// time inside a DST gap moves forward by an hour.
fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime, earliest: bool) -> DateTime<Utc> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(early, late) => {
            if earliest {
                early.with_timezone(&Utc)
            } else {
                late.with_timezone(&Utc)
            }
        }
        LocalResult::None => {
            let shifted = naive + chrono::Duration::hours(1);
            tz.from_local_datetime(&shifted)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|| shifted.and_utc())
        }
    }
}
