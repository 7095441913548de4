//! RFC-5545-style recurrence rule engine (spec §4.C).
//!
//! Grounded in the original `rrule_service`, which wraps `dateutil.rrule` and
//! computes `next_after` via `.after(date, inc=False)` (strictly-after
//! semantics). No crate in the retrieved corpus exercises an RRULE-equivalent
//! dependency, so this is a hand-rolled subset atop `chrono`, stepped the way
//! the teacher's own `calculate_next_occurrence` steps dates (month/day
//! arithmetic with day-of-month clamping), generalized to parsed rule
//! strings instead of separate integer fields.

use crate::error::CoreError;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};

const MAX_ITERATIONS: u32 = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "DAILY" => Some(Self::Daily),
            "WEEKLY" => Some(Self::Weekly),
            "MONTHLY" => Some(Self::Monthly),
            "YEARLY" => Some(Self::Yearly),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceRule {
    pub freq: Frequency,
    pub interval: u32,
    pub by_day: Vec<Weekday>,
    pub count: Option<u32>,
    pub until: Option<DateTime<Utc>>,
}

fn weekday_from_token(token: &str) -> Option<Weekday> {
    match token {
        "MO" => Some(Weekday::Mon),
        "TU" => Some(Weekday::Tue),
        "WE" => Some(Weekday::Wed),
        "TH" => Some(Weekday::Thu),
        "FR" => Some(Weekday::Fri),
        "SA" => Some(Weekday::Sat),
        "SU" => Some(Weekday::Sun),
        _ => None,
    }
}

/// Parse an RRULE-style string. Bare tokens (`DAILY`, `WEEKLY`, ...) are sugar
/// for `FREQ=<token>;INTERVAL=1`.
pub fn parse(rule: &str) -> Result<RecurrenceRule, CoreError> {
    let rule = rule.trim();
    if rule.is_empty() {
        return Err(CoreError::Validation("recurrence rule is empty".into()));
    }

    let normalized = if !rule.contains('=') {
        format!("FREQ={rule};INTERVAL=1")
    } else {
        rule.to_string()
    };

    let mut freq: Option<Frequency> = None;
    let mut interval: u32 = 1;
    let mut by_day: Vec<Weekday> = Vec::new();
    let mut count: Option<u32> = None;
    let mut until: Option<DateTime<Utc>> = None;

    for part in normalized.split(';') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let Some((key, value)) = part.split_once('=') else {
            return Err(CoreError::Validation(format!(
                "malformed recurrence rule component '{part}'"
            )));
        };
        match key.to_uppercase().as_str() {
            "FREQ" => {
                freq = Some(Frequency::from_token(&value.to_uppercase()).ok_or_else(|| {
                    CoreError::Validation(format!("unknown FREQ value '{value}'"))
                })?);
            }
            "INTERVAL" => {
                interval = value
                    .parse()
                    .map_err(|_| CoreError::Validation(format!("invalid INTERVAL '{value}'")))?;
                if interval == 0 {
                    return Err(CoreError::Validation("INTERVAL must be at least 1".into()));
                }
            }
            "BYDAY" => {
                for token in value.split(',') {
                    let wd = weekday_from_token(&token.to_uppercase()).ok_or_else(|| {
                        CoreError::Validation(format!("invalid BYDAY token '{token}'"))
                    })?;
                    by_day.push(wd);
                }
            }
            "COUNT" => {
                count = Some(value.parse().map_err(|_| {
                    CoreError::Validation(format!("invalid COUNT '{value}'"))
                })?);
            }
            "UNTIL" => {
                until = Some(parse_until(value)?);
            }
            other => {
                return Err(CoreError::Validation(format!(
                    "unsupported recurrence rule component '{other}'"
                )));
            }
        }
    }

    let freq = freq.ok_or_else(|| CoreError::Validation("recurrence rule has no FREQ".into()))?;
    if !by_day.is_empty() && freq != Frequency::Weekly {
        return Err(CoreError::Validation(
            "BYDAY is only supported with FREQ=WEEKLY".into(),
        ));
    }

    Ok(RecurrenceRule {
        freq,
        interval,
        by_day,
        count,
        until,
    })
}

fn parse_until(value: &str) -> Result<DateTime<Utc>, CoreError> {
    // RFC-5545 basic-format UTC timestamp, e.g. 20260114T100000Z.
    chrono::NaiveDateTime::parse_from_str(value.trim_end_matches('Z'), "%Y%m%dT%H%M%S")
        .map(|naive| naive.and_utc())
        .map_err(|_| CoreError::Validation(format!("invalid UNTIL value '{value}'")))
}

pub fn validate(rule: &str) -> bool {
    parse(rule).is_ok()
}

fn add_months(date: NaiveDate, months: i64) -> NaiveDate {
    let total_months = date.year() as i64 * 12 + (date.month() as i64 - 1) + months;
    let year = (total_months.div_euclid(12)) as i32;
    let month = (total_months.rem_euclid(12)) as u32 + 1;
    let days_in_month = days_in_month(year, month);
    let day = date.day().min(days_in_month);
    NaiveDate::from_ymd_opt(year, month, day).expect("clamped day is always valid")
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .expect("valid next month");
    let first = NaiveDate::from_ymd_opt(year, month, 1).expect("valid first of month");
    (next - first).num_days() as u32
}

fn add_years(date: NaiveDate, years: i64) -> NaiveDate {
    add_months(date, years * 12)
}

/// Week index of `date` relative to `dtstart`'s week (Monday-aligned).
fn week_index(dtstart: DateTime<Utc>, date: DateTime<Utc>) -> i64 {
    let start_monday = dtstart.date_naive() - Duration::days(dtstart.weekday().num_days_from_monday() as i64);
    let date_monday = date.date_naive() - Duration::days(date.weekday().num_days_from_monday() as i64);
    (date_monday - start_monday).num_days() / 7
}

/// `next_after(rule, after_instant, dtstart) → instant?` — strictly later
/// than `after_instant`; `None` once COUNT/UNTIL exhaust the rule.
///
/// `dtstart` anchors the occurrence pattern itself (it is always a true
/// occurrence, occurrence_index 0), so a caller reporting an `after_instant`
/// earlier than `dtstart` — the Recurring Generator does this on early
/// completion, where `dtstart` is the due date just completed and
/// `after_instant` is the earlier `completed_at` — must still advance past
/// `dtstart`, not receive it back. We compare candidates against
/// `max(after, dtstart)` so `dtstart` itself is never returned as "next".
pub fn next_after(
    rule: &RecurrenceRule,
    after: DateTime<Utc>,
    dtstart: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let mut candidate = dtstart;
    let mut occurrence_index: u32 = 0;
    let interval = rule.interval.max(1) as i64;
    let effective_after = after.max(dtstart);

    for _ in 0..MAX_ITERATIONS {
        let matches_day = rule.by_day.is_empty()
            || (rule.by_day.contains(&candidate.weekday())
                && week_index(dtstart, candidate).rem_euclid(interval) == 0);

        if matches_day {
            if let Some(count) = rule.count {
                if occurrence_index >= count {
                    return None;
                }
            }
            if let Some(until) = rule.until {
                if candidate > until {
                    return None;
                }
            }
            if candidate > effective_after {
                return Some(candidate);
            }
            occurrence_index += 1;
        }

        candidate = step_forward(candidate, rule, interval);
    }

    None
}

fn step_forward(candidate: DateTime<Utc>, rule: &RecurrenceRule, interval: i64) -> DateTime<Utc> {
    match rule.freq {
        Frequency::Daily => candidate + Duration::days(interval),
        Frequency::Weekly => {
            if rule.by_day.is_empty() {
                candidate + Duration::weeks(interval)
            } else {
                candidate + Duration::days(1)
            }
        }
        Frequency::Monthly => {
            let next_date = add_months(candidate.date_naive(), interval);
            combine(next_date, candidate.time())
        }
        Frequency::Yearly => {
            let next_date = add_years(candidate.date_naive(), interval);
            combine(next_date, candidate.time())
        }
    }
}

fn combine(date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    date.and_time(time).and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn dt(y: i32, m: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, mi, 0).unwrap()
    }

    #[test]
    fn bare_token_is_sugar_for_freq_interval_one() {
        let rule = parse("DAILY").unwrap();
        assert_eq!(rule.freq, Frequency::Daily);
        assert_eq!(rule.interval, 1);
    }

    #[test]
    fn unknown_freq_is_rejected() {
        assert!(parse("FREQ=HOURLY").is_err());
        assert!(!validate("FREQ=HOURLY"));
    }

    #[test]
    fn daily_roll_forward() {
        // The Recurring Generator (§4.F) anchors dtstart on the completed
        // task's own due_date and passes that same instant as `after`, so
        // the just-completed occurrence is skipped and the *next* one comes
        // back — not the one that was just completed.
        let rule = parse("FREQ=DAILY;INTERVAL=1").unwrap();
        let due_date = dt(2026, 1, 14, 10, 0);
        let next = next_after(&rule, due_date, due_date).unwrap();
        assert_eq!(next, dt(2026, 1, 15, 10, 0));
    }

    #[test]
    fn early_completion_advances_past_dtstart() {
        // Spec §8 scenario 5: T0 due 2026-01-14T10:00:00Z is completed early
        // at 09:30:00Z. `dtstart` is T0's own due date, so the candidate
        // equal to `dtstart` is the occurrence that was just completed and
        // must not be returned again — the next real occurrence is expected.
        let rule = parse("FREQ=DAILY;INTERVAL=1").unwrap();
        let dtstart = dt(2026, 1, 14, 10, 0);
        let next = next_after(&rule, dt(2026, 1, 14, 9, 30), dtstart).unwrap();
        assert_eq!(next, dt(2026, 1, 15, 10, 0));
    }

    #[test]
    fn weekly_every_two_weeks() {
        let rule = parse("FREQ=WEEKLY;INTERVAL=2").unwrap();
        let dtstart = dt(2026, 1, 5, 9, 0); // Monday
        let next = next_after(&rule, dtstart, dtstart).unwrap();
        assert_eq!(next, dt(2026, 1, 19, 9, 0));
    }

    #[test]
    fn weekly_byday_picks_next_matching_weekday() {
        let rule = parse("FREQ=WEEKLY;INTERVAL=1;BYDAY=MO,WE,FR").unwrap();
        let dtstart = dt(2026, 1, 5, 9, 0); // Monday
        let next = next_after(&rule, dtstart, dtstart).unwrap();
        assert_eq!(next, dt(2026, 1, 7, 9, 0)); // Wednesday
    }

    #[test]
    fn monthly_clamps_short_months() {
        let rule = parse("FREQ=MONTHLY;INTERVAL=1").unwrap();
        let dtstart = dt(2026, 1, 31, 10, 0);
        let next = next_after(&rule, dtstart, dtstart).unwrap();
        // February 2026 has 28 days.
        assert_eq!(next, dt(2026, 2, 28, 10, 0));
    }

    #[test]
    fn count_exhausts_the_rule() {
        let rule = parse("FREQ=DAILY;INTERVAL=1;COUNT=2").unwrap();
        let dtstart = dt(2026, 1, 1, 0, 0);
        // Occurrence 1 = dtstart, occurrence 2 = dtstart + 1 day.
        let second = next_after(&rule, dtstart, dtstart).unwrap();
        assert_eq!(second, dt(2026, 1, 2, 0, 0));
        assert!(next_after(&rule, second, dtstart).is_none());
    }

    #[test]
    fn until_exhausts_the_rule() {
        let rule = parse("FREQ=DAILY;INTERVAL=1;UNTIL=20260102T000000Z").unwrap();
        let dtstart = dt(2026, 1, 1, 0, 0);
        assert!(next_after(&rule, dt(2026, 1, 2, 0, 0), dtstart).is_none());
    }
}
