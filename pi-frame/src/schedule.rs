//! When to wake up next.

use crate::{FrameError, Result};
use chrono::{DateTime, Duration, NaiveDateTime, NaiveTime, TimeZone, Timelike};
use cron::Schedule;
use log::debug;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Hours of the day, both ends included, during which the frame refreshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveHours {
    pub start: u32,
    pub end: u32,
}

impl Default for ActiveHours {
    fn default() -> Self {
        Self { start: 9, end: 23 }
    }
}

impl ActiveHours {
    pub fn validate(&self) -> Result<()> {
        if self.start > self.end || self.end > 23 {
            return Err(FrameError::Config(format!(
                "invalid active_hours {}-{}",
                self.start, self.end
            )));
        }
        Ok(())
    }
}

const DAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

fn day_number(s: &str) -> Result<u32> {
    s.parse()
        .ok()
        .filter(|&day| day <= 7)
        .ok_or_else(|| FrameError::Config(format!("invalid day of week `{}`", s)))
}

/// Rewrite a classic day-of-week field (0 or 7 is Sunday) with day names,
/// which read the same under the 1-based numbering of `cron`.
fn day_of_week(field: &str) -> Result<String> {
    if field == "*" || field == "?" {
        return Ok(field.to_owned());
    }
    let mut items = Vec::new();
    let mut days = [false; 7];
    for item in field.split(',') {
        if item.chars().any(|c| c.is_ascii_alphabetic()) {
            items.push(item.to_owned());
            continue;
        }
        let (range, step) = match item.split_once('/') {
            Some((range, step)) => (range, Some(step)),
            None => (item, None),
        };
        let step = match step {
            Some(step) => step
                .parse::<usize>()
                .ok()
                .filter(|&step| step > 0)
                .ok_or_else(|| FrameError::Config(format!("invalid step in `{}`", item)))?,
            None => 1,
        };
        let (start, end) = match range.split_once('-') {
            _ if range == "*" => (0, 6),
            Some((start, end)) => (day_number(start)?, day_number(end)?),
            // `n/step` runs to the end of the week.
            None if item.contains('/') => (day_number(range)?, 6),
            None => {
                let day = day_number(range)?;
                (day, day)
            }
        };
        if start > end {
            return Err(FrameError::Config(format!("invalid day range `{}`", item)));
        }
        for day in (start..=end).step_by(step) {
            days[day as usize % 7] = true;
        }
    }
    items.extend(
        days.iter()
            .zip(DAY_NAMES)
            .filter(|(set, _)| **set)
            .map(|(_, name)| name.to_owned()),
    );
    Ok(items.join(","))
}

/// Parse a cron expression. Classic 5-field expressions get a seconds field
/// and keep their day-of-week meaning.
pub fn parse_schedule(expression: &str) -> Result<Schedule> {
    let fields: Vec<&str> = expression.split_whitespace().collect();
    let schedule = if let &[minute, hour, day, month, weekday] = fields.as_slice() {
        Schedule::from_str(&format!(
            "0 {} {} {} {} {}",
            minute,
            hour,
            day,
            month,
            day_of_week(weekday)?
        ))?
    } else {
        Schedule::from_str(expression.trim())?
    };
    Ok(schedule)
}

/// The top of the next hour, moved to the start of the active hours when it
/// falls outside them.
pub fn next_hourly(now: NaiveDateTime, hours: ActiveHours) -> NaiveDateTime {
    let midnight = now.date().and_time(NaiveTime::MIN);
    let next = midnight + Duration::hours(now.hour() as i64 + 1);
    let day = next.date().and_time(NaiveTime::MIN);
    if next.hour() < hours.start {
        day + Duration::hours(hours.start as i64)
    } else if next.hour() > hours.end {
        day + Duration::days(1) + Duration::hours(hours.start as i64)
    } else {
        next
    }
}

#[derive(Debug, Clone)]
pub enum WakePolicy {
    Cron(Box<Schedule>),
    Hourly(ActiveHours),
}

impl WakePolicy {
    /// A cron schedule when one is configured, hourly otherwise.
    pub fn new(schedule: Option<&str>, active_hours: ActiveHours) -> Result<Self> {
        match schedule {
            Some(expression) => Ok(Self::Cron(Box::new(parse_schedule(expression)?))),
            None => {
                active_hours.validate()?;
                Ok(Self::Hourly(active_hours))
            }
        }
    }

    /// Local wall-clock time of the next wake up strictly after `now`.
    pub fn next_wake<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<NaiveDateTime> {
        let wakeup = match self {
            Self::Cron(schedule) => schedule
                .after(now)
                .next()
                .map(|wakeup| wakeup.naive_local())
                .ok_or_else(|| FrameError::Config("schedule never fires again".into()))?,
            Self::Hourly(hours) => next_hourly(now.naive_local(), *hours),
        };
        debug!("Next wake up at {}", wakeup);
        Ok(wakeup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, NaiveDate, Utc, Weekday};
    use tokio_test::{assert_err, assert_ok};

    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 12, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn hourly() {
        let hours = ActiveHours::default();
        assert_eq!(next_hourly(at(6, 10, 15), hours), at(6, 11, 0));
        assert_eq!(next_hourly(at(6, 8, 30), hours), at(6, 9, 0));
        assert_eq!(next_hourly(at(6, 22, 59), hours), at(6, 23, 0));
        assert_eq!(next_hourly(at(6, 23, 30), hours), at(7, 9, 0));
        assert_eq!(next_hourly(at(6, 2, 0), hours), at(6, 9, 0));

        let hours = ActiveHours { start: 7, end: 20 };
        assert_eq!(next_hourly(at(6, 20, 0), hours), at(7, 7, 0));
        assert_eq!(next_hourly(at(31, 21, 45), hours), NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_opt(7, 0, 0)
            .unwrap());
    }

    #[test]
    fn active_hours() {
        assert_ok!(ActiveHours::default().validate());
        assert_ok!(ActiveHours { start: 0, end: 0 }.validate());
        assert_err!(ActiveHours { start: 10, end: 9 }.validate());
        assert_err!(ActiveHours { start: 9, end: 24 }.validate());
    }

    #[test]
    fn cron() {
        let policy = assert_ok!(WakePolicy::new(Some("0 9-23 * * *"), ActiveHours::default()));
        let now = Utc.from_utc_datetime(&at(6, 23, 30));
        assert_eq!(assert_ok!(policy.next_wake(&now)), at(7, 9, 0));
        let now = Utc.from_utc_datetime(&at(6, 12, 0));
        assert_eq!(assert_ok!(policy.next_wake(&now)), at(6, 13, 0));

        let policy = assert_ok!(WakePolicy::new(Some("0 */30 8 * * *"), ActiveHours::default()));
        let now = Utc.from_utc_datetime(&at(6, 8, 10));
        assert_eq!(assert_ok!(policy.next_wake(&now)), at(6, 8, 30));

        assert!(WakePolicy::new(Some("every hour"), ActiveHours::default()).is_err());
    }

    #[test]
    fn classic_day_of_week() {
        assert_eq!(assert_ok!(day_of_week("1-5")), "Mon,Tue,Wed,Thu,Fri");
        assert_eq!(assert_ok!(day_of_week("0")), "Sun");
        assert_eq!(assert_ok!(day_of_week("7")), "Sun");
        assert_eq!(assert_ok!(day_of_week("5-7")), "Sun,Fri,Sat");
        assert_eq!(assert_ok!(day_of_week("*/2")), "Sun,Tue,Thu,Sat");
        assert_eq!(assert_ok!(day_of_week("1/3")), "Mon,Thu");
        assert_eq!(assert_ok!(day_of_week("6,0")), "Sun,Sat");
        assert_eq!(assert_ok!(day_of_week("Mon-Fri")), "Mon-Fri");
        assert_eq!(assert_ok!(day_of_week("*")), "*");
        assert_err!(day_of_week("8"));
        assert_err!(day_of_week("5-1"));
        assert_err!(day_of_week("*/0"));
    }

    #[test]
    fn cron_weekdays() {
        // Friday night.
        let now = Utc.from_utc_datetime(&at(6, 23, 30));

        let policy = assert_ok!(WakePolicy::new(Some("0 9 * * 1-5"), ActiveHours::default()));
        let wakeup = assert_ok!(policy.next_wake(&now));
        assert_eq!(wakeup, at(9, 9, 0));
        assert_eq!(wakeup.weekday(), Weekday::Mon);

        for sunday in ["0 9 * * 0", "0 9 * * 7"] {
            let policy = assert_ok!(WakePolicy::new(Some(sunday), ActiveHours::default()));
            let wakeup = assert_ok!(policy.next_wake(&now));
            assert_eq!(wakeup, at(8, 9, 0));
            assert_eq!(wakeup.weekday(), Weekday::Sun);
        }

        let policy = assert_ok!(WakePolicy::new(Some("30 8 * * 6"), ActiveHours::default()));
        assert_eq!(assert_ok!(policy.next_wake(&now)), at(7, 8, 30));
    }

    #[test]
    fn hourly_policy() {
        let policy = assert_ok!(WakePolicy::new(None, ActiveHours::default()));
        let now = Utc.from_utc_datetime(&at(6, 10, 15));
        assert_eq!(assert_ok!(policy.next_wake(&now)), at(6, 11, 0));
        assert!(WakePolicy::new(None, ActiveHours { start: 5, end: 2 }).is_err());
    }
}
