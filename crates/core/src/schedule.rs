//! Trigger schedule validation and next-fire computation.
//!
//! All computation happens in the trigger's configured IANA timezone via
//! `chrono-tz`, so a "09:00 daily" trigger fires at 09:00 local time year
//! round, including across DST changes. A ~60-second grace window treats a
//! local time that just passed as already fired, preventing a trigger from
//! re-firing immediately after the poller advances its schedule.

use chrono::{DateTime, Datelike, Days, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A local time within this many seconds of "now" counts as already
/// fired when computing the next occurrence.
pub const ALREADY_FIRED_GRACE_SECS: i64 = 60;

/// How many days forward a weekday scan looks before giving up. Eight
/// days covers a full week plus the today/tomorrow boundary.
const MAX_SCAN_DAYS: u64 = 8;

/// How often a trigger fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    Weekly,
    SpecificDays,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::SpecificDays => "specific_days",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "specific_days" => Ok(Frequency::SpecificDays),
            other => Err(CoreError::Validation(format!(
                "Unknown frequency \"{other}\"; must be daily, weekly or specific_days"
            ))),
        }
    }

    /// Weekly and specific-days schedules need a weekday set.
    pub fn needs_days(&self) -> bool {
        matches!(self, Frequency::Weekly | Frequency::SpecificDays)
    }
}

/// A validated schedule: frequency, weekday set (0 = Sunday), local time
/// of day, and IANA timezone.
#[derive(Debug, Clone)]
pub struct Schedule {
    pub frequency: Frequency,
    pub days: Vec<i16>,
    pub time_of_day: NaiveTime,
    pub timezone: Tz,
}

impl Schedule {
    /// Parse and validate raw schedule configuration.
    ///
    /// `time` must be 24-hour `HH:MM`; `days` must be distinct integers in
    /// `0..=6` (0 = Sunday) and non-empty for weekly/specific_days.
    pub fn parse(
        frequency: &str,
        days: &[i16],
        time: &str,
        timezone: &str,
    ) -> Result<Self, CoreError> {
        let frequency = Frequency::parse(frequency)?;

        let time_of_day = NaiveTime::parse_from_str(time, "%H:%M").map_err(|_| {
            CoreError::Validation(format!("Invalid time \"{time}\"; expected 24-hour HH:MM"))
        })?;

        let timezone: Tz = timezone.parse().map_err(|_| {
            CoreError::Validation(format!("Unknown timezone \"{timezone}\""))
        })?;

        if frequency.needs_days() {
            if days.is_empty() {
                return Err(CoreError::Validation(format!(
                    "Frequency \"{}\" requires at least one weekday",
                    frequency.as_str()
                )));
            }
        }
        let mut seen = [false; 7];
        for &day in days {
            if !(0..=6).contains(&day) {
                return Err(CoreError::Validation(format!(
                    "Weekday {day} out of range; expected 0 (Sunday) through 6 (Saturday)"
                )));
            }
            if seen[day as usize] {
                return Err(CoreError::Validation(format!("Duplicate weekday {day}")));
            }
            seen[day as usize] = true;
        }

        Ok(Self {
            frequency,
            days: days.to_vec(),
            time_of_day,
            timezone,
        })
    }

    /// Compute the next fire time strictly after `now` (plus the grace
    /// window), in UTC.
    pub fn next_trigger_at(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, CoreError> {
        let local_now = now.with_timezone(&self.timezone);
        let grace = chrono::Duration::seconds(ALREADY_FIRED_GRACE_SECS);

        for offset in 0..MAX_SCAN_DAYS {
            let date = local_now
                .date_naive()
                .checked_add_days(Days::new(offset))
                .ok_or_else(|| CoreError::Internal("date overflow".into()))?;

            if self.frequency.needs_days() {
                let weekday = date.weekday().num_days_from_sunday() as i16;
                if !self.days.contains(&weekday) {
                    continue;
                }
            }

            let naive = date.and_time(self.time_of_day);
            // On a DST gap the local time does not exist; skip to the
            // next candidate day.
            let Some(candidate) = self.timezone.from_local_datetime(&naive).earliest() else {
                continue;
            };

            let candidate_utc = candidate.with_timezone(&Utc);
            if candidate_utc > now + grace {
                return Ok(candidate_utc);
            }
        }

        Err(CoreError::Internal(format!(
            "No valid occurrence within {MAX_SCAN_DAYS} days for schedule at {}",
            self.time_of_day
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn daily(time: &str, tz: &str) -> Schedule {
        Schedule::parse("daily", &[], time, tz).unwrap()
    }

    // -- parsing --------------------------------------------------------------

    #[test]
    fn parses_valid_daily_schedule() {
        let s = daily("09:00", "America/New_York");
        assert_eq!(s.frequency, Frequency::Daily);
        assert_eq!(s.time_of_day.hour(), 9);
    }

    #[test]
    fn rejects_non_hhmm_time() {
        assert!(Schedule::parse("daily", &[], "9am", "UTC").is_err());
        assert!(Schedule::parse("daily", &[], "25:00", "UTC").is_err());
    }

    #[test]
    fn rejects_unknown_timezone() {
        assert!(Schedule::parse("daily", &[], "09:00", "Mars/Olympus").is_err());
    }

    #[test]
    fn rejects_unknown_frequency() {
        assert!(Schedule::parse("hourly", &[], "09:00", "UTC").is_err());
    }

    #[test]
    fn weekly_requires_days() {
        assert!(Schedule::parse("weekly", &[], "09:00", "UTC").is_err());
        assert!(Schedule::parse("specific_days", &[], "09:00", "UTC").is_err());
        assert!(Schedule::parse("weekly", &[1], "09:00", "UTC").is_ok());
    }

    #[test]
    fn rejects_out_of_range_and_duplicate_days() {
        assert!(Schedule::parse("specific_days", &[7], "09:00", "UTC").is_err());
        assert!(Schedule::parse("specific_days", &[-1], "09:00", "UTC").is_err());
        assert!(Schedule::parse("specific_days", &[1, 1], "09:00", "UTC").is_err());
    }

    // -- daily ----------------------------------------------------------------

    #[test]
    fn daily_before_time_fires_today() {
        // 2025-06-10 08:00 New York == 12:00 UTC (EDT, UTC-4).
        let s = daily("09:00", "America/New_York");
        let next = s.next_trigger_at(utc("2025-06-10T12:00:00Z")).unwrap();
        assert_eq!(next, utc("2025-06-10T13:00:00Z")); // today 09:00 EDT
    }

    #[test]
    fn daily_after_time_fires_tomorrow() {
        // 2025-06-10 10:00 New York == 14:00 UTC.
        let s = daily("09:00", "America/New_York");
        let next = s.next_trigger_at(utc("2025-06-10T14:00:00Z")).unwrap();
        assert_eq!(next, utc("2025-06-11T13:00:00Z")); // tomorrow 09:00 EDT
    }

    #[test]
    fn daily_within_grace_rolls_to_next_day() {
        // 30 seconds before the configured time: still inside the
        // already-fired grace window, so the next fire is tomorrow.
        let s = daily("09:00", "UTC");
        let next = s.next_trigger_at(utc("2025-06-10T08:59:30Z")).unwrap();
        assert_eq!(next, utc("2025-06-11T09:00:00Z"));
    }

    #[test]
    fn daily_respects_timezone_offset() {
        // 09:00 in Berlin (CEST, UTC+2) is 07:00 UTC.
        let s = daily("09:00", "Europe/Berlin");
        let next = s.next_trigger_at(utc("2025-06-10T00:00:00Z")).unwrap();
        assert_eq!(next, utc("2025-06-10T07:00:00Z"));
    }

    // -- weekly / specific days ----------------------------------------------

    #[test]
    fn specific_days_scans_to_next_listed_weekday() {
        // 2025-06-10 is a Tuesday. Days {Mon=1, Fri=5} at 18:00 New York:
        // next occurrence is Friday 2025-06-13 18:00 EDT == 22:00 UTC.
        let s = Schedule::parse("specific_days", &[1, 5], "18:00", "America/New_York").unwrap();
        let next = s.next_trigger_at(utc("2025-06-10T16:00:00Z")).unwrap();
        assert_eq!(next, utc("2025-06-13T22:00:00Z"));
    }

    #[test]
    fn specific_days_same_day_when_time_ahead() {
        // Tuesday 08:00 UTC, trigger {Tue=2} at 09:00 UTC: fires today.
        let s = Schedule::parse("specific_days", &[2], "09:00", "UTC").unwrap();
        let next = s.next_trigger_at(utc("2025-06-10T08:00:00Z")).unwrap();
        assert_eq!(next, utc("2025-06-10T09:00:00Z"));
    }

    #[test]
    fn specific_days_same_weekday_rolls_a_full_week() {
        // Tuesday 10:00 UTC, trigger {Tue=2} at 09:00: next Tuesday.
        let s = Schedule::parse("specific_days", &[2], "09:00", "UTC").unwrap();
        let next = s.next_trigger_at(utc("2025-06-10T10:00:00Z")).unwrap();
        assert_eq!(next, utc("2025-06-17T09:00:00Z"));
    }

    #[test]
    fn weekly_behaves_like_single_day_specific() {
        let s = Schedule::parse("weekly", &[0], "12:00", "UTC").unwrap();
        // 2025-06-10 is Tuesday; next Sunday is 2025-06-15.
        let next = s.next_trigger_at(utc("2025-06-10T00:00:00Z")).unwrap();
        assert_eq!(next, utc("2025-06-15T12:00:00Z"));
    }
}
