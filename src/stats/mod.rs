//! Rolling weekly statistics over fasting sessions.
//!
//! Days are bucketed on the client's wall clock: an instant is shifted by the
//! client's UTC offset and floored to midnight, and the resulting epoch
//! milliseconds serve as an integer *day key*. Keys are compared as plain
//! integers, so no timezone database is involved.

use serde::Serialize;
use thiserror::Error;

use crate::db::duration_minutes;

pub const MINUTE_MS: i64 = 60_000;
pub const DAY_MS: i64 = 24 * 60 * MINUTE_MS;

/// Days in the stats window, today included.
pub const WINDOW_DAYS: i64 = 7;

/// Longest streak lookback, today included.
pub const STREAK_LOOKBACK_DAYS: i64 = 365;

pub const MIN_OFFSET_MINUTES: i64 = -12 * 60;
pub const MAX_OFFSET_MINUTES: i64 = 14 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("tzOffsetMinutes must be between {min} and {max}", min = MIN_OFFSET_MINUTES, max = MAX_OFFSET_MINUTES)]
pub struct OffsetOutOfRange(pub i64);

/// A client's offset from UTC in minutes, within [-720, 840].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TzOffset(i64);

impl TzOffset {
    pub fn new(minutes: i64) -> Result<Self, OffsetOutOfRange> {
        if (MIN_OFFSET_MINUTES..=MAX_OFFSET_MINUTES).contains(&minutes) {
            Ok(Self(minutes))
        } else {
            Err(OffsetOutOfRange(minutes))
        }
    }

    pub fn minutes(&self) -> i64 {
        self.0
    }

    fn millis(&self) -> i64 {
        self.0 * MINUTE_MS
    }
}

/// The timing fields of one session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSpan {
    pub start_at: i64,
    pub end_at: Option<i64>,
    pub duration_mins: Option<i64>,
}

impl SessionSpan {
    /// Stored duration when present, else measured up to the end or `now_ms`.
    pub fn minutes(&self, now_ms: i64) -> i64 {
        match self.duration_mins {
            Some(mins) => mins,
            None => duration_minutes(self.start_at, self.end_at.unwrap_or(now_ms)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyStats {
    pub total_hours: f64,
    pub avg_hours: f64,
    pub streak: u32,
}

/// Key of the local midnight that starts the day containing `instant_ms`.
pub fn local_day_key(instant_ms: i64, offset: TzOffset) -> i64 {
    let local = instant_ms + offset.millis();
    local - local.rem_euclid(DAY_MS)
}

/// UTC instant of local midnight `days_back` days before today.
fn local_midnight_before(now_ms: i64, offset: TzOffset, days_back: i64) -> i64 {
    local_day_key(now_ms, offset) - days_back * DAY_MS - offset.millis()
}

/// First instant of the weekly window.
pub fn window_start(now_ms: i64, offset: TzOffset) -> i64 {
    local_midnight_before(now_ms, offset, WINDOW_DAYS - 1)
}

/// First instant the streak walk can reach.
pub fn streak_start(now_ms: i64, offset: TzOffset) -> i64 {
    local_midnight_before(now_ms, offset, STREAK_LOOKBACK_DAYS - 1)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Consecutive local days ending today that contain a session start.
pub fn streak(starts: &[i64], now_ms: i64, offset: TzOffset) -> u32 {
    let days: std::collections::HashSet<i64> =
        starts.iter().map(|s| local_day_key(*s, offset)).collect();
    let today = local_day_key(now_ms, offset);

    let mut streak = 0;
    for i in 0..STREAK_LOOKBACK_DAYS {
        if days.contains(&(today - i * DAY_MS)) {
            streak += 1;
        } else {
            break;
        }
    }
    streak
}

/// Aggregate the weekly window.
///
/// `window` holds the sessions starting at or after [`window_start`];
/// `streak_starts` holds every start at or after [`streak_start`].
pub fn weekly_stats(
    window: &[SessionSpan],
    streak_starts: &[i64],
    now_ms: i64,
    offset: TzOffset,
) -> WeeklyStats {
    let total_mins: i64 = window.iter().map(|s| s.minutes(now_ms)).sum();

    let total_hours = round1(total_mins as f64 / 60.0);
    let avg_hours = round1(total_hours / WINDOW_DAYS as f64);

    WeeklyStats {
        total_hours,
        avg_hours,
        streak: streak(streak_starts, now_ms, offset),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR_MS: i64 = 60 * MINUTE_MS;

    // 2024-03-15T12:00:00Z
    const NOW: i64 = 1_710_504_000_000;

    fn utc() -> TzOffset {
        TzOffset::default()
    }

    fn closed(start_at: i64, hours: i64) -> SessionSpan {
        SessionSpan {
            start_at,
            end_at: Some(start_at + hours * HOUR_MS),
            duration_mins: Some(hours * 60),
        }
    }

    #[test]
    fn test_offset_bounds() {
        assert!(TzOffset::new(-720).is_ok());
        assert!(TzOffset::new(840).is_ok());
        assert!(TzOffset::new(-721).is_err());
        assert!(TzOffset::new(841).is_err());
        assert_eq!(TzOffset::new(330).unwrap().minutes(), 330);
    }

    #[test]
    fn test_day_key_respects_offset() {
        // 2024-03-15T23:30:00Z is already the 16th at UTC+2
        let late = 1_710_545_400_000;
        let utc_key = local_day_key(late, utc());
        let plus_two = local_day_key(late, TzOffset::new(120).unwrap());
        assert_eq!(plus_two - utc_key, DAY_MS);
    }

    #[test]
    fn test_day_key_before_epoch() {
        assert_eq!(local_day_key(-1, utc()), -DAY_MS);
        assert_eq!(local_day_key(0, utc()), 0);
    }

    #[test]
    fn test_window_start_is_local_midnight() {
        let start = window_start(NOW, utc());
        assert_eq!(start, local_day_key(NOW, utc()) - 6 * DAY_MS);

        // UTC-5: local today is still the 15th; local midnight is 05:00Z
        let ny = TzOffset::new(-300).unwrap();
        let start = window_start(NOW, ny);
        assert_eq!(start.rem_euclid(DAY_MS), 5 * HOUR_MS);
    }

    #[test]
    fn test_streak_start_covers_lookback() {
        let start = streak_start(NOW, utc());
        assert_eq!(local_day_key(NOW, utc()) - start, 364 * DAY_MS);
    }

    #[test]
    fn test_empty_window() {
        let stats = weekly_stats(&[], &[], NOW, utc());
        assert_eq!(
            stats,
            WeeklyStats {
                total_hours: 0.0,
                avg_hours: 0.0,
                streak: 0
            }
        );
    }

    #[test]
    fn test_streak_stops_at_gap() {
        let today = local_day_key(NOW, utc());
        let starts = vec![
            today + HOUR_MS,
            today - DAY_MS + 3 * HOUR_MS,
            today - 3 * DAY_MS,
        ];
        assert_eq!(streak(&starts, NOW, utc()), 2);
    }

    #[test]
    fn test_streak_needs_today() {
        let today = local_day_key(NOW, utc());
        let starts = vec![today - DAY_MS, today - 2 * DAY_MS];
        assert_eq!(streak(&starts, NOW, utc()), 0);
    }

    #[test]
    fn test_streak_counts_start_day_only() {
        // A 30 hour fast started yesterday counts yesterday, not today
        let today = local_day_key(NOW, utc());
        let starts = vec![today - DAY_MS + HOUR_MS];
        assert_eq!(streak(&starts, NOW, utc()), 0);
    }

    #[test]
    fn test_streak_beyond_window() {
        let today = local_day_key(NOW, utc());
        let starts: Vec<i64> = (0..10).map(|d| today - d * DAY_MS + HOUR_MS).collect();
        assert_eq!(streak(&starts, NOW, utc()), 10);
    }

    #[test]
    fn test_streak_capped() {
        let today = local_day_key(NOW, utc());
        let starts: Vec<i64> = (0..400).map(|d| today - d * DAY_MS).collect();
        assert_eq!(streak(&starts, NOW, utc()), 365);
    }

    #[test]
    fn test_totals_and_average() {
        let today = local_day_key(NOW, utc());
        let window = vec![closed(today - DAY_MS, 12), closed(today - 2 * DAY_MS, 8)];
        let stats = weekly_stats(&window, &[], NOW, utc());

        assert_eq!(stats.total_hours, 20.0);
        assert_eq!(stats.avg_hours, 2.9);
    }

    #[test]
    fn test_total_rounds_to_one_decimal() {
        let window = vec![SessionSpan {
            start_at: NOW - DAY_MS,
            end_at: None,
            duration_mins: Some(100),
        }];
        let stats = weekly_stats(&window, &[], NOW, utc());
        assert_eq!(stats.total_hours, 1.7);
        assert_eq!(stats.avg_hours, 0.2);
    }

    #[test]
    fn test_active_session_measured_against_now() {
        let active = SessionSpan {
            start_at: NOW - 90 * MINUTE_MS,
            end_at: None,
            duration_mins: None,
        };
        assert_eq!(active.minutes(NOW), 90);
        assert_eq!(active.minutes(NOW + MINUTE_MS), 91);

        let stats = weekly_stats(&[active], &[active.start_at], NOW, utc());
        assert_eq!(stats.total_hours, 1.5);
        assert_eq!(stats.streak, 1);
    }

    #[test]
    fn test_closed_session_without_stored_duration() {
        let span = SessionSpan {
            start_at: 0,
            end_at: Some(8 * HOUR_MS + 30 * MINUTE_MS),
            duration_mins: None,
        };
        assert_eq!(span.minutes(NOW), 510);
    }

    #[test]
    fn test_stats_serialize_camel_case() {
        let json = serde_json::to_value(WeeklyStats {
            total_hours: 1.5,
            avg_hours: 0.2,
            streak: 3,
        })
        .unwrap();
        assert_eq!(json["totalHours"], 1.5);
        assert_eq!(json["avgHours"], 0.2);
        assert_eq!(json["streak"], 3);
    }
}
