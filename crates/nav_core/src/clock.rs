//! Local time for Lagos and the time-of-day context used by predictions.

use chrono::{DateTime, Datelike, FixedOffset, Offset, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// West Africa Time, UTC+1, no daylight saving.
pub const LAGOS_UTC_OFFSET_SECS: i32 = 3600;

pub fn lagos_offset() -> FixedOffset {
    // 3600 is always within the valid +-86_400 range.
    FixedOffset::east_opt(LAGOS_UTC_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

pub fn lagos_now() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&lagos_offset())
}

/// Half-open hour window `[start_hour, end_hour)` in local time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl HourWindow {
    pub const fn new(start_hour: u32, end_hour: u32) -> Self {
        Self {
            start_hour,
            end_hour,
        }
    }

    pub fn contains(&self, hour: u32) -> bool {
        if self.start_hour <= self.end_hour {
            (self.start_hour..self.end_hour).contains(&hour)
        } else {
            // Wraps midnight, e.g. 22..2.
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

/// Morning and evening peaks on Lagos commuter corridors.
pub fn default_rush_windows() -> Vec<HourWindow> {
    vec![HourWindow::new(7, 10), HourWindow::new(16, 20)]
}

/// Calendar facts about a departure time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeContext {
    pub hour: u32,
    /// 0 = Monday ... 6 = Sunday.
    pub day_of_week: u32,
    pub is_rush_hour: bool,
    pub is_weekend: bool,
}

impl TimeContext {
    pub fn at(when: DateTime<FixedOffset>, rush_windows: &[HourWindow]) -> Self {
        let hour = when.hour();
        let weekday = when.weekday();
        Self {
            hour,
            day_of_week: weekday.num_days_from_monday(),
            is_rush_hour: rush_windows.iter().any(|window| window.contains(hour)),
            is_weekend: matches!(weekday, Weekday::Sat | Weekday::Sun),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn lagos(y: i32, m: u32, d: u32, h: u32) -> DateTime<FixedOffset> {
        lagos_offset()
            .with_ymd_and_hms(y, m, d, h, 15, 0)
            .single()
            .expect("valid local time")
    }

    #[test]
    fn weekday_morning_rush() {
        // 2026-10-12 is a Monday.
        let ctx = TimeContext::at(lagos(2026, 10, 12, 8), &default_rush_windows());
        assert_eq!(ctx.hour, 8);
        assert_eq!(ctx.day_of_week, 0);
        assert!(ctx.is_rush_hour);
        assert!(!ctx.is_weekend);
    }

    #[test]
    fn rush_window_end_is_exclusive() {
        let ctx = TimeContext::at(lagos(2026, 10, 12, 10), &default_rush_windows());
        assert!(!ctx.is_rush_hour);
        let ctx = TimeContext::at(lagos(2026, 10, 12, 16), &default_rush_windows());
        assert!(ctx.is_rush_hour);
    }

    #[test]
    fn saturday_is_weekend() {
        let ctx = TimeContext::at(lagos(2026, 10, 17, 12), &default_rush_windows());
        assert_eq!(ctx.day_of_week, 5);
        assert!(ctx.is_weekend);
    }

    #[test]
    fn wrapping_window() {
        let night = HourWindow::new(22, 2);
        assert!(night.contains(23));
        assert!(night.contains(1));
        assert!(!night.contains(2));
        assert!(!night.contains(12));
    }

    #[test]
    fn utc_is_shifted_to_local_hour() {
        let utc = Utc
            .with_ymd_and_hms(2026, 10, 12, 23, 30, 0)
            .single()
            .expect("valid");
        let local = utc.with_timezone(&lagos_offset());
        let ctx = TimeContext::at(local, &[]);
        assert_eq!(ctx.hour, 0);
        assert_eq!(ctx.day_of_week, 1);
    }
}
