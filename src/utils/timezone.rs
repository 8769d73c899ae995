use anyhow::{Context, Result};
use chrono::{Duration, NaiveDateTime, Utc};
use chrono_tz::Tz;

use crate::constants;

/// Clock for the plant the operator works in, plus the offset the remote MES
/// applies when it renders transaction timestamps. The deployed remote runs
/// on UTC and displays +9h, so stamps sent to it must be pre-shifted.
#[derive(Clone, Debug)]
pub struct PlantClock {
    tz: Tz,
    display_offset: Duration,
}

impl PlantClock {
    pub fn new(tz: Tz, display_offset_hours: i64) -> Self {
        Self {
            tz,
            display_offset: Duration::hours(display_offset_hours),
        }
    }

    /// Build from `MES_PLANT_TZ` / `MES_DISPLAY_UTC_OFFSET_HOURS`.
    pub fn from_env() -> Result<Self> {
        let tz_name =
            std::env::var("MES_PLANT_TZ").unwrap_or_else(|_| constants::DEFAULT_PLANT_TZ.to_string());
        let tz: Tz = tz_name
            .parse()
            .ok()
            .with_context(|| format!("Invalid MES_PLANT_TZ: {tz_name}"))?;
        let offset_hours = std::env::var("MES_DISPLAY_UTC_OFFSET_HOURS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(constants::DEFAULT_DISPLAY_UTC_OFFSET_HOURS);
        Ok(Self::new(tz, offset_hours))
    }

    /// Current wall-clock time at the plant.
    pub fn now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.tz).naive_local()
    }

    /// Plant time shifted into the remote system's displayed clock.
    pub fn display_time(&self, plant_now: NaiveDateTime) -> NaiveDateTime {
        plant_now + self.display_offset
    }

    /// `YYYY-MM-DD HH:MM:SS`, the format every save endpoint expects.
    pub fn stamp(dt: NaiveDateTime) -> String {
        dt.format("%Y-%m-%d %H:%M:%S").to_string()
    }

    /// `YYYY-MM-DD` for list filters and numbering-rule base dates.
    pub fn ymd(dt: NaiveDateTime) -> String {
        dt.format("%Y-%m-%d").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_display_time_shift() {
        let clock = PlantClock::new(chrono_tz::Asia::Seoul, 9);
        let base = NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(20, 30, 0)
            .unwrap();
        let shifted = clock.display_time(base);
        assert_eq!(PlantClock::stamp(shifted), "2024-03-16 05:30:00");
    }

    #[test]
    fn test_stamp_formats() {
        let dt = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        assert_eq!(PlantClock::stamp(dt), "2024-01-02 03:04:05");
        assert_eq!(PlantClock::ymd(dt), "2024-01-02");
    }

    #[test]
    fn test_zero_offset_is_identity() {
        let clock = PlantClock::new(chrono_tz::Asia::Seoul, 0);
        let now = clock.now();
        assert_eq!(clock.display_time(now), now);
    }
}
