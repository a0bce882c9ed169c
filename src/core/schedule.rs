use std::fmt::{Debug, Formatter};

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;

use crate::core::error::ScheduleError;

pub const DEFAULT_TIME_ZONE: &str = "Europe/Amsterdam";

pub const DEFAULT_NEW_PRICES_HOUR: u32 = 6;

/// Daily refresh policy: new prices appear at `new_prices_hour:00` local time.
///
/// Everything is computed in local calendar terms, so a day spans 23 or 25 hours across
/// daylight-saving transitions.
#[derive(Copy, Clone, Debug)]
pub struct ScheduleClock {
    time_zone: Tz,
    new_prices_hour: u32,
}

impl ScheduleClock {
    pub fn try_new(time_zone: &str, new_prices_hour: u32) -> Result<Self, ScheduleError> {
        let time_zone = time_zone
            .parse::<Tz>()
            .map_err(|_| ScheduleError::InvalidTimeZone(time_zone.to_string()))?;
        if new_prices_hour > 23 {
            return Err(ScheduleError::InvalidHour(new_prices_hour));
        }
        Ok(Self { time_zone, new_prices_hour })
    }

    pub const fn time_zone(&self) -> Tz {
        self.time_zone
    }

    pub const fn new_prices_hour(&self) -> u32 {
        self.new_prices_hour
    }

    /// Query window for the local day `now` falls on: `[today@hour, tomorrow@hour)`.
    pub fn window(&self, now: DateTime<Utc>) -> Result<Window, ScheduleError> {
        let today = now.with_timezone(&self.time_zone).date_naive();
        let tomorrow = today.succ_opt().ok_or(ScheduleError::DateOutOfRange(today))?;
        Ok(Window { start: self.boundary(today), end: self.boundary(tomorrow) })
    }

    /// The first boundary strictly after `now`.
    pub fn next_refresh(&self, now: DateTime<Utc>) -> Result<DateTime<Tz>, ScheduleError> {
        let window = self.window(now)?;
        if now < window.start.with_timezone(&Utc) { Ok(window.start) } else { Ok(window.end) }
    }

    /// `new_prices_hour:00` on the given local date.
    ///
    /// An ambiguous local time resolves to the earlier instant. A local time that falls into
    /// a gap resolves to the first valid whole hour after it.
    fn boundary(&self, date: NaiveDate) -> DateTime<Tz> {
        let local =
            date.and_time(NaiveTime::MIN) + TimeDelta::hours(self.new_prices_hour.into());
        (0..=24)
            .find_map(|shift| {
                self.time_zone.from_local_datetime(&(local + TimeDelta::hours(shift))).earliest()
            })
            .unwrap_or_else(|| self.time_zone.from_utc_datetime(&local))
    }
}

/// Half-open local-day query window.
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct Window {
    /// Inclusive.
    pub start: DateTime<Tz>,

    /// Exclusive.
    pub end: DateTime<Tz>,
}

impl Debug for Window {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

impl Window {
    #[must_use]
    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }

    /// Window bounds with their UTC offsets, as sent to the API.
    #[must_use]
    pub fn fixed_offset(&self) -> (DateTime<FixedOffset>, DateTime<FixedOffset>) {
        (self.start.fixed_offset(), self.end.fixed_offset())
    }
}
