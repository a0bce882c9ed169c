use chrono::Utc;
use clap::Parser;

use crate::{
    core::schedule::{DEFAULT_NEW_PRICES_HOUR, DEFAULT_TIME_ZONE, ScheduleClock},
    prelude::*,
};

#[derive(Parser)]
pub struct ScheduleArgs {
    /// IANA time zone the new-prices hour is expressed in.
    #[clap(long = "time-zone", env = "TIME_ZONE", default_value = DEFAULT_TIME_ZONE)]
    pub time_zone: String,

    /// Local hour at which the next day's prices become available.
    #[clap(
        long = "new-prices-hour",
        env = "NEW_PRICES_HOUR",
        default_value_t = DEFAULT_NEW_PRICES_HOUR,
        value_parser = clap::value_parser!(u32).range(0..=23),
    )]
    pub new_prices_hour: u32,
}

impl ScheduleArgs {
    pub fn clock(&self) -> Result<ScheduleClock> {
        ScheduleClock::try_new(&self.time_zone, self.new_prices_hour)
            .context("invalid schedule configuration")
    }

    #[instrument(skip_all)]
    pub fn run(&self) -> Result {
        let clock = self.clock()?;
        let now = Utc::now();
        let window = clock.window(now)?;
        let next_refresh = clock.next_refresh(now)?;
        info!(
            time_zone = %clock.time_zone(),
            new_prices_hour = clock.new_prices_hour(),
            window = ?window,
            duration = ?window.duration(),
            next_refresh = %next_refresh.to_rfc3339(),
            "scheduled",
        );
        println!("window:       {}..{}", window.start.to_rfc3339(), window.end.to_rfc3339());
        println!("next refresh: {}", next_refresh.to_rfc3339());
        Ok(())
    }
}
