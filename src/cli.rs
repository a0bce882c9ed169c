mod energy_zero;
mod fetch;
mod heartbeat;
mod schedule;
mod watch;

use clap::{Parser, Subcommand};

pub use self::{fetch::FetchArgs, schedule::ScheduleArgs, watch::WatchArgs};

#[derive(Parser)]
#[command(author, version, about, propagate_version = true)]
#[must_use]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Main command: keep the gas prices fresh and print the sensors on every change.
    #[clap(name = "watch")]
    Watch(Box<WatchArgs>),

    /// Fetch the current window once and print the prices.
    #[clap(name = "fetch")]
    Fetch(Box<FetchArgs>),

    /// Print the current query window and the next refresh time.
    #[clap(name = "schedule")]
    Schedule(ScheduleArgs),
}
