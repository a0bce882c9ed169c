use chrono::Utc;
use clap::Parser;

use crate::{
    api::PriceSource,
    cli::{ScheduleArgs, energy_zero::EnergyZeroArgs},
    core::registry::Registry,
    prelude::*,
    tables::{build_costs_table, build_intervals_table, build_registry_table},
};

#[derive(Parser)]
pub struct FetchArgs {
    #[clap(flatten)]
    schedule: ScheduleArgs,

    #[clap(flatten)]
    energy_zero: EnergyZeroArgs,
}

impl FetchArgs {
    #[instrument(skip_all)]
    pub async fn run(&self) -> Result {
        let window = self.schedule.clock()?.window(Utc::now())?;
        let document = self
            .energy_zero
            .new_api()?
            .fetch(&window)
            .await
            .with_context(|| format!("failed to fetch the prices for {window:?}"))?;
        info!(
            average_incl_vat = ?document.average_incl_vat(),
            average_excl_vat = ?document.average_excl_vat(),
            "fetched",
        );
        println!("{}", build_intervals_table(&document));
        if let Some(interval) = document.current_interval() {
            println!("{}", build_costs_table(interval));
        }
        println!("{}", build_registry_table(&Registry::from_document(&document)));
        Ok(())
    }
}
