use std::sync::Arc;

use clap::Parser;
use tokio::signal::ctrl_c;

use crate::{
    cli::{ScheduleArgs, energy_zero::EnergyZeroArgs, heartbeat::HeartbeatArgs},
    core::{
        coordinator::Coordinator,
        registry::{ALL_IN, MARKET_INCL},
        sensor::SensorSet,
    },
    prelude::*,
    tables::{build_intervals_table, build_sensors_table},
};

#[derive(Parser)]
pub struct WatchArgs {
    #[clap(flatten)]
    schedule: ScheduleArgs,

    #[clap(flatten)]
    energy_zero: EnergyZeroArgs,

    #[clap(flatten)]
    heartbeat: HeartbeatArgs,
}

impl WatchArgs {
    #[instrument(skip_all)]
    pub async fn run(&self) -> Result {
        let coordinator =
            Arc::new(Coordinator::new(self.energy_zero.new_api()?, self.schedule.clock()?));
        let mut sensors = SensorSet::new(coordinator.subscribe());
        let mut snapshots = coordinator.subscribe();
        let handle = Arc::clone(&coordinator).spawn();

        // Polled across iterations, so a Ctrl-C during an arm body is still observed.
        let interrupted = ctrl_c();
        tokio::pin!(interrupted);

        loop {
            tokio::select! {
                changed = snapshots.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = Arc::clone(&*snapshots.borrow_and_update());
                    let reconciliation = sensors.reconcile();
                    if !reconciliation.is_empty() {
                        info!(
                            n_sensors = sensors.len(),
                            identifiers = ?coordinator.identifiers(),
                            "sensor set changed",
                        );
                    }
                    info!(
                        state = %coordinator.state(),
                        last_error = ?snapshot.last_error_kind(),
                        market_incl = ?coordinator.resolve(MARKET_INCL),
                        all_in = ?coordinator.resolve(ALL_IN),
                        "snapshot changed",
                    );
                    if snapshot.last_error.is_none()
                        && let Some(document) = &snapshot.document
                    {
                        println!("{}", build_intervals_table(document));
                    }
                    if !sensors.is_empty() {
                        println!("{}", build_sensors_table(&sensors));
                    }
                    if snapshot.is_available() && snapshot.last_error.is_none() {
                        self.heartbeat.send().await;
                    }
                }
                result = &mut interrupted => {
                    result.context("failed to listen for Ctrl-C")?;
                    info!("interrupted");
                    break;
                }
            }
        }

        handle.shutdown().await;
        Ok(())
    }
}
