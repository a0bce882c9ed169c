use clap::Parser;
use reqwest::Url;

use crate::{
    api::energy_zero::{Api, DEFAULT_ENDPOINT},
    prelude::*,
};

#[derive(Parser)]
pub struct EnergyZeroArgs {
    /// GraphQL endpoint.
    #[clap(long = "endpoint", env = "ENERGY_ZERO_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: Url,

    /// Per-request timeout, for example `10s`.
    #[clap(long = "fetch-timeout", env = "FETCH_TIMEOUT", default_value = "10s")]
    pub timeout: humantime::Duration,
}

impl EnergyZeroArgs {
    pub fn new_api(&self) -> Result<Api> {
        Api::new(self.endpoint.clone(), self.timeout.into())
            .context("failed to build the EnergyZero client")
    }
}
