use clap::Parser;
use reqwest::Url;

use crate::{api::heartbeat, prelude::*};

#[derive(Parser)]
pub struct HeartbeatArgs {
    #[clap(long = "heartbeat-url", env = "HEARTBEAT_URL")]
    pub url: Option<Url>,
}

impl HeartbeatArgs {
    pub async fn send(&self) {
        if let Some(url) = &self.url
            && let Err(error) = heartbeat::send(url.clone()).await
        {
            warn!("failed to send the heartbeat: {error:#}");
        }
    }
}
