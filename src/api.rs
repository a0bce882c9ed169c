pub mod energy_zero;
pub mod heartbeat;

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::{document::PriceDocument, error::FetchError, schedule::Window};

/// Anything that can fetch a price document for a query window.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch(&self, window: &Window) -> Result<PriceDocument, FetchError>;
}

#[async_trait]
impl<S: PriceSource + ?Sized> PriceSource for Arc<S> {
    async fn fetch(&self, window: &Window) -> Result<PriceDocument, FetchError> {
        (**self).fetch(window).await
    }
}
