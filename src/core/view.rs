use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::{core::coordinator::Snapshot, quantity::CubicMeterPrice};

/// Read-only binding of one identifier to the coordinator's current snapshot.
#[derive(Clone)]
pub struct ValueView {
    identifier: String,
    snapshots: watch::Receiver<Arc<Snapshot>>,
}

impl ValueView {
    pub fn new(identifier: impl Into<String>, snapshots: watch::Receiver<Arc<Snapshot>>) -> Self {
        Self { identifier: identifier.into(), snapshots }
    }

    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Human-readable name, falls back to the identifier when it is not currently derivable.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.snapshots
            .borrow()
            .registry
            .get(&self.identifier)
            .map_or_else(|| self.identifier.clone(), |entry| entry.display_name.clone())
    }

    #[must_use]
    pub const fn unit(&self) -> &'static str {
        CubicMeterPrice::UNIT
    }

    #[must_use]
    pub fn current_value(&self) -> Option<CubicMeterPrice> {
        self.snapshots.borrow().registry.resolve(&self.identifier)
    }

    /// Whether at least one fetch has ever succeeded.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.snapshots.borrow().is_available()
    }

    #[must_use]
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.snapshots.borrow().fetched_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::registry::MARKET_INCL;

    #[test]
    fn empty_snapshot_ok() {
        let (_sender, receiver) = watch::channel(Arc::new(Snapshot::default()));
        let view = ValueView::new(MARKET_INCL, receiver);
        assert_eq!(view.identifier(), "market_incl");
        assert_eq!(view.display_name(), "market_incl");
        assert_eq!(view.unit(), "€/m³");
        assert_eq!(view.current_value(), None);
        assert!(!view.is_available());
        assert_eq!(view.last_updated(), None);
    }
}
