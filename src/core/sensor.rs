use std::{collections::BTreeMap, sync::Arc};

use tokio::sync::watch;

use crate::{
    core::{coordinator::Snapshot, view::ValueView},
    prelude::*,
};

/// One [`ValueView`] per identifier the current snapshot can derive.
pub struct SensorSet {
    snapshots: watch::Receiver<Arc<Snapshot>>,
    views: BTreeMap<String, ValueView>,
}

#[derive(Debug, Default, Eq, PartialEq)]
#[must_use]
pub struct Reconciliation {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl Reconciliation {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

impl SensorSet {
    pub const fn new(snapshots: watch::Receiver<Arc<Snapshot>>) -> Self {
        Self { snapshots, views: BTreeMap::new() }
    }

    /// Add views for new identifiers and drop the vanished ones.
    ///
    /// Nothing changes until the first successful fetch, and a failed fetch keeps the set as is.
    #[instrument(skip_all)]
    pub fn reconcile(&mut self) -> Reconciliation {
        let snapshot = Arc::clone(&*self.snapshots.borrow());
        if !snapshot.is_available() {
            return Reconciliation::default();
        }

        let removed: Vec<String> = self
            .views
            .keys()
            .filter(|identifier| !snapshot.registry.contains(identifier))
            .cloned()
            .collect();
        for identifier in &removed {
            self.views.remove(identifier);
        }

        let mut added = Vec::new();
        for identifier in snapshot.registry.identifiers() {
            if !self.views.contains_key(identifier) {
                self.views.insert(
                    identifier.to_string(),
                    ValueView::new(identifier, self.snapshots.clone()),
                );
                added.push(identifier.to_string());
            }
        }

        let reconciliation = Reconciliation { added, removed };
        if !reconciliation.is_empty() {
            info!(added = ?reconciliation.added, removed = ?reconciliation.removed, "reconciled");
        }
        reconciliation
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValueView> {
        self.views.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.views.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}
