use std::collections::{BTreeMap, btree_map};

use crate::{
    core::document::{PriceDocument, PriceInterval},
    prelude::*,
    quantity::CubicMeterPrice,
};

pub const MARKET_INCL: &str = "market_incl";

pub const ALL_IN: &str = "all_in";

/// Named values derived from the current interval.
///
/// Keyed by string since the additional-cost identifiers are only known once a response
/// arrives.
#[derive(Clone, Debug, Default)]
#[must_use]
pub struct Registry(BTreeMap<String, Entry>);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    pub display_name: String,

    /// `None` when the source field is missing from the response.
    pub value: Option<CubicMeterPrice>,
}

impl Registry {
    pub fn from_document(document: &PriceDocument) -> Self {
        document.current_interval().map_or_else(Self::default, Self::from_interval)
    }

    pub fn from_interval(interval: &PriceInterval) -> Self {
        let mut entries = BTreeMap::new();

        // Later costs overwrite earlier ones with the same identifier.
        for cost in &interval.additional_costs {
            entries.insert(
                cost.slug(),
                Entry {
                    display_name: format!("Gas Price {}", cost.name.trim()),
                    value: Some(cost.price_incl_vat),
                },
            );
        }

        for builtin in [MARKET_INCL, ALL_IN] {
            if entries.contains_key(builtin) {
                warn!(identifier = builtin, "an additional cost shadows a built-in value, ignoring");
            }
        }

        let all_in = interval.price_incl_vat.map(|market| {
            market
                + interval
                    .additional_costs
                    .iter()
                    .map(|cost| cost.price_incl_vat)
                    .sum::<CubicMeterPrice>()
        });
        entries.insert(
            MARKET_INCL.to_string(),
            Entry { display_name: "Gas Price Market".to_string(), value: interval.price_incl_vat },
        );
        entries.insert(
            ALL_IN.to_string(),
            Entry { display_name: "Gas Price All-in".to_string(), value: all_in },
        );

        Self(entries)
    }

    /// Current value of the identifier, or `None` when it is not derivable.
    #[must_use]
    pub fn resolve(&self, identifier: &str) -> Option<CubicMeterPrice> {
        self.0.get(identifier).and_then(|entry| entry.value)
    }

    #[must_use]
    pub fn get(&self, identifier: &str) -> Option<&Entry> {
        self.0.get(identifier)
    }

    #[must_use]
    pub fn contains(&self, identifier: &str) -> bool {
        self.0.contains_key(identifier)
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Entry> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a Registry {
    type Item = (&'a String, &'a Entry);
    type IntoIter = btree_map::Iter<'a, String, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
