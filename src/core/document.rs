use bon::Builder;
use itertools::Itertools;

use crate::{
    core::{error::ParseError, interval::Interval},
    quantity::CubicMeterPrice,
};

/// Normalized daily gas prices for one query window.
///
/// Immutable once constructed: [`PriceDocument::try_new`] is the only way in, and it validates
/// the interval list.
#[derive(Clone, Debug)]
#[must_use]
pub struct PriceDocument {
    average_incl_vat: CubicMeterPrice,
    average_excl_vat: CubicMeterPrice,
    intervals: Vec<PriceInterval>,
}

impl PriceDocument {
    /// Build a document, checking that the intervals are non-empty, chronological and
    /// contiguous: each one starts exactly where the previous one ends.
    ///
    /// Summary rows (`is_average`) are exempt from the ordering check since they may span
    /// the whole window.
    pub fn try_new(
        average_incl_vat: CubicMeterPrice,
        average_excl_vat: CubicMeterPrice,
        intervals: Vec<PriceInterval>,
    ) -> Result<Self, ParseError> {
        if intervals.is_empty() {
            return Err(ParseError::NoIntervals);
        }
        if let Some((index, _)) = intervals.iter().find_position(|item| item.interval.is_empty())
        {
            return Err(ParseError::EmptyInterval(index));
        }
        let mut previous_end = None;
        for (index, item) in intervals.iter().enumerate().filter(|(_, item)| !item.is_average) {
            match previous_end {
                Some(end) if item.interval.start < end => {
                    return Err(ParseError::UnorderedInterval(index));
                }
                Some(end) if item.interval.start > end => {
                    return Err(ParseError::IntervalGap(index));
                }
                _ => {}
            }
            previous_end = Some(item.interval.end);
        }
        Ok(Self { average_incl_vat, average_excl_vat, intervals })
    }

    pub const fn average_incl_vat(&self) -> CubicMeterPrice {
        self.average_incl_vat
    }

    pub const fn average_excl_vat(&self) -> CubicMeterPrice {
        self.average_excl_vat
    }

    pub fn intervals(&self) -> &[PriceInterval] {
        &self.intervals
    }

    /// The interval the derived values are evaluated against: the first non-summary row.
    ///
    /// TODO: revisit the tie-break once the API returns more than one non-average interval
    ///       for the daily gas window.
    #[must_use]
    pub fn current_interval(&self) -> Option<&PriceInterval> {
        self.intervals.iter().find(|item| !item.is_average)
    }
}

#[derive(Clone, Debug, Builder)]
pub struct PriceInterval {
    pub interval: Interval,

    /// `None` when the API reports `null`.
    pub price_excl_vat: Option<CubicMeterPrice>,

    /// `None` when the API reports `null`.
    pub price_incl_vat: Option<CubicMeterPrice>,

    /// VAT rate as reported, for example `0.21`.
    pub vat_rate: f64,

    /// Synthetic summary row, never selected as the current interval.
    #[builder(default)]
    pub is_average: bool,

    /// Energy type reported by the API, normally `Gas`.
    #[builder(into)]
    pub kind: String,

    #[builder(default)]
    pub additional_costs: Vec<AdditionalCost>,
}

#[derive(Clone, Debug)]
pub struct AdditionalCost {
    pub name: String,
    pub price_excl_vat: CubicMeterPrice,
    pub price_incl_vat: CubicMeterPrice,
}

impl AdditionalCost {
    #[must_use]
    pub fn slug(&self) -> String {
        slugify(&self.name)
    }
}

/// Lower-case the name and join its whitespace-separated words with underscores.
///
/// Runs of whitespace collapse, so names differing only by case or spacing map to the same
/// identifier.
#[must_use]
pub fn slugify(name: &str) -> String {
    name.split_whitespace().map(str::to_lowercase).join("_")
}
