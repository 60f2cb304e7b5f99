//! Spot-price aggregation
//!
//! Raw spot-price history records are bucketed per availability zone and
//! reduced to summary statistics. The accumulator is fed one page of
//! history at a time, so samples survive pagination boundaries without
//! loss or double counting.
//!
//! ## Median semantics
//!
//! `median` returns the lower of the two central elements for
//! even-length lists (`[1, 2, 3, 4]` yields `2`, not `2.5`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A raw spot-price observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotPriceSample {
    /// Availability zone the price was observed in
    pub availability_zone: String,

    /// Price in USD per instance-hour
    pub price: f64,

    /// When the price took effect
    pub timestamp: DateTime<Utc>,
}

/// Summary statistics for one availability zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZonePriceStats {
    /// Number of samples observed for the zone
    pub count: usize,

    /// Lowest observed price
    pub min: f64,

    /// Arithmetic mean of the observed prices
    pub avg: f64,

    /// Lower-middle median of the sorted prices
    pub median: f64,

    /// Highest observed price
    pub max: f64,
}

/// Accumulates price samples across paginated history responses
///
/// Every sample lands in exactly one zone bucket; feeding the same page
/// twice is the caller's bug, not something this type detects.
#[derive(Debug, Default)]
pub struct PriceAccumulator {
    zone_prices: HashMap<String, Vec<f64>>,
}

impl PriceAccumulator {
    /// Create an empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one observation for a zone
    pub fn add(&mut self, zone: &str, price: f64) {
        self.zone_prices.entry(zone.to_string()).or_default().push(price);
    }

    /// Record a batch of samples (typically one page of history)
    pub fn extend(&mut self, samples: impl IntoIterator<Item = SpotPriceSample>) {
        for sample in samples {
            self.add(&sample.availability_zone, sample.price);
        }
    }

    /// Total number of samples recorded so far
    pub fn len(&self) -> usize {
        self.zone_prices.values().map(Vec::len).sum()
    }

    /// Check whether no samples have been recorded
    pub fn is_empty(&self) -> bool {
        self.zone_prices.is_empty()
    }

    /// Reduce the accumulated samples to per-zone statistics
    ///
    /// Zones with no samples do not appear; an empty accumulator yields
    /// an empty mapping.
    pub fn into_stats(self) -> HashMap<String, ZonePriceStats> {
        let mut stats = HashMap::with_capacity(self.zone_prices.len());

        for (zone, mut prices) in self.zone_prices {
            prices.sort_by(f64::total_cmp);

            let count = prices.len();
            let min = prices[0];
            let max = prices[count - 1];
            let avg = prices.iter().sum::<f64>() / count as f64;
            // lower of the two central elements for even counts
            let median = prices[(count - 1) / 2];

            stats.insert(
                zone,
                ZonePriceStats {
                    count,
                    min,
                    avg,
                    median,
                    max,
                },
            );
        }

        stats
    }
}

/// Median of a price list
///
/// Sorts a copy of the input; for even-length lists the lower of the two
/// central elements is returned. Empty input yields `None`.
pub fn median(prices: &[f64]) -> Option<f64> {
    if prices.is_empty() {
        return None;
    }

    let mut sorted = prices.to_vec();
    sorted.sort_by(f64::total_cmp);
    Some(sorted[(sorted.len() - 1) / 2])
}
