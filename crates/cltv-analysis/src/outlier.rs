//! Quantile-based capping of extreme channel counts and values.
//!
//! For each column, thresholds are derived from a low and a high quantile:
//!
//! ```text
//! spread = q_high - q_low
//! upper  = round(q_high + multiplier * spread)
//! lower  = round(q_low  - multiplier * spread)
//! ```
//!
//! and every value is clamped into `[lower, upper]`. Thresholds are rounded
//! half to even so that capped order counts stay integral.

use cltv_stats::quantiles::compute_quantile;
use serde::{Deserialize, Serialize};

use crate::aggregate::{ChannelColumn, CustomerAggregate};

/// Settings of the capping transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutlierCapping {
    pub lower_quantile: f64,
    pub upper_quantile: f64,
    pub spread_multiplier: f64,
}

impl Default for OutlierCapping {
    fn default() -> Self {
        Self {
            lower_quantile: 0.01,
            upper_quantile: 0.99,
            spread_multiplier: 1.5,
        }
    }
}

/// Clamping bounds of one column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutlierThresholds {
    pub lower: f64,
    pub upper: f64,
}

impl OutlierThresholds {
    /// Computes the thresholds of `values`.
    ///
    /// Returns `None` if `values` is empty or contains a non-finite value.
    #[must_use]
    pub fn from_values(values: &[f64], capping: &OutlierCapping) -> Option<Self> {
        if values.is_empty() || values.iter().any(|v| !v.is_finite()) {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let low = compute_quantile(&sorted, capping.lower_quantile);
        let high = compute_quantile(&sorted, capping.upper_quantile);
        let spread = high - low;
        Some(Self {
            lower: capping
                .spread_multiplier
                .mul_add(-spread, low)
                .round_ties_even(),
            upper: capping
                .spread_multiplier
                .mul_add(spread, high)
                .round_ties_even(),
        })
    }

    #[must_use]
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.lower, self.upper)
    }
}

/// Thresholds applied to one column and how many values they changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnCap {
    pub column: ChannelColumn,
    pub thresholds: OutlierThresholds,
    pub capped: usize,
}

/// Caps every channel column of `rows` in place.
///
/// Columns containing non-finite values are left untouched and omitted from
/// the report.
pub fn cap_outliers(rows: &mut [CustomerAggregate], capping: &OutlierCapping) -> Vec<ColumnCap> {
    let mut report = Vec::with_capacity(ChannelColumn::ALL.len());
    for column in ChannelColumn::ALL {
        let values = rows.iter().map(|row| column.get(row)).collect::<Vec<_>>();
        let Some(thresholds) = OutlierThresholds::from_values(&values, capping) else {
            continue;
        };
        let mut capped = 0;
        for row in rows.iter_mut() {
            let value = column.get_mut(row);
            let clamped = thresholds.clamp(*value);
            if clamped != *value {
                *value = clamped;
                capped += 1;
            }
        }
        tracing::debug!(
            %column,
            lower = thresholds.lower,
            upper = thresholds.upper,
            capped,
            "capped outliers"
        );
        report.push(ColumnCap {
            column,
            thresholds,
            capped,
        });
    }
    report
}
