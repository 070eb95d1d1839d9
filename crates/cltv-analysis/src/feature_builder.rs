//! Conversion of raw customer aggregates into RFM records.
//!
//! For every customer, relative to an analysis date and in the configured
//! time unit:
//!
//! - `recency = last_order_date - first_order_date`
//! - `tenure = analysis_date - first_order_date`
//! - `frequency` = orders across both channels
//! - `monetary_avg` = spend across both channels / `frequency`
//!
//! Customers with `frequency <= min_frequency` carry no repeat-purchase signal
//! and are excluded. Rows that cannot be converted are reported as
//! [`DataError`]s and dropped; the remaining rows are still usable.
//!
//! # Example
//!
//! ```
//! use chrono::NaiveDate;
//! use cltv_analysis::{aggregate::CustomerAggregate, feature_builder::RfmFeatureBuilder};
//! use cltv_model::config::TimeUnit;
//!
//! let date = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap();
//! let row = CustomerAggregate {
//!     master_id: "cc294636".to_owned(),
//!     order_channel: "Android App".to_owned(),
//!     last_order_channel: "Offline".to_owned(),
//!     first_order_date: date(2021, 1, 1),
//!     last_order_date: date(2021, 3, 26),
//!     last_order_date_online: None,
//!     last_order_date_offline: None,
//!     order_num_total_ever_online: 3.0,
//!     order_num_total_ever_offline: 1.0,
//!     customer_value_total_ever_offline: 100.0,
//!     customer_value_total_ever_online: 300.0,
//!     interested_in_categories_12: String::new(),
//! };
//!
//! let builder = RfmFeatureBuilder::new(date(2021, 6, 1), TimeUnit::Week, 1);
//! let record = builder.build_record(&row).unwrap().unwrap();
//! assert_eq!(record.frequency, 4);
//! assert_eq!(record.recency, 12.0);
//! assert_eq!(record.monetary_avg, 100.0);
//! ```

use std::collections::HashSet;

use chrono::NaiveDate;
use cltv_model::{config::TimeUnit, record::CustomerRecord};

use crate::aggregate::CustomerAggregate;

/// A row that cannot be turned into a customer record.
#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum DataError {
    #[display(
        "customer '{customer_id}': last order {last_order_date} precedes first order {first_order_date}"
    )]
    LastOrderBeforeFirst {
        customer_id: String,
        first_order_date: NaiveDate,
        last_order_date: NaiveDate,
    },
    #[display(
        "customer '{customer_id}': last order {last_order_date} is after the analysis date {analysis_date}"
    )]
    LastOrderAfterAnalysisDate {
        customer_id: String,
        last_order_date: NaiveDate,
        analysis_date: NaiveDate,
    },
    #[display("customer '{customer_id}': order count {count} is not a non-negative integer")]
    InvalidOrderCount { customer_id: String, count: f64 },
    #[display("customer '{customer_id}': no orders recorded")]
    NoOrders { customer_id: String },
    #[display("customer '{customer_id}': total spend {value} is not positive")]
    NonPositiveValue { customer_id: String, value: f64 },
    #[display("customer '{customer_id}' appears more than once")]
    DuplicateCustomer { customer_id: String },
}

impl DataError {
    /// Identifier of the offending customer.
    #[must_use]
    pub fn customer_id(&self) -> &str {
        match self {
            Self::LastOrderBeforeFirst { customer_id, .. }
            | Self::LastOrderAfterAnalysisDate { customer_id, .. }
            | Self::InvalidOrderCount { customer_id, .. }
            | Self::NoOrders { customer_id }
            | Self::NonPositiveValue { customer_id, .. }
            | Self::DuplicateCustomer { customer_id } => customer_id,
        }
    }
}

/// Records built from a batch of aggregates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RfmDataset {
    /// Customers retained for modeling, in input order.
    pub records: Vec<CustomerRecord>,
    /// Rows rejected as invalid.
    pub dropped: Vec<DataError>,
    /// Number of valid rows with `frequency <= min_frequency`.
    pub excluded: usize,
}

/// Builds [`CustomerRecord`]s relative to a fixed analysis date.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RfmFeatureBuilder {
    analysis_date: NaiveDate,
    time_unit: TimeUnit,
    min_frequency: u32,
}

impl RfmFeatureBuilder {
    #[must_use]
    pub fn new(analysis_date: NaiveDate, time_unit: TimeUnit, min_frequency: u32) -> Self {
        Self {
            analysis_date,
            time_unit,
            min_frequency,
        }
    }

    #[must_use]
    pub fn analysis_date(&self) -> NaiveDate {
        self.analysis_date
    }

    /// Converts one row.
    ///
    /// Returns `Ok(None)` if the customer is excluded by the frequency
    /// threshold.
    pub fn build_record(&self, row: &CustomerAggregate) -> Result<Option<CustomerRecord>, DataError> {
        let customer_id = || row.master_id.clone();

        if row.last_order_date < row.first_order_date {
            return Err(DataError::LastOrderBeforeFirst {
                customer_id: customer_id(),
                first_order_date: row.first_order_date,
                last_order_date: row.last_order_date,
            });
        }
        if row.last_order_date > self.analysis_date {
            return Err(DataError::LastOrderAfterAnalysisDate {
                customer_id: customer_id(),
                last_order_date: row.last_order_date,
                analysis_date: self.analysis_date,
            });
        }

        let frequency = order_count(row.order_total()).ok_or_else(|| DataError::InvalidOrderCount {
            customer_id: customer_id(),
            count: row.order_total(),
        })?;
        if frequency == 0 {
            return Err(DataError::NoOrders {
                customer_id: customer_id(),
            });
        }
        if frequency <= self.min_frequency {
            return Ok(None);
        }

        let value = row.value_total();
        if !(value.is_finite() && value > 0.0) {
            return Err(DataError::NonPositiveValue {
                customer_id: customer_id(),
                value,
            });
        }

        Ok(Some(CustomerRecord {
            customer_id: customer_id(),
            frequency,
            recency: self.to_time_unit(row.last_order_date - row.first_order_date),
            tenure: self.to_time_unit(self.analysis_date - row.first_order_date),
            monetary_avg: value / f64::from(frequency),
        }))
    }

    /// Converts every row, dropping invalid ones.
    ///
    /// Only the first row of a repeated `master_id` is used.
    pub fn build(&self, rows: &[CustomerAggregate]) -> RfmDataset {
        let mut dataset = RfmDataset::default();
        let mut seen = HashSet::with_capacity(rows.len());
        for row in rows {
            if !seen.insert(row.master_id.as_str()) {
                dataset.dropped.push(DataError::DuplicateCustomer {
                    customer_id: row.master_id.clone(),
                });
                continue;
            }
            match self.build_record(row) {
                Ok(Some(record)) => dataset.records.push(record),
                Ok(None) => dataset.excluded += 1,
                Err(err) => dataset.dropped.push(err),
            }
        }
        for err in &dataset.dropped {
            tracing::warn!(customer_id = err.customer_id(), "dropped row: {err}");
        }
        tracing::info!(
            retained = dataset.records.len(),
            excluded = dataset.excluded,
            dropped = dataset.dropped.len(),
            min_frequency = self.min_frequency,
            "built RFM records"
        );
        dataset
    }

    #[expect(clippy::cast_precision_loss)]
    fn to_time_unit(&self, duration: chrono::TimeDelta) -> f64 {
        duration.num_days() as f64 / self.time_unit.days()
    }
}

#[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn order_count(total: f64) -> Option<u32> {
    (total.is_finite() && total >= 0.0 && total.fract() == 0.0 && total <= f64::from(u32::MAX))
        .then_some(total as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::aggregate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn builder() -> RfmFeatureBuilder {
        RfmFeatureBuilder::new(date(2021, 6, 1), TimeUnit::Week, 1)
    }

    #[test]
    fn test_build_record() {
        // 2020-10-30 .. 2021-02-26 is 119 days, .. 2021-06-01 is 214 days
        let record = builder().build_record(&aggregate("a")).unwrap().unwrap();
        assert_eq!(record.customer_id, "a");
        assert_eq!(record.frequency, 5);
        assert_eq!(record.recency, 17.0);
        assert!((record.tenure - 214.0 / 7.0).abs() < 1e-12);
        assert!((record.monetary_avg - 939.37 / 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_day_unit() {
        let builder = RfmFeatureBuilder::new(date(2021, 6, 1), TimeUnit::Day, 1);
        let record = builder.build_record(&aggregate("a")).unwrap().unwrap();
        assert_eq!(record.recency, 119.0);
        assert_eq!(record.tenure, 214.0);
    }

    #[test]
    fn test_single_order_is_excluded() {
        let mut row = aggregate("a");
        row.order_num_total_ever_online = 1.0;
        row.order_num_total_ever_offline = 0.0;
        assert_eq!(builder().build_record(&row), Ok(None));
    }

    #[test]
    fn test_invalid_rows() {
        let mut row = aggregate("late");
        row.last_order_date = date(2021, 6, 2);
        assert!(matches!(
            builder().build_record(&row),
            Err(DataError::LastOrderAfterAnalysisDate { .. })
        ));

        let mut row = aggregate("reversed");
        row.last_order_date = date(2020, 1, 1);
        assert!(matches!(
            builder().build_record(&row),
            Err(DataError::LastOrderBeforeFirst { .. })
        ));

        let mut row = aggregate("empty");
        row.order_num_total_ever_online = 0.0;
        row.order_num_total_ever_offline = 0.0;
        assert_eq!(
            builder().build_record(&row),
            Err(DataError::NoOrders {
                customer_id: "empty".to_owned()
            })
        );

        let mut row = aggregate("fraction");
        row.order_num_total_ever_online = 2.5;
        assert!(matches!(
            builder().build_record(&row),
            Err(DataError::InvalidOrderCount { .. })
        ));

        let mut row = aggregate("free");
        row.customer_value_total_ever_online = 0.0;
        row.customer_value_total_ever_offline = 0.0;
        assert!(matches!(
            builder().build_record(&row),
            Err(DataError::NonPositiveValue { .. })
        ));
    }

    #[test]
    fn test_build_drops_and_excludes() {
        let mut single = aggregate("single");
        single.order_num_total_ever_online = 0.0;
        let mut late = aggregate("late");
        late.last_order_date = date(2022, 1, 1);
        let rows = [aggregate("a"), single, late, aggregate("a"), aggregate("b")];

        let dataset = builder().build(&rows);
        let ids = dataset
            .records
            .iter()
            .map(|r| r.customer_id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ids, ["a", "b"]);
        assert_eq!(dataset.excluded, 1);
        let dropped = dataset
            .dropped
            .iter()
            .map(DataError::customer_id)
            .collect::<Vec<_>>();
        assert_eq!(dropped, ["late", "a"]);
    }
}
