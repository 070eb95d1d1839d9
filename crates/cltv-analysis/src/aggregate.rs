//! Raw per-customer order aggregates, split by sales channel.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One input row: a customer's lifetime order history summarized per channel.
///
/// Order counts are read as floating point numbers because exports commonly
/// write them as `4.0`; they are checked for integrality when features are
/// built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerAggregate {
    pub master_id: String,
    #[serde(default)]
    pub order_channel: String,
    #[serde(default)]
    pub last_order_channel: String,
    pub first_order_date: NaiveDate,
    pub last_order_date: NaiveDate,
    #[serde(default)]
    pub last_order_date_online: Option<NaiveDate>,
    #[serde(default)]
    pub last_order_date_offline: Option<NaiveDate>,
    pub order_num_total_ever_online: f64,
    pub order_num_total_ever_offline: f64,
    pub customer_value_total_ever_offline: f64,
    pub customer_value_total_ever_online: f64,
    #[serde(default)]
    pub interested_in_categories_12: String,
}

impl CustomerAggregate {
    /// Orders across both channels.
    #[must_use]
    pub fn order_total(&self) -> f64 {
        self.order_num_total_ever_online + self.order_num_total_ever_offline
    }

    /// Spend across both channels.
    #[must_use]
    pub fn value_total(&self) -> f64 {
        self.customer_value_total_ever_online + self.customer_value_total_ever_offline
    }
}

/// A numeric channel column subject to outlier capping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum ChannelColumn {
    #[display("order_num_total_ever_online")]
    OrderNumTotalEverOnline,
    #[display("order_num_total_ever_offline")]
    OrderNumTotalEverOffline,
    #[display("customer_value_total_ever_offline")]
    CustomerValueTotalEverOffline,
    #[display("customer_value_total_ever_online")]
    CustomerValueTotalEverOnline,
}

impl ChannelColumn {
    pub const ALL: [Self; 4] = [
        Self::OrderNumTotalEverOnline,
        Self::OrderNumTotalEverOffline,
        Self::CustomerValueTotalEverOffline,
        Self::CustomerValueTotalEverOnline,
    ];

    #[must_use]
    pub fn get(self, row: &CustomerAggregate) -> f64 {
        match self {
            Self::OrderNumTotalEverOnline => row.order_num_total_ever_online,
            Self::OrderNumTotalEverOffline => row.order_num_total_ever_offline,
            Self::CustomerValueTotalEverOffline => row.customer_value_total_ever_offline,
            Self::CustomerValueTotalEverOnline => row.customer_value_total_ever_online,
        }
    }

    pub fn get_mut(self, row: &mut CustomerAggregate) -> &mut f64 {
        match self {
            Self::OrderNumTotalEverOnline => &mut row.order_num_total_ever_online,
            Self::OrderNumTotalEverOffline => &mut row.order_num_total_ever_offline,
            Self::CustomerValueTotalEverOffline => &mut row.customer_value_total_ever_offline,
            Self::CustomerValueTotalEverOnline => &mut row.customer_value_total_ever_online,
        }
    }
}

/// Default analysis date: two days after the latest order in `rows`.
#[must_use]
pub fn default_analysis_date(rows: &[CustomerAggregate]) -> Option<NaiveDate> {
    rows.iter()
        .map(|row| row.last_order_date)
        .max()?
        .checked_add_days(chrono::Days::new(2))
}
