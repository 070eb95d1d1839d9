use serde::{Deserialize, Serialize};

/// RFM summary of one customer's transaction history.
///
/// All durations are expressed in the model's time unit (weeks by default).
/// A valid record satisfies `0 <= recency <= tenure`; `monetary_avg` is only
/// meaningful when `frequency > 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub customer_id: String,
    /// Number of purchases observed for the customer.
    pub frequency: u32,
    /// Time between the first and the last purchase.
    pub recency: f64,
    /// Time between the first purchase and the end of the observation window.
    pub tenure: f64,
    /// Mean value of the customer's purchases.
    pub monetary_avg: f64,
}

impl CustomerRecord {
    /// Checks the timing invariants shared by both models.
    ///
    /// Returns a human-readable reason on violation.
    pub fn check_timing(&self) -> Result<(), String> {
        check_timing(self.recency, self.tenure)
    }

    /// Checks that the record carries a usable monetary observation.
    pub fn check_monetary(&self) -> Result<(), String> {
        if self.frequency == 0 {
            return Err("frequency must be positive".to_owned());
        }
        if !(self.monetary_avg.is_finite() && self.monetary_avg > 0.0) {
            return Err(format!(
                "monetary average must be positive and finite, got {}",
                self.monetary_avg
            ));
        }
        Ok(())
    }
}

pub(crate) fn check_timing(recency: f64, tenure: f64) -> Result<(), String> {
    if !(recency.is_finite() && tenure.is_finite()) {
        return Err(format!(
            "recency and tenure must be finite, got {recency} and {tenure}"
        ));
    }
    if recency < 0.0 {
        return Err(format!("recency must be non-negative, got {recency}"));
    }
    if tenure < recency {
        return Err(format!(
            "tenure ({tenure}) must not be smaller than recency ({recency})"
        ));
    }
    Ok(())
}
