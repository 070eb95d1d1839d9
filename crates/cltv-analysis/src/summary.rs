//! Descriptive summaries of scored customers, overall and per segment.

use cltv_model::segment::Segment;
use cltv_stats::{descriptive::DescriptiveStats, quantiles::Quantiles};
use serde::{Deserialize, Serialize};

use crate::pipeline::ScoredCustomer;

const QUARTILES: [f64; 3] = [0.25, 0.5, 0.75];

/// Distribution summary of one numeric column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub p25: f64,
    pub median: f64,
    pub p75: f64,
    pub max: f64,
}

impl ColumnSummary {
    /// Summarizes `values`; `None` if empty.
    #[must_use]
    pub fn new(values: &[f64]) -> Option<Self> {
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let stats = DescriptiveStats::from_sorted(&sorted)?;
        let quartiles = Quantiles::from_sorted(&sorted, &QUARTILES);
        let [p25, median, p75] = QUARTILES.map(|q| quartiles.get(q).unwrap_or(f64::NAN));
        Some(Self {
            count: stats.count,
            mean: stats.mean,
            std_dev: stats.std_dev,
            min: stats.min,
            p25,
            median,
            p75,
            max: stats.max,
        })
    }
}

/// Summaries of the RFM and score columns of a group of customers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerSummary {
    pub recency: ColumnSummary,
    pub tenure: ColumnSummary,
    pub frequency: ColumnSummary,
    pub monetary_avg: ColumnSummary,
    pub expected_average_value: ColumnSummary,
    pub cltv: ColumnSummary,
}

impl CustomerSummary {
    /// Summarizes `customers`; `None` if empty.
    #[must_use]
    pub fn new<'a, I>(customers: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a ScoredCustomer>,
    {
        let customers = customers.into_iter().collect::<Vec<_>>();
        let column = |f: fn(&ScoredCustomer) -> f64| {
            ColumnSummary::new(&customers.iter().map(|c| f(c)).collect::<Vec<_>>())
        };
        Some(Self {
            recency: column(|c| c.recency)?,
            tenure: column(|c| c.tenure)?,
            frequency: column(|c| f64::from(c.frequency))?,
            monetary_avg: column(|c| c.monetary_avg)?,
            expected_average_value: column(|c| c.expected_average_value)?,
            cltv: column(|c| c.cltv)?,
        })
    }
}

/// Summary of one segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentSummary {
    pub segment: Segment,
    pub customers: usize,
    pub summary: CustomerSummary,
}

/// Summarizes every non-empty segment, highest first.
#[must_use]
pub fn summarize_segments(customers: &[ScoredCustomer]) -> Vec<SegmentSummary> {
    Segment::ALL
        .iter()
        .rev()
        .filter_map(|&segment| {
            let members = customers
                .iter()
                .filter(|c| c.segment == segment)
                .collect::<Vec<_>>();
            let summary = CustomerSummary::new(members.iter().copied())?;
            Some(SegmentSummary {
                segment,
                customers: members.len(),
                summary,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(id: &str, frequency: u32, cltv: f64, segment: Segment) -> ScoredCustomer {
        ScoredCustomer {
            customer_id: id.to_owned(),
            recency: 10.0,
            tenure: 20.0,
            frequency,
            monetary_avg: 50.0,
            alive_probability: 0.8,
            expected_transactions: Vec::new(),
            expected_average_value: 48.0,
            cltv,
            segment,
        }
    }

    #[test]
    fn test_column_summary() {
        let summary = ColumnSummary::new(&[4.0, 1.0, 3.0, 2.0, 5.0]).unwrap();
        assert_eq!(summary.count, 5);
        assert_eq!(summary.min, 1.0);
        assert_eq!(summary.p25, 2.0);
        assert_eq!(summary.median, 3.0);
        assert_eq!(summary.p75, 4.0);
        assert_eq!(summary.max, 5.0);
        assert_eq!(summary.mean, 3.0);
        assert_eq!(ColumnSummary::new(&[]), None);
    }

    #[test]
    fn test_summarize_segments() {
        let customers = [
            scored("a", 2, 10.0, Segment::D),
            scored("b", 4, 30.0, Segment::A),
            scored("c", 6, 50.0, Segment::A),
        ];
        let summaries = summarize_segments(&customers);
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].segment, Segment::A);
        assert_eq!(summaries[0].customers, 2);
        assert_eq!(summaries[0].summary.cltv.mean, 40.0);
        assert_eq!(summaries[0].summary.frequency.mean, 5.0);
        assert_eq!(summaries[1].segment, Segment::D);
    }
}
