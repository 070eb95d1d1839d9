use std::io;

use anyhow::Context as _;
use cltv_analysis::pipeline::ScoredCustomer;

const LEADING_COLUMNS: [&str; 6] = [
    "customer_id",
    "recency",
    "tenure",
    "frequency",
    "monetary_avg",
    "alive_probability",
];
const TRAILING_COLUMNS: [&str; 3] = ["expected_average_value", "cltv", "segment"];

/// CSV header of scored customers: one `expected_transactions_<n>m` column
/// per report horizon.
pub fn csv_header(horizons_months: &[f64]) -> Vec<String> {
    LEADING_COLUMNS
        .iter()
        .map(ToString::to_string)
        .chain(
            horizons_months
                .iter()
                .map(|months| format!("expected_transactions_{months}m")),
        )
        .chain(TRAILING_COLUMNS.iter().map(ToString::to_string))
        .collect()
}

pub fn csv_record(customer: &ScoredCustomer) -> Vec<String> {
    let mut record = vec![
        customer.customer_id.clone(),
        customer.recency.to_string(),
        customer.tenure.to_string(),
        customer.frequency.to_string(),
        customer.monetary_avg.to_string(),
        customer.alive_probability.to_string(),
    ];
    record.extend(
        customer
            .expected_transactions
            .iter()
            .map(|forecast| forecast.transactions.to_string()),
    );
    record.extend([
        customer.expected_average_value.to_string(),
        customer.cltv.to_string(),
        customer.segment.to_string(),
    ]);
    record
}

pub fn write_csv<W>(writer: W, customers: &[ScoredCustomer], horizons_months: &[f64]) -> anyhow::Result<()>
where
    W: io::Write,
{
    let mut writer = csv::Writer::from_writer(writer);
    writer
        .write_record(csv_header(horizons_months))
        .context("Failed to write CSV header")?;
    for customer in customers {
        writer
            .write_record(csv_record(customer))
            .with_context(|| format!("Failed to write customer {}", customer.customer_id))?;
    }
    writer.flush().context("Failed to flush CSV output")?;
    Ok(())
}
