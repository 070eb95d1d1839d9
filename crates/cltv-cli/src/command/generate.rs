use std::path::PathBuf;

use anyhow::Context as _;
use chrono::{Days, NaiveDate};
use cltv_analysis::aggregate::CustomerAggregate;
use cltv_model::{
    config::TimeUnit,
    count_model::FittedCountModel,
    simulate::{PopulationSimulator, SimulatedCustomer},
    value_model::FittedValueModel,
};
use rand::{Rng, SeedableRng as _};
use rand_pcg::Pcg32;

use crate::util::Output;

const ORDER_CHANNELS: [&str; 4] = ["Android App", "Desktop", "Ios App", "Mobile"];
const ONLINE_SHARE: f64 = 0.7;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct GenerateArg {
    /// Number of customers to generate
    #[arg(long, default_value_t = 1000)]
    customers: usize,
    /// Random seed; drawn from the system if omitted
    #[arg(long)]
    seed: Option<u64>,
    /// Count model shape of the purchase rate distribution
    #[arg(long, default_value_t = 0.243)]
    r: f64,
    /// Count model scale of the purchase rate distribution
    #[arg(long, default_value_t = 4.414)]
    alpha: f64,
    /// Count model dropout parameter a
    #[arg(long, default_value_t = 0.793)]
    a: f64,
    /// Count model dropout parameter b
    #[arg(long, default_value_t = 2.426)]
    b: f64,
    /// Value model shape of purchase values
    #[arg(long, default_value_t = 6.25)]
    p: f64,
    /// Value model shape of the value rate distribution
    #[arg(long, default_value_t = 3.74)]
    q: f64,
    /// Value model scale of the value rate distribution
    #[arg(long, default_value_t = 15.44)]
    v: f64,
    /// Shortest customer tenure, in time units
    #[arg(long, default_value_t = 26.0)]
    min_tenure: f64,
    /// Longest customer tenure, in time units
    #[arg(long, default_value_t = 78.0)]
    max_tenure: f64,
    /// Unit of the model parameters and tenures
    #[arg(long, default_value = "week")]
    time_unit: TimeUnit,
    /// Date the population is observed at (YYYY-MM-DD)
    #[arg(long, default_value = "2021-06-01")]
    analysis_date: NaiveDate,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

pub(crate) fn run(arg: &GenerateArg) -> anyhow::Result<()> {
    let count_model = FittedCountModel::new(arg.r, arg.alpha, arg.a, arg.b)
        .context("Invalid count model parameters")?;
    let value_model =
        FittedValueModel::new(arg.p, arg.q, arg.v).context("Invalid value model parameters")?;
    let simulator = PopulationSimulator::new(count_model, value_model)
        .context("Cannot sample from the given parameters")?;
    anyhow::ensure!(
        0.0 <= arg.min_tenure && arg.min_tenure <= arg.max_tenure && arg.max_tenure.is_finite(),
        "Tenure range [{}, {}] is invalid",
        arg.min_tenure,
        arg.max_tenure
    );

    let seed = arg.seed.unwrap_or_else(|| rand::rng().random());
    tracing::info!(seed, customers = arg.customers, "generating population");
    let mut rng = Pcg32::seed_from_u64(seed);

    let rows = simulator
        .simulate_population(&mut rng, arg.customers, arg.min_tenure, arg.max_tenure)
        .into_iter()
        .enumerate()
        .map(|(i, customer)| {
            to_aggregate(
                &mut rng,
                format!("customer-{i:06}"),
                &customer,
                arg.time_unit,
                arg.analysis_date,
            )
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let mut output = Output::from_output_path(arg.output.clone())?;
    output.write_csv(&rows)
}

/// Lays a simulated history out on the calendar, ending at `analysis_date`,
/// with each purchase independently online or offline.
fn to_aggregate<R>(
    rng: &mut R,
    master_id: String,
    customer: &SimulatedCustomer,
    time_unit: TimeUnit,
    analysis_date: NaiveDate,
) -> anyhow::Result<CustomerAggregate>
where
    R: Rng + ?Sized,
{
    let first_order_date = analysis_date
        .checked_sub_days(to_days(customer.tenure, time_unit))
        .with_context(|| format!("Tenure of {master_id} precedes the calendar"))?;
    let last_order_date = first_order_date
        .checked_add_days(to_days(customer.recency, time_unit))
        .with_context(|| format!("Recency of {master_id} exceeds the calendar"))?;

    let purchases = customer.repeat_purchases + 1;
    let online = (0..purchases)
        .filter(|_| rng.random_bool(ONLINE_SHARE))
        .count();
    let online = u32::try_from(online)?;
    let offline = purchases - online;
    let total_value = customer.monetary_avg * f64::from(purchases);
    let online_value = round_cents(total_value * f64::from(online) / f64::from(purchases));
    let offline_value = round_cents(total_value) - online_value;

    let order_channel = ORDER_CHANNELS[rng.random_range(0..ORDER_CHANNELS.len())];
    let last_order_channel = if offline > 0 && (online == 0 || rng.random_bool(0.5)) {
        "Offline"
    } else {
        order_channel
    };
    Ok(CustomerAggregate {
        master_id,
        order_channel: order_channel.to_owned(),
        last_order_channel: last_order_channel.to_owned(),
        first_order_date,
        last_order_date,
        last_order_date_online: (online > 0).then_some(last_order_date),
        last_order_date_offline: (offline > 0).then_some(last_order_date),
        order_num_total_ever_online: f64::from(online),
        order_num_total_ever_offline: f64::from(offline),
        customer_value_total_ever_offline: offline_value,
        customer_value_total_ever_online: online_value,
        interested_in_categories_12: String::new(),
    })
}

#[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_days(value: f64, time_unit: TimeUnit) -> Days {
    Days::new((value * time_unit.days()).round().max(0.0) as u64)
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
