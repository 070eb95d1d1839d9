use cltv_model::{
    config::TimeUnit,
    count_model::FittedCountModel,
    lifetime_value::compute_cltv,
    record::CustomerRecord,
    segment::{Segment, assign_segments},
    value_model::FittedValueModel,
};
use proptest::prelude::*;

fn count_model() -> impl Strategy<Value = FittedCountModel> {
    (0.1..3.0_f64, 0.5..20.0_f64, 0.2..3.0_f64, 0.5..5.0_f64)
        .prop_map(|(r, alpha, a, b)| FittedCountModel::new(r, alpha, a, b).unwrap())
}

fn value_model() -> impl Strategy<Value = FittedValueModel> {
    (0.5..10.0_f64, 1.5..10.0_f64, 1.0..100.0_f64)
        .prop_map(|(p, q, v)| FittedValueModel::new(p, q, v).unwrap())
}

/// A customer state with at least one repeat purchase and `recency <= tenure`.
fn customer() -> impl Strategy<Value = CustomerRecord> {
    (1..30_u32, 1.0..100.0_f64, 0.0..=1.0_f64, 1.0..500.0_f64).prop_map(
        |(frequency, tenure, recency_share, monetary_avg)| CustomerRecord {
            customer_id: "customer".to_owned(),
            frequency,
            recency: tenure * recency_share,
            tenure,
            monetary_avg,
        },
    )
}

fn within(lower: f64, upper: f64) -> bool {
    lower <= upper + 1e-9 * upper.abs().max(1.0)
}

proptest! {
    #[test]
    fn prop_expected_transactions_grow_with_horizon(
        model in count_model(),
        record in customer(),
        short in 0.0..100.0_f64,
        extra in 0.0..100.0_f64,
    ) {
        let at = |horizon| {
            model
                .predict_expected_transactions(horizon, record.frequency, record.recency, record.tenure)
                .unwrap()
        };
        let near = at(short);
        let far = at(short + extra);
        prop_assert!(near >= 0.0);
        prop_assert!(within(near, far), "{near} > {far}");
    }

    #[test]
    fn prop_alive_probability_is_a_probability(model in count_model(), record in customer()) {
        let p = model
            .alive_probability(record.frequency, record.recency, record.tenure)
            .unwrap();
        prop_assert!((0.0..=1.0).contains(&p));
    }

    #[test]
    fn prop_zero_horizon_has_zero_value(
        count in count_model(),
        value in value_model(),
        record in customer(),
        discount_rate in 0.0..0.5_f64,
    ) {
        let cltv = compute_cltv(&count, &value, &record, 0.0, TimeUnit::Week, discount_rate).unwrap();
        prop_assert_eq!(cltv, 0.0);
    }

    #[test]
    fn prop_cltv_grows_with_horizon(
        count in count_model(),
        value in value_model(),
        record in customer(),
        short in 0.0..24.0_f64,
        extra in 0.0..24.0_f64,
        discount_rate in 0.0..0.2_f64,
    ) {
        let at = |horizon| {
            compute_cltv(&count, &value, &record, horizon, TimeUnit::Week, discount_rate).unwrap()
        };
        let near = at(short);
        let far = at(short + extra);
        prop_assert!(within(near, far), "{near} > {far}");
    }

    #[test]
    fn prop_cltv_shrinks_with_discount_rate(
        count in count_model(),
        value in value_model(),
        record in customer(),
        horizon in 0.0..24.0_f64,
        low in 0.0..0.2_f64,
        extra in 0.0..0.2_f64,
    ) {
        let at = |rate| compute_cltv(&count, &value, &record, horizon, TimeUnit::Week, rate).unwrap();
        let cheap = at(low);
        let expensive = at(low + extra);
        prop_assert!(expensive <= cheap, "{expensive} > {cheap}");
    }

    #[test]
    fn prop_shrinkage_converges_to_own_average(model in value_model(), monetary_avg in 1.0..1000.0_f64) {
        let population = model.population_mean();
        let estimate = model.expected_average_value(1_000_000, monetary_avg).unwrap();
        let tolerance = 1e-3 * (population - monetary_avg).abs() + 1e-9 * monetary_avg.max(population);
        prop_assert!((estimate - monetary_avg).abs() <= tolerance);
    }

    #[test]
    fn prop_single_purchase_lies_between_own_and_population(
        model in value_model(),
        monetary_avg in 1.0..1000.0_f64,
    ) {
        let population = model.population_mean();
        prop_assume!((population - monetary_avg).abs() > 1e-6 * population.max(monetary_avg));
        let estimate = model.expected_average_value(1, monetary_avg).unwrap();
        prop_assert!(estimate > population.min(monetary_avg));
        prop_assert!(estimate < population.max(monetary_avg));
    }

    #[test]
    fn prop_segments_partition_scores(scores in prop::collection::vec(0.0..1000.0_f64, 4..200)) {
        let mut distinct = scores.clone();
        distinct.sort_by(f64::total_cmp);
        distinct.dedup();
        prop_assume!(distinct.len() >= 4);

        let segments = assign_segments(&scores).unwrap();
        prop_assert_eq!(segments.len(), scores.len());

        let n = scores.len();
        let mut bounds = Vec::new();
        for segment in Segment::ALL {
            let members = scores
                .iter()
                .zip(&segments)
                .filter(|(_, s)| **s == segment)
                .map(|(score, _)| *score)
                .collect::<Vec<_>>();
            prop_assert!(members.len() >= n / 4 && members.len() <= n.div_ceil(4));
            let min = members.iter().copied().fold(f64::INFINITY, f64::min);
            let max = members.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            bounds.push((min, max));
        }
        for pair in bounds.windows(2) {
            let (lower, upper) = (pair[0], pair[1]);
            prop_assert!(upper.0 >= lower.1, "segment overlap: {lower:?} vs {upper:?}");
        }
    }
}
