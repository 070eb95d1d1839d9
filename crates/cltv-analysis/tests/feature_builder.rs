use chrono::NaiveDate;
use cltv_analysis::{aggregate::CustomerAggregate, feature_builder::RfmFeatureBuilder};
use cltv_model::config::TimeUnit;
use proptest::prelude::*;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn aggregate(id: usize, orders: u32) -> CustomerAggregate {
    CustomerAggregate {
        master_id: format!("c{id}"),
        order_channel: "Mobile".to_owned(),
        last_order_channel: "Mobile".to_owned(),
        first_order_date: date(2020, 1, 1),
        last_order_date: date(2021, 1, 1),
        last_order_date_online: None,
        last_order_date_offline: None,
        order_num_total_ever_online: f64::from(orders),
        order_num_total_ever_offline: 0.0,
        customer_value_total_ever_offline: 0.0,
        customer_value_total_ever_online: 10.0 * f64::from(orders) + 1.0,
        interested_in_categories_12: String::new(),
    }
}

proptest! {
    #[test]
    fn prop_raising_min_frequency_keeps_a_subset(
        orders in prop::collection::vec(0..8_u32, 1..40),
        min_frequency in 0..4_u32,
        extra in 0..4_u32,
    ) {
        let rows = orders
            .iter()
            .enumerate()
            .map(|(i, &n)| aggregate(i, n))
            .collect::<Vec<_>>();
        let build = |min_frequency| {
            RfmFeatureBuilder::new(date(2021, 6, 1), TimeUnit::Week, min_frequency).build(&rows)
        };
        let loose = build(min_frequency);
        let strict = build(min_frequency + extra);

        for dataset in [&loose, &strict] {
            prop_assert_eq!(
                dataset.records.len() + dataset.excluded + dataset.dropped.len(),
                rows.len()
            );
        }
        prop_assert!(loose.records.iter().all(|r| r.frequency > min_frequency));
        prop_assert!(strict.records.iter().all(|r| r.frequency > min_frequency + extra));
        for record in &strict.records {
            prop_assert!(loose.records.contains(record));
        }
    }

    #[test]
    fn prop_records_respect_time_order(
        first_offset in 0..400_u64,
        span in 0..400_u64,
        slack in 0..400_u64,
    ) {
        let first = date(2019, 1, 1) + chrono::Days::new(first_offset);
        let last = first + chrono::Days::new(span);
        let analysis_date = last + chrono::Days::new(slack);
        let row = CustomerAggregate {
            first_order_date: first,
            last_order_date: last,
            ..aggregate(0, 3)
        };
        let record = RfmFeatureBuilder::new(analysis_date, TimeUnit::Day, 1)
            .build_record(&row)
            .unwrap()
            .unwrap();
        prop_assert!(record.recency >= 0.0);
        prop_assert!(record.recency <= record.tenure);
        prop_assert!(record.monetary_avg > 0.0);
    }
}
