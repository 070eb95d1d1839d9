use chrono::NaiveDate;

use crate::aggregate::CustomerAggregate;

/// A plausible input row with 5 orders between 2020-10-30 and 2021-02-26.
pub(crate) fn aggregate(id: &str) -> CustomerAggregate {
    CustomerAggregate {
        master_id: id.to_owned(),
        order_channel: "Android App".to_owned(),
        last_order_channel: "Offline".to_owned(),
        first_order_date: NaiveDate::from_ymd_opt(2020, 10, 30).unwrap(),
        last_order_date: NaiveDate::from_ymd_opt(2021, 2, 26).unwrap(),
        last_order_date_online: NaiveDate::from_ymd_opt(2021, 2, 21),
        last_order_date_offline: NaiveDate::from_ymd_opt(2021, 2, 26),
        order_num_total_ever_online: 4.0,
        order_num_total_ever_offline: 1.0,
        customer_value_total_ever_offline: 139.99,
        customer_value_total_ever_online: 799.38,
        interested_in_categories_12: "[KADIN]".to_owned(),
    }
}
