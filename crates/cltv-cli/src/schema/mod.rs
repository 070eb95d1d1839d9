pub mod model_file;
pub mod scored_customer;
