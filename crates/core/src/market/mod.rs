pub mod aggregator;
pub mod provider;
pub mod summary;
pub mod types;
