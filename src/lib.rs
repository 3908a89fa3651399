//! Municipal crime incidence (SESNSP) → long-form Parquet table, plus the
//! shared choropleth query and catalog join used by the dashboards.
pub mod catalog;
pub mod config;
pub mod process;
pub mod query;
pub mod store;
