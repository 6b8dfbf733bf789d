//! Data module - CSV loading and snapshot extraction

mod loader;
mod processor;

pub use loader::{DatasetLoader, LoaderError};
pub use processor::{entity_series, snapshot_year, EntitySnapshot, SnapshotError};

/// Entity (country / region / aggregate) column.
pub const ENTITY_COL: &str = "Entity";
/// Observation year column.
pub const YEAR_COL: &str = "Year";
/// Mobile subscriptions per 100 people. Can exceed 100.
pub const CELLULAR_COL: &str = "Cellular Subscription";
/// Share of the population using the internet.
pub const USERS_PCT_COL: &str = "Internet Users(%)";
/// Absolute internet user count.
pub const USERS_COUNT_COL: &str = "No. of Internet Users";
/// Fixed broadband subscriptions per 100 people.
pub const BROADBAND_COL: &str = "Broadband Subscription";

/// The numeric metric columns, in dataset order.
pub const METRIC_COLUMNS: [&str; 4] = [
    CELLULAR_COL,
    USERS_PCT_COL,
    USERS_COUNT_COL,
    BROADBAND_COL,
];
