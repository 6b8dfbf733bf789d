//! Statistics module - aggregation, ranking, regression, growth

mod aggregate;
mod growth;
mod ranking;
mod regression;

pub use aggregate::{
    aggregate_by_year, summarize_by_year, AggregateError, ColumnSummary, Reducer,
};
pub use growth::pct_change;
pub use ranking::{
    annual_leaders, collapse_top_n, leader_frequencies, CollapsedRanking, RankedEntry,
    RankingError, OTHER_LABEL,
};
pub use regression::{LinearModel, PolynomialModel, RegressionError};
