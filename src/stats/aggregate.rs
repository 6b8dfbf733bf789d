//! Year Aggregation Module
//! Groups records by year and reduces one metric within each group.

use polars::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::data::YEAR_COL;

#[derive(Error, Debug)]
pub enum AggregateError {
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
}

/// Reduction applied to a metric within each year group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reducer {
    Sum,
    Mean,
    Max,
}

impl Reducer {
    fn reduce(&self, values: &[f64]) -> f64 {
        match self {
            Reducer::Sum => values.iter().sum(),
            Reducer::Mean => values.iter().sum::<f64>() / values.len() as f64,
            Reducer::Max => values.iter().fold(f64::NEG_INFINITY, |acc, &v| acc.max(v)),
        }
    }
}

/// Sum, mean, and max of one metric within one year group.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ColumnSummary {
    pub sum: f64,
    pub mean: f64,
    pub max: f64,
}

/// Group rows by year and reduce `column` within each group.
///
/// Returns the series ordered by year ascending. Missing cells are excluded
/// from the reduction, never zero-filled; a year with no valid cells is
/// omitted from the output.
pub fn aggregate_by_year(
    df: &DataFrame,
    column: &str,
    reducer: Reducer,
) -> Result<Vec<(i32, f64)>, AggregateError> {
    let groups = grouped_values(df, column)?;
    Ok(groups
        .into_iter()
        .map(|(year, values)| (year, reducer.reduce(&values)))
        .collect())
}

/// All three reductions of `column` in one pass per year group.
pub fn summarize_by_year(
    df: &DataFrame,
    column: &str,
) -> Result<Vec<(i32, ColumnSummary)>, AggregateError> {
    let groups = grouped_values(df, column)?;
    Ok(groups
        .into_iter()
        .map(|(year, values)| {
            let summary = ColumnSummary {
                sum: Reducer::Sum.reduce(&values),
                mean: Reducer::Mean.reduce(&values),
                max: Reducer::Max.reduce(&values),
            };
            (year, summary)
        })
        .collect())
}

fn grouped_values(df: &DataFrame, column: &str) -> Result<BTreeMap<i32, Vec<f64>>, AggregateError> {
    let years = df.column(YEAR_COL)?.cast(&DataType::Int64)?;
    let years_ca = years.i64()?;
    let values = df.column(column)?.cast(&DataType::Float64)?;
    let values_ca = values.f64()?;

    let mut groups: BTreeMap<i32, Vec<f64>> = BTreeMap::new();
    for i in 0..df.height() {
        if let (Some(y), Some(v)) = (years_ca.get(i), values_ca.get(i)) {
            groups.entry(y as i32).or_default().push(v);
        }
    }
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_df() -> DataFrame {
        DataFrame::new(vec![
            Column::new(
                "Entity".into(),
                vec!["China", "India", "China", "India", "Chad"],
            ),
            Column::new("Year".into(), vec![2019i64, 2019, 2020, 2020, 2021]),
            Column::new(
                "Internet Users(%)".into(),
                vec![Some(60.0), Some(40.0), Some(65.0), Some(45.0), None],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn sum_over_years_equals_direct_total() {
        let df = sample_df();
        let by_year = aggregate_by_year(&df, "Internet Users(%)", Reducer::Sum).unwrap();
        let total: f64 = by_year.iter().map(|(_, v)| v).sum();
        assert_eq!(total, 60.0 + 40.0 + 65.0 + 45.0);
    }

    #[test]
    fn output_is_year_ordered() {
        let df = sample_df();
        let by_year = aggregate_by_year(&df, "Internet Users(%)", Reducer::Max).unwrap();
        assert_eq!(by_year, vec![(2019, 60.0), (2020, 65.0)]);
    }

    #[test]
    fn mean_excludes_missing_cells() {
        let df = DataFrame::new(vec![
            Column::new("Entity".into(), vec!["A", "B", "C"]),
            Column::new("Year".into(), vec![2020i64, 2020, 2020]),
            Column::new(
                "Internet Users(%)".into(),
                vec![Some(10.0), None, Some(30.0)],
            ),
        ])
        .unwrap();
        let by_year = aggregate_by_year(&df, "Internet Users(%)", Reducer::Mean).unwrap();
        // Missing cell excluded: mean of {10, 30}, not {10, 0, 30}.
        assert_eq!(by_year, vec![(2020, 20.0)]);
    }

    #[test]
    fn all_missing_year_is_omitted() {
        let df = sample_df();
        let by_year = aggregate_by_year(&df, "Internet Users(%)", Reducer::Sum).unwrap();
        assert!(by_year.iter().all(|&(y, _)| y != 2021));
    }

    #[test]
    fn summary_combines_all_reducers() {
        let df = sample_df();
        let summaries = summarize_by_year(&df, "Internet Users(%)").unwrap();
        let (year, s) = summaries[0];
        assert_eq!(year, 2019);
        assert_eq!(s.sum, 100.0);
        assert_eq!(s.mean, 50.0);
        assert_eq!(s.max, 60.0);
    }
}
