//! Snapshot Extraction Module
//! Restricts the dataset to one year or one entity for downstream analysis.

use polars::prelude::*;
use std::collections::HashMap;
use thiserror::Error;

use super::{ENTITY_COL, METRIC_COLUMNS, YEAR_COL};

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
    #[error("No rows for year {0}")]
    EmptyYear(i32),
    #[error("Unknown entity '{0}'")]
    UnknownEntity(String),
}

/// The dataset restricted to a single year, indexed by entity.
///
/// Entities appear in source-row order; that order is the tie-break used by
/// the ranking collapse, so it is part of the contract.
#[derive(Debug, Clone)]
pub struct EntitySnapshot {
    year: i32,
    entities: Vec<String>,
    index: HashMap<String, usize>,
    columns: HashMap<String, Vec<Option<f64>>>,
}

impl EntitySnapshot {
    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn entities(&self) -> &[String] {
        &self.entities
    }

    /// All cells of one metric, in entity order.
    pub fn metric(&self, column: &str) -> Option<&[Option<f64>]> {
        self.columns.get(column).map(|v| v.as_slice())
    }

    /// Single cell lookup by entity.
    pub fn value(&self, entity: &str, column: &str) -> Option<f64> {
        let row = *self.index.get(entity)?;
        self.columns.get(column)?.get(row).copied().flatten()
    }

    /// (entity, value) pairs for one metric, missing cells excluded.
    pub fn pairs(&self, column: &str) -> Vec<(String, f64)> {
        let Some(cells) = self.columns.get(column) else {
            return Vec::new();
        };
        self.entities
            .iter()
            .zip(cells.iter())
            .filter_map(|(e, v)| v.map(|v| (e.clone(), v)))
            .collect()
    }

    /// Present (non-missing) values of one metric, in entity order.
    pub fn values(&self, column: &str) -> Vec<f64> {
        self.columns
            .get(column)
            .map(|cells| cells.iter().filter_map(|v| *v).collect())
            .unwrap_or_default()
    }
}

/// Filter the table to `Year == year`, dropping any entity named in
/// `exclude`. Fails with `EmptyYear` when nothing is left.
pub fn snapshot_year(
    df: &DataFrame,
    year: i32,
    exclude: &[String],
) -> Result<EntitySnapshot, SnapshotError> {
    let filtered = df
        .clone()
        .lazy()
        .filter(col(YEAR_COL).eq(lit(year)))
        .collect()?;

    if filtered.height() == 0 {
        return Err(SnapshotError::EmptyYear(year));
    }

    let entity_col = filtered.column(ENTITY_COL)?;

    // First pass: decide which rows survive the exclusion list.
    let mut entities: Vec<String> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut kept_rows: Vec<usize> = Vec::new();
    for i in 0..filtered.height() {
        let Ok(e) = entity_col.get(i) else { continue };
        if e.is_null() {
            continue;
        }
        let entity = e.to_string().trim_matches('"').to_string();
        if exclude.iter().any(|x| x == &entity) {
            continue;
        }
        index.insert(entity.clone(), entities.len());
        entities.push(entity);
        kept_rows.push(i);
    }

    let mut columns: HashMap<String, Vec<Option<f64>>> = HashMap::new();
    for name in METRIC_COLUMNS {
        let cast = filtered.column(name)?.cast(&DataType::Float64)?;
        let ca = cast.f64()?;
        let cells = kept_rows.iter().map(|&i| ca.get(i)).collect();
        columns.insert(name.to_string(), cells);
    }

    if entities.is_empty() {
        return Err(SnapshotError::EmptyYear(year));
    }

    Ok(EntitySnapshot {
        year,
        entities,
        index,
        columns,
    })
}

/// (year, value) series of one metric for one entity, ordered by year.
/// Missing cells are excluded from the series.
pub fn entity_series(
    df: &DataFrame,
    entity: &str,
    column: &str,
) -> Result<Vec<(i32, f64)>, SnapshotError> {
    let filtered = df
        .clone()
        .lazy()
        .filter(col(ENTITY_COL).eq(lit(entity)))
        .collect()?;

    if filtered.height() == 0 {
        return Err(SnapshotError::UnknownEntity(entity.to_string()));
    }

    let years = filtered.column(YEAR_COL)?.cast(&DataType::Int64)?;
    let years_ca = years.i64()?;
    let values = filtered.column(column)?.cast(&DataType::Float64)?;
    let values_ca = values.f64()?;

    let mut series: Vec<(i32, f64)> = Vec::with_capacity(filtered.height());
    for i in 0..filtered.height() {
        if let (Some(y), Some(v)) = (years_ca.get(i), values_ca.get(i)) {
            series.push((y as i32, v));
        }
    }
    series.sort_by_key(|&(y, _)| y);
    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_df() -> DataFrame {
        DataFrame::new(vec![
            Column::new("Entity".into(), vec!["World", "China", "India", "China"]),
            Column::new("Year".into(), vec![2020i64, 2020, 2020, 2019]),
            Column::new(
                "Cellular Subscription".into(),
                vec![Some(105.0), Some(120.0), Some(83.0), Some(110.0)],
            ),
            Column::new(
                "Internet Users(%)".into(),
                vec![Some(60.0), Some(65.0), None, Some(60.0)],
            ),
            Column::new(
                "No. of Internet Users".into(),
                vec![Some(4.6e9), Some(9.9e8), Some(6.2e8), Some(9.0e8)],
            ),
            Column::new(
                "Broadband Subscription".into(),
                vec![Some(15.0), Some(34.0), Some(2.0), Some(30.0)],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn snapshot_excludes_world_pseudo_entity() {
        let df = sample_df();
        let snap = snapshot_year(&df, 2020, &["World".to_string()]).unwrap();
        assert_eq!(snap.entities(), ["China".to_string(), "India".to_string()]);
        assert_eq!(snap.year(), 2020);
        assert_eq!(snap.value("China", "Cellular Subscription"), Some(120.0));
    }

    #[test]
    fn snapshot_pairs_skip_missing_cells() {
        let df = sample_df();
        let snap = snapshot_year(&df, 2020, &["World".to_string()]).unwrap();
        let pairs = snap.pairs("Internet Users(%)");
        assert_eq!(pairs, vec![("China".to_string(), 65.0)]);
    }

    #[test]
    fn missing_year_is_empty() {
        let df = sample_df();
        let err = snapshot_year(&df, 1999, &[]).unwrap_err();
        assert!(matches!(err, SnapshotError::EmptyYear(1999)));
    }

    #[test]
    fn entity_series_is_year_ordered() {
        let df = sample_df();
        let series = entity_series(&df, "China", "Broadband Subscription").unwrap();
        assert_eq!(series, vec![(2019, 30.0), (2020, 34.0)]);
    }

    #[test]
    fn unknown_entity_is_an_error() {
        let df = sample_df();
        let err = entity_series(&df, "Atlantis", "Broadband Subscription").unwrap_err();
        assert!(matches!(err, SnapshotError::UnknownEntity(_)));
    }
}
