//! CSV Dataset Loader Module
//! Loads the adoption dataset and validates its schema using Polars.

use polars::prelude::*;
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

use super::{ENTITY_COL, METRIC_COLUMNS, YEAR_COL};

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Failed to load CSV: {0}")]
    Csv(#[from] PolarsError),
    #[error("Declared column '{0}' is missing from the dataset")]
    MissingColumn(String),
    #[error("Column '{column}' is not numeric (found {dtype})")]
    NonNumericColumn { column: String, dtype: String },
    #[error("Duplicate (Entity, Year) pair: ({entity}, {year})")]
    DuplicateKey { entity: String, year: i64 },
}

/// Loads the dataset CSV and narrows it to the declared columns.
///
/// The source file carries an unnamed leading row-index column and a `Code`
/// column; neither is part of the declared schema and both are dropped here.
pub struct DatasetLoader;

impl DatasetLoader {
    /// Load a CSV file, validate the declared columns, and reject duplicate
    /// (Entity, Year) keys.
    pub fn load(path: &Path) -> Result<DataFrame, LoaderError> {
        // Lazy scan, then collect; bad numeric cells become nulls and fall
        // under the missing-value exclusion policy.
        let df = LazyCsvReader::new(path)
            .with_infer_schema_length(Some(10000))
            .with_ignore_errors(true)
            .finish()?
            .collect()?;

        Self::validate(df)
    }

    /// Schema validation shared by `load` and in-memory tables.
    pub fn validate(df: DataFrame) -> Result<DataFrame, LoaderError> {
        for name in Self::declared_columns() {
            if df.column(name).is_err() {
                return Err(LoaderError::MissingColumn(name.to_string()));
            }
        }

        let df = df.select(Self::declared_columns())?;

        let year_dtype = df.column(YEAR_COL)?.dtype().clone();
        if !Self::is_numeric(&year_dtype) {
            return Err(LoaderError::NonNumericColumn {
                column: YEAR_COL.to_string(),
                dtype: year_dtype.to_string(),
            });
        }

        for name in METRIC_COLUMNS {
            let dtype = df.column(name)?.dtype().clone();
            if !Self::is_numeric(&dtype) {
                return Err(LoaderError::NonNumericColumn {
                    column: name.to_string(),
                    dtype: dtype.to_string(),
                });
            }
        }

        Self::check_unique_keys(&df)?;
        Ok(df)
    }

    fn declared_columns() -> [&'static str; 6] {
        [
            ENTITY_COL,
            YEAR_COL,
            METRIC_COLUMNS[0],
            METRIC_COLUMNS[1],
            METRIC_COLUMNS[2],
            METRIC_COLUMNS[3],
        ]
    }

    fn is_numeric(dtype: &DataType) -> bool {
        matches!(
            dtype,
            DataType::Float32
                | DataType::Float64
                | DataType::Int8
                | DataType::Int16
                | DataType::Int32
                | DataType::Int64
                | DataType::UInt8
                | DataType::UInt16
                | DataType::UInt32
                | DataType::UInt64
        )
    }

    /// Fail fast on duplicate (Entity, Year) pairs; silently picking one row
    /// would skew every downstream aggregate.
    fn check_unique_keys(df: &DataFrame) -> Result<(), LoaderError> {
        let entities = df.column(ENTITY_COL)?;
        let years = df.column(YEAR_COL)?.cast(&DataType::Int64)?;
        let years_ca = years.i64()?;

        let mut seen: HashSet<(String, i64)> = HashSet::with_capacity(df.height());
        for i in 0..df.height() {
            let (Ok(e), Some(y)) = (entities.get(i), years_ca.get(i)) else {
                continue;
            };
            if e.is_null() {
                continue;
            }
            let entity = e.to_string().trim_matches('"').to_string();
            if !seen.insert((entity.clone(), y)) {
                return Err(LoaderError::DuplicateKey { entity, year: y });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn write_temp_csv(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("netpulse_{}_{}", std::process::id(), name));
        fs::write(&path, content).unwrap();
        path
    }

    const HEADER: &str = ",Entity,Code,Year,Cellular Subscription,Internet Users(%),No. of Internet Users,Broadband Subscription";

    #[test]
    fn loads_and_drops_undeclared_columns() {
        let csv = format!(
            "{HEADER}\n0,China,CHN,2019,120.0,60.0,900000000,30.0\n1,China,CHN,2020,125.0,65.0,990000000,34.0\n"
        );
        let path = write_temp_csv("ok.csv", &csv);
        let df = DatasetLoader::load(&path).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), 6);
        assert!(df.column("Code").is_err());
    }

    #[test]
    fn missing_declared_column_is_rejected() {
        let csv = ",Entity,Year\n0,China,2020\n";
        let path = write_temp_csv("missing.csv", csv);
        let err = DatasetLoader::load(&path).unwrap_err();
        assert!(matches!(err, LoaderError::MissingColumn(c) if c == "Cellular Subscription"));
    }

    #[test]
    fn non_numeric_metric_column_is_rejected() {
        let csv = format!("{HEADER}\n0,China,CHN,2020,high,60.0,900000000,30.0\n");
        let path = write_temp_csv("nonnum.csv", &csv);
        let err = DatasetLoader::load(&path).unwrap_err();
        assert!(matches!(
            err,
            LoaderError::NonNumericColumn { column, .. } if column == "Cellular Subscription"
        ));
    }

    #[test]
    fn duplicate_entity_year_fails_fast() {
        let csv = format!(
            "{HEADER}\n0,China,CHN,2020,120.0,60.0,900000000,30.0\n1,China,CHN,2020,121.0,61.0,910000000,31.0\n"
        );
        let path = write_temp_csv("dup.csv", &csv);
        let err = DatasetLoader::load(&path).unwrap_err();
        assert!(matches!(
            err,
            LoaderError::DuplicateKey { entity, year } if entity == "China" && year == 2020
        ));
    }
}
