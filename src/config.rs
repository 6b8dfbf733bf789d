//! Run Configuration
//! Analysis settings with defaults matching the reference dataset.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Settings for a full analysis run.
///
/// All fields have defaults tuned for the Our World in Data internet-adoption
/// CSV; a JSON file can override any subset of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Path to the input CSV.
    pub data_path: PathBuf,
    /// Directory the chart images and summary are written to.
    pub output_dir: PathBuf,
    /// Year used for the entity snapshot analyses.
    pub snapshot_year: i32,
    /// Pseudo-entities dropped from snapshots (they double-count countries).
    pub exclude_entities: Vec<String>,
    /// Entity for the single-entity deep dive.
    pub focus_entity: String,
    /// How many entities to keep before collapsing into "Other".
    pub top_n: usize,
    /// Entities per year in the annual-leaders analysis.
    pub leaders_per_year: usize,
    /// Degree of the polynomial trend fit.
    pub poly_degree: usize,
    /// Last year of the trend forecast (inclusive).
    pub forecast_until: i32,
    /// Bucket width (in percentage points) for the adoption histogram.
    pub histogram_bucket: f64,
    /// Chart image size in pixels.
    pub chart_size: (u32, u32),
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("data/internet_users.csv"),
            output_dir: PathBuf::from("img"),
            snapshot_year: 2020,
            exclude_entities: vec!["World".to_string()],
            focus_entity: "China".to_string(),
            top_n: 10,
            leaders_per_year: 3,
            poly_degree: 3,
            forecast_until: 2030,
            histogram_bucket: 10.0,
            chart_size: (1280, 800),
        }
    }
}

impl Settings {
    /// Load settings from a JSON file, falling back to defaults for
    /// missing fields.
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&text)?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_dataset() {
        let s = Settings::default();
        assert_eq!(s.snapshot_year, 2020);
        assert_eq!(s.top_n, 10);
        assert_eq!(s.exclude_entities, vec!["World".to_string()]);
        assert_eq!(s.poly_degree, 3);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let s: Settings = serde_json::from_str(r#"{"snapshot_year": 2019}"#).unwrap();
        assert_eq!(s.snapshot_year, 2019);
        assert_eq!(s.focus_entity, "China");
    }
}
