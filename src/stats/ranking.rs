//! Ranking Module
//! Ranks entities by a metric and collapses the tail into a single "Other"
//! aggregate.

use polars::prelude::*;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

use crate::data::{ENTITY_COL, YEAR_COL};

/// Label of the synthetic tail entry.
pub const OTHER_LABEL: &str = "Other";

#[derive(Error, Debug)]
pub enum RankingError {
    #[error("No entities to rank")]
    InsufficientData,
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedEntry {
    pub label: String,
    pub value: f64,
}

/// Top-N entities by value descending plus one "Other" entry for the rest.
#[derive(Debug, Clone, Serialize)]
pub struct CollapsedRanking {
    pub entries: Vec<RankedEntry>,
    pub normalized: bool,
}

impl CollapsedRanking {
    pub fn total(&self) -> f64 {
        self.entries.iter().map(|e| e.value).sum()
    }
}

/// Sort `pairs` by value descending, keep the first `n`, and sum the
/// remainder into an `"Other"` entry.
///
/// The sort is stable: tied entities keep their input (snapshot) order, so
/// the boundary entity is deterministic. With `n` or fewer entities the
/// collapse degrades to returning every entity with no `"Other"` row; an
/// empty input is `InsufficientData`.
///
/// `normalize` divides every entry (including `"Other"`) by the grand total
/// so the values sum to 1.0. A zero grand total leaves values untouched.
pub fn collapse_top_n(
    pairs: &[(String, f64)],
    n: usize,
    normalize: bool,
) -> Result<CollapsedRanking, RankingError> {
    if pairs.is_empty() {
        return Err(RankingError::InsufficientData);
    }

    let mut ranked = pairs.to_vec();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

    let grand_total: f64 = ranked.iter().map(|(_, v)| v).sum();

    let mut entries: Vec<RankedEntry> = ranked
        .iter()
        .take(n)
        .map(|(label, value)| RankedEntry {
            label: label.clone(),
            value: *value,
        })
        .collect();

    if ranked.len() > n {
        let other: f64 = ranked[n..].iter().map(|(_, v)| v).sum();
        entries.push(RankedEntry {
            label: OTHER_LABEL.to_string(),
            value: other,
        });
    }

    if normalize && grand_total != 0.0 {
        for entry in &mut entries {
            entry.value /= grand_total;
        }
    }

    Ok(CollapsedRanking {
        entries,
        normalized: normalize,
    })
}

/// For every year, the top-`n` entities by `column` (value descending,
/// stable tie-break). Rows with a missing metric are skipped.
pub fn annual_leaders(
    df: &DataFrame,
    column: &str,
    n: usize,
) -> Result<Vec<(i32, Vec<String>)>, RankingError> {
    let entities = df.column(ENTITY_COL)?.clone();
    let years = df.column(YEAR_COL)?.cast(&DataType::Int64)?;
    let years_ca = years.i64()?;
    let values = df.column(column)?.cast(&DataType::Float64)?;
    let values_ca = values.f64()?;

    let mut groups: BTreeMap<i32, Vec<(String, f64)>> = BTreeMap::new();
    for i in 0..df.height() {
        let Ok(e) = entities.get(i) else { continue };
        if e.is_null() {
            continue;
        }
        if let (Some(y), Some(v)) = (years_ca.get(i), values_ca.get(i)) {
            let entity = e.to_string().trim_matches('"').to_string();
            groups.entry(y as i32).or_default().push((entity, v));
        }
    }

    Ok(groups
        .into_iter()
        .map(|(year, mut pairs)| {
            pairs.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
            let leaders = pairs.into_iter().take(n).map(|(e, _)| e).collect();
            (year, leaders)
        })
        .collect())
}

/// Collapse annual leaders into (entity, appearance-count) pairs, most
/// frequent first. Ties keep first-appearance order.
pub fn leader_frequencies(leaders: &[(i32, Vec<String>)]) -> Vec<(String, usize)> {
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();

    for (_, names) in leaders {
        for name in names {
            if !counts.contains_key(name) {
                order.push(name.clone());
            }
            *counts.entry(name.clone()).or_insert(0) += 1;
        }
    }

    let mut out: Vec<(String, usize)> = order
        .into_iter()
        .map(|name| {
            let count = counts[&name];
            (name, count)
        })
        .collect();
    out.sort_by(|a, b| b.1.cmp(&a.1));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(raw: &[(&str, f64)]) -> Vec<(String, f64)> {
        raw.iter().map(|(l, v)| (l.to_string(), *v)).collect()
    }

    #[test]
    fn collapses_tail_into_other() {
        let input = pairs(&[("A", 50.0), ("B", 30.0), ("C", 15.0), ("D", 5.0)]);
        let ranking = collapse_top_n(&input, 2, false).unwrap();
        assert_eq!(
            ranking.entries,
            vec![
                RankedEntry {
                    label: "A".into(),
                    value: 50.0
                },
                RankedEntry {
                    label: "B".into(),
                    value: 30.0
                },
                RankedEntry {
                    label: "Other".into(),
                    value: 20.0
                },
            ]
        );
    }

    #[test]
    fn unnormalized_total_is_preserved() {
        let input = pairs(&[("A", 50.0), ("B", 30.0), ("C", 15.0), ("D", 5.0)]);
        let ranking = collapse_top_n(&input, 2, false).unwrap();
        assert_eq!(ranking.total(), 100.0);
    }

    #[test]
    fn normalized_values_sum_to_one() {
        let input = pairs(&[("A", 50.0), ("B", 30.0), ("C", 15.0), ("D", 5.0)]);
        let ranking = collapse_top_n(&input, 2, true).unwrap();
        assert!((ranking.total() - 1.0).abs() < 1e-12);
        assert_eq!(ranking.entries[0].value, 0.5);
    }

    #[test]
    fn fewer_entities_than_n_degrades_without_other() {
        let input = pairs(&[("A", 50.0), ("B", 30.0)]);
        let ranking = collapse_top_n(&input, 10, false).unwrap();
        assert_eq!(ranking.entries.len(), 2);
        assert!(ranking.entries.iter().all(|e| e.label != OTHER_LABEL));
    }

    #[test]
    fn empty_input_is_insufficient() {
        let err = collapse_top_n(&[], 3, false).unwrap_err();
        assert!(matches!(err, RankingError::InsufficientData));
    }

    #[test]
    fn ties_keep_input_order() {
        let input = pairs(&[("First", 10.0), ("Second", 10.0), ("Third", 10.0)]);
        let ranking = collapse_top_n(&input, 2, false).unwrap();
        assert_eq!(ranking.entries[0].label, "First");
        assert_eq!(ranking.entries[1].label, "Second");
        assert_eq!(ranking.entries[2].value, 10.0);
    }

    #[test]
    fn annual_leaders_and_frequencies() {
        let df = DataFrame::new(vec![
            Column::new(
                "Entity".into(),
                vec!["China", "India", "Chad", "China", "India", "Chad"],
            ),
            Column::new("Year".into(), vec![2019i64, 2019, 2019, 2020, 2020, 2020]),
            Column::new(
                "Internet Users(%)".into(),
                vec![60.0, 40.0, 10.0, 65.0, 45.0, 12.0],
            ),
        ])
        .unwrap();

        let leaders = annual_leaders(&df, "Internet Users(%)", 2).unwrap();
        assert_eq!(
            leaders,
            vec![
                (2019, vec!["China".to_string(), "India".to_string()]),
                (2020, vec!["China".to_string(), "India".to_string()]),
            ]
        );

        let freqs = leader_frequencies(&leaders);
        assert_eq!(
            freqs,
            vec![("China".to_string(), 2), ("India".to_string(), 2)]
        );
    }
}
