//! Analysis Orchestration
//! Runs every chart analysis over the loaded table and writes a JSON summary
//! of the fitted models and rankings. Analyses are independent; one failing
//! does not stop the others.

use anyhow::{Context, Result};
use polars::prelude::DataFrame;
use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

use crate::charts::ChartRenderer;
use crate::config::Settings;
use crate::data::{
    entity_series, snapshot_year, EntitySnapshot, BROADBAND_COL, CELLULAR_COL, USERS_COUNT_COL,
    USERS_PCT_COL,
};
use crate::stats::{
    aggregate_by_year, annual_leaders, collapse_top_n, leader_frequencies, pct_change,
    summarize_by_year, CollapsedRanking, LinearModel, PolynomialModel, Reducer,
};

/// Divisor for the focus-entity user counts (tens of millions).
const USERS_SCALE: f64 = 1e7;

/// Result of one independent analysis.
pub struct AnalysisOutcome {
    pub name: &'static str,
    pub result: Result<Vec<PathBuf>>,
}

type Analysis = (&'static str, fn(&DataFrame, &Settings) -> Result<Vec<PathBuf>>);

const ANALYSES: [Analysis; 6] = [
    ("global-overview", global_overview),
    ("adoption-share", adoption_share),
    ("adoption-histogram", adoption_histogram),
    ("adoption-vs-cellular", adoption_vs_cellular),
    ("annual-leaders", annual_leaders_chart),
    ("focus-entity", focus_entity),
];

/// Run every analysis on the rayon pool, one outcome per analysis.
pub fn run_all(df: &DataFrame, settings: &Settings) -> Vec<AnalysisOutcome> {
    ANALYSES
        .par_iter()
        .map(|&(name, run)| AnalysisOutcome {
            name,
            result: run(df, settings),
        })
        .collect()
}

/// Yearly user-count total plus mean/max lines for the per-100 metrics.
fn global_overview(df: &DataFrame, s: &Settings) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    let sums = aggregate_by_year(df, USERS_COUNT_COL, Reducer::Sum)?;
    let path = s.output_dir.join("global_internet_users_per_year.png");
    ChartRenderer::yearly_total(
        &sums,
        "Global internet users per year",
        "Internet users",
        &path,
        s.chart_size,
    )?;
    files.push(path);

    for column in [CELLULAR_COL, USERS_PCT_COL, BROADBAND_COL] {
        let summaries = summarize_by_year(df, column)?;
        let mean: Vec<(i32, f64)> = summaries.iter().map(|&(y, c)| (y, c.mean)).collect();
        let max: Vec<(i32, f64)> = summaries.iter().map(|&(y, c)| (y, c.max)).collect();

        let path = s.output_dir.join(format!("{}_mean_max.png", slug(column)));
        ChartRenderer::mean_max_lines(
            &mean,
            &max,
            &format!("{column} per year"),
            column,
            &path,
            s.chart_size,
        )?;
        files.push(path);
    }

    Ok(files)
}

/// Snapshot-year user share: top-N + "Other", as pie and bar charts.
fn adoption_share(df: &DataFrame, s: &Settings) -> Result<Vec<PathBuf>> {
    let snap = snapshot_year(df, s.snapshot_year, &s.exclude_entities)?;
    let ranking = collapse_top_n(&snap.pairs(USERS_COUNT_COL), s.top_n, true)?;

    let year = s.snapshot_year;
    let title = format!("Internet user share by entity, {year}");

    let pie = s
        .output_dir
        .join(format!("internet_users_share_{year}_pie.png"));
    ChartRenderer::ranking_pie(&ranking, &title, &pie, s.chart_size)?;

    let bars = s
        .output_dir
        .join(format!("internet_users_share_{year}_bars.png"));
    let items: Vec<(String, f64)> = ranking
        .entries
        .iter()
        .map(|e| (e.label.clone(), e.value))
        .collect();
    ChartRenderer::bar_chart(&items, &title, "Share of users", &bars, s.chart_size)?;

    Ok(vec![pie, bars])
}

/// Distribution of the adoption percentage across entities.
fn adoption_histogram(df: &DataFrame, s: &Settings) -> Result<Vec<PathBuf>> {
    let snap = snapshot_year(df, s.snapshot_year, &s.exclude_entities)?;
    let values = snap.values(USERS_PCT_COL);

    let path = s
        .output_dir
        .join(format!("internet_users_pct_distribution_{}.png", s.snapshot_year));
    ChartRenderer::decile_histogram(
        &values,
        s.histogram_bucket,
        &format!("Internet adoption distribution, {}", s.snapshot_year),
        USERS_PCT_COL,
        "Entities",
        &path,
        s.chart_size,
    )?;

    Ok(vec![path])
}

/// Adoption percentage vs. cellular subscriptions, with a linear fit.
fn adoption_vs_cellular(df: &DataFrame, s: &Settings) -> Result<Vec<PathBuf>> {
    let snap = snapshot_year(df, s.snapshot_year, &s.exclude_entities)?;
    let (xs, ys) = paired_metrics(&snap, USERS_PCT_COL, CELLULAR_COL);
    let model = LinearModel::fit(&xs, &ys)?;

    let lo = xs.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let fit = vec![(lo, model.predict(lo)), (hi, model.predict(hi))];
    let points: Vec<(f64, f64)> = xs.iter().zip(&ys).map(|(&x, &y)| (x, y)).collect();

    let path = s
        .output_dir
        .join(format!("adoption_vs_cellular_{}.png", s.snapshot_year));
    ChartRenderer::scatter_with_fit(
        &points,
        &fit,
        &format!("Adoption vs. cellular subscriptions, {}", s.snapshot_year),
        USERS_PCT_COL,
        CELLULAR_COL,
        &path,
        s.chart_size,
    )?;

    Ok(vec![path])
}

/// How often each entity led the annual adoption ranking.
fn annual_leaders_chart(df: &DataFrame, s: &Settings) -> Result<Vec<PathBuf>> {
    let leaders = annual_leaders(df, USERS_PCT_COL, s.leaders_per_year)?;
    let freqs = leader_frequencies(&leaders);
    let items: Vec<(String, f64)> = freqs
        .iter()
        .map(|(entity, count)| (entity.clone(), *count as f64))
        .collect();

    let path = s.output_dir.join("annual_adoption_leaders.png");
    ChartRenderer::bar_chart(
        &items,
        "Most frequent annual adoption leaders",
        "Years in the top group",
        &path,
        s.chart_size,
    )?;

    Ok(vec![path])
}

/// Focus-entity deep dive: metric lines, growth rates, polynomial trend,
/// and a forecast past the observed range.
fn focus_entity(df: &DataFrame, s: &Settings) -> Result<Vec<PathBuf>> {
    let entity = &s.focus_entity;
    let mut files = Vec::new();

    let users = scaled_users(df, s)?;
    let metric_series: Vec<(String, Vec<(i32, f64)>)> = vec![
        ("Internet users (tens of millions)".to_string(), users.clone()),
        (USERS_PCT_COL.to_string(), entity_series(df, entity, USERS_PCT_COL)?),
        (CELLULAR_COL.to_string(), entity_series(df, entity, CELLULAR_COL)?),
        (BROADBAND_COL.to_string(), entity_series(df, entity, BROADBAND_COL)?),
    ];

    let path = s
        .output_dir
        .join(format!("{}_adoption_metrics.png", slug(entity)));
    ChartRenderer::multi_line(
        &metric_series,
        &format!("{entity} internet adoption metrics"),
        "Value",
        &path,
        s.chart_size,
    )?;
    files.push(path);

    let growth_series: Vec<(String, Vec<(i32, f64)>)> = metric_series
        .iter()
        .map(|(label, points)| {
            let values: Vec<f64> = points.iter().map(|&(_, v)| v).collect();
            let rates = pct_change(&values);
            let series = points
                .iter()
                .zip(rates)
                .map(|(&(year, _), rate)| (year, rate))
                .collect();
            (format!("{label} growth"), series)
        })
        .collect();

    let path = s.output_dir.join(format!("{}_growth_rates.png", slug(entity)));
    ChartRenderer::multi_line(
        &growth_series,
        &format!("{entity} period-over-period growth"),
        "Growth rate",
        &path,
        s.chart_size,
    )?;
    files.push(path);

    let model = users_trend(&users, s.poly_degree)?;

    let fitted: Vec<(f64, f64)> = users
        .iter()
        .map(|&(year, _)| (year as f64, model.predict(year as f64)))
        .collect();
    let path = s.output_dir.join(format!("{}_users_trend.png", slug(entity)));
    ChartRenderer::fit_forecast(
        &users,
        &fitted,
        "fitted trend",
        &format!("{entity} internet users, degree-{} trend", s.poly_degree),
        "Internet users (tens of millions)",
        &path,
        s.chart_size,
    )?;
    files.push(path);

    let first_year = users.first().map(|&(y, _)| y).unwrap_or(s.forecast_until);
    let forecast: Vec<(f64, f64)> = (first_year..=s.forecast_until)
        .map(|year| (year as f64, model.predict(year as f64)))
        .collect();
    let path = s
        .output_dir
        .join(format!("{}_users_forecast_{}.png", slug(entity), s.forecast_until));
    ChartRenderer::fit_forecast(
        &users,
        &forecast,
        "forecast",
        &format!("{entity} internet users forecast to {}", s.forecast_until),
        "Internet users (tens of millions)",
        &path,
        s.chart_size,
    )?;
    files.push(path);

    Ok(files)
}

#[derive(Serialize)]
struct YearPrediction {
    year: i32,
    predicted_users: f64,
}

#[derive(Serialize)]
struct Summary<'a> {
    snapshot_year: i32,
    adoption_share: CollapsedRanking,
    adoption_vs_cellular: LinearModel,
    focus_entity: &'a str,
    users_scale: f64,
    users_trend: PolynomialModel,
    forecast: Vec<YearPrediction>,
}

/// Serialize the fitted models and the collapsed ranking next to the charts.
pub fn write_summary(df: &DataFrame, settings: &Settings) -> Result<PathBuf> {
    let snap = snapshot_year(df, settings.snapshot_year, &settings.exclude_entities)?;
    let adoption_share = collapse_top_n(&snap.pairs(USERS_COUNT_COL), settings.top_n, true)?;

    let (xs, ys) = paired_metrics(&snap, USERS_PCT_COL, CELLULAR_COL);
    let adoption_vs_cellular = LinearModel::fit(&xs, &ys)?;

    let users = scaled_users(df, settings)?;
    let users_trend = users_trend(&users, settings.poly_degree)?;

    let last_observed = users.last().map(|&(y, _)| y).unwrap_or(settings.forecast_until);
    let forecast = (last_observed + 1..=settings.forecast_until)
        .map(|year| YearPrediction {
            year,
            predicted_users: users_trend.predict(year as f64),
        })
        .collect();

    let summary = Summary {
        snapshot_year: settings.snapshot_year,
        adoption_share,
        adoption_vs_cellular,
        focus_entity: &settings.focus_entity,
        users_scale: USERS_SCALE,
        users_trend,
        forecast,
    };

    let path = settings.output_dir.join("summary.json");
    let json = serde_json::to_string_pretty(&summary)?;
    fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

fn paired_metrics(snap: &EntitySnapshot, x_col: &str, y_col: &str) -> (Vec<f64>, Vec<f64>) {
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for entity in snap.entities() {
        if let (Some(x), Some(y)) = (snap.value(entity, x_col), snap.value(entity, y_col)) {
            xs.push(x);
            ys.push(y);
        }
    }
    (xs, ys)
}

fn scaled_users(df: &DataFrame, settings: &Settings) -> Result<Vec<(i32, f64)>> {
    let users = entity_series(df, &settings.focus_entity, USERS_COUNT_COL)?
        .into_iter()
        .map(|(year, v)| (year, v / USERS_SCALE))
        .collect();
    Ok(users)
}

fn users_trend(users: &[(i32, f64)], degree: usize) -> Result<PolynomialModel> {
    let xs: Vec<f64> = users.iter().map(|&(y, _)| y as f64).collect();
    let ys: Vec<f64> = users.iter().map(|&(_, v)| v).collect();
    let model = PolynomialModel::fit(&xs, &ys, degree)?;
    Ok(model)
}

/// File-name-safe slug of a column or entity name.
fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_underscore = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_underscore = false;
        } else if !last_underscore {
            out.push('_');
            last_underscore = true;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs_are_file_name_safe() {
        assert_eq!(slug("No. of Internet Users"), "no_of_internet_users");
        assert_eq!(slug("Internet Users(%)"), "internet_users");
        assert_eq!(slug("China"), "china");
    }

    #[test]
    fn every_analysis_has_a_unique_name() {
        let mut names: Vec<&str> = ANALYSES.iter().map(|&(name, _)| name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), ANALYSES.len());
    }
}
