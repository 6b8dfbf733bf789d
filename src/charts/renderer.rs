//! Static Chart Renderer
//! Renders analysis outputs to PNG files with plotters. The renderer never
//! computes statistics; it consumes year series, rankings, and fitted
//! predictions produced by the stats modules.

use plotters::prelude::*;
use std::path::Path;
use thiserror::Error;

use crate::stats::CollapsedRanking;

/// Primary series color
pub const ACCENT: RGBColor = RGBColor(52, 152, 219); // Blue

pub const PALETTE: [RGBColor; 10] = [
    RGBColor(231, 76, 60),  // Red
    RGBColor(46, 204, 113), // Green
    RGBColor(155, 89, 182), // Purple
    RGBColor(243, 156, 18), // Orange
    RGBColor(26, 188, 156), // Teal
    RGBColor(233, 30, 99),  // Pink
    RGBColor(0, 188, 212),  // Cyan
    RGBColor(255, 87, 34),  // Deep Orange
    RGBColor(121, 85, 72),  // Brown
    RGBColor(96, 125, 139), // Blue Grey
];

#[derive(Error, Debug)]
pub enum ChartError {
    #[error("Failed to render chart: {0}")]
    Backend(String),
    #[error("Nothing to draw")]
    EmptySeries,
}

fn backend<E: std::fmt::Display>(e: E) -> ChartError {
    ChartError::Backend(e.to_string())
}

/// Renders charts as PNG images.
pub struct ChartRenderer;

impl ChartRenderer {
    /// Year series as a bar chart with a line overlay.
    pub fn yearly_total(
        series: &[(i32, f64)],
        title: &str,
        y_desc: &str,
        path: &Path,
        size: (u32, u32),
    ) -> Result<(), ChartError> {
        if series.is_empty() {
            return Err(ChartError::EmptySeries);
        }

        let root = BitMapBackend::new(path, size).into_drawing_area();
        root.fill(&WHITE).map_err(backend)?;

        let x_min = series[0].0 as f64 - 0.5;
        let x_max = series[series.len() - 1].0 as f64 + 0.5;
        let y_max = series.iter().map(|&(_, v)| v).fold(0.0f64, f64::max) * 1.1;
        let y_max = if y_max > 0.0 { y_max } else { 1.0 };

        let mut chart = ChartBuilder::on(&root)
            .caption(title, ("sans-serif", 28))
            .margin(16)
            .x_label_area_size(48)
            .y_label_area_size(80)
            .build_cartesian_2d(x_min..x_max, 0.0..y_max)
            .map_err(backend)?;

        chart
            .configure_mesh()
            .x_desc("Year")
            .y_desc(y_desc)
            .draw()
            .map_err(backend)?;

        chart
            .draw_series(series.iter().map(|&(year, v)| {
                let x = year as f64;
                Rectangle::new([(x - 0.3, 0.0), (x + 0.3, v)], ACCENT.mix(0.5).filled())
            }))
            .map_err(backend)?;

        chart
            .draw_series(LineSeries::new(
                series.iter().map(|&(year, v)| (year as f64, v)),
                ACCENT.stroke_width(3),
            ))
            .map_err(backend)?;

        root.present().map_err(backend)?;
        Ok(())
    }

    /// Per-year mean and max of one metric as two labelled lines.
    pub fn mean_max_lines(
        mean: &[(i32, f64)],
        max: &[(i32, f64)],
        title: &str,
        y_desc: &str,
        path: &Path,
        size: (u32, u32),
    ) -> Result<(), ChartError> {
        let series = [
            (format!("{y_desc} max"), max.to_vec()),
            (format!("{y_desc} mean"), mean.to_vec()),
        ];
        Self::multi_line(&series, title, y_desc, path, size)
    }

    /// Several labelled year series on one chart. Non-finite points
    /// (unbounded growth rates) are skipped.
    pub fn multi_line(
        series: &[(String, Vec<(i32, f64)>)],
        title: &str,
        y_desc: &str,
        path: &Path,
        size: (u32, u32),
    ) -> Result<(), ChartError> {
        let finite = |points: &[(i32, f64)]| -> Vec<(i32, f64)> {
            points.iter().copied().filter(|(_, v)| v.is_finite()).collect()
        };
        let all_points: Vec<(i32, f64)> = series.iter().flat_map(|(_, pts)| finite(pts)).collect();
        if all_points.is_empty() {
            return Err(ChartError::EmptySeries);
        }

        let root = BitMapBackend::new(path, size).into_drawing_area();
        root.fill(&WHITE).map_err(backend)?;

        let x_lo = all_points.iter().map(|&(y, _)| y).min().unwrap_or(0) as f64 - 0.5;
        let x_hi = all_points.iter().map(|&(y, _)| y).max().unwrap_or(0) as f64 + 0.5;
        let (y_lo, y_hi) = value_range(all_points.iter().map(|&(_, v)| v));

        let mut chart = ChartBuilder::on(&root)
            .caption(title, ("sans-serif", 28))
            .margin(16)
            .x_label_area_size(48)
            .y_label_area_size(80)
            .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)
            .map_err(backend)?;

        chart
            .configure_mesh()
            .x_desc("Year")
            .y_desc(y_desc)
            .draw()
            .map_err(backend)?;

        for (i, (label, points)) in series.iter().enumerate() {
            let color = PALETTE[i % PALETTE.len()];
            let points = finite(points);
            chart
                .draw_series(LineSeries::new(
                    points.iter().map(|&(year, v)| (year as f64, v)),
                    color.stroke_width(3),
                ))
                .map_err(backend)?
                .label(label.clone())
                .legend(move |(x, y)| {
                    PathElement::new(vec![(x, y), (x + 18, y)], color.stroke_width(3))
                });
        }

        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()
            .map_err(backend)?;

        root.present().map_err(backend)?;
        Ok(())
    }

    /// CollapsedRanking as a pie chart with percentage labels.
    pub fn ranking_pie(
        ranking: &CollapsedRanking,
        title: &str,
        path: &Path,
        size: (u32, u32),
    ) -> Result<(), ChartError> {
        if ranking.entries.is_empty() {
            return Err(ChartError::EmptySeries);
        }

        let root = BitMapBackend::new(path, size).into_drawing_area();
        root.fill(&WHITE).map_err(backend)?;
        let root = root
            .titled(title, ("sans-serif", 28))
            .map_err(backend)?;

        let (w, h) = root.dim_in_pixel();
        let center = (w as i32 / 2, h as i32 / 2);
        let radius = (w.min(h) as f64) * 0.35;

        let sizes: Vec<f64> = ranking.entries.iter().map(|e| e.value).collect();
        let colors: Vec<RGBColor> = (0..sizes.len())
            .map(|i| PALETTE[i % PALETTE.len()])
            .collect();
        let labels: Vec<String> = ranking.entries.iter().map(|e| e.label.clone()).collect();

        let mut pie = Pie::new(&center, &radius, &sizes, &colors, &labels);
        pie.label_style(("sans-serif", 16).into_font());
        pie.percentages(("sans-serif", 14).into_font().color(&BLACK));

        root.draw(&pie).map_err(backend)?;
        root.present().map_err(backend)?;
        Ok(())
    }

    /// Labelled values as vertical bars, one palette color per bar.
    pub fn bar_chart(
        items: &[(String, f64)],
        title: &str,
        y_desc: &str,
        path: &Path,
        size: (u32, u32),
    ) -> Result<(), ChartError> {
        if items.is_empty() {
            return Err(ChartError::EmptySeries);
        }

        let root = BitMapBackend::new(path, size).into_drawing_area();
        root.fill(&WHITE).map_err(backend)?;

        let n = items.len() as i32;
        let y_max = items.iter().map(|(_, v)| *v).fold(0.0f64, f64::max) * 1.1;
        let y_max = if y_max > 0.0 { y_max } else { 1.0 };
        let labels: Vec<String> = items.iter().map(|(l, _)| l.clone()).collect();

        let mut chart = ChartBuilder::on(&root)
            .caption(title, ("sans-serif", 28))
            .margin(16)
            .x_label_area_size(110)
            .y_label_area_size(80)
            .build_cartesian_2d((0..n).into_segmented(), 0.0..y_max)
            .map_err(backend)?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(items.len())
            .x_label_formatter(&|v| match v {
                SegmentValue::CenterOf(i) | SegmentValue::Exact(i) => {
                    labels.get(*i as usize).cloned().unwrap_or_default()
                }
                _ => String::new(),
            })
            .x_label_style(
                ("sans-serif", 12)
                    .into_font()
                    .transform(FontTransform::Rotate90),
            )
            .y_desc(y_desc)
            .draw()
            .map_err(backend)?;

        for (i, (_, value)) in items.iter().enumerate() {
            let color = PALETTE[i % PALETTE.len()];
            chart
                .draw_series(
                    Histogram::vertical(&chart)
                        .style(color.filled())
                        .margin(8)
                        .data(std::iter::once((i as i32, *value))),
                )
                .map_err(backend)?;
        }

        root.present().map_err(backend)?;
        Ok(())
    }

    /// Distribution of a 0-100 metric in fixed-width buckets.
    pub fn decile_histogram(
        values: &[f64],
        bucket: f64,
        title: &str,
        x_desc: &str,
        y_desc: &str,
        path: &Path,
        size: (u32, u32),
    ) -> Result<(), ChartError> {
        if values.is_empty() || bucket <= 0.0 {
            return Err(ChartError::EmptySeries);
        }

        let counts = bucket_counts(values, bucket);
        let n = counts.len() as i32;
        let y_max = counts.iter().max().copied().unwrap_or(0) + 1;

        let root = BitMapBackend::new(path, size).into_drawing_area();
        root.fill(&WHITE).map_err(backend)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(title, ("sans-serif", 28))
            .margin(16)
            .x_label_area_size(48)
            .y_label_area_size(64)
            .build_cartesian_2d((0..n).into_segmented(), 0u32..y_max)
            .map_err(backend)?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(counts.len())
            .x_label_formatter(&|v| match v {
                SegmentValue::CenterOf(i) | SegmentValue::Exact(i) => {
                    let lo = *i as f64 * bucket;
                    format!("{:.0}-{:.0}", lo, lo + bucket)
                }
                _ => String::new(),
            })
            .x_desc(x_desc)
            .y_desc(y_desc)
            .draw()
            .map_err(backend)?;

        let max_bucket = n - 1;
        chart
            .draw_series(
                Histogram::vertical(&chart)
                    .style(ACCENT.mix(0.7).filled())
                    .margin(4)
                    .data(
                        values
                            .iter()
                            .map(|&v| (((v / bucket).floor() as i32).clamp(0, max_bucket), 1u32)),
                    ),
            )
            .map_err(backend)?;

        root.present().map_err(backend)?;
        Ok(())
    }

    /// Scatter cloud plus a fitted regression line.
    pub fn scatter_with_fit(
        points: &[(f64, f64)],
        fit: &[(f64, f64)],
        title: &str,
        x_desc: &str,
        y_desc: &str,
        path: &Path,
        size: (u32, u32),
    ) -> Result<(), ChartError> {
        if points.is_empty() {
            return Err(ChartError::EmptySeries);
        }

        let root = BitMapBackend::new(path, size).into_drawing_area();
        root.fill(&WHITE).map_err(backend)?;

        let (x_lo, x_hi) = value_range(points.iter().chain(fit).map(|&(x, _)| x));
        let (y_lo, y_hi) = value_range(points.iter().chain(fit).map(|&(_, y)| y));

        let mut chart = ChartBuilder::on(&root)
            .caption(title, ("sans-serif", 28))
            .margin(16)
            .x_label_area_size(48)
            .y_label_area_size(64)
            .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)
            .map_err(backend)?;

        chart
            .configure_mesh()
            .x_desc(x_desc)
            .y_desc(y_desc)
            .draw()
            .map_err(backend)?;

        chart
            .draw_series(points.iter().enumerate().map(|(i, &(x, y))| {
                Circle::new((x, y), 4, PALETTE[i % PALETTE.len()].filled())
            }))
            .map_err(backend)?;

        chart
            .draw_series(LineSeries::new(
                fit.iter().copied(),
                ACCENT.stroke_width(3),
            ))
            .map_err(backend)?;

        root.present().map_err(backend)?;
        Ok(())
    }

    /// Observed points plus a model curve, optionally extending past the
    /// observed range (the forecast case).
    pub fn fit_forecast(
        observed: &[(i32, f64)],
        predicted: &[(f64, f64)],
        predicted_label: &str,
        title: &str,
        y_desc: &str,
        path: &Path,
        size: (u32, u32),
    ) -> Result<(), ChartError> {
        if observed.is_empty() && predicted.is_empty() {
            return Err(ChartError::EmptySeries);
        }

        let root = BitMapBackend::new(path, size).into_drawing_area();
        root.fill(&WHITE).map_err(backend)?;

        let xs = observed
            .iter()
            .map(|&(y, _)| y as f64)
            .chain(predicted.iter().map(|&(x, _)| x));
        let (x_lo, x_hi) = value_range(xs);
        let ys = observed
            .iter()
            .map(|&(_, v)| v)
            .chain(predicted.iter().map(|&(_, v)| v));
        let (y_lo, y_hi) = value_range(ys);

        let mut chart = ChartBuilder::on(&root)
            .caption(title, ("sans-serif", 28))
            .margin(16)
            .x_label_area_size(48)
            .y_label_area_size(80)
            .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)
            .map_err(backend)?;

        chart
            .configure_mesh()
            .x_desc("Year")
            .y_desc(y_desc)
            .draw()
            .map_err(backend)?;

        chart
            .draw_series(
                observed
                    .iter()
                    .map(|&(year, v)| Circle::new((year as f64, v), 4, ACCENT.filled())),
            )
            .map_err(backend)?
            .label("observed")
            .legend(|(x, y)| Circle::new((x + 9, y), 4, ACCENT.filled()));

        let line_color = PALETTE[0];
        chart
            .draw_series(LineSeries::new(
                predicted.iter().copied(),
                line_color.stroke_width(3),
            ))
            .map_err(backend)?
            .label(predicted_label)
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 18, y)], line_color.stroke_width(3))
            });

        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()
            .map_err(backend)?;

        root.present().map_err(backend)?;
        Ok(())
    }
}

/// Padded min/max of the finite values.
fn value_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in values {
        if v.is_finite() {
            min = min.min(v);
            max = max.max(v);
        }
    }
    if !min.is_finite() || !max.is_finite() {
        return (0.0, 1.0);
    }
    if min == max {
        return (min - 1.0, max + 1.0);
    }
    let pad = (max - min) * 0.15;
    (min - pad, max + pad)
}

fn bucket_counts(values: &[f64], bucket: f64) -> Vec<u32> {
    let n = ((100.0 / bucket).ceil() as usize).max(1);
    let mut counts = vec![0u32; n];
    for &v in values {
        let idx = ((v / bucket).floor() as isize).clamp(0, n as isize - 1) as usize;
        counts[idx] += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_range_pads_both_sides() {
        let (lo, hi) = value_range([10.0, 20.0].into_iter());
        assert!(lo < 10.0 && hi > 20.0);
    }

    #[test]
    fn value_range_ignores_non_finite() {
        let (lo, hi) = value_range([f64::INFINITY, 1.0, 2.0, f64::NAN].into_iter());
        assert!(lo < 1.0 && hi > 2.0 && hi.is_finite());
    }

    #[test]
    fn degenerate_range_still_has_width() {
        let (lo, hi) = value_range([5.0, 5.0].into_iter());
        assert!(lo < hi);
    }

    #[test]
    fn buckets_cover_the_percent_scale() {
        let counts = bucket_counts(&[0.0, 5.0, 15.0, 99.9, 100.0], 10.0);
        assert_eq!(counts.len(), 10);
        assert_eq!(counts[0], 2);
        assert_eq!(counts[1], 1);
        // 100.0 lands in the last bucket, not out of range.
        assert_eq!(counts[9], 2);
    }
}
