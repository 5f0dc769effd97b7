//! Plot
//!
//! SVG rendering of incremental metric curves and of grouped bar charts of summary scores.
use crate::analysis::UncertaintyAnalyzer;
use crate::constants::{BAND_ALPHA, BAR_ALPHA, BAR_FONT_POINTS, FIGURE_DPI, FONT_POINTS, LINE_POINTS, MARKER_POINTS};
use crate::errors::UncError;
use hashbrown::HashMap;
use log::info;
use plotters::coord::types::RangedCoordf64;
use plotters::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::ops::Range;
use std::path::Path;

const X_LABEL: &str = "Fraction of included data points (most certain points are included first)";

/// ColorBrewer Set1.
const SET1: [RGBColor; 9] = [
    RGBColor(228, 26, 28),
    RGBColor(55, 126, 184),
    RGBColor(77, 175, 74),
    RGBColor(152, 78, 163),
    RGBColor(255, 127, 0),
    RGBColor(255, 255, 51),
    RGBColor(166, 86, 40),
    RGBColor(247, 129, 191),
    RGBColor(153, 153, 153),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    Cross,
    Circle,
    TriangleUp,
    TriangleDown,
    Diamond,
    Star,
    Dot,
}

const MARKERS: [Marker; 7] = [
    Marker::Cross,
    Marker::Circle,
    Marker::TriangleUp,
    Marker::TriangleDown,
    Marker::Diamond,
    Marker::Star,
    Marker::Dot,
];

fn plot_err<E: Display>(e: E) -> UncError {
    UncError::UnableToPlot(e.to_string())
}

fn points_to_px(points: f64) -> f64 {
    points * FIGURE_DPI / 72.0
}

/// Pixel size of a figure of `figsize` inches.
fn canvas_size(figsize: (f64, f64)) -> Result<(u32, u32), UncError> {
    let valid = |v: f64| v.is_finite() && v > 0.0;
    if !valid(figsize.0) || !valid(figsize.1) {
        return Err(UncError::InvalidParameter(
            "figsize".to_string(),
            "positive width and height in inches".to_string(),
            format!("{:?}", figsize),
        ));
    }
    Ok(((figsize.0 * FIGURE_DPI).round() as u32, (figsize.1 * FIGURE_DPI).round() as u32))
}

/// Range covering every finite value, padded by 5% on both sides.
fn padded_range<I: IntoIterator<Item = f64>>(values: I) -> Range<f64> {
    let (lo, hi) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if lo > hi {
        return 0.0..1.0;
    }
    let pad = if hi > lo { (hi - lo) * 0.05 } else { 0.5 };
    (lo - pad)..(hi + pad)
}

fn star(radius: i32) -> Vec<(i32, i32)> {
    (0..10)
        .map(|k| {
            let r = if k % 2 == 0 { radius as f64 } else { radius as f64 * 0.45 };
            let angle = std::f64::consts::PI * (k as f64 / 5.0 - 0.5);
            ((r * angle.cos()).round() as i32, (r * angle.sin()).round() as i32)
        })
        .collect()
}

fn draw_markers<DB: DrawingBackend>(
    chart: &mut ChartContext<'_, DB, Cartesian2d<RangedCoordf64, RangedCoordf64>>,
    points: &[(f64, f64)],
    marker: Marker,
    color: RGBColor,
    size: i32,
) -> Result<(), UncError> {
    let points = points.iter().copied();
    let style = color.filled();
    let res = match marker {
        Marker::Cross => chart
            .draw_series(points.map(|p| Cross::new(p, size, color.stroke_width((size / 4).max(1) as u32))))
            .map(|_| ()),
        Marker::Circle => chart.draw_series(points.map(|p| Circle::new(p, size, style))).map(|_| ()),
        Marker::TriangleUp => chart.draw_series(points.map(|p| TriangleMarker::new(p, size, style))).map(|_| ()),
        Marker::TriangleDown => chart
            .draw_series(points.map(|p| EmptyElement::at(p) + Polygon::new(vec![(-size, -size / 2), (size, -size / 2), (0, size)], style)))
            .map(|_| ()),
        Marker::Diamond => chart
            .draw_series(points.map(|p| EmptyElement::at(p) + Polygon::new(vec![(0, -size), (size, 0), (0, size), (-size, 0)], style)))
            .map(|_| ()),
        Marker::Star => chart
            .draw_series(points.map(|p| EmptyElement::at(p) + Polygon::new(star(size), style)))
            .map(|_| ()),
        Marker::Dot => chart.draw_series(points.map(|p| Circle::new(p, (size / 3).max(1), style))).map(|_| ()),
    };
    res.map_err(plot_err)
}

fn default_alpha() -> f64 {
    BAND_ALPHA
}
fn default_legend() -> bool {
    true
}
fn default_figsize() -> (f64, f64) {
    (5.0, 5.0)
}

/// Display options of [`plot_incremental_metric`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncrementalPlotOptions {
    /// Label of the y axis. The metric name is used when unset.
    #[serde(default)]
    pub title: Option<String>,
    /// Methods to draw, in this order. Every method of the analyzer when unset.
    #[serde(default)]
    pub methods: Option<Vec<String>>,
    /// Opacity of the shaded standard deviation band. Default `0.1`.
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    /// Display names for method names. Methods without an entry keep their name.
    #[serde(default)]
    pub key_mapping: Option<HashMap<String, String>>,
    #[serde(default = "default_legend")]
    pub legend: bool,
    /// Figure size in inches. Default `(5, 5)`.
    #[serde(default = "default_figsize")]
    pub figsize: (f64, f64),
}

impl Default for IncrementalPlotOptions {
    fn default() -> Self {
        IncrementalPlotOptions {
            title: None,
            methods: None,
            alpha: default_alpha(),
            key_mapping: None,
            legend: default_legend(),
            figsize: default_figsize(),
        }
    }
}

impl IncrementalPlotOptions {
    pub fn set_title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn set_methods(mut self, methods: &[&str]) -> Self {
        self.methods = Some(methods.iter().map(|m| m.to_string()).collect());
        self
    }

    pub fn set_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn set_key_mapping(mut self, key_mapping: HashMap<String, String>) -> Self {
        self.key_mapping = Some(key_mapping);
        self
    }

    pub fn set_legend(mut self, legend: bool) -> Self {
        self.legend = legend;
        self
    }

    pub fn set_figsize(mut self, figsize: (f64, f64)) -> Self {
        self.figsize = figsize;
        self
    }

    fn label(&self, method: &str) -> String {
        self.key_mapping
            .as_ref()
            .and_then(|m| m.get(method))
            .cloned()
            .unwrap_or_else(|| method.to_string())
    }
}

struct Line {
    label: String,
    points: Vec<(f64, f64)>,
    band: Vec<(f64, f64)>,
}

/// Plot how `metric` changes as more uncertain points are included, one line per method,
/// and write the figure as SVG to `path`.
///
/// The x axis is the subset size divided by the number of points of the first run. The
/// shaded band spans one standard deviation over runs on either side of the mean.
pub fn plot_incremental_metric<P: AsRef<Path>>(
    analyzer: &UncertaintyAnalyzer,
    metric: &str,
    options: &IncrementalPlotOptions,
    path: P,
) -> Result<(), UncError> {
    let size = canvas_size(options.figsize)?;
    let methods: Vec<String> = match &options.methods {
        Some(m) if !m.is_empty() => m.clone(),
        _ => analyzer.methods().to_vec(),
    };
    let total = analyzer.total_points() as f64;

    let mut lines = Vec::with_capacity(methods.len());
    for method in &methods {
        let curve = analyzer.curve(method, metric)?;
        let finite: Vec<(f64, f64, f64)> = curve
            .xs
            .iter()
            .zip(&curve.mean)
            .zip(&curve.std)
            .filter(|((_, m), s)| m.is_finite() && s.is_finite())
            .map(|((x, m), s)| (*x as f64 / total, *m, *s))
            .collect();
        let upper = finite.iter().map(|(x, m, s)| (*x, m + s));
        let lower = finite.iter().rev().map(|(x, m, s)| (*x, m - s));
        lines.push(Line {
            label: options.label(method),
            points: finite.iter().map(|(x, m, _)| (*x, *m)).collect(),
            band: upper.chain(lower).collect(),
        });
    }

    let x_range = padded_range(lines.iter().flat_map(|l| l.points.iter().map(|p| p.0)));
    let y_range = padded_range(lines.iter().flat_map(|l| l.band.iter().map(|p| p.1)));

    let font = points_to_px(FONT_POINTS);
    let line_width = points_to_px(LINE_POINTS).round() as u32;
    let marker_size = (points_to_px(MARKER_POINTS) / 2.0).round() as i32;
    let y_desc = options.title.clone().unwrap_or_else(|| metric.to_string());

    let root = SVGBackend::new(path.as_ref(), size).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;
    let mut chart = ChartBuilder::on(&root)
        .margin((font * 0.8) as u32)
        .x_label_area_size((font * 3.0) as u32)
        .y_label_area_size((font * 4.0) as u32)
        .build_cartesian_2d(x_range, y_range)
        .map_err(plot_err)?;
    chart
        .configure_mesh()
        .light_line_style(&WHITE)
        .bold_line_style(&BLACK.mix(0.15))
        .x_desc(X_LABEL)
        .y_desc(y_desc.as_str())
        .label_style(("sans-serif", font))
        .axis_desc_style(("sans-serif", font))
        .draw()
        .map_err(plot_err)?;

    for (k, line) in lines.iter().enumerate() {
        let color = SET1[k % SET1.len()];
        if !line.band.is_empty() {
            chart
                .draw_series(std::iter::once(Polygon::new(line.band.clone(), color.mix(options.alpha).filled())))
                .map_err(plot_err)?;
        }
        let marker = MARKERS[k % MARKERS.len()];
        chart
            .draw_series(LineSeries::new(line.points.iter().copied(), color.stroke_width(line_width)))
            .map_err(plot_err)?
            .label(line.label.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 40, y)], color.stroke_width(line_width)));
        draw_markers(&mut chart, &line.points, marker, color, marker_size)?;
    }

    if options.legend {
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::LowerLeft)
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK.mix(0.3))
            .label_font(("sans-serif", font))
            .draw()
            .map_err(plot_err)?;
    }
    root.present().map_err(plot_err)?;
    info!("Saved {} plot of {} methods to {}", metric, lines.len(), path.as_ref().display());
    Ok(())
}

/// One bar of a [`GroupedBars`] chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarEntry {
    pub group: String,
    pub series: String,
    pub value: f64,
    pub std: f64,
}

/// Scalar summaries keyed by group, then by series, each with a standard deviation used as
/// error bar. Groups and series keep the order in which they were first inserted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupedBars {
    entries: Vec<BarEntry>,
    groups: Vec<String>,
    series: Vec<String>,
}

impl GroupedBars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the value and standard deviation of `series` within `group`, replacing any
    /// previous value.
    pub fn insert(&mut self, group: &str, series: &str, value: f64, std: f64) {
        if !self.groups.iter().any(|g| g == group) {
            self.groups.push(group.to_string());
        }
        if !self.series.iter().any(|s| s == series) {
            self.series.push(series.to_string());
        }
        match self.entries.iter_mut().find(|e| e.group == group && e.series == series) {
            Some(entry) => {
                entry.value = value;
                entry.std = std;
            }
            None => self.entries.push(BarEntry {
                group: group.to_string(),
                series: series.to_string(),
                value,
                std,
            }),
        }
    }

    pub fn get(&self, group: &str, series: &str) -> Option<(f64, f64)> {
        self.entries
            .iter()
            .find(|e| e.group == group && e.series == series)
            .map(|e| (e.value, e.std))
    }

    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    pub fn series(&self) -> &[String] {
        &self.series
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Draw a grouped horizontal bar chart with error bars and write it as SVG to `path`.
///
/// * `bars` - Values and standard deviations per group and series.
/// * `xlim` - Limits of the value axis.
/// * `figsize` - Figure size in inches.
/// * `title` - Figure title.
/// * `path` - Output file.
/// * `remove_yticks` - Leave the group names off the y axis.
///
/// The first inserted group is drawn at the top.
pub fn barplot_grouped<P: AsRef<Path>>(
    bars: &GroupedBars,
    xlim: (f64, f64),
    figsize: (f64, f64),
    title: &str,
    path: P,
    remove_yticks: bool,
) -> Result<(), UncError> {
    if bars.is_empty() {
        return Err(UncError::InvalidParameter(
            "bars".to_string(),
            "at least one value".to_string(),
            "no values".to_string(),
        ));
    }
    if !(xlim.0 < xlim.1) {
        return Err(UncError::InvalidParameter(
            "xlim".to_string(),
            "lower limit below upper limit".to_string(),
            format!("{:?}", xlim),
        ));
    }
    let size = canvas_size(figsize)?;
    let groups = bars.groups();
    let n_groups = groups.len();
    let n_series = bars.series().len();
    let bar_height = 0.8 / n_series as f64;
    let row = |g: usize| (n_groups - 1 - g) as f64;
    let clip = |v: f64| v.clamp(xlim.0, xlim.1);

    let font = points_to_px(BAR_FONT_POINTS);
    let label_width = if remove_yticks {
        font
    } else {
        let longest = groups.iter().map(|g| g.chars().count()).max().unwrap_or(0);
        longest as f64 * font * 0.6 + font
    };
    let n_yticks = if remove_yticks { 0 } else { n_groups };
    // Only integral positions are group rows.
    let group_label = |y: &f64| {
        let r = y.round();
        if remove_yticks || (y - r).abs() > 1e-6 || r < 0.0 || r as usize >= n_groups {
            String::new()
        } else {
            groups[n_groups - 1 - r as usize].clone()
        }
    };

    let root = SVGBackend::new(path.as_ref(), size).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", font * 1.2))
        .margin((font * 0.5) as u32)
        .x_label_area_size((font * 2.0) as u32)
        .y_label_area_size(label_width as u32)
        .build_cartesian_2d(xlim.0..xlim.1, -0.5..n_groups as f64 - 0.5)
        .map_err(plot_err)?;
    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(n_yticks)
        .light_line_style(&WHITE)
        .bold_line_style(&BLACK.mix(0.15))
        .y_label_formatter(&group_label)
        .label_style(("sans-serif", font))
        .draw()
        .map_err(plot_err)?;

    for (j, series) in bars.series().iter().enumerate() {
        let color = SET1[j % SET1.len()];
        let mut rects = Vec::with_capacity(n_groups);
        let mut errors = Vec::with_capacity(n_groups);
        for (g, group) in groups.iter().enumerate() {
            let (value, std) = match bars.get(group, series) {
                Some(v) if v.0.is_finite() => v,
                _ => continue,
            };
            let y0 = row(g) - 0.4 + j as f64 * bar_height;
            let center = y0 + bar_height / 2.0;
            rects.push(Rectangle::new(
                [(clip(0.0), y0), (clip(value), y0 + bar_height)],
                color.mix(BAR_ALPHA).filled(),
            ));
            if std.is_finite() && std > 0.0 {
                errors.push(PathElement::new(
                    vec![(clip(value - std), center), (clip(value + std), center)],
                    BLACK.stroke_width(2),
                ));
            }
        }
        chart
            .draw_series(rects)
            .map_err(plot_err)?
            .label(series.as_str())
            .legend(move |(x, y)| Rectangle::new([(x, y - 10), (x + 30, y + 10)], color.mix(BAR_ALPHA).filled()));
        chart.draw_series(errors).map_err(plot_err)?;
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK.mix(0.3))
        .label_font(("sans-serif", font))
        .draw()
        .map_err(plot_err)?;
    root.present().map_err(plot_err)?;
    info!("Saved bar plot {} to {}", title, path.as_ref().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::IncrementalConfig;
    use crate::metric::{Metric, NamedMetric};
    use crate::uncertainty::ResultContainer;
    use ndarray::Array2;
    use std::fs;

    fn probs(p: &[f64]) -> Array2<f64> {
        Array2::from_shape_fn((p.len(), 2), |(i, j)| if j == 0 { 1.0 - p[i] } else { p[i] })
    }

    fn analyzer() -> UncertaintyAnalyzer {
        let mut results = ResultContainer::new();
        for p in [[0.9, 0.2, 0.6, 0.45, 0.7, 0.3], [0.8, 0.4, 0.55, 0.6, 0.9, 0.1]] {
            results.add_results(probs(&p).view(), "mlp").unwrap();
        }
        for p in [[0.6, 0.5, 0.52, 0.48, 0.51, 0.49], [0.7, 0.3, 0.4, 0.6, 0.55, 0.45]] {
            results.add_results(probs(&p).view(), "logreg").unwrap();
        }
        let y = vec![vec![1.0, 0.0, 1.0, 0.0, 1.0, 0.0]; 2];
        let metrics: Vec<NamedMetric> = vec![Metric::Accuracy.into(), Metric::BrierScore.into()];
        UncertaintyAnalyzer::new(&y, &results, &metrics, IncrementalConfig::new(2, 1)).unwrap()
    }

    #[test]
    fn test_canvas_size() {
        assert_eq!(canvas_size((5.0, 5.0)).unwrap(), (1500, 1500));
        assert_eq!(canvas_size((8.0, 3.5)).unwrap(), (2400, 1050));
        assert!(canvas_size((0.0, 5.0)).is_err());
    }

    #[test]
    fn test_padded_range() {
        assert_eq!(padded_range(vec![0.0, 10.0]), -0.5..10.5);
        assert_eq!(padded_range(vec![2.0, f64::NAN]), 1.5..2.5);
        assert_eq!(padded_range(Vec::new()), 0.0..1.0);
    }

    #[test]
    fn test_plot_incremental_metric() {
        let analyzer = analyzer();
        let path = std::env::temp_dir().join("tabular_uncertainty_incremental.svg");
        let mut mapping = HashMap::new();
        mapping.insert("mlp".to_string(), "Neural network".to_string());
        let options = IncrementalPlotOptions::default().set_key_mapping(mapping);
        plot_incremental_metric(&analyzer, "accuracy", &options, &path).unwrap();

        let svg = fs::read_to_string(&path).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("Neural network"));
        assert!(svg.contains("logreg"));
        assert!(svg.contains("Fraction of included data points"));
        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_plot_incremental_metric_selected_methods() {
        let analyzer = analyzer();
        let path = std::env::temp_dir().join("tabular_uncertainty_incremental_selected.svg");
        let options = IncrementalPlotOptions::default()
            .set_methods(&["logreg"])
            .set_title("Brier score")
            .set_legend(false);
        plot_incremental_metric(&analyzer, "brier_score", &options, &path).unwrap();
        let svg = fs::read_to_string(&path).unwrap();
        assert!(svg.contains("Brier score"));
        assert!(!svg.contains("mlp"));
        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_plot_incremental_metric_errors() {
        let analyzer = analyzer();
        let path = std::env::temp_dir().join("tabular_uncertainty_never_written.svg");
        let options = IncrementalPlotOptions::default();
        assert!(matches!(
            plot_incremental_metric(&analyzer, "roc_auc", &options, &path),
            Err(UncError::UnknownMetric(_, _))
        ));
        let options = IncrementalPlotOptions::default().set_methods(&["knn"]);
        assert!(matches!(
            plot_incremental_metric(&analyzer, "accuracy", &options, &path),
            Err(UncError::UnknownMethod(_))
        ));
        let options = IncrementalPlotOptions::default().set_figsize((-1.0, 5.0));
        assert!(plot_incremental_metric(&analyzer, "accuracy", &options, &path).is_err());
    }

    #[test]
    fn test_grouped_bars_keep_insertion_order() {
        let mut bars = GroupedBars::new();
        bars.insert("mimic", "mlp", 0.8, 0.01);
        bars.insert("mimic", "logreg", 0.75, 0.02);
        bars.insert("eicu", "logreg", 0.7, 0.03);
        bars.insert("mimic", "mlp", 0.82, 0.015);
        assert_eq!(bars.groups(), &["mimic".to_string(), "eicu".to_string()]);
        assert_eq!(bars.series(), &["mlp".to_string(), "logreg".to_string()]);
        assert_eq!(bars.get("mimic", "mlp"), Some((0.82, 0.015)));
        assert_eq!(bars.get("eicu", "mlp"), None);
    }

    #[test]
    fn test_barplot_grouped() {
        let mut bars = GroupedBars::new();
        bars.insert("AUC", "mlp", 0.8, 0.01);
        bars.insert("AUC", "logreg", 0.75, 0.02);
        bars.insert("ECE", "mlp", 0.05, 0.01);
        bars.insert("ECE", "logreg", 0.04, 0.005);

        let path = std::env::temp_dir().join("tabular_uncertainty_bars.svg");
        barplot_grouped(&bars, (0.0, 1.0), (6.0, 4.0), "Scores", &path, false).unwrap();
        let svg = fs::read_to_string(&path).unwrap();
        assert!(svg.contains("Scores"));
        assert!(svg.contains("AUC"));
        assert!(svg.contains("ECE"));
        assert!(svg.contains("logreg"));

        barplot_grouped(&bars, (0.0, 1.0), (6.0, 4.0), "Scores", &path, true).unwrap();
        let svg = fs::read_to_string(&path).unwrap();
        assert!(!svg.contains("ECE"));
        let _ = fs::remove_file(path);

        assert!(barplot_grouped(&bars, (1.0, 0.0), (6.0, 4.0), "Scores", "unused.svg", false).is_err());
        assert!(barplot_grouped(&GroupedBars::new(), (0.0, 1.0), (6.0, 4.0), "Scores", "unused.svg", false).is_err());
    }
}
