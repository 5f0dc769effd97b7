//! Analysis
//!
//! Incremental evaluation of predictions ordered from most to least certain: a metric is
//! computed on growing prefixes of the sorted points, then averaged over runs.
use crate::errors::UncError;
use crate::metric::NamedMetric;
use crate::uncertainty::ResultContainer;
use crate::utils::{fmt_vec_output, mean, population_std, validate_positive_usize_parameter};
use hashbrown::HashMap;
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

/// A single test point of one run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredPoint {
    /// Predicted positive class probability.
    pub prediction: f64,
    /// Distance to the nearest class, `min(1 - p, p)`.
    pub margin: f64,
    pub uncertainty: f64,
    pub label: f64,
}

impl ScoredPoint {
    pub fn new(prediction: f64, uncertainty: f64, label: f64) -> Self {
        ScoredPoint {
            prediction,
            margin: f64::min(1.0 - prediction, prediction),
            uncertainty,
            label,
        }
    }
}

/// Metric values of one method as more uncertain points are included.
///
/// `xs`, `mean` and `std` are index aligned: `mean[k]` is the average over runs of the
/// metric evaluated on the `xs[k]` most certain points.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IncrementalCurve {
    pub xs: Vec<usize>,
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

fn default_parallel() -> bool {
    false
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IncrementalConfig {
    /// The smallest number of points a metric is evaluated on.
    pub min_size: usize,
    /// Number of points added at every increment.
    pub step_size: usize,
    /// Evaluate the runs of a method on the rayon thread pool. Default `false`.
    #[serde(default = "default_parallel")]
    pub parallel: bool,
}

impl IncrementalConfig {
    pub fn new(min_size: usize, step_size: usize) -> Self {
        IncrementalConfig {
            min_size,
            step_size,
            parallel: default_parallel(),
        }
    }

    pub fn set_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn validate(&self) -> Result<(), UncError> {
        validate_positive_usize_parameter(self.min_size, "min_size")?;
        validate_positive_usize_parameter(self.step_size, "step_size")
    }
}

/// Subset sizes `min_size, min_size + step_size, ...` strictly below `n_points`.
pub fn subset_sizes(n_points: usize, min_size: usize, step_size: usize) -> Vec<usize> {
    (min_size..n_points).step_by(step_size).collect()
}

/// Build the points of one run, sorted by uncertainty with the most certain first.
/// Points with equal uncertainty keep their original order and NaN uncertainties come last.
pub fn sort_by_uncertainty(y: &[f64], y_pred: &[f64], uncertainty: &[f64]) -> Vec<ScoredPoint> {
    let mut points: Vec<ScoredPoint> = y
        .iter()
        .zip(y_pred)
        .zip(uncertainty)
        .map(|((label, prediction), unc)| ScoredPoint::new(*prediction, *unc, *label))
        .collect();
    points.sort_by(|a, b| {
        a.uncertainty
            .is_nan()
            .cmp(&b.uncertainty.is_nan())
            .then(a.uncertainty.total_cmp(&b.uncertainty))
    });
    points
}

/// Evaluate every metric on growing prefixes of the sorted `points`.
///
/// Returns one score vector per metric, aligned with [`subset_sizes`].
pub fn incremental_scores(points: &[ScoredPoint], metrics: &[NamedMetric], config: &IncrementalConfig) -> Vec<Vec<f64>> {
    let labels: Vec<f64> = points.iter().map(|p| p.label).collect();
    let predictions: Vec<f64> = points.iter().map(|p| p.prediction).collect();
    let sizes = subset_sizes(points.len(), config.min_size, config.step_size);
    metrics
        .iter()
        .map(|metric| {
            sizes
                .iter()
                .map(|&i| metric.evaluate(&labels[..i], &predictions[..i]))
                .collect()
        })
        .collect()
}

/// Mean and population standard deviation across runs at every index.
pub fn mean_and_std(runs: &[Vec<f64>]) -> (Vec<f64>, Vec<f64>) {
    let n_steps = runs.first().map_or(0, |r| r.len());
    (0..n_steps)
        .map(|k| {
            let column: Vec<f64> = runs.iter().map(|r| r[k]).collect();
            (mean(&column), population_std(&column))
        })
        .unzip()
}

fn validate_runs(y: &[Vec<f64>], y_pred: &[Vec<f64>], uncertainty: &[Vec<f64>]) -> Result<(), UncError> {
    if y_pred.is_empty() {
        return Err(UncError::InvalidParameter(
            "predictions".to_string(),
            "at least one run".to_string(),
            "0 runs".to_string(),
        ));
    }
    if uncertainty.len() != y_pred.len() {
        return Err(UncError::ShapeMismatch("uncertainty runs".to_string(), y_pred.len(), uncertainty.len()));
    }
    if y.len() != y_pred.len() {
        return Err(UncError::ShapeMismatch("label runs".to_string(), y_pred.len(), y.len()));
    }
    let first = y[0].len();
    for (run, ((labels, preds), uncs)) in y.iter().zip(y_pred).zip(uncertainty).enumerate() {
        if preds.len() != labels.len() {
            return Err(UncError::ShapeMismatch(format!("predictions of run {}", run), labels.len(), preds.len()));
        }
        if uncs.len() != labels.len() {
            return Err(UncError::ShapeMismatch(format!("uncertainties of run {}", run), labels.len(), uncs.len()));
        }
        if labels.len() != first {
            return Err(UncError::UnequalRunSizes(run, labels.len(), first));
        }
    }
    Ok(())
}

/// Compute incremental metric curves of one method over several runs.
///
/// * `y` - True labels, one vector per run.
/// * `y_pred` - Predicted positive class probabilities, one vector per run, in the same
///   order as `y`.
/// * `uncertainty` - Uncertainty scores, one vector per run.
/// * `metrics` - Metrics taking labels and probabilities in this order.
/// * `config` - Minimum subset size, step size and parallelism.
pub fn get_incremental_loss(
    y: &[Vec<f64>],
    y_pred: &[Vec<f64>],
    uncertainty: &[Vec<f64>],
    metrics: &[NamedMetric],
    config: &IncrementalConfig,
) -> Result<HashMap<String, IncrementalCurve>, UncError> {
    config.validate()?;
    validate_runs(y, y_pred, uncertainty)?;

    let run_scores = |run: usize| {
        let points = sort_by_uncertainty(&y[run], &y_pred[run], &uncertainty[run]);
        incremental_scores(&points, metrics, config)
    };
    let per_run: Vec<Vec<Vec<f64>>> = if config.parallel {
        (0..y_pred.len()).into_par_iter().map(run_scores).collect()
    } else {
        (0..y_pred.len()).map(run_scores).collect()
    };

    let xs = subset_sizes(y[0].len(), config.min_size, config.step_size);
    if xs.is_empty() {
        warn!(
            "min_size {} is not below the {} points of a run, the curves are empty.",
            config.min_size,
            y[0].len()
        );
    }
    let mut curves = HashMap::with_capacity(metrics.len());
    for (m, metric) in metrics.iter().enumerate() {
        let runs: Vec<Vec<f64>> = per_run.iter().map(|scores| scores[m].clone()).collect();
        let (mean, std) = mean_and_std(&runs);
        curves.insert(
            metric.name.clone(),
            IncrementalCurve {
                xs: xs.clone(),
                mean,
                std,
            },
        );
    }
    Ok(curves)
}

/// Incremental metric curves of every method of a [`ResultContainer`], computed eagerly.
///
/// Serializes its curves in method and metric insertion order.
#[derive(Debug, Clone)]
pub struct UncertaintyAnalyzer {
    curves: HashMap<String, HashMap<String, IncrementalCurve>>,
    methods: Vec<String>,
    metrics: Vec<String>,
    total_points: usize,
    pub config: IncrementalConfig,
}

impl UncertaintyAnalyzer {
    /// Compute the curves of every method and metric.
    ///
    /// * `y` - True labels, one vector per run. Every method must have the same number of runs.
    /// * `results` - Predictions and uncertainties of every method.
    /// * `metrics` - Metrics to compute.
    /// * `config` - Minimum subset size, step size and parallelism.
    pub fn new(
        y: &[Vec<f64>],
        results: &ResultContainer,
        metrics: &[NamedMetric],
        config: IncrementalConfig,
    ) -> Result<Self, UncError> {
        let total_points = y.first().map(|r| r.len()).ok_or_else(|| {
            UncError::InvalidParameter("labels".to_string(), "at least one run".to_string(), "0 runs".to_string())
        })?;

        let mut curves = HashMap::with_capacity(results.len());
        for (name, method) in results.iter() {
            let method_curves = get_incremental_loss(y, &method.predictions, &method.uncertainties, metrics, &config)?;
            if let Some(first) = metrics.first().and_then(|m| method_curves.get(&m.name)) {
                debug!("{} {}: {}", name, metrics[0].name, fmt_vec_output(&first.mean));
            }
            curves.insert(name.to_string(), method_curves);
        }
        info!(
            "Computed incremental metrics for {} methods and {} metrics.",
            results.len(),
            metrics.len()
        );

        Ok(UncertaintyAnalyzer {
            curves,
            methods: results.methods().to_vec(),
            metrics: metrics.iter().map(|m| m.name.clone()).collect(),
            total_points,
            config,
        })
    }

    /// The curve of `metric` for `method`.
    pub fn curve(&self, method: &str, metric: &str) -> Result<&IncrementalCurve, UncError> {
        self.curves
            .get(method)
            .ok_or_else(|| UncError::UnknownMethod(method.to_string()))?
            .get(metric)
            .ok_or_else(|| UncError::UnknownMetric(metric.to_string(), method.to_string()))
    }

    /// Method names in insertion order.
    pub fn methods(&self) -> &[String] {
        &self.methods
    }

    pub fn metrics(&self) -> &[String] {
        &self.metrics
    }

    /// Number of points in the first run, used to turn subset sizes into fractions.
    pub fn total_points(&self) -> usize {
        self.total_points
    }

    pub fn to_json(&self) -> Result<String, UncError> {
        serde_json::to_string(self).map_err(|e| UncError::UnableToWrite(e.to_string()))
    }
}

struct MethodCurves<'a> {
    metrics: &'a [String],
    curves: &'a HashMap<String, IncrementalCurve>,
}

impl Serialize for MethodCurves<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(
            self.metrics
                .iter()
                .filter_map(|metric| self.curves.get(metric).map(|curve| (metric, curve))),
        )
    }
}

struct OrderedCurves<'a>(&'a UncertaintyAnalyzer);

impl Serialize for OrderedCurves<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let analyzer = self.0;
        serializer.collect_map(analyzer.methods.iter().filter_map(|method| {
            analyzer.curves.get(method).map(|curves| {
                (
                    method,
                    MethodCurves {
                        metrics: &analyzer.metrics,
                        curves,
                    },
                )
            })
        }))
    }
}

impl Serialize for UncertaintyAnalyzer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("UncertaintyAnalyzer", 5)?;
        state.serialize_field("curves", &OrderedCurves(self))?;
        state.serialize_field("methods", &self.methods)?;
        state.serialize_field("metrics", &self.metrics)?;
        state.serialize_field("total_points", &self.total_points)?;
        state.serialize_field("config", &self.config)?;
        state.end()
    }
}
