use crate::constants::{ACCURACY_THRESHOLD, ECE_BINS, LOG_LOSS_EPSILON};
use crate::errors::UncError;
use crate::utils::items_to_strings;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Metric callable, taking true labels and predicted positive class probabilities in this order.
pub type MetricFn = fn(&[f64], &[f64]) -> f64;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Accuracy,
    AUC,
    LogLoss,
    BrierScore,
    ExpectedCalibrationError,
}

impl FromStr for Metric {
    type Err = UncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Accuracy" => Ok(Metric::Accuracy),
            "AUC" => Ok(Metric::AUC),
            "LogLoss" => Ok(Metric::LogLoss),
            "BrierScore" => Ok(Metric::BrierScore),
            "ExpectedCalibrationError" => Ok(Metric::ExpectedCalibrationError),

            _ => Err(UncError::ParseString(
                s.to_string(),
                "Metric".to_string(),
                items_to_strings(vec![
                    "Accuracy",
                    "AUC",
                    "LogLoss",
                    "BrierScore",
                    "ExpectedCalibrationError",
                ]),
            )),
        }
    }
}

impl Metric {
    pub fn name(&self) -> &'static str {
        match self {
            Metric::Accuracy => "accuracy",
            Metric::AUC => "roc_auc",
            Metric::LogLoss => "log_loss",
            Metric::BrierScore => "brier_score",
            Metric::ExpectedCalibrationError => "ece",
        }
    }

    pub fn callable(&self) -> MetricFn {
        metric_callables(self).0
    }
}

pub fn metric_callables(metric_type: &Metric) -> (MetricFn, bool) {
    match metric_type {
        Metric::Accuracy => (AccuracyMetric::calculate_metric, AccuracyMetric::maximize()),
        Metric::AUC => (AUCMetric::calculate_metric, AUCMetric::maximize()),
        Metric::LogLoss => (LogLossMetric::calculate_metric, LogLossMetric::maximize()),
        Metric::BrierScore => (BrierScoreMetric::calculate_metric, BrierScoreMetric::maximize()),
        Metric::ExpectedCalibrationError => (
            ExpectedCalibrationErrorMetric::calculate_metric,
            ExpectedCalibrationErrorMetric::maximize(),
        ),
    }
}

pub trait EvaluationMetric {
    fn calculate_metric(y: &[f64], yhat: &[f64]) -> f64;
    fn maximize() -> bool;
}

pub struct AccuracyMetric {}
impl EvaluationMetric for AccuracyMetric {
    fn calculate_metric(y: &[f64], yhat: &[f64]) -> f64 {
        accuracy(y, yhat)
    }
    fn maximize() -> bool {
        true
    }
}

pub struct AUCMetric {}
impl EvaluationMetric for AUCMetric {
    fn calculate_metric(y: &[f64], yhat: &[f64]) -> f64 {
        roc_auc_score(y, yhat)
    }
    fn maximize() -> bool {
        true
    }
}

pub struct LogLossMetric {}
impl EvaluationMetric for LogLossMetric {
    fn calculate_metric(y: &[f64], yhat: &[f64]) -> f64 {
        log_loss(y, yhat)
    }
    fn maximize() -> bool {
        false
    }
}

pub struct BrierScoreMetric {}
impl EvaluationMetric for BrierScoreMetric {
    fn calculate_metric(y: &[f64], yhat: &[f64]) -> f64 {
        brier_score(y, yhat)
    }
    fn maximize() -> bool {
        false
    }
}

pub struct ExpectedCalibrationErrorMetric {}
impl EvaluationMetric for ExpectedCalibrationErrorMetric {
    fn calculate_metric(y: &[f64], yhat: &[f64]) -> f64 {
        expected_calibration_error(y, yhat, ECE_BINS)
    }
    fn maximize() -> bool {
        false
    }
}

/// A metric together with the name its results are stored under.
///
/// Built-in metrics convert with `From<Metric>`; any other `fn(labels, probabilities) -> f64`
/// can be wrapped with [`NamedMetric::new`].
#[derive(Clone)]
pub struct NamedMetric {
    pub name: String,
    pub func: MetricFn,
}

impl NamedMetric {
    pub fn new(name: &str, func: MetricFn) -> Self {
        NamedMetric {
            name: name.to_string(),
            func,
        }
    }

    #[inline]
    pub fn evaluate(&self, y: &[f64], yhat: &[f64]) -> f64 {
        (self.func)(y, yhat)
    }
}

impl From<Metric> for NamedMetric {
    fn from(metric: Metric) -> Self {
        let (func, _) = metric_callables(&metric);
        NamedMetric::new(metric.name(), func)
    }
}

impl fmt::Debug for NamedMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedMetric").field("name", &self.name).finish()
    }
}

/// Fraction of samples whose thresholded probability matches the label.
pub fn accuracy(y: &[f64], yhat: &[f64]) -> f64 {
    let correct = y
        .iter()
        .zip(yhat)
        .filter(|(y_, yhat_)| {
            let predicted = if **yhat_ > ACCURACY_THRESHOLD { 1.0 } else { 0.0 };
            predicted == **y_
        })
        .count();
    correct as f64 / y.len() as f64
}

pub fn log_loss(y: &[f64], yhat: &[f64]) -> f64 {
    let res = y
        .iter()
        .zip(yhat)
        .map(|(y_, yhat_)| {
            let p = yhat_.clamp(LOG_LOSS_EPSILON, 1.0 - LOG_LOSS_EPSILON);
            -(*y_ * p.ln() + (1.0 - *y_) * (1.0 - p).ln())
        })
        .sum::<f64>();
    res / y.len() as f64
}

pub fn brier_score(y: &[f64], yhat: &[f64]) -> f64 {
    let res = y.iter().zip(yhat).map(|(y_, yhat_)| (y_ - yhat_).powi(2)).sum::<f64>();
    res / y.len() as f64
}

/// Expected calibration error over `n_bins` equal width probability bins. NaN when
/// `n_bins` is zero.
pub fn expected_calibration_error(y: &[f64], yhat: &[f64], n_bins: usize) -> f64 {
    if n_bins == 0 {
        return f64::NAN;
    }
    let n = y.len();
    let mut bin_conf = vec![0.0_f64; n_bins];
    let mut bin_pos = vec![0.0_f64; n_bins];
    let mut bin_count = vec![0_usize; n_bins];

    for (y_, yhat_) in y.iter().zip(yhat) {
        let p = yhat_.clamp(0.0, 1.0);
        let bin = ((p * n_bins as f64) as usize).min(n_bins - 1);
        bin_conf[bin] += p;
        bin_pos[bin] += *y_;
        bin_count[bin] += 1;
    }

    let mut ece = 0.0;
    for b in 0..n_bins {
        if bin_count[b] > 0 {
            let count = bin_count[b] as f64;
            ece += (count / n as f64) * (bin_conf[b] / count - bin_pos[b] / count).abs();
        }
    }
    ece
}

fn trapezoid_area(x0: f64, x1: f64, y0: f64, y1: f64) -> f64 {
    (x0 - x1).abs() * (y0 + y1) * 0.5
}

/// Area under the ROC curve. NaN when only one class is present.
pub fn roc_auc_score(y: &[f64], yhat: &[f64]) -> f64 {
    if y.is_empty() {
        return f64::NAN;
    }
    let mut indices = (0..y.len()).collect::<Vec<_>>();
    indices.sort_unstable_by(|&a, &b| yhat[b].total_cmp(&yhat[a]));
    let mut auc: f64 = 0.0;

    let mut label = y[indices[0]];
    let mut fp = 1.0 - label;
    let mut tp: f64 = label;
    let mut tp_prev: f64 = 0.0;
    let mut fp_prev: f64 = 0.0;

    for i in 1..indices.len() {
        if yhat[indices[i]] != yhat[indices[i - 1]] {
            auc += trapezoid_area(fp_prev, fp, tp_prev, tp);
            tp_prev = tp;
            fp_prev = fp;
        }
        label = y[indices[i]];
        fp += 1.0 - label;
        tp += label;
    }

    auc += trapezoid_area(fp_prev, fp, tp_prev, tp);
    if fp <= 0.0 || tp <= 0.0 {
        auc = 0.0;
        fp = 0.0;
        tp = 0.0;
    }

    auc / (tp * fp)
}
