//! Uncertainty
//!
//! Collects the predictions and entropy based uncertainties of several methods over several
//! runs (seeds or cross validation splits), ready to be handed to the analyzer.
use crate::calibration::platt_scale;
use crate::errors::UncError;
use hashbrown::HashMap;
use log::debug;
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

/// Shannon entropy (natural log) of every row of a class probability matrix.
///
/// Rows are normalized to sum to one first and `0 * ln(0)` is taken as zero.
pub fn entropy(probs: ArrayView2<f64>) -> Vec<f64> {
    probs
        .rows()
        .into_iter()
        .map(|row| {
            let total = row.sum();
            row.iter()
                .map(|p| p / total)
                .filter(|p| *p > 0.0)
                .map(|p| -p * p.ln())
                .sum()
        })
        .collect()
}

/// Predictions and uncertainties of a single method, one entry per run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MethodResults {
    /// Positive class probabilities.
    pub predictions: Vec<Vec<f64>>,
    /// Uncertainty scores, index aligned with `predictions`.
    pub uncertainties: Vec<Vec<f64>>,
}

impl MethodResults {
    /// Append the results of one run.
    pub fn push(&mut self, predictions: Vec<f64>, uncertainties: Vec<f64>) -> Result<(), UncError> {
        if predictions.len() != uncertainties.len() {
            return Err(UncError::ShapeMismatch(
                "run uncertainties".to_string(),
                predictions.len(),
                uncertainties.len(),
            ));
        }
        self.predictions.push(predictions);
        self.uncertainties.push(uncertainties);
        Ok(())
    }

    pub fn n_runs(&self) -> usize {
        self.predictions.len()
    }
}

/// Append only store of [`MethodResults`] keyed by method name, iterated in insertion order.
#[derive(Debug, Clone, Default)]
pub struct ResultContainer {
    results: HashMap<String, MethodResults>,
    order: Vec<String>,
}

fn check_probability_pairs(y_pred: &ArrayView2<f64>, what: &str) -> Result<(), UncError> {
    if y_pred.ncols() != 2 {
        return Err(UncError::ShapeMismatch(format!("{} class columns", what), 2, y_pred.ncols()));
    }
    Ok(())
}

impl ResultContainer {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&mut self, name: &str) -> &mut MethodResults {
        if !self.results.contains_key(name) {
            self.order.push(name.to_string());
        }
        self.results.entry(name.to_string()).or_default()
    }

    /// Add one run of `name`: the entropy of every row of `y_pred` and its positive class
    /// probability.
    ///
    /// * `y_pred` - Predicted probabilities with columns `[1 - p, p]`.
    /// * `name` - The method name.
    pub fn add_results(&mut self, y_pred: ArrayView2<f64>, name: &str) -> Result<(), UncError> {
        check_probability_pairs(&y_pred, "test predictions")?;
        let uncertainties = entropy(y_pred);
        let predictions = y_pred.column(1).to_vec();
        self.entry(name).push(predictions, uncertainties)
    }

    /// Add one run of `name` with Platt scaled predictions.
    ///
    /// The scaling is fitted on the validation probabilities and labels and applied to the
    /// positive class probabilities of `y_pred`. The stored uncertainty is the entropy of the
    /// uncalibrated `y_pred`.
    ///
    /// * `y_pred` - Predicted probabilities on the test set, columns `[1 - p, p]`.
    /// * `name` - The method name.
    /// * `y_pred_val` - Predicted probabilities on the validation set.
    /// * `y_val` - True labels of the validation set.
    pub fn add_calibrated_results(
        &mut self,
        y_pred: ArrayView2<f64>,
        name: &str,
        y_pred_val: ArrayView2<f64>,
        y_val: &[f64],
    ) -> Result<(), UncError> {
        check_probability_pairs(&y_pred, "test predictions")?;
        check_probability_pairs(&y_pred_val, "validation predictions")?;
        let uncertainties = entropy(y_pred);
        let calibrated = platt_scale(&y_pred.column(1).to_vec(), &y_pred_val.column(1).to_vec(), y_val)?;
        debug!("Added calibrated run {} for method {}", self.get(name).map_or(0, |r| r.n_runs()), name);
        self.entry(name).push(calibrated, uncertainties)
    }

    /// Method names in the order they were first added.
    pub fn methods(&self) -> &[String] {
        &self.order
    }

    pub fn get(&self, name: &str) -> Option<&MethodResults> {
        self.results.get(name)
    }

    /// Iterate over `(name, results)` in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &MethodResults)> {
        self.order
            .iter()
            .filter_map(move |name| self.results.get(name).map(|r| (name.as_str(), r)))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
