//! Platt scaling (sigmoid calibration)
use crate::constants::{PLATT_MAX_ITER, PLATT_REGULARIZATION, PLATT_TOLERANCE};
use crate::errors::UncError;
use crate::utils::{sigmoid, softplus, validate_positive_usize_parameter};
use log::debug;
use serde::{Deserialize, Serialize};

/// Platt scaling calibrator.
///
/// Fits `P(y = 1 | p) = 1 / (1 + exp(-(a * p + b)))` where `p` is the raw positive class
/// probability of a classifier. The slope `a` carries an L2 penalty of strength
/// `regularization`, the intercept is left unpenalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlattScaler {
    /// Slope parameter.
    a: Option<f64>,
    /// Intercept parameter.
    b: Option<f64>,
    /// L2 penalty on the slope, the inverse of the usual `C`.
    pub regularization: f64,
    /// Maximum number of Newton iterations.
    pub max_iter: usize,
    /// Convergence tolerance on the parameter update.
    pub tol: f64,
}

impl Default for PlattScaler {
    fn default() -> Self {
        Self::new()
    }
}

impl PlattScaler {
    pub fn new() -> Self {
        PlattScaler {
            a: None,
            b: None,
            regularization: PLATT_REGULARIZATION,
            max_iter: PLATT_MAX_ITER,
            tol: PLATT_TOLERANCE,
        }
    }

    pub fn with_regularization(mut self, regularization: f64) -> Self {
        self.regularization = regularization;
        self
    }

    /// Fitted `(a, b)`, if `fit` has been called.
    pub fn parameters(&self) -> Option<(f64, f64)> {
        match (self.a, self.b) {
            (Some(a), Some(b)) => Some((a, b)),
            _ => None,
        }
    }

    fn objective(&self, probs: &[f64], labels: &[f64], a: f64, b: f64) -> f64 {
        let nll: f64 = probs
            .iter()
            .zip(labels)
            .map(|(p, y)| {
                let z = a * p + b;
                y * softplus(-z) + (1.0 - y) * softplus(z)
            })
            .sum();
        nll + 0.5 * self.regularization * a * a
    }

    /// Fit the calibration map from raw probabilities to binary labels with Newton's method.
    ///
    /// * `probs` - Raw positive class probabilities on the validation set.
    /// * `labels` - True validation labels.
    pub fn fit(&mut self, probs: &[f64], labels: &[f64]) -> Result<&mut Self, UncError> {
        if probs.len() != labels.len() {
            return Err(UncError::ShapeMismatch(
                "calibration labels".to_string(),
                probs.len(),
                labels.len(),
            ));
        }
        validate_positive_usize_parameter(probs.len(), "calibration set size")?;

        let mut a = 0.0;
        let mut b = 0.0;
        let mut loss = self.objective(probs, labels, a, b);

        for iteration in 0..self.max_iter {
            let mut grad_a = self.regularization * a;
            let mut grad_b = 0.0;
            let mut hess_aa = self.regularization;
            let mut hess_ab = 0.0;
            let mut hess_bb = 1e-12;

            for (f, y) in probs.iter().zip(labels) {
                let p = sigmoid(a * f + b);
                let d1 = p - y;
                let d2 = p * (1.0 - p);
                grad_a += f * d1;
                grad_b += d1;
                hess_aa += f * f * d2;
                hess_ab += f * d2;
                hess_bb += d2;
            }

            let det = hess_aa * hess_bb - hess_ab * hess_ab;
            if det.abs() < 1e-300 {
                break;
            }
            let delta_a = (hess_bb * grad_a - hess_ab * grad_b) / det;
            let delta_b = (hess_aa * grad_b - hess_ab * grad_a) / det;

            // Backtrack until the penalized loss does not increase.
            let mut step = 1.0;
            let mut new_a = a - delta_a;
            let mut new_b = b - delta_b;
            let mut new_loss = self.objective(probs, labels, new_a, new_b);
            while new_loss > loss && step > 1e-8 {
                step *= 0.5;
                new_a = a - step * delta_a;
                new_b = b - step * delta_b;
                new_loss = self.objective(probs, labels, new_a, new_b);
            }

            a = new_a;
            b = new_b;
            loss = new_loss;

            if (step * delta_a).abs() < self.tol && (step * delta_b).abs() < self.tol {
                debug!("Platt scaling converged after {} iterations.", iteration + 1);
                break;
            }
        }

        self.a = Some(a);
        self.b = Some(b);
        Ok(self)
    }

    /// Map raw probabilities through the fitted sigmoid.
    pub fn transform(&self, probs: &[f64]) -> Result<Vec<f64>, UncError> {
        let (a, b) = self.parameters().ok_or(UncError::NotFitted)?;
        Ok(probs.iter().map(|p| sigmoid(a * p + b)).collect())
    }
}

/// Calibrate test probabilities with a Platt scaler fitted on validation probabilities.
///
/// * `y_pred` - Raw positive class probabilities on the test set.
/// * `y_pred_val` - Raw positive class probabilities on the validation set.
/// * `y_val` - Validation labels.
pub fn platt_scale(y_pred: &[f64], y_pred_val: &[f64], y_val: &[f64]) -> Result<Vec<f64>, UncError> {
    let mut scaler = PlattScaler::new();
    scaler.fit(y_pred_val, y_val)?;
    scaler.transform(y_pred)
}
