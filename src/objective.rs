//! Objective
//!
//! Binary cross entropy on logits with a positive class weight, as used by the MLP trainer.
use crate::utils::{mean, sigmoid, softplus};
use serde::{Deserialize, Serialize};

/// Positive class weight derived from the fraction of positives `mean_y`.
///
/// With class weighting enabled this is the inverse class frequency `(1 - mean_y) / mean_y`,
/// except for batches without positives (weight 0) or without negatives (weight 1).
/// With class weighting disabled the weight is always 1.
pub fn positive_class_weight(mean_y: f64, class_weight: bool) -> f64 {
    if !class_weight {
        return 1.0;
    }
    if mean_y == 0.0 {
        0.0
    } else if mean_y == 1.0 {
        1.0
    } else {
        (1.0 - mean_y) / mean_y
    }
}

pub trait ObjectiveFunction {
    /// Per sample loss.
    fn calc_loss(&self, y: &[f64], yhat: &[f64]) -> Vec<f64>;
    /// Gradient of the mean loss with respect to each prediction.
    fn calc_grad(&self, y: &[f64], yhat: &[f64]) -> Vec<f64>;
    /// Mean reduced loss.
    fn calc_mean_loss(&self, y: &[f64], yhat: &[f64]) -> f64 {
        mean(&self.calc_loss(y, yhat))
    }
}

/// Logistic loss on raw logits where positive samples are scaled by `pos_weight`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BCEWithLogits {
    pub pos_weight: f64,
}

impl BCEWithLogits {
    pub fn new(pos_weight: f64) -> Self {
        BCEWithLogits { pos_weight }
    }

    /// Loss whose positive weight follows the label mean of `y`.
    pub fn from_labels(y: &[f64], class_weight: bool) -> Self {
        BCEWithLogits::new(positive_class_weight(mean(y), class_weight))
    }
}

impl ObjectiveFunction for BCEWithLogits {
    #[inline]
    fn calc_loss(&self, y: &[f64], yhat: &[f64]) -> Vec<f64> {
        // ln(sigmoid(z)) = -softplus(-z), ln(1 - sigmoid(z)) = -softplus(z)
        y.iter()
            .zip(yhat)
            .map(|(y_, z_)| self.pos_weight * *y_ * softplus(-*z_) + (1.0 - *y_) * softplus(*z_))
            .collect()
    }

    #[inline]
    fn calc_grad(&self, y: &[f64], yhat: &[f64]) -> Vec<f64> {
        let n = y.len() as f64;
        y.iter()
            .zip(yhat)
            .map(|(y_, z_)| {
                let p = sigmoid(*z_);
                (p * (self.pos_weight * *y_ + 1.0 - *y_) - self.pos_weight * *y_) / n
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::precision_round;

    #[test]
    fn test_positive_class_weight() {
        assert_eq!(positive_class_weight(0.0, true), 0.0);
        assert_eq!(positive_class_weight(1.0, true), 1.0);
        assert_eq!(positive_class_weight(0.25, true), 3.0);
        assert_eq!(positive_class_weight(0.5, true), 1.0);
        for m in [0.0, 0.1, 0.25, 1.0] {
            assert_eq!(positive_class_weight(m, false), 1.0);
        }
    }

    #[test]
    fn test_bce_unweighted_matches_log_loss() {
        let loss = BCEWithLogits::new(1.0);
        let y = vec![1.0, 0.0];
        let z = vec![0.0, 0.0];
        let l = loss.calc_loss(&y, &z);
        assert_eq!(precision_round(l[0], 6), precision_round(2.0_f64.ln(), 6));
        assert_eq!(precision_round(loss.calc_mean_loss(&y, &z), 6), precision_round(2.0_f64.ln(), 6));
    }

    #[test]
    fn test_bce_pos_weight_scales_positives_only() {
        let y = vec![1.0, 0.0, 1.0];
        let z = vec![0.3, -1.2, 2.0];
        let base = BCEWithLogits::new(1.0).calc_loss(&y, &z);
        let weighted = BCEWithLogits::new(3.0).calc_loss(&y, &z);
        assert_eq!(precision_round(weighted[0], 10), precision_round(3.0 * base[0], 10));
        assert_eq!(weighted[1], base[1]);
        assert_eq!(precision_round(weighted[2], 10), precision_round(3.0 * base[2], 10));
    }

    #[test]
    fn test_bce_grad_finite_difference() {
        let loss = BCEWithLogits::new(2.5);
        let y = vec![1.0, 0.0, 1.0, 0.0];
        let z = vec![0.4, -0.7, -1.5, 2.2];
        let grad = loss.calc_grad(&y, &z);
        let h = 1e-6;
        for i in 0..z.len() {
            let mut zp = z.clone();
            let mut zm = z.clone();
            zp[i] += h;
            zm[i] -= h;
            let numeric = (loss.calc_mean_loss(&y, &zp) - loss.calc_mean_loss(&y, &zm)) / (2.0 * h);
            assert!((numeric - grad[i]).abs() < 1e-6);
        }
    }

    #[test]
    fn test_from_labels_uses_label_mean() {
        let loss = BCEWithLogits::from_labels(&[1.0, 0.0, 0.0, 0.0], true);
        assert_eq!(loss.pos_weight, 3.0);
        let loss = BCEWithLogits::from_labels(&[0.0, 0.0], true);
        assert_eq!(loss.pos_weight, 0.0);
    }
}
