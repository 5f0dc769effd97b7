use crate::constants::{ADAM_BETA1, ADAM_BETA2, ADAM_EPSILON};
use ndarray::{ArrayD, ArrayViewD, ArrayViewMutD, Zip};
use serde::{Deserialize, Serialize};

/// Adam optimizer with bias corrected first and second moment estimates.
///
/// Moment buffers are created lazily on the first step, matching the shapes of the gradients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Adam {
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
    t: i32,
    m: Vec<ArrayD<f64>>,
    v: Vec<ArrayD<f64>>,
}

impl Adam {
    pub fn new(learning_rate: f64) -> Self {
        Adam {
            learning_rate,
            beta1: ADAM_BETA1,
            beta2: ADAM_BETA2,
            epsilon: ADAM_EPSILON,
            t: 0,
            m: Vec::new(),
            v: Vec::new(),
        }
    }

    /// Number of steps taken so far.
    pub fn steps(&self) -> i32 {
        self.t
    }

    /// Update `params` in place with their matching `grads`.
    pub fn step(&mut self, params: Vec<ArrayViewMutD<f64>>, grads: Vec<ArrayViewD<f64>>) {
        if self.m.len() != grads.len() {
            self.m = grads.iter().map(|g| ArrayD::zeros(g.raw_dim())).collect();
            self.v = grads.iter().map(|g| ArrayD::zeros(g.raw_dim())).collect();
            self.t = 0;
        }
        self.t += 1;

        let (lr, b1, b2, eps) = (self.learning_rate, self.beta1, self.beta2, self.epsilon);
        let bias_correction1 = 1.0 - b1.powi(self.t);
        let bias_correction2 = 1.0 - b2.powi(self.t);

        for (((p, g), m), v) in params.into_iter().zip(grads).zip(self.m.iter_mut()).zip(self.v.iter_mut()) {
            Zip::from(p).and(g).and(m).and(v).for_each(|p, &g, m, v| {
                *m = b1 * *m + (1.0 - b1) * g;
                *v = b2 * *v + (1.0 - b2) * g * g;
                let m_hat = *m / bias_correction1;
                let v_hat = *v / bias_correction2;
                *p -= lr * m_hat / (v_hat.sqrt() + eps);
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1};

    #[test]
    fn test_first_step_moves_by_learning_rate() {
        let mut opt = Adam::new(0.1);
        let mut w = array![1.0, -2.0, 3.0];
        let g = array![0.5, -4.0, 0.0];
        opt.step(vec![w.view_mut().into_dyn()], vec![g.view().into_dyn()]);
        // With bias correction the first update is lr * sign(g).
        assert!((w[0] - 0.9).abs() < 1e-6);
        assert!((w[1] + 1.9).abs() < 1e-6);
        assert_eq!(w[2], 3.0);
        assert_eq!(opt.steps(), 1);
    }

    #[test]
    fn test_minimizes_quadratic() {
        let mut opt = Adam::new(0.05);
        let mut w: Array1<f64> = array![4.0, -3.0];
        for _ in 0..2000 {
            let g = &w * 2.0;
            opt.step(vec![w.view_mut().into_dyn()], vec![g.view().into_dyn()]);
        }
        assert!(w.iter().all(|v| v.abs() < 0.1));
    }
}
