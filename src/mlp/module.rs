//! MLP Module
//!
//! Feed-forward network built from `Linear -> [BatchNorm1d] -> ReLU -> Dropout` blocks with a
//! final linear output layer, together with its hand written backward pass.
use crate::constants::{BATCH_NORM_EPSILON, BATCH_NORM_MOMENTUM};
use ndarray::{Array1, Array2, ArrayView2, ArrayViewD, ArrayViewMutD, Axis};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Fully connected layer computing `x · weight + bias`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Linear {
    /// Weight matrix of shape `(n_in, n_out)`.
    pub weight: Array2<f64>,
    /// Bias of length `n_out`.
    pub bias: Array1<f64>,
}

impl Linear {
    /// Weights and biases are drawn from U(-1/sqrt(n_in), 1/sqrt(n_in)).
    pub fn new(rng: &mut StdRng, n_in: usize, n_out: usize) -> Self {
        let bound = 1.0 / (n_in as f64).sqrt();
        let weight = Array2::from_shape_fn((n_in, n_out), |_| rng.gen_range(-bound..bound));
        let bias = Array1::from_shape_fn(n_out, |_| rng.gen_range(-bound..bound));
        Linear { weight, bias }
    }

    fn forward(&self, x: &Array2<f64>) -> Array2<f64> {
        x.dot(&self.weight) + &self.bias
    }
}

/// Batch normalization over the feature axis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchNorm1d {
    pub gamma: Array1<f64>,
    pub beta: Array1<f64>,
    pub running_mean: Array1<f64>,
    pub running_var: Array1<f64>,
    momentum: f64,
    eps: f64,
}

impl BatchNorm1d {
    pub fn new(num_features: usize) -> Self {
        BatchNorm1d {
            gamma: Array1::ones(num_features),
            beta: Array1::zeros(num_features),
            running_mean: Array1::zeros(num_features),
            running_var: Array1::ones(num_features),
            momentum: BATCH_NORM_MOMENTUM,
            eps: BATCH_NORM_EPSILON,
        }
    }

    fn forward_eval(&self, x: &Array2<f64>) -> Array2<f64> {
        let inv_std = self.running_var.mapv(|v| 1.0 / (v + self.eps).sqrt());
        (x - &self.running_mean) * &inv_std * &self.gamma + &self.beta
    }

    fn forward_train(&mut self, x: &Array2<f64>) -> (Array2<f64>, Cache) {
        let n = x.nrows() as f64;
        let mean = x.sum_axis(Axis(0)) / n;
        let centered = x - &mean;
        let var = centered.mapv(|v| v * v).sum_axis(Axis(0)) / n;
        let inv_std = var.mapv(|v| 1.0 / (v + self.eps).sqrt());
        let x_hat = &centered * &inv_std;
        let out = &x_hat * &self.gamma + &self.beta;

        // Running variance tracks the unbiased estimate.
        let unbiased = if n > 1.0 { &var * (n / (n - 1.0)) } else { var };
        self.running_mean = &self.running_mean * (1.0 - self.momentum) + &mean * self.momentum;
        self.running_var = &self.running_var * (1.0 - self.momentum) + &unbiased * self.momentum;

        (out, Cache::BatchNorm { x_hat, inv_std })
    }
}

/// A single step of the network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Layer {
    Linear(Linear),
    BatchNorm(BatchNorm1d),
    ReLU,
    /// Dropout with the given drop probability.
    Dropout(f64),
}

/// Values kept from the forward pass that the backward pass needs.
#[derive(Debug)]
pub enum Cache {
    Linear(Array2<f64>),
    BatchNorm { x_hat: Array2<f64>, inv_std: Array1<f64> },
    Mask(Array2<f64>),
    Identity,
}

/// Gradients of one layer's parameters.
#[derive(Debug)]
pub enum LayerGrad {
    Linear { weight: Array2<f64>, bias: Array1<f64> },
    BatchNorm { gamma: Array1<f64>, beta: Array1<f64> },
    None,
}

impl LayerGrad {
    /// Flatten gradients in the same order as [`MLPModule::parameters_mut`].
    pub fn flatten(grads: &[LayerGrad]) -> Vec<ArrayViewD<'_, f64>> {
        let mut flat = Vec::new();
        for grad in grads {
            match grad {
                LayerGrad::Linear { weight, bias } => {
                    flat.push(weight.view().into_dyn());
                    flat.push(bias.view().into_dyn());
                }
                LayerGrad::BatchNorm { gamma, beta } => {
                    flat.push(gamma.view().into_dyn());
                    flat.push(beta.view().into_dyn());
                }
                LayerGrad::None => {}
            }
        }
        flat
    }
}

/// Output of a training mode forward pass.
pub struct ForwardPass {
    pub output: Array2<f64>,
    caches: Vec<Cache>,
}

/// Multi-layer perceptron with ReLU activations and no non-linearity on the output layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MLPModule {
    layers: Vec<Layer>,
    input_size: usize,
    output_size: usize,
}

impl MLPModule {
    /// Build the network.
    ///
    /// * `hidden_sizes` - The sizes of the hidden layers. When empty the network is a single
    ///   linear map from the input to the output.
    /// * `input_size` - Number of input features.
    /// * `dropout_rate` - Dropout applied after every hidden layer.
    /// * `output_size` - Number of outputs.
    /// * `batch_norm` - Whether to normalize every hidden layer before its activation.
    /// * `rng` - Source of the initial weights.
    pub fn new(
        hidden_sizes: &[usize],
        input_size: usize,
        dropout_rate: f64,
        output_size: usize,
        batch_norm: bool,
        rng: &mut StdRng,
    ) -> Self {
        let mut layers = Vec::new();
        let mut n_in = input_size;
        for &n_out in hidden_sizes {
            layers.push(Layer::Linear(Linear::new(rng, n_in, n_out)));
            if batch_norm {
                layers.push(Layer::BatchNorm(BatchNorm1d::new(n_out)));
            }
            layers.push(Layer::ReLU);
            layers.push(Layer::Dropout(dropout_rate));
            n_in = n_out;
        }
        layers.push(Layer::Linear(Linear::new(rng, n_in, output_size)));

        MLPModule {
            layers,
            input_size,
            output_size,
        }
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn output_size(&self) -> usize {
        self.output_size
    }

    /// Evaluation mode forward pass: dropout disabled, batch norm uses its running statistics.
    pub fn forward(&self, x: ArrayView2<f64>) -> Array2<f64> {
        let mut out = x.to_owned();
        for layer in &self.layers {
            out = match layer {
                Layer::Linear(linear) => linear.forward(&out),
                Layer::BatchNorm(bn) => bn.forward_eval(&out),
                Layer::ReLU => out.mapv_into(|v| v.max(0.0)),
                Layer::Dropout(_) => out,
            };
        }
        out
    }

    /// Training mode forward pass, keeping what [`MLPModule::backward`] needs.
    pub fn forward_train(&mut self, x: ArrayView2<f64>, rng: &mut StdRng) -> ForwardPass {
        let mut out = x.to_owned();
        let mut caches = Vec::with_capacity(self.layers.len());
        for layer in self.layers.iter_mut() {
            let (next, cache) = match layer {
                Layer::Linear(linear) => (linear.forward(&out), Cache::Linear(out)),
                Layer::BatchNorm(bn) => bn.forward_train(&out),
                Layer::ReLU => {
                    let mask = out.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 });
                    (out * &mask, Cache::Mask(mask))
                }
                Layer::Dropout(p) if *p > 0.0 => {
                    let keep = 1.0 - *p;
                    let mask = Array2::from_shape_fn(out.raw_dim(), |_| {
                        if rng.gen::<f64>() < keep {
                            1.0 / keep
                        } else {
                            0.0
                        }
                    });
                    (out * &mask, Cache::Mask(mask))
                }
                Layer::Dropout(_) => (out, Cache::Identity),
            };
            out = next;
            caches.push(cache);
        }
        ForwardPass { output: out, caches }
    }

    /// Back-propagate `grad_output`, the gradient of the loss with respect to the network
    /// output, returning one entry per layer.
    pub fn backward(&self, pass: ForwardPass, grad_output: Array2<f64>) -> Vec<LayerGrad> {
        let mut grads = Vec::with_capacity(self.layers.len());
        let mut delta = grad_output;
        for (layer, cache) in self.layers.iter().zip(pass.caches).rev() {
            let grad = match (layer, cache) {
                (Layer::Linear(linear), Cache::Linear(input)) => {
                    let weight = input.t().dot(&delta);
                    let bias = delta.sum_axis(Axis(0));
                    delta = delta.dot(&linear.weight.t());
                    LayerGrad::Linear { weight, bias }
                }
                (Layer::BatchNorm(bn), Cache::BatchNorm { x_hat, inv_std }) => {
                    let n = delta.nrows() as f64;
                    let gamma = (&delta * &x_hat).sum_axis(Axis(0));
                    let beta = delta.sum_axis(Axis(0));
                    let dx_hat = &delta * &bn.gamma;
                    let sum_dx_hat = dx_hat.sum_axis(Axis(0));
                    let sum_dx_hat_x_hat = (&dx_hat * &x_hat).sum_axis(Axis(0));
                    delta = (dx_hat * n - &sum_dx_hat - &x_hat * &sum_dx_hat_x_hat) * &inv_std / n;
                    LayerGrad::BatchNorm { gamma, beta }
                }
                (_, Cache::Mask(mask)) => {
                    delta = delta * &mask;
                    LayerGrad::None
                }
                _ => LayerGrad::None,
            };
            grads.push(grad);
        }
        grads.reverse();
        grads
    }

    /// Mutable views of every trainable parameter, in a fixed order.
    pub fn parameters_mut(&mut self) -> Vec<ArrayViewMutD<'_, f64>> {
        let mut params = Vec::new();
        for layer in self.layers.iter_mut() {
            match layer {
                Layer::Linear(linear) => {
                    params.push(linear.weight.view_mut().into_dyn());
                    params.push(linear.bias.view_mut().into_dyn());
                }
                Layer::BatchNorm(bn) => {
                    params.push(bn.gamma.view_mut().into_dyn());
                    params.push(bn.beta.view_mut().into_dyn());
                }
                Layer::ReLU | Layer::Dropout(_) => {}
            }
        }
        params
    }

    /// Number of trainable scalars.
    pub fn n_parameters(&self) -> usize {
        self.layers
            .iter()
            .map(|layer| match layer {
                Layer::Linear(linear) => linear.weight.len() + linear.bias.len(),
                Layer::BatchNorm(bn) => bn.gamma.len() + bn.beta.len(),
                Layer::ReLU | Layer::Dropout(_) => 0,
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;

    fn linear_weights(module: &MLPModule) -> Vec<&Array2<f64>> {
        module
            .layers()
            .iter()
            .filter_map(|l| match l {
                Layer::Linear(linear) => Some(&linear.weight),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_empty_hidden_sizes_is_single_linear() {
        let mut rng = StdRng::seed_from_u64(0);
        let module = MLPModule::new(&[], 4, 0.5, 3, true, &mut rng);
        assert_eq!(module.layers().len(), 1);
        let weights = linear_weights(&module);
        assert_eq!(weights.len(), 1);
        assert_eq!(weights[0].dim(), (4, 3));
        assert_eq!(module.n_parameters(), 4 * 3 + 3);
    }

    #[test]
    fn test_layer_layout() {
        let mut rng = StdRng::seed_from_u64(0);
        let module = MLPModule::new(&[8, 5], 3, 0.1, 1, true, &mut rng);
        // (Linear, BatchNorm, ReLU, Dropout) x 2 + output Linear
        assert_eq!(module.layers().len(), 9);
        let shapes: Vec<_> = linear_weights(&module).iter().map(|w| w.dim()).collect();
        assert_eq!(shapes, vec![(3, 8), (8, 5), (5, 1)]);

        let module = MLPModule::new(&[8], 3, 0.1, 1, false, &mut rng);
        assert_eq!(module.layers().len(), 4);
    }

    #[test]
    fn test_init_bounds() {
        let mut rng = StdRng::seed_from_u64(1);
        let module = MLPModule::new(&[16], 4, 0.0, 1, false, &mut rng);
        let w = linear_weights(&module)[0];
        assert!(w.iter().all(|v| v.abs() <= 0.5));
    }

    #[test]
    fn test_eval_forward_ignores_dropout() {
        let mut rng = StdRng::seed_from_u64(3);
        let module = MLPModule::new(&[6], 2, 0.9, 1, false, &mut rng);
        let x = array![[0.5, -1.0], [2.0, 0.25]];
        assert_eq!(module.forward(x.view()), module.forward(x.view()));
    }

    #[test]
    fn test_train_forward_matches_eval_without_dropout() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut module = MLPModule::new(&[6, 3], 2, 0.0, 1, false, &mut rng);
        let x = array![[0.5, -1.0], [2.0, 0.25], [-0.3, 0.7]];
        let eval = module.forward(x.view());
        let pass = module.forward_train(x.view(), &mut rng);
        assert_eq!(pass.output, eval);
    }

    fn sum_of_outputs(module: &mut MLPModule, x: &Array2<f64>, rng: &mut StdRng) -> f64 {
        module.forward_train(x.view(), rng).output.sum()
    }

    #[test]
    fn test_backward_finite_difference() {
        let x = array![[0.5, -1.0, 0.3], [2.0, 0.25, -0.8], [-0.3, 0.7, 1.1], [0.9, -0.4, 0.2]];
        for batch_norm in [false, true] {
            let mut rng = StdRng::seed_from_u64(11);
            let mut module = MLPModule::new(&[5, 4], 3, 0.0, 1, batch_norm, &mut rng);

            let pass = module.clone().forward_train(x.view(), &mut rng);
            let grad_output = Array2::ones(pass.output.raw_dim());
            let grads = module.backward(pass, grad_output);
            let analytic: Vec<f64> = LayerGrad::flatten(&grads).iter().flat_map(|g| g.iter().copied().collect::<Vec<_>>()).collect();

            let h = 1e-6;
            let n_params = analytic.len();
            assert_eq!(n_params, module.n_parameters());
            for k in (0..n_params).step_by(3) {
                let mut plus = module.clone();
                let mut minus = module.clone();
                {
                    let mut p = plus.parameters_mut();
                    let (i, j) = locate(&p, k);
                    p[i].as_slice_memory_order_mut().unwrap()[j] += h;
                }
                {
                    let mut p = minus.parameters_mut();
                    let (i, j) = locate(&p, k);
                    p[i].as_slice_memory_order_mut().unwrap()[j] -= h;
                }
                let numeric = (sum_of_outputs(&mut plus, &x, &mut rng) - sum_of_outputs(&mut minus, &x, &mut rng)) / (2.0 * h);
                assert!(
                    (numeric - analytic[k]).abs() < 1e-5,
                    "param {} batch_norm {}: numeric {} analytic {}",
                    k,
                    batch_norm,
                    numeric,
                    analytic[k]
                );
            }
        }
    }

    fn locate(params: &[ArrayViewMutD<f64>], mut k: usize) -> (usize, usize) {
        for (i, p) in params.iter().enumerate() {
            if k < p.len() {
                return (i, k);
            }
            k -= p.len();
        }
        panic!("index out of range");
    }

    #[test]
    fn test_batch_norm_updates_running_stats() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut module = MLPModule::new(&[2], 2, 0.0, 1, true, &mut rng);
        let x = array![[1.0, 2.0], [3.0, -4.0], [0.5, 0.0]];
        module.forward_train(x.view(), &mut rng);
        match &module.layers()[1] {
            Layer::BatchNorm(bn) => {
                assert!(bn.running_mean.iter().any(|v| *v != 0.0));
                assert!(bn.running_var.iter().any(|v| *v != 1.0));
            }
            _ => panic!("expected batch norm layer"),
        }
    }
}
