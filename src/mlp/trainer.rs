use crate::data::Dataset;
use crate::errors::UncError;
use crate::mlp::config::{FitConfig, MLPConfig};
use crate::mlp::module::{LayerGrad, MLPModule};
use crate::mlp::optimizer::Adam;
use crate::objective::{BCEWithLogits, ObjectiveFunction};
use crate::sampler::{BatchSampler, RandomBatchSampler, SequentialBatchSampler};
use crate::utils::sigmoid;
use log::info;
use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Tracks the best validation loss and how many epochs have passed without beating it.
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    pub patience: usize,
    best: f64,
    n_no_improvement: usize,
}

impl EarlyStopping {
    pub fn new(patience: usize) -> Self {
        EarlyStopping {
            patience,
            best: f64::INFINITY,
            n_no_improvement: 0,
        }
    }

    /// Record the loss of the latest epoch and return `true` once training should stop.
    /// A loss equal to the best seen so far is not an improvement.
    pub fn update(&mut self, val_loss: f64) -> bool {
        if val_loss < self.best {
            self.best = val_loss;
            self.n_no_improvement = 0;
        } else {
            self.n_no_improvement += 1;
        }
        self.n_no_improvement >= self.patience
    }

    pub fn best(&self) -> f64 {
        self.best
    }
}

/// Per epoch losses of a call to [`MLP::train`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingHistory {
    /// Mean training loss of every epoch, weighted by batch size.
    pub train_loss: Vec<f64>,
    /// Validation loss after every epoch. Empty when no validation rows were given.
    pub val_loss: Vec<f64>,
    pub epochs_run: usize,
    pub stopped_early: bool,
}

/// IO
pub trait ModelIO: Serialize + DeserializeOwned + Sized {
    /// Save a model as a json object to a file.
    ///
    /// * `path` - Path to save the model.
    fn save_model<P: AsRef<Path>>(&self, path: P) -> Result<(), UncError> {
        fs::write(path, self.json_dump()?).map_err(|e| UncError::UnableToWrite(e.to_string()))
    }

    /// Dump a model as a json object
    fn json_dump(&self) -> Result<String, UncError> {
        serde_json::to_string(self).map_err(|e| UncError::UnableToWrite(e.to_string()))
    }

    /// Load a model from Json string
    ///
    /// * `json_str` - String object, which can be serialized to json.
    fn from_json(json_str: &str) -> Result<Self, UncError> {
        serde_json::from_str::<Self>(json_str).map_err(|e| UncError::UnableToRead(e.to_string()))
    }

    /// Load a model from a path to a json model object.
    ///
    /// * `path` - Path to load the model from.
    fn load_model<P: AsRef<Path>>(path: P) -> Result<Self, UncError> {
        let json_str = fs::read_to_string(path).map_err(|e| UncError::UnableToRead(e.to_string()))?;
        Self::from_json(&json_str)
    }
}

/// Binary classifier trained with a class weighted logistic loss, Adam and early stopping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MLP {
    pub cfg: MLPConfig,
    module: MLPModule,
    optimizer: Adam,
}

impl ModelIO for MLP {}

impl MLP {
    /// Create an untrained classifier with a single logit output.
    pub fn new(cfg: MLPConfig) -> Result<Self, UncError> {
        cfg.validate()?;
        let mut rng = StdRng::seed_from_u64(cfg.seed);
        let module = MLPModule::new(&cfg.hidden_sizes, cfg.input_size, cfg.dropout_rate, 1, cfg.batch_norm, &mut rng);
        let optimizer = Adam::new(cfg.learning_rate);
        Ok(MLP { cfg, module, optimizer })
    }

    pub fn module(&self) -> &MLPModule {
        &self.module
    }

    /// Loss whose positive weight follows the label mean of `y`.
    pub fn loss_fn(&self, y: &[f64]) -> BCEWithLogits {
        BCEWithLogits::from_labels(y, self.cfg.class_weight)
    }

    fn check_features(&self, n_features: usize, what: &str) -> Result<(), UncError> {
        if n_features != self.cfg.input_size {
            return Err(UncError::ShapeMismatch(
                format!("{} features", what),
                self.cfg.input_size,
                n_features,
            ));
        }
        Ok(())
    }

    fn logits(&self, x: ArrayView2<f64>) -> Array1<f64> {
        self.module.forward(x).index_axis_move(Axis(1), 0)
    }

    /// Mean loss on `val` in evaluation mode. The positive weight is derived from the
    /// label mean of the whole split.
    pub fn validate(&self, val: &Dataset) -> Result<f64, UncError> {
        if val.is_empty() {
            return Err(UncError::InvalidParameter(
                "validation data".to_string(),
                "at least one row".to_string(),
                "0 rows".to_string(),
            ));
        }
        self.check_features(val.n_features(), "validation")?;
        let y = val.y().to_vec();
        let z = self.logits(val.x()).to_vec();
        Ok(self.loss_fn(&y).calc_mean_loss(&y, &z))
    }

    /// Fit the network on `train`.
    ///
    /// * `train` - Training split.
    /// * `val` - Validation split, only evaluated when early stopping is enabled and
    ///   ignored otherwise.
    /// * `fit` - Batch size, number of epochs, early stopping and seed.
    pub fn train(&mut self, train: &Dataset, val: &Dataset, fit: &FitConfig) -> Result<TrainingHistory, UncError> {
        fit.validate()?;
        if train.is_empty() {
            return Err(UncError::InvalidParameter(
                "training data".to_string(),
                "at least one row".to_string(),
                "0 rows".to_string(),
            ));
        }
        self.check_features(train.n_features(), "training")?;
        if fit.early_stopping && val.is_empty() {
            return Err(UncError::InvalidParameter(
                "validation data".to_string(),
                "at least one row when early stopping is enabled".to_string(),
                "0 rows".to_string(),
            ));
        }

        let mut rng = StdRng::seed_from_u64(fit.seed);
        let mut sampler: Box<dyn BatchSampler> = if fit.shuffle {
            Box::new(RandomBatchSampler::new(fit.batch_size))
        } else {
            Box::new(SequentialBatchSampler::new(fit.batch_size))
        };
        let mut stopper = EarlyStopping::new(fit.early_stopping_patience);
        let mut history = TrainingHistory::default();

        for epoch in 1..(fit.n_epochs + 1) {
            let mut loss_sum = 0.0;
            for batch in sampler.batches(&mut rng, train.n_rows()) {
                let (x, y) = train.select(&batch);
                let y = y.to_vec();
                // The positive weight is specific to every batch.
                let loss_fn = self.loss_fn(&y);

                let pass = self.module.forward_train(x.view(), &mut rng);
                let z = pass.output.column(0).to_vec();
                let batch_loss = loss_fn.calc_mean_loss(&y, &z);
                if !batch_loss.is_finite() {
                    return Err(UncError::NonFiniteLoss(epoch));
                }
                loss_sum += batch_loss * batch.len() as f64;

                let grad_output = Array1::from_vec(loss_fn.calc_grad(&y, &z)).insert_axis(Axis(1));
                let grads = self.module.backward(pass, grad_output);
                self.optimizer.step(self.module.parameters_mut(), LayerGrad::flatten(&grads));
            }
            let train_loss = loss_sum / train.n_rows() as f64;
            history.train_loss.push(train_loss);
            history.epochs_run = epoch;

            let val_loss = if fit.early_stopping { Some(self.validate(val)?) } else { None };
            if let Some(v) = val_loss {
                history.val_loss.push(v);
            }

            if fit.log_epochs > 0 && epoch % fit.log_epochs == 0 {
                match val_loss {
                    Some(v) => info!("epoch {}, train loss: {:.5}, validation loss: {:.5}", epoch, train_loss, v),
                    None => info!("epoch {}, train loss: {:.5}", epoch, train_loss),
                }
            }

            if let Some(v) = val_loss {
                if stopper.update(v) {
                    info!(
                        "Early stopping after epoch {}, best validation loss: {:.5}",
                        epoch,
                        stopper.best()
                    );
                    history.stopped_early = true;
                    break;
                }
            }
        }

        info!(
            "Finished training after {} epochs, {} optimizer steps.",
            history.epochs_run,
            self.optimizer.steps()
        );
        Ok(history)
    }

    /// Raw logits of the positive class, one per row.
    pub fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, UncError> {
        self.check_features(x.ncols(), "prediction")?;
        Ok(self.logits(x))
    }

    /// Class probabilities, one row `[1 - p, p]` per sample.
    pub fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array2<f64>, UncError> {
        let p = self.predict(x)?.mapv_into(sigmoid);
        Ok(Array2::from_shape_fn((p.len(), 2), |(i, j)| if j == 0 { 1.0 - p[i] } else { p[i] }))
    }
}
