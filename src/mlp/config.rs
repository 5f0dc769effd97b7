//! MLP Configuration
//!
//! Architecture and training settings for the MLP trainer. Every field has a documented
//! default so configurations can be loaded from partial JSON documents.
use crate::constants::{ADAM_LEARNING_RATE, DEFAULT_BATCH_SIZE, DEFAULT_EARLY_STOPPING_PATIENCE, DEFAULT_N_EPOCHS};
use crate::errors::UncError;
use crate::utils::{validate_float_parameter, validate_positive_float_parameter, validate_positive_usize_parameter};
use serde::{Deserialize, Serialize};

fn default_class_weight() -> bool {
    true
}
fn default_batch_norm() -> bool {
    false
}
fn default_learning_rate() -> f64 {
    ADAM_LEARNING_RATE
}
fn default_seed() -> u64 {
    0
}
fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}
fn default_n_epochs() -> usize {
    DEFAULT_N_EPOCHS
}
fn default_early_stopping() -> bool {
    true
}
fn default_early_stopping_patience() -> usize {
    DEFAULT_EARLY_STOPPING_PATIENCE
}
fn default_shuffle() -> bool {
    true
}
fn default_log_epochs() -> usize {
    0
}

/// Architecture and optimizer settings of an [`crate::mlp::MLP`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MLPConfig {
    /// The sizes of the hidden layers. Empty for a plain logistic regression.
    pub hidden_sizes: Vec<usize>,
    /// Number of input features.
    pub input_size: usize,
    /// Dropout rate applied after each hidden layer, in `[0, 1)`.
    pub dropout_rate: f64,
    /// Reweight positives in every batch by the inverse of their frequency. Default `true`.
    #[serde(default = "default_class_weight")]
    pub class_weight: bool,
    /// Batch normalization after each hidden linear layer. Default `false`.
    #[serde(default = "default_batch_norm")]
    pub batch_norm: bool,
    /// Adam learning rate. Default `1e-3`.
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    /// Seed for the initial weights. Default `0`.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl MLPConfig {
    pub fn new(hidden_sizes: Vec<usize>, input_size: usize, dropout_rate: f64) -> Self {
        MLPConfig {
            hidden_sizes,
            input_size,
            dropout_rate,
            class_weight: default_class_weight(),
            batch_norm: default_batch_norm(),
            learning_rate: default_learning_rate(),
            seed: default_seed(),
        }
    }

    /// Set whether positives are reweighted per batch.
    pub fn set_class_weight(mut self, class_weight: bool) -> Self {
        self.class_weight = class_weight;
        self
    }

    /// Set whether hidden layers are batch normalized.
    pub fn set_batch_norm(mut self, batch_norm: bool) -> Self {
        self.batch_norm = batch_norm;
        self
    }

    /// Set the Adam learning rate.
    pub fn set_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Set the seed used to initialize the weights.
    pub fn set_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<(), UncError> {
        validate_positive_usize_parameter(self.input_size, "input_size")?;
        for size in &self.hidden_sizes {
            validate_positive_usize_parameter(*size, "hidden_sizes")?;
        }
        validate_float_parameter(self.dropout_rate, 0.0, 1.0, "dropout_rate")?;
        validate_positive_float_parameter(self.learning_rate, "learning_rate")?;
        Ok(())
    }

    pub fn from_json(json_str: &str) -> Result<Self, UncError> {
        serde_json::from_str::<MLPConfig>(json_str).map_err(|e| UncError::UnableToRead(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, UncError> {
        serde_json::to_string(self).map_err(|e| UncError::UnableToWrite(e.to_string()))
    }
}

/// Settings of a single call to [`crate::mlp::MLP::train`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitConfig {
    /// Rows per mini-batch. Default `256`.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Maximum number of passes over the training data. Default `30`.
    #[serde(default = "default_n_epochs")]
    pub n_epochs: usize,
    /// Stop when the validation loss stops improving. Default `true`.
    #[serde(default = "default_early_stopping")]
    pub early_stopping: bool,
    /// Number of consecutive epochs without improvement before stopping. Default `2`.
    #[serde(default = "default_early_stopping_patience")]
    pub early_stopping_patience: usize,
    /// Shuffle the training rows every epoch. Default `true`.
    #[serde(default = "default_shuffle")]
    pub shuffle: bool,
    /// Seed for shuffling and dropout. Default `0`.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Log the losses every N epochs, `0` disables epoch logging. Default `0`.
    #[serde(default = "default_log_epochs")]
    pub log_epochs: usize,
}

impl Default for FitConfig {
    fn default() -> Self {
        FitConfig {
            batch_size: default_batch_size(),
            n_epochs: default_n_epochs(),
            early_stopping: default_early_stopping(),
            early_stopping_patience: default_early_stopping_patience(),
            shuffle: default_shuffle(),
            seed: default_seed(),
            log_epochs: default_log_epochs(),
        }
    }
}

impl FitConfig {
    pub fn validate(&self) -> Result<(), UncError> {
        validate_positive_usize_parameter(self.batch_size, "batch_size")
    }

    pub fn from_json(json_str: &str) -> Result<Self, UncError> {
        serde_json::from_str::<FitConfig>(json_str).map_err(|e| UncError::UnableToRead(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, UncError> {
        serde_json::to_string(self).map_err(|e| UncError::UnableToWrite(e.to_string()))
    }
}
