pub mod config;
pub mod module;
pub mod optimizer;
pub mod trainer;

pub use config::{FitConfig, MLPConfig};
pub use module::MLPModule;
pub use optimizer::Adam;
pub use trainer::{EarlyStopping, ModelIO, TrainingHistory, MLP};
