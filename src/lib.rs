pub mod constants;

// Modules
pub mod analysis;
pub mod calibration;
pub mod data;
pub mod errors;
pub mod metric;
pub mod mlp;
pub mod objective;
pub mod plot;
pub mod sampler;
pub mod uncertainty;
pub mod utils;

// Individual classes, and functions
pub use analysis::{get_incremental_loss, IncrementalConfig, IncrementalCurve, UncertaintyAnalyzer};
pub use data::Dataset;
pub use errors::UncError;
pub use metric::{Metric, NamedMetric};
pub use mlp::{FitConfig, MLPConfig, ModelIO, MLP};
pub use plot::{barplot_grouped, plot_incremental_metric, GroupedBars, IncrementalPlotOptions};
pub use uncertainty::{entropy, ResultContainer};
