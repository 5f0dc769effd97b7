//! Errors
//!
//! Custom error types used throughout the `tabular_uncertainty` crate.
use thiserror::Error;

/// Errors that can occur while training, analyzing or plotting.
#[derive(Debug, Error)]
pub enum UncError {
    /// First value is the name of the parameter, second is expected, third is what was passed.
    #[error("Invalid parameter value passed for {0}, expected {1} but {2} provided.")]
    InvalidParameter(String, String, String),
    /// Invalid value parsing.
    #[error("Invalid value {0} passed for {1}, expected one of {2}.")]
    ParseString(String, String, String),
    /// First value describes the data, second is the expected size, third is the size found.
    #[error("Shape mismatch in {0}: expected {1}, found {2}.")]
    ShapeMismatch(String, usize, usize),
    /// A method name that was never added to the results.
    #[error("Unknown method {0}.")]
    UnknownMethod(String),
    /// A metric name that was not computed by the analyzer.
    #[error("Unknown metric {0} for method {1}.")]
    UnknownMetric(String, String),
    /// Runs of a single method must all have the same number of points.
    #[error("Run {0} has {1} points, but the first run has {2}; all runs must be the same size.")]
    UnequalRunSizes(usize, usize, usize),
    /// The training loss became NaN or infinite.
    #[error("Training loss is not finite in epoch {0}.")]
    NonFiniteLoss(usize),
    /// A calibrator was used before it was fitted.
    #[error("Calibrator has not been fitted.")]
    NotFitted,
    /// Unable to write model or figure to file.
    #[error("Unable to write to file: {0}")]
    UnableToWrite(String),
    /// Unable to read model from file.
    #[error("Unable to read from file {0}")]
    UnableToRead(String),
    /// The plotting backend failed.
    #[error("Unable to draw figure: {0}")]
    UnableToPlot(String),
}
