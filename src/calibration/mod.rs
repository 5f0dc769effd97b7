//! Calibration Module
//!
//! Post-hoc probability calibration for classifier outputs.
//!
//! # Submodules
//!
//! * `platt`: Platt scaling, a one dimensional logistic regression fitted on a validation set.

pub mod platt;
#[cfg(test)]
mod tests;

pub use platt::{platt_scale, PlattScaler};
