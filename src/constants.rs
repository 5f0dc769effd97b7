pub const DEFAULT_BATCH_SIZE: usize = 256;
pub const DEFAULT_N_EPOCHS: usize = 30;
pub const DEFAULT_EARLY_STOPPING_PATIENCE: usize = 2;

pub const ADAM_LEARNING_RATE: f64 = 1e-3;
pub const ADAM_BETA1: f64 = 0.9;
pub const ADAM_BETA2: f64 = 0.999;
pub const ADAM_EPSILON: f64 = 1e-8;

pub const BATCH_NORM_EPSILON: f64 = 1e-5;
pub const BATCH_NORM_MOMENTUM: f64 = 0.1;

pub const LOG_LOSS_EPSILON: f64 = 1e-15;
pub const ECE_BINS: usize = 10;
pub const ACCURACY_THRESHOLD: f64 = 0.5;

pub const PLATT_REGULARIZATION: f64 = 1.0;
pub const PLATT_MAX_ITER: usize = 100;
pub const PLATT_TOLERANCE: f64 = 1e-10;

pub const FIGURE_DPI: f64 = 300.0;
pub const FONT_POINTS: f64 = 10.0;
pub const BAR_FONT_POINTS: f64 = 12.0;
pub const MARKER_POINTS: f64 = 8.0;
pub const LINE_POINTS: f64 = 1.5;
pub const BAR_ALPHA: f64 = 0.9;
pub const BAND_ALPHA: f64 = 0.1;
