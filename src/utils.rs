use crate::errors::UncError;

/// Create a string of all available items.
pub fn items_to_strings(items: Vec<&str>) -> String {
    let mut s = String::new();
    for i in items {
        s.push_str(i);
        s.push_str(&String::from(", "));
    }
    s
}

pub fn fmt_vec_output(v: &[f64]) -> String {
    let mut res = String::new();
    if let Some(last) = v.len().checked_sub(1) {
        if last == 0 {
            return format!("{:.4}", v[0]);
        }
        for n in &v[..last] {
            res.push_str(format!("{:.4}", n).as_str());
            res.push_str(", ");
        }
        res.push_str(format!("{:.4}", &v[last]).as_str());
    }
    res
}

// Validation
pub fn validate_positive_float_parameter(value: f64, parameter: &str) -> Result<(), UncError> {
    if value.is_nan() || value <= 0.0 {
        Err(UncError::InvalidParameter(
            parameter.to_string(),
            "positive real value".to_string(),
            value.to_string(),
        ))
    } else {
        Ok(())
    }
}

/// Check that `value` lies in the half open interval `[min, max)`.
pub fn validate_float_parameter(value: f64, min: f64, max: f64, parameter: &str) -> Result<(), UncError> {
    if value.is_nan() || value < min || max <= value {
        let ex_msg = format!("real value within range [{}, {})", min, max);
        Err(UncError::InvalidParameter(
            parameter.to_string(),
            ex_msg,
            value.to_string(),
        ))
    } else {
        Ok(())
    }
}

pub fn validate_positive_usize_parameter(value: usize, parameter: &str) -> Result<(), UncError> {
    if value == 0 {
        Err(UncError::InvalidParameter(
            parameter.to_string(),
            "integer greater than zero".to_string(),
            value.to_string(),
        ))
    } else {
        Ok(())
    }
}

/// Convert log odds to probability.
#[inline]
pub fn sigmoid(v: f64) -> f64 {
    1. / (1. + (-v).exp())
}

/// `ln(1 + exp(v))` without overflow for large `v`.
#[inline]
pub fn softplus(v: f64) -> f64 {
    v.max(0.0) + (-v.abs()).exp().ln_1p()
}

const LANES: usize = 16;

/// Fast summation, ends up being roughly 8 to 10 times faster
/// than values.iter().copied().sum().
#[inline]
pub fn fast_sum(values: &[f64]) -> f64 {
    let chunks = values.chunks_exact(LANES);
    let remainder = chunks.remainder();

    let sum = chunks.fold([0.0_f64; LANES], |mut acc, chunk| {
        for (a, c) in acc.iter_mut().zip(chunk) {
            *a += *c;
        }
        acc
    });

    let remainder: f64 = remainder.iter().copied().sum();
    sum.iter().sum::<f64>() + remainder
}

/// Arithmetic mean, NaN for an empty slice.
#[inline]
pub fn mean(values: &[f64]) -> f64 {
    fast_sum(values) / values.len() as f64
}

/// Population (ddof = 0) standard deviation.
pub fn population_std(values: &[f64]) -> f64 {
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

#[inline]
pub fn precision_round(n: f64, precision: i32) -> f64 {
    let p = (10.0_f64).powi(precision);
    (n * p).round() / p
}
