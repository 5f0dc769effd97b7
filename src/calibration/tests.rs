use crate::calibration::{platt_scale, PlattScaler};
use crate::errors::UncError;
use crate::utils::sigmoid;

fn validation_fixture() -> (Vec<f64>, Vec<f64>) {
    let probs = vec![0.1, 0.4, 0.35, 0.8, 0.9, 0.2, 0.7, 0.6, 0.55, 0.3];
    let labels = vec![0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0];
    (probs, labels)
}

#[test]
fn test_platt_scaling_basic() {
    let (probs, labels) = validation_fixture();
    let mut scaler = PlattScaler::new();
    scaler.fit(&probs, &labels).unwrap();

    let calibrated = scaler.transform(&probs).unwrap();
    assert_eq!(calibrated.len(), probs.len());
    assert!(calibrated.iter().all(|p| *p > 0.0 && *p < 1.0));

    // A positive slope keeps the ranking of the raw probabilities.
    let (a, _) = scaler.parameters().unwrap();
    assert!(a > 0.0);
    let ranked = scaler.transform(&[0.1, 0.5, 0.9]).unwrap();
    assert!(ranked[0] < ranked[1] && ranked[1] < ranked[2]);
}

#[test]
fn test_platt_scaling_is_stationary() {
    let (probs, labels) = validation_fixture();
    let mut scaler = PlattScaler::new();
    scaler.fit(&probs, &labels).unwrap();
    let (a, b) = scaler.parameters().unwrap();

    let mut grad_a = scaler.regularization * a;
    let mut grad_b = 0.0;
    for (f, y) in probs.iter().zip(&labels) {
        let d = sigmoid(a * f + b) - y;
        grad_a += f * d;
        grad_b += d;
    }
    assert!(grad_a.abs() < 1e-6);
    assert!(grad_b.abs() < 1e-6);
}

#[test]
fn test_platt_scaling_separable_data_stays_finite() {
    let probs = vec![0.1, 0.2, 0.3, 0.7, 0.8, 0.9];
    let labels = vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
    let mut scaler = PlattScaler::new();
    scaler.fit(&probs, &labels).unwrap();
    let (a, b) = scaler.parameters().unwrap();
    assert!(a.is_finite() && b.is_finite());
}

#[test]
fn test_platt_scaling_errors() {
    let scaler = PlattScaler::new();
    assert!(matches!(scaler.transform(&[0.5]), Err(UncError::NotFitted)));

    let mut scaler = PlattScaler::new();
    assert!(matches!(
        scaler.fit(&[0.1, 0.2], &[1.0]),
        Err(UncError::ShapeMismatch(_, 2, 1))
    ));
    assert!(scaler.fit(&[], &[]).is_err());
}

#[test]
fn test_platt_scale_helper() {
    let (probs, labels) = validation_fixture();
    let test = vec![0.05, 0.5, 0.95];
    let calibrated = platt_scale(&test, &probs, &labels).unwrap();
    let mut scaler = PlattScaler::new();
    scaler.fit(&probs, &labels).unwrap();
    assert_eq!(calibrated, scaler.transform(&test).unwrap());
}
