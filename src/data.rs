//! Data
//!
//! Feature/label containers handed to the trainer.
use crate::errors::UncError;
use crate::utils::mean;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

/// A train, validation or test split: a row major feature matrix and its binary labels.
///
/// The split is immutable once built; the trainer only ever reads from it.
#[derive(Debug, Clone)]
pub struct Dataset {
    x: Array2<f64>,
    y: Array1<f64>,
}

impl Dataset {
    /// Create a new split, checking that features and labels have matching row counts.
    ///
    /// * `x` - Feature matrix, one row per sample.
    /// * `y` - Binary labels (0.0 or 1.0), one per sample.
    pub fn new(x: Array2<f64>, y: Array1<f64>) -> Result<Self, UncError> {
        if x.nrows() != y.len() {
            return Err(UncError::ShapeMismatch(
                "dataset labels".to_string(),
                x.nrows(),
                y.len(),
            ));
        }
        Ok(Dataset { x, y })
    }

    /// Build a split from row vectors, convenient for small fixtures.
    pub fn from_rows(rows: &[Vec<f64>], y: &[f64]) -> Result<Self, UncError> {
        let n_features = rows.first().map(|r| r.len()).unwrap_or(0);
        let mut flat = Vec::with_capacity(rows.len() * n_features);
        for row in rows {
            if row.len() != n_features {
                return Err(UncError::ShapeMismatch(
                    "dataset row".to_string(),
                    n_features,
                    row.len(),
                ));
            }
            flat.extend_from_slice(row);
        }
        let x = Array2::from_shape_vec((rows.len(), n_features), flat)
            .map_err(|e| UncError::InvalidParameter("rows".to_string(), "rectangular data".to_string(), e.to_string()))?;
        Dataset::new(x, Array1::from_vec(y.to_vec()))
    }

    pub fn x(&self) -> ArrayView2<'_, f64> {
        self.x.view()
    }

    pub fn y(&self) -> ArrayView1<'_, f64> {
        self.y.view()
    }

    pub fn n_rows(&self) -> usize {
        self.x.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.x.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows() == 0
    }

    /// Fraction of positive labels in the split.
    pub fn mean_label(&self) -> f64 {
        match self.y.as_slice() {
            Some(y) => mean(y),
            None => self.y.mean().unwrap_or(f64::NAN),
        }
    }

    /// Gather the given rows into an owned mini-batch.
    pub fn select(&self, rows: &[usize]) -> (Array2<f64>, Array1<f64>) {
        (self.x.select(Axis(0), rows), self.y.select(Axis(0), rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_dataset_shape_mismatch() {
        let res = Dataset::new(array![[1.0, 2.0], [3.0, 4.0]], array![1.0]);
        assert!(matches!(res, Err(UncError::ShapeMismatch(_, 2, 1))));
    }

    #[test]
    fn test_dataset_select_and_mean() {
        let data = Dataset::from_rows(&[vec![0.0, 1.0], vec![2.0, 3.0], vec![4.0, 5.0], vec![6.0, 7.0]], &[1.0, 0.0, 0.0, 0.0])
            .unwrap();
        assert_eq!(data.n_rows(), 4);
        assert_eq!(data.n_features(), 2);
        assert_eq!(data.mean_label(), 0.25);
        let (x, y) = data.select(&[3, 0]);
        assert_eq!(x, array![[6.0, 7.0], [0.0, 1.0]]);
        assert_eq!(y, array![0.0, 1.0]);
    }

    #[test]
    fn test_dataset_ragged_rows() {
        let res = Dataset::from_rows(&[vec![0.0, 1.0], vec![2.0]], &[1.0, 0.0]);
        assert!(res.is_err());
    }
}
