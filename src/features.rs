//! Trend/lag feature construction and fixed standardization.

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};

/// Training matrix built from a series.
#[derive(Debug, Clone)]
pub struct FeatureSet {
    /// One row `(trend, lagged observation)` per target.
    pub inputs: Array2<f64>,
    pub targets: Array1<f64>,
    /// Length of the series the rows were built from.
    pub train_length: usize,
}

impl FeatureSet {
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Row `k - 1` is `(k - 1, series[k - 1])` with target `series[k]`, for `k = 1..n`.
pub fn lagged_features(series: &[f64]) -> Result<FeatureSet> {
    if series.len() < 2 {
        return Err(ForecastError::SeriesTooShort {
            needed: 2,
            len: series.len(),
        });
    }
    if let Some(i) = series.iter().position(|v| !v.is_finite()) {
        return Err(ForecastError::InvalidParameter(format!(
            "observation {i} is not finite"
        )));
    }

    let rows = series.len() - 1;
    let inputs = Array2::from_shape_fn((rows, 2), |(k, j)| match j {
        0 => k as f64,
        _ => series[k],
    });
    let targets = Array1::from_iter(series[1..].iter().copied());

    Ok(FeatureSet {
        inputs,
        targets,
        train_length: series.len(),
    })
}

/// Column-wise mean/standard deviation, fixed once fitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standardizer {
    mean: Vec<f64>,
    std: Vec<f64>,
}

impl Standardizer {
    pub fn new(mean: Vec<f64>, std: Vec<f64>) -> Result<Self> {
        if mean.len() != std.len() {
            return Err(ForecastError::ShapeMismatch {
                expected: vec![mean.len()],
                actual: vec![std.len()],
            });
        }
        if let Some(column) = std.iter().position(|s| !(*s > 0.0 && s.is_finite())) {
            return Err(ForecastError::DegenerateFeature { column });
        }
        Ok(Self { mean, std })
    }

    /// Population mean and standard deviation of each column.
    pub fn fit(inputs: &Array2<f64>) -> Result<Self> {
        if inputs.nrows() == 0 {
            return Err(ForecastError::SeriesTooShort { needed: 1, len: 0 });
        }
        let mean = inputs
            .mean_axis(Axis(0))
            .ok_or(ForecastError::SeriesTooShort { needed: 1, len: 0 })?;
        let std = inputs.std_axis(Axis(0), 0.0);
        Self::new(mean.to_vec(), std.to_vec())
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn std(&self) -> &[f64] {
        &self.std
    }

    pub fn width(&self) -> usize {
        self.mean.len()
    }

    pub fn transform_row(&self, row: &[f64]) -> Result<Vec<f64>> {
        if row.len() != self.width() {
            return Err(ForecastError::ShapeMismatch {
                expected: vec![self.width()],
                actual: vec![row.len()],
            });
        }
        Ok(row
            .iter()
            .zip(self.mean.iter().zip(&self.std))
            .map(|(x, (m, s))| (x - m) / s)
            .collect())
    }

    pub fn transform(&self, inputs: &Array2<f64>) -> Result<Array2<f64>> {
        if inputs.ncols() != self.width() {
            return Err(ForecastError::ShapeMismatch {
                expected: vec![inputs.nrows(), self.width()],
                actual: inputs.shape().to_vec(),
            });
        }
        let mean = Array1::from(self.mean.clone());
        let std = Array1::from(self.std.clone());
        Ok((inputs - &mean) / &std)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_lagged_features_layout() {
        let set = lagged_features(&[3.0, 5.0, 4.0, 6.0]).unwrap();
        assert_eq!(set.train_length, 4);
        assert_eq!(set.len(), 3);
        assert_eq!(set.inputs, array![[0.0, 3.0], [1.0, 5.0], [2.0, 4.0]]);
        assert_eq!(set.targets, array![5.0, 4.0, 6.0]);
    }

    #[test]
    fn test_lagged_features_short_series() {
        assert!(matches!(
            lagged_features(&[1.0]),
            Err(ForecastError::SeriesTooShort { needed: 2, len: 1 })
        ));
        assert!(lagged_features(&[1.0, f64::NAN]).is_err());
    }

    #[test]
    fn test_standardizer_fit_and_transform() {
        let inputs = array![[0.0, 2.0], [1.0, 4.0], [2.0, 6.0]];
        let scaler = Standardizer::fit(&inputs).unwrap();
        assert_eq!(scaler.mean(), &[1.0, 4.0]);
        let sd = (2.0f64 / 3.0).sqrt();
        assert!((scaler.std()[0] - sd).abs() < 1e-12);

        let z = scaler.transform(&inputs).unwrap();
        assert!(z.column(0).sum().abs() < 1e-12);
        assert!((z[[2, 1]] - 2.0 / (2.0 * sd)).abs() < 1e-12);

        let row = scaler.transform_row(&[2.0, 6.0]).unwrap();
        assert!((row[0] - z[[2, 0]]).abs() < 1e-12);
    }

    #[test]
    fn test_standardizer_constant_column() {
        let inputs = array![[0.0, 5.0], [1.0, 5.0]];
        assert!(matches!(
            Standardizer::fit(&inputs),
            Err(ForecastError::DegenerateFeature { column: 1 })
        ));
    }

    #[test]
    fn test_standardizer_width_checks() {
        let scaler = Standardizer::new(vec![0.0, 0.0], vec![1.0, 1.0]).unwrap();
        assert!(scaler.transform_row(&[1.0]).is_err());
        assert!(scaler.transform(&array![[1.0, 2.0, 3.0]]).is_err());
        assert!(Standardizer::new(vec![0.0], vec![1.0, 1.0]).is_err());
    }
}
