use ndarray::Array2;

use crate::autograd::Autograd;
use crate::error::{ForecastError, Result};

/// Anything that maps a standardized feature vector to one link-space output.
///
/// The forecaster only ever sees this capability, never the model's internals.
pub trait Model {
    /// Number of features the model expects, when it is known.
    fn n_features(&self) -> Option<usize> {
        None
    }

    fn evaluate(&self, features: &[f64]) -> Result<f64>;
}

impl<F> Model for F
where
    F: Fn(&[f64]) -> f64,
{
    fn evaluate(&self, features: &[f64]) -> Result<f64> {
        Ok(self(features))
    }
}

/// A model whose parameters can be fitted by gradient descent.
pub trait Trainable: Model {
    /// Maps a `(batch, n_features)` node to a `(batch, 1)` node.
    fn forward(&self, inputs: &Autograd) -> Autograd;

    fn parameters(&self) -> Vec<Autograd>;

    fn zero_grad(&self) {
        for p in self.parameters() {
            p.zero_grad();
        }
    }

    /// Link-space outputs for every row of `inputs`.
    fn predict(&self, inputs: &Array2<f64>) -> Result<Vec<f64>> {
        if let Some(n) = self.n_features() {
            check_width(n, inputs.ncols())?;
        }
        let out = self.forward(&Autograd::new(inputs.clone())).value();
        Ok(out.column(0).to_vec())
    }
}

pub(crate) fn check_width(expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(ForecastError::ShapeMismatch {
            expected: vec![expected],
            actual: vec![actual],
        })
    }
}
