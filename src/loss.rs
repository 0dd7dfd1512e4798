//! Poisson negative log-likelihood with a softplus link.
//!
//! `loss = softplus(o) - ln(softplus(o)) * y`, the Poisson NLL of `y` under
//! rate `softplus(o)` without the parameter-free `ln(y!)` term.

use ndarray::{Array1, Array2, ArrayView2, Axis};

use crate::autograd::Autograd;
use crate::error::{ForecastError, Result};
use crate::link::softplus;

/// One loss per batch row, averaged over the remaining columns.
///
/// A rate that underflows to exactly zero makes the log term unbounded; that
/// is reported as [`ForecastError::DegenerateLikelihood`] rather than clamped.
pub fn poisson_nll(output: ArrayView2<f64>, label: ArrayView2<f64>) -> Result<Array1<f64>> {
    if output.shape() != label.shape() {
        return Err(ForecastError::ShapeMismatch {
            expected: output.shape().to_vec(),
            actual: label.shape().to_vec(),
        });
    }
    if output.ncols() == 0 {
        return Err(ForecastError::InvalidParameter(
            "poisson_nll needs at least one output column".to_string(),
        ));
    }

    let rate = output.mapv(softplus);
    if let Some(index) = rate.iter().position(|&r| r == 0.0) {
        return Err(ForecastError::DegenerateLikelihood { index });
    }

    let elementwise: Array2<f64> = &rate - &(rate.mapv(f64::ln) * &label);
    elementwise
        .mean_axis(Axis(1))
        .ok_or_else(|| ForecastError::InvalidParameter("empty loss axis".to_string()))
}

/// Differentiable form of [`poisson_nll`], averaged to a single `(1, 1)` node.
pub fn poisson_nll_graph(output: &Autograd, label: &Array2<f64>) -> Autograd {
    let rate = output.softplus();
    let label = Autograd::new(label.clone());
    rate.sub(&rate.ln().mul(&label)).mean()
}
