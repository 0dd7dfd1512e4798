//! Link functions mapping unconstrained model outputs to positive Poisson rates.

use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};

/// Monotone map between link space (model output) and rate space.
pub trait LinkFunction {
    /// Maps any real input to a strictly positive rate.
    fn forward(&self, x: f64) -> f64;

    /// Inverse of [`LinkFunction::forward`]. Defined only for `y > 0`.
    fn inverse(&self, y: f64) -> Result<f64>;
}

/// `log(1 + exp(x))`. Grows linearly for large `x` instead of overflowing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SoftplusLink;

impl LinkFunction for SoftplusLink {
    fn forward(&self, x: f64) -> f64 {
        softplus(x)
    }

    fn inverse(&self, y: f64) -> Result<f64> {
        inverse_softplus(y)
    }
}

pub fn softplus(x: f64) -> f64 {
    // max(x, 0) + log(1 + exp(-|x|)) never exponentiates a positive number
    x.max(0.0) + (-x.abs()).exp().ln_1p()
}

/// `log(exp(y) - 1)`, evaluated as `y + log(1 - exp(-y))` so large rates do not overflow.
pub fn inverse_softplus(y: f64) -> Result<f64> {
    check_domain(y)?;
    Ok(y + (-(-y).exp_m1()).ln())
}

/// Derivative of [`softplus`].
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

fn check_domain(y: f64) -> Result<()> {
    // NaN fails the comparison as well
    if y > 0.0 {
        Ok(())
    } else {
        Err(ForecastError::LinkDomain { value: y })
    }
}
