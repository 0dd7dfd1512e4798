//! Scoring a forecast against held-out observations.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};
use crate::interval::ForecastWithInterval;
use crate::link::LinkFunction;
use crate::loss::poisson_nll;

/// Accuracy of a forecast over the held-out tail of a series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldoutScore {
    pub observed: Vec<f64>,
    /// Root mean squared error of the inverse-link forecast.
    pub rmse: f64,
    pub mae: f64,
    /// Poisson NLL of each observed count under its forecast output.
    pub nll: Vec<f64>,
    pub mean_nll: f64,
    /// Fraction of observations inside `[lower, upper]`.
    pub coverage: f64,
}

/// Scores `interval` against `observed`, step by step.
///
/// Every forecast value must have a defined inverse link.
pub fn score_holdout<L>(
    interval: &ForecastWithInterval,
    link: &L,
    observed: &[f64],
) -> Result<HoldoutScore>
where
    L: LinkFunction + ?Sized,
{
    if interval.len() != observed.len() {
        return Err(ForecastError::ShapeMismatch {
            expected: vec![interval.len()],
            actual: vec![observed.len()],
        });
    }
    if observed.is_empty() {
        return Err(ForecastError::InvalidParameter(
            "holdout needs at least one observation".to_string(),
        ));
    }

    let n = observed.len() as f64;
    let mut squared = 0.0;
    let mut absolute = 0.0;
    let mut covered = 0usize;
    for (i, &y) in observed.iter().enumerate() {
        let rate = link.inverse(interval.forecast[i])?;
        squared += (rate - y).powi(2);
        absolute += (rate - y).abs();
        if interval.lower[i] <= y && y <= interval.upper[i] {
            covered += 1;
        }
    }

    let output = Array2::from_shape_vec((observed.len(), 1), interval.forecast.clone())
        .map_err(|e| ForecastError::InvalidParameter(e.to_string()))?;
    let label = Array2::from_shape_vec((observed.len(), 1), observed.to_vec())
        .map_err(|e| ForecastError::InvalidParameter(e.to_string()))?;
    let nll = poisson_nll(output.view(), label.view())?;
    let mean_nll = nll.sum() / n;

    Ok(HoldoutScore {
        observed: observed.to_vec(),
        rmse: (squared / n).sqrt(),
        mae: absolute / n,
        nll: nll.to_vec(),
        mean_nll,
        coverage: covered as f64 / n,
    })
}
