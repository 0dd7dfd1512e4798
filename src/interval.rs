//! Approximate prediction intervals around recursive forecasts.
//!
//! The forecast error is treated as Gaussian with the constant variance of the
//! training residuals, so the interval width does not grow with the horizon.

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};
use crate::link::LinkFunction;

/// One-sided 95% normal quantile, giving roughly 90% two-sided coverage.
pub const DEFAULT_QUANTILE: f64 = 1.65;

/// What to do when a shifted bound falls outside the inverse link's domain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "lowercase")]
pub enum LowerBoundPolicy {
    /// Report [`ForecastError::IntervalDomain`].
    Strict,
    /// Evaluate the inverse link at `epsilon` instead.
    Clamp { epsilon: f64 },
}

impl Default for LowerBoundPolicy {
    fn default() -> Self {
        LowerBoundPolicy::Clamp { epsilon: 1e-8 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntervalConfig {
    pub quantile: f64,
    pub lower_bound: LowerBoundPolicy,
}

impl Default for IntervalConfig {
    fn default() -> Self {
        Self {
            quantile: DEFAULT_QUANTILE,
            lower_bound: LowerBoundPolicy::default(),
        }
    }
}

/// Forecast with per-step bounds, as parallel arrays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastWithInterval {
    pub forecast: Vec<f64>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
    pub quantile: f64,
    pub standard_error: f64,
}

impl ForecastWithInterval {
    pub fn len(&self) -> usize {
        self.forecast.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forecast.is_empty()
    }
}

/// Sample standard deviation (n - 1) of `fitted - observed`.
pub fn residual_standard_error(fitted: &[f64], observed: &[f64]) -> Result<f64> {
    if fitted.len() != observed.len() {
        return Err(ForecastError::ShapeMismatch {
            expected: vec![fitted.len()],
            actual: vec![observed.len()],
        });
    }
    if fitted.len() < 2 {
        return Err(ForecastError::SeriesTooShort {
            needed: 2,
            len: fitted.len(),
        });
    }

    let residuals: Array1<f64> = fitted.iter().zip(observed).map(|(f, o)| f - o).collect();
    Ok(residuals.std(1.0))
}

/// Bounds `inverse(f - q*se)` and `inverse(f + q*se)` for every forecast value.
///
/// The inverse link is applied to each shifted value separately; it is never
/// applied to the midpoint and shifted afterwards.
pub fn prediction_intervals<L>(
    forecast: &[f64],
    standard_error: f64,
    link: &L,
    config: &IntervalConfig,
) -> Result<ForecastWithInterval>
where
    L: LinkFunction + ?Sized,
{
    if !(standard_error >= 0.0 && standard_error.is_finite()) {
        return Err(ForecastError::InvalidParameter(format!(
            "standard error must be finite and non-negative, got {standard_error}"
        )));
    }
    if !(config.quantile > 0.0 && config.quantile.is_finite()) {
        return Err(ForecastError::InvalidParameter(format!(
            "quantile must be positive, got {}",
            config.quantile
        )));
    }

    let margin = config.quantile * standard_error;
    let mut lower = Vec::with_capacity(forecast.len());
    let mut upper = Vec::with_capacity(forecast.len());

    for (step, &f) in forecast.iter().enumerate() {
        lower.push(bound(link, f - margin, step, config.lower_bound)?);
        upper.push(bound(link, f + margin, step, config.lower_bound)?);
    }

    Ok(ForecastWithInterval {
        forecast: forecast.to_vec(),
        lower,
        upper,
        quantile: config.quantile,
        standard_error,
    })
}

fn bound<L>(link: &L, value: f64, step: usize, policy: LowerBoundPolicy) -> Result<f64>
where
    L: LinkFunction + ?Sized,
{
    match link.inverse(value) {
        Ok(v) => Ok(v),
        Err(_) => match policy {
            LowerBoundPolicy::Strict => Err(ForecastError::IntervalDomain { step, value }),
            LowerBoundPolicy::Clamp { epsilon } => link.inverse(epsilon),
        },
    }
}
