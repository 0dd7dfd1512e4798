//! Poisson maximum-likelihood forecasting of count series.
//!
//! A linear model or a small MLP is fitted with a softplus-linked Poisson
//! likelihood on `(trend, lagged value)` features, then rolled forward
//! autoregressively with approximate prediction intervals.

pub mod autograd;
pub mod config;
pub mod data;
pub mod error;
pub mod evaluate;
pub mod features;
pub mod forecast;
pub mod interval;
pub mod link;
pub mod loss;
pub mod mlp;
pub mod model;
pub mod pipeline;
pub mod train;

pub use error::{ForecastError, Result};
pub use evaluate::{HoldoutScore, score_holdout};
pub use forecast::{ForecastConfig, recursive_forecast};
pub use interval::{
    ForecastWithInterval, IntervalConfig, prediction_intervals, residual_standard_error,
};
pub use link::{LinkFunction, SoftplusLink};
pub use model::{Model, Trainable};
