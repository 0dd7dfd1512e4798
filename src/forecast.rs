//! Autoregressive multi-step forecasting.
//!
//! Each step's model output is mapped back through the inverse link and fed
//! in as the next step's lagged feature, so the loop is strictly sequential.

use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};
use crate::features::{FeatureSet, Standardizer};
use crate::link::LinkFunction;
use crate::model::{Model, check_width};

/// Training-time quantities the forecaster reuses unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastConfig {
    pub standardizer: Standardizer,
    /// Length of the training series; the trend index continues from here.
    pub train_length: usize,
}

impl ForecastConfig {
    pub fn new(standardizer: Standardizer, train_length: usize) -> Self {
        Self {
            standardizer,
            train_length,
        }
    }

    pub fn from_features(features: &FeatureSet) -> Result<Self> {
        Ok(Self::new(
            Standardizer::fit(&features.inputs)?,
            features.train_length,
        ))
    }
}

/// Returns `horizon` link-space outputs.
///
/// Step `t` evaluates the model on the standardized `(train_length + t - 1, prev)`
/// where `prev` is `last_observation` for `t = 0` and the inverse link of the
/// previous output afterwards. An output that has to be fed back but lies
/// outside the inverse link's domain stops the recursion with
/// [`ForecastError::RecursionDomain`].
pub fn recursive_forecast<M, L>(
    model: &M,
    link: &L,
    last_observation: f64,
    config: &ForecastConfig,
    horizon: usize,
) -> Result<Vec<f64>>
where
    M: Model + ?Sized,
    L: LinkFunction + ?Sized,
{
    check_width(config.standardizer.width(), 2)?;
    if let Some(n) = model.n_features() {
        check_width(n, 2)?;
    }

    let mut forecast = Vec::with_capacity(horizon);
    let mut prev = last_observation;

    for t in 0..horizon {
        let trend = config.train_length as f64 + t as f64 - 1.0;
        let features = config.standardizer.transform_row(&[trend, prev])?;
        let output = model.evaluate(&features)?;
        forecast.push(output);

        if t + 1 < horizon {
            prev = link.inverse(output).map_err(|_| ForecastError::RecursionDomain {
                step: t,
                value: output,
            })?;
        }
    }

    log::debug!("forecast {horizon} steps from last observation {last_observation}");
    Ok(forecast)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::SoftplusLink;
    use crate::mlp::LinearModel;
    use std::cell::RefCell;
    use std::f64::consts::LN_2;

    fn identity_config(train_length: usize) -> ForecastConfig {
        ForecastConfig::new(
            Standardizer::new(vec![0.0, 0.0], vec![1.0, 1.0]).unwrap(),
            train_length,
        )
    }

    #[test]
    fn test_constant_model_yields_constant_forecast() {
        let model = |_: &[f64]| LN_2;
        let out = recursive_forecast(&model, &SoftplusLink, 1.0, &identity_config(10), 3).unwrap();
        assert_eq!(out.len(), 3);
        for v in out {
            assert!((v - LN_2).abs() < 1e-15);
        }
    }

    #[test]
    fn test_feature_sequence_feeds_back_inverse_link() {
        let seen = RefCell::new(Vec::new());
        let model = |x: &[f64]| {
            seen.borrow_mut().push(x.to_vec());
            5.0 + x[0]
        };
        let out = recursive_forecast(&model, &SoftplusLink, 2.0, &identity_config(10), 3).unwrap();

        let seen = seen.into_inner();
        assert_eq!(seen[0], vec![9.0, 2.0]);
        assert_eq!(seen[1][0], 10.0);
        assert_eq!(seen[2][0], 11.0);
        let back = SoftplusLink.inverse(out[0]).unwrap();
        assert_eq!(seen[1][1], back);
        assert_eq!(out, vec![14.0, 15.0, 16.0]);
    }

    #[test]
    fn test_standardization_is_applied_with_fixed_parameters() {
        let config = ForecastConfig::new(
            Standardizer::new(vec![10.0, 4.0], vec![2.0, 0.5]).unwrap(),
            11,
        );
        let seen = RefCell::new(Vec::new());
        let model = |x: &[f64]| {
            seen.borrow_mut().push(x.to_vec());
            4.0
        };
        recursive_forecast(&model, &SoftplusLink, 5.0, &config, 2).unwrap();

        let seen = seen.into_inner();
        assert_eq!(seen[0], vec![0.0, 2.0]);
        let prev = SoftplusLink.inverse(4.0).unwrap();
        assert_eq!(seen[1], vec![0.5, (prev - 4.0) / 0.5]);
    }

    #[test]
    fn test_length_matches_horizon() {
        let model = LinearModel::from_coefficients(&[0.1, 0.2], 3.0).unwrap();
        for horizon in [0, 1, 5, 10] {
            let config = identity_config(20);
            let out = recursive_forecast(&model, &SoftplusLink, 4.0, &config, horizon).unwrap();
            assert_eq!(out.len(), horizon);
        }
    }

    #[test]
    fn test_repeated_calls_are_bit_identical() {
        let model = LinearModel::from_coefficients(&[0.03, 0.9], 0.4).unwrap();
        let config = identity_config(12);
        let a = recursive_forecast(&model, &SoftplusLink, 7.0, &config, 10).unwrap();
        let b = recursive_forecast(&model, &SoftplusLink, 7.0, &config, 10).unwrap();
        let bits = |v: &[f64]| v.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&a), bits(&b));
    }

    #[test]
    fn test_non_positive_output_stops_recursion() {
        let model = |_: &[f64]| -0.5;
        match recursive_forecast(&model, &SoftplusLink, 1.0, &identity_config(5), 4) {
            Err(ForecastError::RecursionDomain { step: 0, value }) => assert_eq!(value, -0.5),
            other => panic!("expected recursion domain error, got {other:?}"),
        }
        // nothing is fed back after the final step
        let out = recursive_forecast(&model, &SoftplusLink, 1.0, &identity_config(5), 1).unwrap();
        assert_eq!(out, vec![-0.5]);
    }

    #[test]
    fn test_wrong_model_width_fails_fast() {
        let model = LinearModel::from_coefficients(&[1.0, 1.0, 1.0], 0.0).unwrap();
        assert!(matches!(
            recursive_forecast(&model, &SoftplusLink, 1.0, &identity_config(5), 3),
            Err(ForecastError::ShapeMismatch { .. })
        ));
    }
}
