//! The full recipe: features, fit, residual spread, recursive forecast, intervals.
//!
//! With a non-zero `forecast.holdout` the last `holdout` observations are kept
//! out of training, forecast from the observation before them, and scored.

use std::io::Write;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::config::{Config, ModelKind};
use crate::error::{ForecastError, Result};
use crate::evaluate::{HoldoutScore, score_holdout};
use crate::features::lagged_features;
use crate::forecast::{ForecastConfig, recursive_forecast};
use crate::interval::{ForecastWithInterval, prediction_intervals, residual_standard_error};
use crate::link::{LinkFunction, SoftplusLink};
use crate::mlp::{LinearModel, Mlp};
use crate::model::Trainable;
use crate::train::fit;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastReport {
    pub model: String,
    pub train_length: usize,
    pub last_observation: f64,
    pub train_loss: f64,
    pub residual_standard_error: f64,
    /// Inverse link of each forecast value; `None` where it is undefined.
    pub rate: Vec<Option<f64>>,
    pub interval: ForecastWithInterval,
    /// Score against the held-out tail, when one was configured.
    pub evaluation: Option<HoldoutScore>,
}

/// One line of the CSV export.
#[derive(Debug, Clone, Serialize)]
pub struct ForecastRow {
    pub step: usize,
    pub forecast: f64,
    pub rate: Option<f64>,
    pub lower: f64,
    pub upper: f64,
    pub observed: Option<f64>,
    pub nll: Option<f64>,
    pub covered: Option<bool>,
}

impl ForecastReport {
    pub fn rows(&self) -> Vec<ForecastRow> {
        let iv = &self.interval;
        let eval = self.evaluation.as_ref();
        (0..iv.len())
            .map(|i| {
                let observed = eval.map(|e| e.observed[i]);
                ForecastRow {
                    step: self.train_length + i,
                    forecast: iv.forecast[i],
                    rate: self.rate[i],
                    lower: iv.lower[i],
                    upper: iv.upper[i],
                    observed,
                    nll: eval.map(|e| e.nll[i]),
                    covered: observed.map(|y| iv.lower[i] <= y && y <= iv.upper[i]),
                }
            })
            .collect()
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        for row in self.rows() {
            wtr.serialize(row)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

/// Builds the configured model and runs the recipe on `series`.
pub fn run(config: &Config, series: &[f64]) -> Result<ForecastReport> {
    let mut rng = StdRng::seed_from_u64(config.model.seed);
    match config.model.kind {
        ModelKind::Linear => {
            let model = LinearModel::new(2, &mut rng);
            forecast_with(ModelKind::Linear.name(), &model, config, series)
        }
        ModelKind::Mlp => {
            let mut widths = config.model.hidden.clone();
            widths.push(1);
            let model = Mlp::new(2, &widths, config.model.activation, &mut rng)?;
            forecast_with(ModelKind::Mlp.name(), &model, config, series)
        }
    }
}

/// Fits `model` on `series` and forecasts `config.forecast.horizon` steps, or
/// `config.forecast.holdout` steps past the training part when holding out.
pub fn forecast_with<M>(
    name: &str,
    model: &M,
    config: &Config,
    series: &[f64],
) -> Result<ForecastReport>
where
    M: Trainable + ?Sized,
{
    let holdout = config.forecast.holdout;
    let (train, held_out) = split_holdout(series, holdout)?;
    let horizon = if holdout > 0 { holdout } else { config.forecast.horizon };

    let features = lagged_features(train)?;
    let forecast_config = ForecastConfig::from_features(&features)?;
    let inputs = forecast_config.standardizer.transform(&features.inputs)?;

    let report = fit(model, &inputs, &features.targets, &config.train)?;

    let fitted = model.predict(&inputs)?;
    let observed = features.targets.to_vec();
    let se = residual_standard_error(&fitted, &observed)?;
    log::info!("{name}: final loss {:.6}, residual se {se:.4}", report.final_loss);

    let last_observation = *train
        .last()
        .ok_or(ForecastError::SeriesTooShort { needed: 2, len: 0 })?;
    let link = SoftplusLink;
    let forecast = recursive_forecast(model, &link, last_observation, &forecast_config, horizon)?;
    let interval = prediction_intervals(&forecast, se, &link, &config.forecast.interval)?;
    let rate = forecast.iter().map(|&f| link.inverse(f).ok()).collect();

    let evaluation = if held_out.is_empty() {
        None
    } else {
        let score = score_holdout(&interval, &link, held_out)?;
        log::info!(
            "{name}: holdout of {holdout}, rmse {:.4}, mean nll {:.4}, coverage {:.2}",
            score.rmse,
            score.mean_nll,
            score.coverage
        );
        Some(score)
    };

    Ok(ForecastReport {
        model: name.to_string(),
        train_length: forecast_config.train_length,
        last_observation,
        train_loss: report.final_loss,
        residual_standard_error: se,
        rate,
        interval,
        evaluation,
    })
}

/// Splits off the last `holdout` points, leaving at least two for training.
fn split_holdout(series: &[f64], holdout: usize) -> Result<(&[f64], &[f64])> {
    let needed = holdout.saturating_add(2);
    if holdout > 0 && series.len() < needed {
        return Err(ForecastError::SeriesTooShort {
            needed,
            len: series.len(),
        });
    }
    Ok(series.split_at(series.len() - holdout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mlp::Activation;
    use crate::train::TrainConfig;

    fn counts() -> Vec<f64> {
        (0..24)
            .map(|t| 10.0 + 0.5 * t as f64 + if t % 2 == 0 { 1.0 } else { -1.0 })
            .collect()
    }

    fn quick_config(kind: ModelKind) -> Config {
        let mut config = Config::default();
        config.model.kind = kind;
        config.model.hidden = vec![4];
        config.train = TrainConfig {
            epochs: 200,
            batch_size: 4,
            learning_rate: 0.03,
            log_every: 0,
            ..TrainConfig::default()
        };
        config.forecast.horizon = 5;
        config
    }

    #[test]
    fn test_linear_run_produces_parallel_arrays() {
        let report = run(&quick_config(ModelKind::Linear), &counts()).unwrap();
        assert_eq!(report.model, "linear");
        assert_eq!(report.train_length, 24);
        assert_eq!(report.interval.len(), 5);
        assert_eq!(report.rate.len(), 5);
        assert_eq!(report.interval.lower.len(), 5);
        assert!(report.residual_standard_error.is_finite());
        assert!(report.evaluation.is_none());

        let rows = report.rows();
        assert_eq!(rows[0].step, 24);
        assert_eq!(rows[4].step, 28);
    }

    #[test]
    fn test_csv_export() {
        let report = run(&quick_config(ModelKind::Linear), &counts()).unwrap();
        let mut buf = Vec::new();
        report.write_csv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("step,forecast,rate,lower,upper,observed,nll,covered")
        );
        assert_eq!(lines.count(), 5);
    }

    #[test]
    fn test_holdout_trains_on_head_and_scores_tail() {
        let series = counts();
        let mut config = quick_config(ModelKind::Linear);
        config.forecast.holdout = 4;
        let report = run(&config, &series).unwrap();

        assert_eq!(report.train_length, series.len() - 4);
        assert_eq!(report.last_observation, series[series.len() - 5]);
        assert_eq!(report.interval.len(), 4);

        let score = report.evaluation.as_ref().unwrap();
        assert_eq!(score.observed, series[20..].to_vec());
        assert!(score.rmse.is_finite());
        assert!(score.mean_nll.is_finite());
        assert!((0.0..=1.0).contains(&score.coverage));

        let rows = report.rows();
        assert_eq!(rows[0].step, 20);
        assert_eq!(rows[3].observed, Some(series[23]));
        let covered = rows.iter().filter(|r| r.covered == Some(true)).count();
        assert_eq!(covered as f64 / 4.0, score.coverage);

        let mut buf = Vec::new();
        report.write_csv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let fields: Vec<&str> = text.lines().nth(1).unwrap().split(',').collect();
        assert_eq!(fields.len(), 8);
        assert_eq!(fields[5].parse::<f64>().unwrap(), series[20]);
        assert!(fields[6].parse::<f64>().unwrap().is_finite());
    }

    #[test]
    fn test_holdout_needs_two_training_points() {
        let mut config = quick_config(ModelKind::Linear);
        config.forecast.holdout = 5;
        assert!(matches!(
            run(&config, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]),
            Err(ForecastError::SeriesTooShort { needed: 7, len: 6 })
        ));
    }

    #[test]
    fn test_mlp_run() {
        let report = run(&quick_config(ModelKind::Mlp), &counts()).unwrap();
        assert_eq!(report.model, "mlp");
        assert_eq!(report.interval.forecast.len(), 5);

        let mut config = quick_config(ModelKind::Mlp);
        config.model.activation = Activation::Tanh;
        let tanh = run(&config, &counts()).unwrap();
        assert!(tanh.train_loss.is_finite());
        assert_ne!(tanh.interval.forecast, report.interval.forecast);
    }

    #[test]
    fn test_short_series_is_rejected() {
        assert!(matches!(
            run(&quick_config(ModelKind::Linear), &[3.0]),
            Err(ForecastError::SeriesTooShort { .. })
        ));
    }
}
