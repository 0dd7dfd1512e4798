//! Mini-batch gradient descent on the Poisson negative log-likelihood.

use ndarray::{Array1, Array2, Axis};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::autograd::Autograd;
use crate::error::{ForecastError, Result};
use crate::loss::poisson_nll_graph;
use crate::model::Trainable;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    /// Decay of the running loss average.
    pub smoothing: f64,
    /// Seed for batch shuffling.
    pub seed: u64,
    /// Log every `log_every` epochs; 0 disables progress logging.
    pub log_every: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: 200,
            batch_size: 8,
            learning_rate: 0.01,
            smoothing: 0.98,
            seed: 42,
            log_every: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainReport {
    /// Bias-corrected running loss at the end of each epoch.
    pub epoch_losses: Vec<f64>,
    pub final_loss: f64,
    pub steps: usize,
}

/// Stochastic gradient descent: `p <- p - lr * grad`.
#[derive(Debug, Clone, Copy)]
pub struct Sgd {
    pub learning_rate: f64,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Self {
        Self { learning_rate }
    }

    pub fn step(&self, params: &[Autograd]) {
        for p in params {
            let updated = p.value() - p.grad() * self.learning_rate;
            p.set_value(updated);
        }
    }
}

/// Running mean with the start-up bias divided out, `avg / (1 - beta^t)`.
#[derive(Debug, Clone, Copy)]
struct SmoothedLoss {
    beta: f64,
    avg: f64,
    steps: i32,
}

impl SmoothedLoss {
    fn new(beta: f64) -> Self {
        Self {
            beta,
            avg: 0.0,
            steps: 0,
        }
    }

    fn update(&mut self, loss: f64) -> f64 {
        self.steps = self.steps.saturating_add(1);
        self.avg = self.beta * self.avg + (1.0 - self.beta) * loss;
        self.value()
    }

    fn value(&self) -> f64 {
        if self.steps == 0 {
            return f64::NAN;
        }
        let correction = 1.0 - self.beta.powi(self.steps);
        if correction > 0.0 {
            self.avg / correction
        } else {
            self.avg
        }
    }
}

/// Fits `model` to `(inputs, targets)` in place.
///
/// `inputs` should already be standardized. A batch whose loss is not finite
/// aborts training with [`ForecastError::NonFiniteLoss`].
pub fn fit<M>(
    model: &M,
    inputs: &Array2<f64>,
    targets: &Array1<f64>,
    config: &TrainConfig,
) -> Result<TrainReport>
where
    M: Trainable + ?Sized,
{
    if inputs.nrows() != targets.len() {
        return Err(ForecastError::ShapeMismatch {
            expected: vec![inputs.nrows()],
            actual: vec![targets.len()],
        });
    }
    if inputs.nrows() == 0 {
        return Err(ForecastError::SeriesTooShort { needed: 1, len: 0 });
    }
    if config.batch_size == 0 {
        return Err(ForecastError::InvalidParameter(
            "batch_size must be positive".to_string(),
        ));
    }
    if !(0.0..1.0).contains(&config.smoothing) {
        return Err(ForecastError::InvalidParameter(format!(
            "smoothing must lie in [0, 1), got {}",
            config.smoothing
        )));
    }

    let params = model.parameters();
    let optimizer = Sgd::new(config.learning_rate);
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut indices: Vec<usize> = (0..inputs.nrows()).collect();
    let mut running = SmoothedLoss::new(config.smoothing);
    let mut epoch_losses = Vec::with_capacity(config.epochs);
    let mut steps = 0;

    log::info!(
        "training on {} rows for {} epochs (batch {}, lr {})",
        inputs.nrows(),
        config.epochs,
        config.batch_size,
        config.learning_rate
    );

    for epoch in 1..=config.epochs {
        indices.shuffle(&mut rng);

        for batch in indices.chunks(config.batch_size) {
            let x = inputs.select(Axis(0), batch);
            let y = targets.select(Axis(0), batch).insert_axis(Axis(1));

            let output = model.forward(&Autograd::new(x));
            let loss = poisson_nll_graph(&output, &y);
            let value = loss.item();
            if !value.is_finite() {
                return Err(ForecastError::NonFiniteLoss { epoch });
            }

            model.zero_grad();
            loss.backward();
            optimizer.step(&params);

            running.update(value);
            steps += 1;
        }

        let smoothed = running.value();
        epoch_losses.push(smoothed);
        if config.log_every > 0 && (epoch % config.log_every == 0 || epoch == 1) {
            log::info!("epoch {epoch:4} | loss {smoothed:.6}");
        } else {
            log::debug!("epoch {epoch:4} | loss {smoothed:.6}");
        }
    }

    Ok(TrainReport {
        final_loss: running.value(),
        epoch_losses,
        steps,
    })
}
