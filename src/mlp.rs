use ndarray::Array2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::autograd::Autograd;
use crate::error::{ForecastError, Result};
use crate::model::{Model, Trainable, check_width};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    #[default]
    ReLU,
    Tanh,
    None,
}

/// Fully-connected layer: `y = act(x W + b)`.
///
/// `x` is `(batch, nin)`, `W` is `(nin, nout)` and `b` is a `(1, nout)` row.
pub struct Dense {
    weights: Autograd,
    bias: Autograd,
    activation: Activation,
}

impl Dense {
    pub fn new<R: Rng>(nin: usize, nout: usize, activation: Activation, rng: &mut R) -> Self {
        let scale = (2.0 / nin.max(1) as f64).sqrt();
        let weights = Array2::from_shape_fn((nin, nout), |_| rng.gen_range(-scale..scale));

        Self {
            weights: Autograd::new(weights),
            bias: Autograd::new(Array2::zeros((1, nout))),
            activation,
        }
    }

    pub fn from_parts(
        weights: Array2<f64>,
        bias: Array2<f64>,
        activation: Activation,
    ) -> Result<Self> {
        if bias.nrows() != 1 || bias.ncols() != weights.ncols() {
            return Err(ForecastError::ShapeMismatch {
                expected: vec![1, weights.ncols()],
                actual: bias.shape().to_vec(),
            });
        }
        Ok(Self {
            weights: Autograd::new(weights),
            bias: Autograd::new(bias),
            activation,
        })
    }

    pub fn forward(&self, x: &Autograd) -> Autograd {
        let z = x.matmul(&self.weights).add_row(&self.bias);
        match self.activation {
            Activation::ReLU => z.relu(),
            Activation::Tanh => z.tanh(),
            Activation::None => z,
        }
    }

    pub fn nin(&self) -> usize {
        self.weights.shape().0
    }

    pub fn parameters(&self) -> Vec<Autograd> {
        vec![self.weights.clone(), self.bias.clone()]
    }
}

/// Single dense layer with no activation: the Poisson GLM once the softplus
/// link is applied to its output.
pub struct LinearModel {
    layer: Dense,
}

impl LinearModel {
    pub fn new<R: Rng>(nin: usize, rng: &mut R) -> Self {
        Self {
            layer: Dense::new(nin, 1, Activation::None, rng),
        }
    }

    pub fn from_coefficients(coefficients: &[f64], intercept: f64) -> Result<Self> {
        let weights = Array2::from_shape_vec((coefficients.len(), 1), coefficients.to_vec())
            .map_err(|e| ForecastError::InvalidParameter(e.to_string()))?;
        let bias = Array2::from_elem((1, 1), intercept);
        let layer = Dense::from_parts(weights, bias, Activation::None)?;
        Ok(Self { layer })
    }

    pub fn coefficients(&self) -> Vec<f64> {
        self.layer.weights.value().column(0).to_vec()
    }

    pub fn intercept(&self) -> f64 {
        self.layer.bias.item()
    }
}

impl Model for LinearModel {
    fn n_features(&self) -> Option<usize> {
        Some(self.layer.nin())
    }

    fn evaluate(&self, features: &[f64]) -> Result<f64> {
        check_width(self.layer.nin(), features.len())?;
        let dot: f64 = self
            .coefficients()
            .iter()
            .zip(features)
            .map(|(w, x)| w * x)
            .sum();
        Ok(dot + self.intercept())
    }
}

impl Trainable for LinearModel {
    fn forward(&self, inputs: &Autograd) -> Autograd {
        self.layer.forward(inputs)
    }

    fn parameters(&self) -> Vec<Autograd> {
        self.layer.parameters()
    }
}

/// Multi-layer perceptron with a shared hidden activation and a linear output.
pub struct Mlp {
    layers: Vec<Dense>,
}

impl Mlp {
    /// `nouts` lists every layer width; the last one must be 1.
    pub fn new<R: Rng>(
        nin: usize,
        nouts: &[usize],
        hidden: Activation,
        rng: &mut R,
    ) -> Result<Self> {
        match nouts.last() {
            Some(1) => {}
            Some(&n) => {
                return Err(ForecastError::InvalidParameter(format!(
                    "MLP output width must be 1, got {n}"
                )));
            }
            None => {
                return Err(ForecastError::InvalidParameter(
                    "MLP needs at least one layer".to_string(),
                ));
            }
        }
        if nouts.contains(&0) {
            return Err(ForecastError::InvalidParameter(
                "MLP layer widths must be positive".to_string(),
            ));
        }

        let mut sizes = vec![nin];
        sizes.extend_from_slice(nouts);

        let layers = (0..nouts.len())
            .map(|i| {
                let activation = if i < nouts.len() - 1 {
                    hidden
                } else {
                    Activation::None
                };
                Dense::new(sizes[i], sizes[i + 1], activation, &mut *rng)
            })
            .collect();

        Ok(Self { layers })
    }
}

impl Model for Mlp {
    fn n_features(&self) -> Option<usize> {
        self.layers.first().map(Dense::nin)
    }

    fn evaluate(&self, features: &[f64]) -> Result<f64> {
        if let Some(n) = self.n_features() {
            check_width(n, features.len())?;
        }
        let row = Array2::from_shape_fn((1, features.len()), |(_, j)| features[j]);
        Ok(self.forward(&Autograd::new(row)).item())
    }
}

impl Trainable for Mlp {
    fn forward(&self, inputs: &Autograd) -> Autograd {
        let mut current = inputs.clone();
        for layer in &self.layers {
            current = layer.forward(&current);
        }
        current
    }

    fn parameters(&self) -> Vec<Autograd> {
        self.layers.iter().flat_map(Dense::parameters).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_linear_model_evaluate() {
        let model = LinearModel::from_coefficients(&[0.5, 2.0], 1.0).unwrap();
        assert_eq!(model.evaluate(&[2.0, 3.0]).unwrap(), 8.0);
        assert_eq!(model.n_features(), Some(2));
    }

    #[test]
    fn test_linear_model_rejects_wrong_width() {
        let model = LinearModel::from_coefficients(&[0.5, 2.0], 1.0).unwrap();
        assert!(matches!(
            model.evaluate(&[1.0]),
            Err(ForecastError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_linear_forward_matches_evaluate() {
        let model = LinearModel::from_coefficients(&[0.5, -1.0], 0.25).unwrap();
        let batch = array![[1.0, 2.0], [3.0, 4.0]];
        let out = model.predict(&batch).unwrap();
        assert_eq!(out.len(), 2);
        assert!((out[0] - model.evaluate(&[1.0, 2.0]).unwrap()).abs() < 1e-12);
        assert!((out[1] - model.evaluate(&[3.0, 4.0]).unwrap()).abs() < 1e-12);
    }

    #[test]
    fn test_mlp_shapes_and_parameters() {
        let mut rng = StdRng::seed_from_u64(7);
        let mlp = Mlp::new(2, &[8, 1], Activation::ReLU, &mut rng).unwrap();
        assert_eq!(mlp.n_features(), Some(2));
        // two weight matrices and two bias rows
        assert_eq!(mlp.parameters().len(), 4);

        let out = mlp.predict(&array![[0.1, 0.2], [0.3, 0.4], [0.5, 0.6]]).unwrap();
        assert_eq!(out.len(), 3);
        assert!(mlp.evaluate(&[0.1, 0.2]).unwrap().is_finite());
    }

    #[test]
    fn test_mlp_rejects_wide_output() {
        let mut rng = StdRng::seed_from_u64(7);
        assert!(Mlp::new(2, &[4, 2], Activation::ReLU, &mut rng).is_err());
        assert!(Mlp::new(2, &[], Activation::ReLU, &mut rng).is_err());
        assert!(Mlp::new(2, &[0, 1], Activation::ReLU, &mut rng).is_err());
    }

    #[test]
    fn test_mlp_same_seed_same_weights() {
        let a = Mlp::new(2, &[4, 1], Activation::Tanh, &mut StdRng::seed_from_u64(3)).unwrap();
        let b = Mlp::new(2, &[4, 1], Activation::Tanh, &mut StdRng::seed_from_u64(3)).unwrap();
        let x = [0.7, -1.2];
        assert_eq!(a.evaluate(&x).unwrap(), b.evaluate(&x).unwrap());
    }

    #[test]
    fn test_hidden_activation_is_applied() {
        // one hidden unit with weight 1 and bias 0, output weight 1
        let hidden = |activation| {
            let first = Dense::from_parts(array![[1.0]], array![[0.0]], activation).unwrap();
            let last = Dense::from_parts(array![[1.0]], array![[0.0]], Activation::None).unwrap();
            Mlp {
                layers: vec![first, last],
            }
        };
        let x = [-2.0];
        assert_eq!(hidden(Activation::ReLU).evaluate(&x).unwrap(), 0.0);
        assert!((hidden(Activation::Tanh).evaluate(&x).unwrap() - (-2.0f64).tanh()).abs() < 1e-12);
        assert_eq!(hidden(Activation::None).evaluate(&x).unwrap(), -2.0);
    }

    #[test]
    fn test_activation_names() {
        let parsed: Activation = serde_json::from_str("\"tanh\"").unwrap();
        assert_eq!(parsed, Activation::Tanh);
        assert_eq!(Activation::default(), Activation::ReLU);
    }
}
