use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::interval::IntervalConfig;
use crate::mlp::Activation;
use crate::train::TrainConfig;

/// Run configuration loaded from a TOML or JSON file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data: DataConfig,
    pub model: ModelConfig,
    pub train: TrainConfig,
    pub forecast: ForecastSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// CSV file holding the series.
    pub path: Option<PathBuf>,
    /// Column to read; the last column when absent.
    pub column: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    #[default]
    Linear,
    Mlp,
}

impl ModelKind {
    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::Linear => "linear",
            ModelKind::Mlp => "mlp",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub kind: ModelKind,
    /// Hidden layer widths for the MLP.
    pub hidden: Vec<usize>,
    /// Activation of the MLP hidden layers.
    pub activation: Activation,
    /// Seed for weight initialization.
    pub seed: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            kind: ModelKind::Linear,
            hidden: vec![16],
            activation: Activation::ReLU,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastSettings {
    pub horizon: usize,
    /// Trailing observations held out of training and scored against the
    /// forecast. When non-zero it replaces `horizon`.
    pub holdout: usize,
    pub interval: IntervalConfig,
}

impl Default for ForecastSettings {
    fn default() -> Self {
        Self {
            horizon: 12,
            holdout: 0,
            interval: IntervalConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the given path. JSON when the extension is
    /// `.json`, TOML otherwise.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content)?
        } else {
            toml::from_str(&content)?
        };
        Ok(config)
    }
}
