use thiserror::Error;

#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("Inverse link undefined for non-positive input {value}")]
    LinkDomain { value: f64 },

    #[error(
        "Forecast step {step}: model output {value} cannot be fed back through the inverse link"
    )]
    RecursionDomain { step: usize, value: f64 },

    #[error("Interval step {step}: shifted bound {value} is outside the inverse-link domain")]
    IntervalDomain { step: usize, value: f64 },

    #[error("Degenerate likelihood: link output is zero at element {index}")]
    DegenerateLikelihood { index: usize },

    #[error("Non-finite training loss in epoch {epoch}")]
    NonFiniteLoss { epoch: usize },

    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("Feature column {column} has zero variance and cannot be standardized")]
    DegenerateFeature { column: usize },

    #[error("Series too short: need at least {needed} observations, got {len}")]
    SeriesTooShort { needed: usize, len: usize },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML config error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ForecastError>;
