//! Error type shared by the estimator, the configuration layer and the data codecs.
use thiserror::Error;

/// Everything that can go wrong while configuring or running the filter.
#[derive(Error, Debug)]
pub enum FilterError {
    #[error("particle filter has not been initialized")]
    NotInitialized,

    #[error("particle filter is already initialized")]
    AlreadyInitialized,

    #[error("particle count must be at least 1, got {0}")]
    InvalidParticleCount(usize),

    #[error("standard deviation `{name}` is invalid: {value}")]
    InvalidStdDev { name: &'static str, value: f64 },

    #[error("time step must be positive and finite, got {0}")]
    InvalidTimeStep(f64),

    #[error("sensor range must be non-negative and finite, got {0}")]
    InvalidSensorRange(f64),

    #[error("all particle weights are zero or invalid")]
    DegenerateWeights,

    #[error("particle population is empty")]
    EmptyPopulation,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("data error: {0}")]
    Data(String),

    #[error("message error: {0}")]
    Message(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl From<serde_json::Error> for FilterError {
    fn from(e: serde_json::Error) -> Self {
        FilterError::Message(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FilterError>;
