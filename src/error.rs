use thiserror::Error;

/// Top-level error type for the oracle
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Price error: {0}")]
    Price(#[from] PriceError),

    #[error("Settlement error: {0}")]
    Settlement(#[from] SettlementError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("External error: {0}")]
    ExternalError(String),
}

/// Pricing errors. These always reach the caller; pricing never substitutes a default.
#[derive(Error, Debug)]
pub enum PriceError {
    #[error("Token {chain_id}:{token} is not recognized")]
    UnknownToken { chain_id: u64, token: String },

    #[error("Price source {feed} unavailable: {reason}")]
    SourceUnavailable { feed: &'static str, reason: String },

    #[error("Price change is >20% between sources ({low} vs {high}, ratio {ratio})")]
    PriceDeviation { low: f64, high: f64, ratio: f64 },

    #[error("Cannot compute a price over an empty sample")]
    EmptyInput,

    #[error("Time window collapses to a single instant")]
    DegenerateWindow,
}

/// Settlement-side errors
#[derive(Error, Debug)]
pub enum SettlementError {
    #[error("Settlement step '{step}' failed: {message}")]
    Step { step: &'static str, message: String },

    #[error("Payment registry error: {0}")]
    Registry(String),
}

impl SettlementError {
    pub fn step(step: &'static str, message: impl Into<String>) -> Self {
        SettlementError::Step {
            step,
            message: message.into(),
        }
    }
}

impl PriceError {
    pub fn unavailable(feed: &'static str, reason: impl Into<String>) -> Self {
        PriceError::SourceUnavailable {
            feed,
            reason: reason.into(),
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        AppError::ExternalError(format!("HTTP request error: {:?}", error))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(error: config::ConfigError) -> Self {
        AppError::Config(error.to_string())
    }
}

/// Result type alias for the oracle
pub type AppResult<T> = Result<T, AppError>;
