use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum PriceError {
    #[error("No price data available")]
    NoPriceData,
}

/// Hard failures reading or writing persisted state.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Unable to access {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed JSON in {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Malformed YAML in {path:?}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Unable to write CSV to {path:?}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Unable to replace {path:?}: {source}")]
    Replace {
        path: PathBuf,
        #[source]
        source: tempfile::PersistError,
    },

    #[error("Invalid data in {path:?}: {reason}")]
    Invalid { path: PathBuf, reason: String },
}

impl PersistenceError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> PersistenceError {
        PersistenceError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> PersistenceError {
        PersistenceError::Json {
            path: path.into(),
            source,
        }
    }

    pub fn invalid(path: impl Into<PathBuf>, reason: impl Into<String>) -> PersistenceError {
        PersistenceError::Invalid {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Failures raised by the quote and rate collaborators. These are caught and
/// logged by callers, never allowed to abort a batch.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("No quote data for ticker {0}")]
    UnknownTicker(String),

    #[error("No exchange rate for {0}")]
    UnknownCurrency(String),

    #[error("Invalid exchange rate {rate} for {currency}")]
    InvalidRate { currency: String, rate: f64 },

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unable to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Unsupported base currency {0}")]
    UnsupportedCurrency(String),

    #[error("Unknown pricing method {0:?}")]
    UnknownMethod(String),
}
