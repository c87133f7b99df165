//! Crate-level error type
//!
//! Covers failures that happen while setting the scaffold up (loading
//! configuration, registering sort fields). Request-time failures use
//! [`crate::pipeline::ApiError`] instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be loaded or extracted
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// A sort field set was registered with a default outside the set
    #[error("Invalid sort default `{default}`: expected one of {allowed:?}")]
    InvalidSortDefault {
        default: String,
        allowed: Vec<String>,
    },

    /// Logging could not be initialized
    #[error("Tracing initialization failed: {0}")]
    Tracing(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
