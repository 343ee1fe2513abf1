//! Errors that can be thrown when processing configuration.

use std::path::PathBuf;

use query_engine_execution::error::DriverError;
use thiserror::Error;

use crate::environment::EnvironmentError;

/// The configuration is well-formed but cannot be used.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("invalid host: {0:?}")]
    InvalidHost(String),
    #[error("port must not be 0")]
    InvalidPort,
    #[error("invalid pool settings: {0}")]
    InvalidPoolSettings(&'static str),
    #[error(transparent)]
    Environment(#[from] EnvironmentError),
}

#[derive(Debug, Error)]
pub enum ParseConfigurationError {
    #[error("parse error on {file_path}:{line}:{column}: {message}")]
    ParseError {
        file_path: PathBuf,
        line: usize,
        column: usize,
        message: String,
    },
    #[error("unsupported configuration version {0}, expected {1}")]
    UnsupportedVersion(u32, u32),
    #[error("I/O error: {0}")]
    IoErrorButStringified(String),
}

#[derive(Debug, Error)]
pub enum WriteParsedConfigurationError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors raised while turning a parsed configuration into a connection pool.
#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("invalid configuration: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("unable to initialize connection pool: {0}")]
    UnableToCreatePool(#[from] DriverError),
}
