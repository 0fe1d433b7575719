// src/error.rs

//! Error types for the build pipeline

use thiserror::Error;

/// Errors raised while preparing, building, or exporting a package
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or incomplete recipe descriptor or configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A build-progress record carried an error marker
    #[error("Image build failed: {0}")]
    EngineProtocolError(String),

    /// The engine reported success but the image could not be found
    #[error("Image not found after build: {0}")]
    EngineLookupError(String),

    /// Lower-level failure talking to the container engine
    #[error("Container engine error: {0}")]
    TransportError(String),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::IoError(e.to_string())
    }
}

impl From<walkdir::Error> for Error {
    fn from(e: walkdir::Error) -> Self {
        Error::IoError(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::ParseError(e.to_string())
    }
}

impl From<bollard::errors::Error> for Error {
    fn from(e: bollard::errors::Error) -> Self {
        Error::TransportError(e.to_string())
    }
}
