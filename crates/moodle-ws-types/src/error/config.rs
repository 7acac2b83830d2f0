//! Configuration-related errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while loading client configuration.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Config read error at {path}: {message}")]
    ReadError {
        /// Filesystem path of the config file
        path: String,
        /// Description of the IO failure
        message: String,
    },

    /// Config file parse error (JSON)
    #[error("Config parse error: {message}")]
    ParseError {
        /// Description of the parse failure
        message: String,
    },

    /// Config validation error (invalid values)
    #[error("Config validation error for {field}: {message}")]
    ValidationError {
        /// Name of the field that failed validation
        field: String,
        /// Description of the validation failure
        message: String,
    },
}

impl ConfigError {
    /// Create a parse error from a serde_json error.
    pub fn from_json_error(e: &serde_json::Error) -> Self {
        Self::ParseError { message: e.to_string() }
    }

    /// Create a read error from an IO error.
    pub fn from_io_error(path: &std::path::Path, e: &std::io::Error) -> Self {
        Self::ReadError { path: path.display().to_string(), message: e.to_string() }
    }

    /// Flatten validator output into the first failing field.
    pub fn from_validation(errors: &validator::ValidationErrors) -> Self {
        let (field, message) = errors
            .field_errors()
            .into_iter()
            .next()
            .map(|(field, errs)| {
                let message = errs
                    .first()
                    .map(|e| e.message.as_ref().map_or_else(|| e.code.to_string(), |m| m.to_string()))
                    .unwrap_or_default();
                (field.to_string(), message)
            })
            .unwrap_or_else(|| ("config".to_string(), errors.to_string()));
        Self::ValidationError { field, message }
    }
}
