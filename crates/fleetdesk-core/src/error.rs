//! Error type for client setup: configuration, logging and local storage

use std::{error::Error as StdError, fmt};

/// Main error type for `FleetDesk` client setup
#[derive(Debug)]
pub enum Error {
    /// I/O error
    Io(std::io::Error),

    /// Configuration error
    Configuration {
        /// Error message
        message: String,
    },

    /// Validation error
    Validation {
        /// Field that failed validation
        field: String,
        /// Validation error message
        message: String,
    },

    /// Logging could not be initialized
    Logging(String),

    /// Serialization error
    Serialization(serde_json::Error),
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "I/O error: {err}"),
            Self::Configuration { message } => write!(f, "Configuration error: {message}"),
            Self::Validation { field, message } => {
                write!(f, "Validation error: {field} - {message}")
            }
            Self::Logging(msg) => write!(f, "Logging error: {msg}"),
            Self::Serialization(err) => write!(f, "Serialization error: {err}"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Serialization(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err)
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Self::Configuration {
            message: err.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errs: validator::ValidationErrors) -> Self {
        // Report the first failing field path; the rest rarely add anything.
        let (field, message) = first_failure(&errs, String::new())
            .unwrap_or_else(|| ("config".to_string(), errs.to_string()));
        Self::Validation { field, message }
    }
}

fn first_failure(errs: &validator::ValidationErrors, prefix: String) -> Option<(String, String)> {
    use validator::ValidationErrorsKind;

    for (field, kind) in errs.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                if let Some(first) = list.first() {
                    let message = first
                        .message
                        .as_ref()
                        .map_or_else(|| first.code.to_string(), ToString::to_string);
                    return Some((path, message));
                }
            }
            ValidationErrorsKind::Struct(nested) => {
                if let Some(found) = first_failure(nested, path) {
                    return Some(found);
                }
            }
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    if let Some(found) = first_failure(nested, format!("{path}[{index}]")) {
                        return Some(found);
                    }
                }
            }
        }
    }
    None
}
