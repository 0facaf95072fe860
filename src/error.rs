//! Error types for sqlprep.
//!
//! The transforms themselves never fail. Errors come from startup
//! (configuration, dialect validation) and from the execution engine.

use thiserror::Error;

/// The main error type for sqlprep operations.
#[derive(Debug, Error)]
pub enum SqlPrepError {
    /// The dialect cannot be used by the transforms.
    #[error("Unusable dialect '{dialect}': {message}")]
    Dialect { dialect: String, message: String },

    /// Unknown dialect preset name.
    #[error("Unknown dialect preset: '{0}'. Expected one of: {1}")]
    UnknownDialect(String, &'static str),

    /// Unknown execution provider.
    #[error("Unknown engine provider: '{0}'. Expected: sqlx or offline")]
    UnknownProvider(String),

    /// Cleaning produced no statement.
    #[error("No SQL statement to execute")]
    EmptyStatement,

    /// Connection error.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution error.
    #[error("Execution error: {0}")]
    Execution(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed TOML configuration.
    #[error("Invalid config file: {0}")]
    Toml(#[from] toml::de::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SqlPrepError {
    /// Create a dialect validation error.
    pub fn dialect(dialect: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Dialect {
            dialect: dialect.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for sqlprep operations.
pub type SqlPrepResult<T> = Result<T, SqlPrepError>;
