//! Error types for the PostgreSQL access layer.
//!
//! All errors are defined with `thiserror` in a single enum. Driver failures
//! are carried through unchanged in the `Driver` variant; they are never
//! reinterpreted by this layer.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    /// Configuration absent, malformed, or failing validation. Raised before
    /// any physical connect attempt.
    #[error("invalid configuration: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// No codec provider matched the declared type.
    #[error("no PostgreSQL codec available for type {type_name}")]
    UnsupportedType { type_name: String },

    /// A parameter value does not match its declared type.
    #[error("failed to encode value as {sql_type}: {message}")]
    Encode { sql_type: String, message: String },

    /// A column value could not be decoded by its resolved codec.
    #[error("failed to decode column {field}: {message} (raw value: {value})")]
    Decode {
        field: String,
        value: String,
        message: String,
    },

    /// The caller used the API outside its contract, e.g. executing a
    /// statement without an active transaction.
    #[error("{message}")]
    Usage { message: String },

    /// A failure reported by the wire-level driver, passed through unchanged.
    #[error("driver error: {message}")]
    Driver {
        message: String,
        /// e.g. "23505" for a unique violation
        sql_state: Option<String>,
    },
}

impl DbError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Create a configuration error wrapping an underlying cause.
    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an unsupported type error.
    pub fn unsupported_type(type_name: impl Into<String>) -> Self {
        Self::UnsupportedType {
            type_name: type_name.into(),
        }
    }

    /// Create an encode error.
    pub fn encode(sql_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Encode {
            sql_type: sql_type.into(),
            message: message.into(),
        }
    }

    /// Create a decode error. The field name is filled in by the result
    /// stream via [`DbError::for_field`] once the column is known.
    pub fn decode(value: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            field: String::new(),
            value: value.into(),
            message: message.into(),
        }
    }

    /// Create a usage error.
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
        }
    }

    /// Create a driver error.
    pub fn driver(message: impl Into<String>, sql_state: Option<String>) -> Self {
        Self::Driver {
            message: message.into(),
            sql_state,
        }
    }

    /// Attach a column name to a decode error, leaving other errors intact.
    pub fn for_field(self, field: impl Into<String>) -> Self {
        match self {
            Self::Decode { value, message, .. } => Self::Decode {
                field: field.into(),
                value,
                message,
            },
            other => other,
        }
    }

    /// The SQLSTATE code for driver errors, if the driver reported one.
    pub fn sql_state(&self) -> Option<&str> {
        match self {
            Self::Driver { sql_state, .. } => sql_state.as_deref(),
            _ => None,
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;
