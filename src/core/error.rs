//! Errors of the query layer
//!
//! Configuration problems, statement-build misuse, value conversion failures and
//! driver errors are kept apart so callers can tell a broken setup from a broken query.

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, DatabaseError>;

/// Everything that can go wrong between configuration and a result row
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// Invalid or incomplete database configuration
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The statement could not be built from the configured metadata
    #[error("Data access error: {0}")]
    DataAccess(String),

    /// A configured database could not hand out a connection
    #[error("Connection to database '{database}' failed")]
    ConnectionFailed {
        database: String,
        #[source]
        source: Box<DatabaseError>,
    },

    /// An open connection failed or was already closed
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// A statement failed to run
    #[error("Query execution error: {0}")]
    QueryError(String),

    /// A value cannot be converted to its column type
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// Marshal or demarshal failure reported by a `DataMarshaller`
    #[error("Marshal error: {0}")]
    Marshal(String),

    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    /// Anything else, such as a panicked blocking task
    #[error("{0}")]
    Other(String),
}

impl DatabaseError {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        DatabaseError::Configuration {
            message: msg.into(),
            source: None,
        }
    }

    /// Create a configuration error wrapping its cause
    pub fn configuration_with_source(
        msg: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        DatabaseError::Configuration {
            message: msg.into(),
            source: Some(source),
        }
    }

    /// Create a statement-build error
    pub fn data_access<S: Into<String>>(msg: S) -> Self {
        DatabaseError::DataAccess(msg.into())
    }

    /// Wrap a failure to connect to the named database
    pub fn connection_failed(database: impl Into<String>, source: DatabaseError) -> Self {
        DatabaseError::ConnectionFailed {
            database: database.into(),
            source: Box::new(source),
        }
    }

    /// Create a new connection error (generic)
    pub fn connection<S: Into<String>>(msg: S) -> Self {
        DatabaseError::ConnectionError(msg.into())
    }

    /// Create a new query error
    pub fn query<S: Into<String>>(msg: S) -> Self {
        DatabaseError::QueryError(msg.into())
    }

    /// Create a new type mismatch error
    pub fn type_mismatch(expected: &str, actual: &str) -> Self {
        DatabaseError::TypeMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Create a marshal error
    pub fn marshal<S: Into<String>>(msg: S) -> Self {
        DatabaseError::Marshal(msg.into())
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        DatabaseError::Other(msg.into())
    }

    /// Whether this error came from configuration rather than from a query
    pub fn is_configuration(&self) -> bool {
        matches!(self, DatabaseError::Configuration { .. })
    }
}
