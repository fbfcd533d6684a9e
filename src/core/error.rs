use thiserror::Error;

/// Boxed source error carried by data-access failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum DbError {
    /// Low-level driver failure, with the SQL that was being executed when known.
    #[error("Error executing SQL{}: {message}", sql_suffix(.sql))]
    DataAccess {
        message: String,
        sql: Option<String>,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Execute update returned unexpected row count. Expected: {expected} got: {actual}")]
    OptimisticLock {
        expected: u64,
        actual: u64,
        sql: Option<String>,
    },

    #[error("Parameter resolution error: {0}")]
    ParameterResolution(String),

    #[error("Cannot bind transient entity '{entity}' as parameter '{parameter}': identity is not assigned")]
    TransientEntity { entity: String, parameter: String },

    #[error("Entity '{0}' has no identity")]
    MissingIdentity(String),

    #[error("Failed to generate ID for entity: {0}")]
    GeneratedId(String),

    #[error("Query construction error: {0}")]
    QueryConstruction(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Lock error: {0}")]
    Lock(String),
}

/// Coarse classification used by callers deciding whether to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Driver or execution failure. Not retried by this layer.
    DataAccess,
    /// Affected-row count differed from expectation; retry with a fresh read.
    OptimisticLock,
    /// Metadata or caller bug; never retryable.
    Programming,
}

pub type Result<T> = std::result::Result<T, DbError>;

fn sql_suffix(sql: &Option<String>) -> String {
    match sql {
        Some(sql) => format!(" [{}]", sql),
        None => String::new(),
    }
}

impl DbError {
    pub fn data_access(message: impl Into<String>) -> Self {
        Self::DataAccess {
            message: message.into(),
            sql: None,
            source: None,
        }
    }

    /// Wraps a driver error together with the SQL text that failed.
    pub fn driver(sql: &str, source: impl Into<BoxError>) -> Self {
        let source = source.into();
        Self::DataAccess {
            message: source.to_string(),
            sql: Some(sql.to_string()),
            source: Some(source),
        }
    }

    /// Attaches the executed SQL to errors that carry one and do not have it yet.
    pub fn with_sql(self, statement: &str) -> Self {
        match self {
            Self::DataAccess {
                message,
                sql: None,
                source,
            } => Self::DataAccess {
                message,
                sql: Some(statement.to_string()),
                source,
            },
            Self::OptimisticLock {
                expected,
                actual,
                sql: None,
            } => Self::OptimisticLock {
                expected,
                actual,
                sql: Some(statement.to_string()),
            },
            other => other,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DataAccess { .. } | Self::Lock(_) => ErrorKind::DataAccess,
            Self::OptimisticLock { .. } => ErrorKind::OptimisticLock,
            Self::ParameterResolution(_)
            | Self::TransientEntity { .. }
            | Self::MissingIdentity(_)
            | Self::GeneratedId(_)
            | Self::QueryConstruction(_)
            | Self::Configuration(_)
            | Self::Json(_) => ErrorKind::Programming,
        }
    }

    /// True for everything a caller sees as a data-access failure. Optimistic
    /// lock conflicts are reported separately.
    pub fn is_data_access(&self) -> bool {
        self.kind() != ErrorKind::OptimisticLock
    }

    pub fn is_optimistic_lock(&self) -> bool {
        self.kind() == ErrorKind::OptimisticLock
    }

    pub fn is_programming_error(&self) -> bool {
        self.kind() == ErrorKind::Programming
    }

    /// SQL text attached to the error, if any.
    pub fn sql(&self) -> Option<&str> {
        match self {
            Self::DataAccess { sql, .. } | Self::OptimisticLock { sql, .. } => sql.as_deref(),
            _ => None,
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for DbError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::Lock(err.to_string())
    }
}
