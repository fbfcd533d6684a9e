//! Driver seams.
//!
//! The runtime never opens connections. Callers hand it a borrowed blocking
//! or reactive connection; drivers report failures as [`anyhow::Error`] and
//! the runtime wraps them with the SQL that failed.

use async_trait::async_trait;
use futures::stream::BoxStream;
use crate::core::{Result, Value};

pub type DriverResult<T> = anyhow::Result<T>;

/// One statement with its positional values.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub sql: String,
    pub parameters: Vec<Value>,
    /// Column whose generated values the driver should return.
    pub generated_key: Option<String>,
}

impl SqlStatement {
    pub fn new(sql: impl Into<String>, parameters: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            parameters,
            generated_key: None,
        }
    }

    pub fn returning(mut self, column: Option<String>) -> Self {
        self.generated_key = column;
        self
    }
}

/// One statement executed for several parameter rows as a native batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchStatement {
    pub sql: String,
    pub rows: Vec<Vec<Value>>,
    pub generated_key: Option<String>,
}

impl BatchStatement {
    pub fn new(sql: impl Into<String>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            sql: sql.into(),
            rows,
            generated_key: None,
        }
    }

    pub fn returning(mut self, column: Option<String>) -> Self {
        self.generated_key = column;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateOutcome {
    pub rows_affected: u64,
    pub generated_keys: Vec<Value>,
}

impl UpdateOutcome {
    pub fn rows(rows_affected: u64) -> Self {
        Self {
            rows_affected,
            generated_keys: Vec::new(),
        }
    }

    pub fn with_key(mut self, key: impl Into<Value>) -> Self {
        self.generated_keys.push(key.into());
        self
    }
}

/// Per-row counts and generated keys, both in submission order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    pub rows_affected: Vec<u64>,
    pub generated_keys: Vec<Value>,
}

impl BatchOutcome {
    pub fn total(&self) -> u64 {
        self.rows_affected.iter().sum()
    }
}

/// A result row addressed by column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    pub columns: Vec<String>,
    pub values: Vec<Value>,
}

impl Row {
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    /// Case-insensitive lookup.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
            .and_then(|index| self.values.get(index))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

pub trait BlockingConnection: Send {
    fn execute_update(&mut self, statement: SqlStatement) -> DriverResult<UpdateOutcome>;

    fn execute_batch(&mut self, statement: BatchStatement) -> DriverResult<BatchOutcome>;

    fn query(&mut self, statement: SqlStatement) -> DriverResult<Vec<Row>>;
}

/// Non-blocking driver. The stream returned by `query_stream` owns the open
/// statement; dropping it must release the statement.
#[async_trait]
pub trait ReactiveConnection: Send {
    async fn execute_update(&mut self, statement: SqlStatement) -> DriverResult<UpdateOutcome>;

    async fn execute_batch(&mut self, statement: BatchStatement) -> DriverResult<BatchOutcome>;

    fn query_stream<'a>(&'a mut self, statement: SqlStatement) -> BoxStream<'a, DriverResult<Row>>;
}

/// Lends a blocking connection for the duration of one call.
pub trait ConnectionProvider: Send + Sync + 'static {
    fn with_connection<R>(&self, work: &mut dyn FnMut(&mut dyn BlockingConnection) -> Result<R>) -> Result<R>;
}
