use async_trait::async_trait;
use futures::TryStreamExt;
use tracing::{Level, event};
use crate::core::{DbError, Result};
use crate::driver::{
    BatchOutcome, BatchStatement, BlockingConnection, DriverResult, ReactiveConnection, Row, SqlStatement,
    UpdateOutcome,
};

/// Executes statements for the operation pipeline.
///
/// The pipeline is written once against this async seam. The blocking
/// implementation completes every call immediately; the reactive one
/// suspends on driver I/O.
#[async_trait]
pub trait StatementRunner: Send {
    async fn update(&mut self, statement: SqlStatement) -> Result<UpdateOutcome>;

    async fn batch(&mut self, statement: BatchStatement) -> Result<BatchOutcome>;

    async fn query(&mut self, statement: SqlStatement) -> Result<Vec<Row>>;
}

fn wrap<T>(sql: &str, result: DriverResult<T>) -> Result<T> {
    result.map_err(|err| {
        event!(Level::ERROR, sql = %sql, error = %err, "statement failed");
        DbError::driver(sql, err)
    })
}

fn log_statement(sql: &str, rows: usize) {
    event!(Level::DEBUG, sql = %sql, rows, "executing statement");
}

pub struct BlockingRunner<'c> {
    connection: &'c mut dyn BlockingConnection,
}

impl<'c> BlockingRunner<'c> {
    pub fn new(connection: &'c mut dyn BlockingConnection) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl StatementRunner for BlockingRunner<'_> {
    async fn update(&mut self, statement: SqlStatement) -> Result<UpdateOutcome> {
        log_statement(&statement.sql, 1);
        let sql = statement.sql.clone();
        wrap(&sql, self.connection.execute_update(statement))
    }

    async fn batch(&mut self, statement: BatchStatement) -> Result<BatchOutcome> {
        log_statement(&statement.sql, statement.rows.len());
        let sql = statement.sql.clone();
        wrap(&sql, self.connection.execute_batch(statement))
    }

    async fn query(&mut self, statement: SqlStatement) -> Result<Vec<Row>> {
        log_statement(&statement.sql, 1);
        let sql = statement.sql.clone();
        wrap(&sql, self.connection.query(statement))
    }
}

pub struct ReactiveRunner<'c> {
    connection: &'c mut dyn ReactiveConnection,
}

impl<'c> ReactiveRunner<'c> {
    pub fn new(connection: &'c mut dyn ReactiveConnection) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl StatementRunner for ReactiveRunner<'_> {
    async fn update(&mut self, statement: SqlStatement) -> Result<UpdateOutcome> {
        log_statement(&statement.sql, 1);
        let sql = statement.sql.clone();
        let result = self.connection.execute_update(statement).await;
        wrap(&sql, result)
    }

    async fn batch(&mut self, statement: BatchStatement) -> Result<BatchOutcome> {
        log_statement(&statement.sql, statement.rows.len());
        let sql = statement.sql.clone();
        let result = self.connection.execute_batch(statement).await;
        wrap(&sql, result)
    }

    async fn query(&mut self, statement: SqlStatement) -> Result<Vec<Row>> {
        log_statement(&statement.sql, 1);
        let sql = statement.sql.clone();
        let result = self.connection.query_stream(statement).try_collect::<Vec<_>>().await;
        wrap(&sql, result)
    }
}
