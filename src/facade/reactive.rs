use std::sync::Arc;
use futures::stream::{self, BoxStream, StreamExt};
use tracing::{Level, event};
use crate::core::{DbError, Result};
use crate::driver::ReactiveConnection;
use crate::model::EntityRef;
use crate::operation::{EntityOperations, ReactiveRunner};
use crate::query::PreparedQuery;

/// Operations over a non-blocking connection.
///
/// Every call suspends only inside the driver. One statement is in flight
/// per call, since the call holds the connection exclusively.
#[derive(Clone)]
pub struct ReactiveRepositoryOperations {
    operations: Arc<EntityOperations>,
}

impl ReactiveRepositoryOperations {
    pub fn new(operations: Arc<EntityOperations>) -> Self {
        Self { operations }
    }

    pub fn operations(&self) -> &Arc<EntityOperations> {
        &self.operations
    }

    pub async fn persist(&self, connection: &mut dyn ReactiveConnection, entity: EntityRef) -> Result<EntityRef> {
        let mut runner = ReactiveRunner::new(connection);
        let mut ctx = self.operations.context(&mut runner);
        self.operations.persist(&mut ctx, entity).await
    }

    pub async fn persist_all(
        &self,
        connection: &mut dyn ReactiveConnection,
        entities: Vec<EntityRef>,
    ) -> Result<Vec<EntityRef>> {
        let mut runner = ReactiveRunner::new(connection);
        let mut ctx = self.operations.context(&mut runner);
        self.operations.persist_all(&mut ctx, entities).await
    }

    pub async fn update(&self, connection: &mut dyn ReactiveConnection, entity: EntityRef) -> Result<EntityRef> {
        let mut runner = ReactiveRunner::new(connection);
        let mut ctx = self.operations.context(&mut runner);
        self.operations.update(&mut ctx, entity).await
    }

    pub async fn update_all(
        &self,
        connection: &mut dyn ReactiveConnection,
        entities: Vec<EntityRef>,
    ) -> Result<Vec<EntityRef>> {
        let mut runner = ReactiveRunner::new(connection);
        let mut ctx = self.operations.context(&mut runner);
        self.operations.update_all(&mut ctx, entities).await
    }

    pub async fn delete(&self, connection: &mut dyn ReactiveConnection, entity: EntityRef) -> Result<u64> {
        let mut runner = ReactiveRunner::new(connection);
        let mut ctx = self.operations.context(&mut runner);
        self.operations.delete(&mut ctx, entity).await
    }

    pub async fn delete_all(&self, connection: &mut dyn ReactiveConnection, entities: Vec<EntityRef>) -> Result<u64> {
        let mut runner = ReactiveRunner::new(connection);
        let mut ctx = self.operations.context(&mut runner);
        self.operations.delete_all(&mut ctx, entities).await
    }

    pub async fn find_all(
        &self,
        connection: &mut dyn ReactiveConnection,
        prepared: PreparedQuery,
    ) -> Result<Vec<EntityRef>> {
        let mut runner = ReactiveRunner::new(connection);
        let mut ctx = self.operations.context(&mut runner);
        self.operations.find_all(&mut ctx, prepared).await
    }

    pub async fn find_one(
        &self,
        connection: &mut dyn ReactiveConnection,
        prepared: PreparedQuery,
    ) -> Result<Option<EntityRef>> {
        let mut runner = ReactiveRunner::new(connection);
        let mut ctx = self.operations.context(&mut runner);
        self.operations.find_one(&mut ctx, prepared).await
    }

    /// Entities as the driver yields rows. Dropping the stream cancels the
    /// query and releases the driver's statement.
    pub fn find_stream<'a>(
        &'a self,
        connection: &'a mut dyn ReactiveConnection,
        mut prepared: PreparedQuery,
    ) -> BoxStream<'a, Result<EntityRef>> {
        let entity = Arc::clone(prepared.stored().entity());
        let statement = match self.operations.prepare_statement(&mut prepared, false) {
            Ok(statement) => statement,
            Err(err) => return stream::once(async move { Err::<EntityRef, DbError>(err) }).boxed(),
        };

        let sql = statement.sql.clone();
        event!(Level::DEBUG, sql = %sql, entity = %entity.name(), "streaming query");
        connection
            .query_stream(statement)
            .map(move |row| {
                let row = row.map_err(|err| {
                    event!(Level::ERROR, sql = %sql, error = %err, "statement failed");
                    DbError::driver(&sql, err)
                })?;
                self.operations.load(&entity, &row)
            })
            .boxed()
    }

    pub async fn exists(&self, connection: &mut dyn ReactiveConnection, prepared: PreparedQuery) -> Result<bool> {
        let mut runner = ReactiveRunner::new(connection);
        let mut ctx = self.operations.context(&mut runner);
        self.operations.exists(&mut ctx, prepared).await
    }

    pub async fn execute_update(&self, connection: &mut dyn ReactiveConnection, prepared: PreparedQuery) -> Result<u64> {
        let mut runner = ReactiveRunner::new(connection);
        let mut ctx = self.operations.context(&mut runner);
        self.operations.execute_update(&mut ctx, prepared).await
    }
}
