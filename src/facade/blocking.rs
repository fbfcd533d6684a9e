use std::sync::Arc;
use futures::executor::block_on;
use crate::core::{DbError, Result};
use crate::driver::{BlockingConnection, ConnectionProvider};
use crate::model::EntityRef;
use crate::operation::{BlockingRunner, EntityOperations, StatementRunner};
use crate::query::PreparedQuery;

/// Runs operations on the calling thread against a borrowed connection.
///
/// The pipeline never suspends on anything but the connection itself, so
/// each call is driven to completion in place.
#[derive(Clone)]
pub struct BlockingRepositoryOperations {
    operations: Arc<EntityOperations>,
}

impl BlockingRepositoryOperations {
    pub fn new(operations: Arc<EntityOperations>) -> Self {
        Self { operations }
    }

    pub fn operations(&self) -> &Arc<EntityOperations> {
        &self.operations
    }

    pub fn persist(&self, connection: &mut dyn BlockingConnection, entity: EntityRef) -> Result<EntityRef> {
        let mut runner = BlockingRunner::new(connection);
        let mut ctx = self.operations.context(&mut runner);
        block_on(self.operations.persist(&mut ctx, entity))
    }

    pub fn persist_all(
        &self,
        connection: &mut dyn BlockingConnection,
        entities: Vec<EntityRef>,
    ) -> Result<Vec<EntityRef>> {
        let mut runner = BlockingRunner::new(connection);
        let mut ctx = self.operations.context(&mut runner);
        block_on(self.operations.persist_all(&mut ctx, entities))
    }

    pub fn update(&self, connection: &mut dyn BlockingConnection, entity: EntityRef) -> Result<EntityRef> {
        let mut runner = BlockingRunner::new(connection);
        let mut ctx = self.operations.context(&mut runner);
        block_on(self.operations.update(&mut ctx, entity))
    }

    pub fn update_all(
        &self,
        connection: &mut dyn BlockingConnection,
        entities: Vec<EntityRef>,
    ) -> Result<Vec<EntityRef>> {
        let mut runner = BlockingRunner::new(connection);
        let mut ctx = self.operations.context(&mut runner);
        block_on(self.operations.update_all(&mut ctx, entities))
    }

    pub fn delete(&self, connection: &mut dyn BlockingConnection, entity: EntityRef) -> Result<u64> {
        let mut runner = BlockingRunner::new(connection);
        let mut ctx = self.operations.context(&mut runner);
        block_on(self.operations.delete(&mut ctx, entity))
    }

    pub fn delete_all(&self, connection: &mut dyn BlockingConnection, entities: Vec<EntityRef>) -> Result<u64> {
        let mut runner = BlockingRunner::new(connection);
        let mut ctx = self.operations.context(&mut runner);
        block_on(self.operations.delete_all(&mut ctx, entities))
    }

    pub fn find_all(&self, connection: &mut dyn BlockingConnection, prepared: PreparedQuery) -> Result<Vec<EntityRef>> {
        let mut runner = BlockingRunner::new(connection);
        let mut ctx = self.operations.context(&mut runner);
        block_on(self.operations.find_all(&mut ctx, prepared))
    }

    pub fn find_one(
        &self,
        connection: &mut dyn BlockingConnection,
        prepared: PreparedQuery,
    ) -> Result<Option<EntityRef>> {
        let mut runner = BlockingRunner::new(connection);
        let mut ctx = self.operations.context(&mut runner);
        block_on(self.operations.find_one(&mut ctx, prepared))
    }

    /// Rows are fetched up front; entities are mapped and post-load events
    /// fired as the iterator advances.
    pub fn find_stream<'a>(
        &'a self,
        connection: &mut dyn BlockingConnection,
        mut prepared: PreparedQuery,
    ) -> Result<impl Iterator<Item = Result<EntityRef>> + use<'a>> {
        let entity = Arc::clone(prepared.stored().entity());
        let statement = self.operations.prepare_statement(&mut prepared, false)?;
        let mut runner = BlockingRunner::new(connection);
        let rows = block_on(runner.query(statement))?;
        Ok(rows.into_iter().map(move |row| self.operations.load(&entity, &row)))
    }

    pub fn exists(&self, connection: &mut dyn BlockingConnection, prepared: PreparedQuery) -> Result<bool> {
        let mut runner = BlockingRunner::new(connection);
        let mut ctx = self.operations.context(&mut runner);
        block_on(self.operations.exists(&mut ctx, prepared))
    }

    pub fn execute_update(&self, connection: &mut dyn BlockingConnection, prepared: PreparedQuery) -> Result<u64> {
        let mut runner = BlockingRunner::new(connection);
        let mut ctx = self.operations.context(&mut runner);
        block_on(self.operations.execute_update(&mut ctx, prepared))
    }
}

/// Asynchronous façade over blocking connections.
///
/// Each call moves to tokio's blocking pool and keeps one worker thread and
/// one borrowed connection for its whole duration.
pub struct AsyncBlockingOperations<P: ConnectionProvider> {
    blocking: BlockingRepositoryOperations,
    provider: Arc<P>,
}

impl<P: ConnectionProvider> AsyncBlockingOperations<P> {
    pub fn new(operations: Arc<EntityOperations>, provider: Arc<P>) -> Self {
        Self {
            blocking: BlockingRepositoryOperations::new(operations),
            provider,
        }
    }

    async fn offload<T, F>(&self, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnMut(&BlockingRepositoryOperations, &mut dyn BlockingConnection) -> Result<T> + Send + 'static,
    {
        let blocking = self.blocking.clone();
        let provider = Arc::clone(&self.provider);
        let mut work = work;
        tokio::task::spawn_blocking(move || {
            provider.with_connection(&mut |connection: &mut dyn BlockingConnection| work(&blocking, connection))
        })
        .await
        .map_err(|e| DbError::data_access(format!("Blocking worker failed: {}", e)))?
    }

    pub async fn persist(&self, entity: EntityRef) -> Result<EntityRef> {
        self.offload(move |ops, connection| ops.persist(connection, entity.clone()))
            .await
    }

    pub async fn persist_all(&self, entities: Vec<EntityRef>) -> Result<Vec<EntityRef>> {
        self.offload(move |ops, connection| ops.persist_all(connection, entities.clone()))
            .await
    }

    pub async fn update(&self, entity: EntityRef) -> Result<EntityRef> {
        self.offload(move |ops, connection| ops.update(connection, entity.clone()))
            .await
    }

    pub async fn update_all(&self, entities: Vec<EntityRef>) -> Result<Vec<EntityRef>> {
        self.offload(move |ops, connection| ops.update_all(connection, entities.clone()))
            .await
    }

    pub async fn delete(&self, entity: EntityRef) -> Result<u64> {
        self.offload(move |ops, connection| ops.delete(connection, entity.clone()))
            .await
    }

    pub async fn delete_all(&self, entities: Vec<EntityRef>) -> Result<u64> {
        self.offload(move |ops, connection| ops.delete_all(connection, entities.clone()))
            .await
    }

    pub async fn find_all(&self, prepared: PreparedQuery) -> Result<Vec<EntityRef>> {
        self.offload(move |ops, connection| ops.find_all(connection, prepared.clone()))
            .await
    }

    pub async fn find_one(&self, prepared: PreparedQuery) -> Result<Option<EntityRef>> {
        self.offload(move |ops, connection| ops.find_one(connection, prepared.clone()))
            .await
    }

    pub async fn exists(&self, prepared: PreparedQuery) -> Result<bool> {
        self.offload(move |ops, connection| ops.exists(connection, prepared.clone()))
            .await
    }

    pub async fn execute_update(&self, prepared: PreparedQuery) -> Result<u64> {
        self.offload(move |ops, connection| ops.execute_update(connection, prepared.clone()))
            .await
    }
}
