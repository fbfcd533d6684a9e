#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use sqlentity::driver::{
    BatchOutcome, BatchStatement, BlockingConnection, ConnectionProvider, DriverResult, ReactiveConnection, Row,
    SqlStatement, UpdateOutcome,
};
use sqlentity::model::{Association, AutoPopulated, Cascade, Relation};
use sqlentity::runtime::EventListenerRegistry;
use sqlentity::{
    DataType, Dialect, EntityOperations, EntityRegistry, OperationsConfig, PersistentEntity, PersistentProperty,
    Result, Value,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Author, Genre, Book and Chapter with generated integer identities.
///
/// Book owns two many-to-one references to Author (`author`, `editor`), a
/// many-to-many `genres` through `book_genre` and a one-to-many `chapters`
/// mapped by `Chapter.book`. Book carries an optimistic-lock version.
pub fn registry() -> EntityRegistry {
    let mut registry = EntityRegistry::new();
    registry.register(
        PersistentEntity::new("Author", "author")
            .with_identity(PersistentProperty::new("id", DataType::Integer).generated())
            .with_property(PersistentProperty::new("name", DataType::Text)),
    );
    registry.register(
        PersistentEntity::new("Genre", "genre")
            .with_identity(PersistentProperty::new("id", DataType::Integer).generated())
            .with_property(PersistentProperty::new("name", DataType::Text)),
    );
    registry.register(
        PersistentEntity::new("Book", "book")
            .with_identity(PersistentProperty::new("id", DataType::Integer).generated())
            .with_property(PersistentProperty::new("title", DataType::Text))
            .with_property(PersistentProperty::new("version", DataType::Integer).auto_populated(AutoPopulated::Version))
            .with_association(Association::new("author", Relation::ManyToOne, "Author").cascade(Cascade::PERSIST))
            .with_association(Association::new("editor", Relation::ManyToOne, "Author").cascade(Cascade::PERSIST))
            .with_association(Association::new("genres", Relation::ManyToMany, "Genre").cascade(Cascade::ALL))
            .with_association(
                Association::new("chapters", Relation::OneToMany, "Chapter")
                    .mapped_by("book")
                    .cascade(Cascade::ALL),
            ),
    );
    registry.register(
        PersistentEntity::new("Chapter", "chapter")
            .with_identity(PersistentProperty::new("id", DataType::Integer).generated())
            .with_property(PersistentProperty::new("title", DataType::Text))
            .with_association(Association::new("book", Relation::ManyToOne, "Book")),
    );
    registry
}

pub fn operations(dialect: Dialect) -> Arc<EntityOperations> {
    operations_with(OperationsConfig::new(dialect), EventListenerRegistry::new())
}

pub fn operations_with(config: OperationsConfig, events: EventListenerRegistry) -> Arc<EntityOperations> {
    Arc::new(
        EntityOperations::builder(config, registry())
            .events(events)
            .build()
            .unwrap(),
    )
}

pub fn entity(operations: &EntityOperations, name: &str) -> Arc<PersistentEntity> {
    operations.registry().require(name).unwrap()
}

pub fn book_row(id: i64, title: &str, version: i64, author: Option<i64>) -> Row {
    Row::new(
        vec!["id".into(), "title".into(), "version".into(), "author_id".into()],
        vec![
            Value::Integer(id),
            Value::from(title),
            Value::Integer(version),
            author.map(Value::Integer).unwrap_or(Value::Null),
        ],
    )
}

#[derive(Debug, Clone, PartialEq)]
pub enum Executed {
    Update(SqlStatement),
    Batch(BatchStatement),
    Query(SqlStatement),
}

impl Executed {
    pub fn sql(&self) -> &str {
        match self {
            Self::Update(statement) | Self::Query(statement) => &statement.sql,
            Self::Batch(batch) => &batch.sql,
        }
    }
}

/// Records every statement and answers with scripted results.
///
/// Generated keys count up from 1 across the whole connection.
#[derive(Debug, Default)]
pub struct RecordingConnection {
    pub executed: Vec<Executed>,
    pub rows: Vec<Row>,
    pub affected: Option<u64>,
    pub fail_on: Option<String>,
    next_key: i64,
}

impl RecordingConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every write reports `rows` affected rows.
    pub fn affecting(rows: u64) -> Self {
        Self {
            affected: Some(rows),
            ..Self::default()
        }
    }

    pub fn returning(rows: Vec<Row>) -> Self {
        Self {
            rows,
            ..Self::default()
        }
    }

    /// Fail any statement whose SQL contains `fragment`.
    pub fn failing_on(fragment: &str) -> Self {
        Self {
            fail_on: Some(fragment.to_string()),
            ..Self::default()
        }
    }

    pub fn statements(&self) -> Vec<&str> {
        self.executed.iter().map(Executed::sql).collect()
    }

    pub fn updates(&self) -> Vec<&SqlStatement> {
        self.executed
            .iter()
            .filter_map(|e| match e {
                Executed::Update(statement) => Some(statement),
                _ => None,
            })
            .collect()
    }

    pub fn batches(&self) -> Vec<&BatchStatement> {
        self.executed
            .iter()
            .filter_map(|e| match e {
                Executed::Batch(batch) => Some(batch),
                _ => None,
            })
            .collect()
    }

    pub fn queries(&self) -> Vec<&SqlStatement> {
        self.executed
            .iter()
            .filter_map(|e| match e {
                Executed::Query(statement) => Some(statement),
                _ => None,
            })
            .collect()
    }

    fn check(&self, sql: &str) -> DriverResult<()> {
        match &self.fail_on {
            Some(fragment) if sql.contains(fragment.as_str()) => anyhow::bail!("constraint violation"),
            _ => Ok(()),
        }
    }

    fn key(&mut self) -> Value {
        self.next_key += 1;
        Value::Integer(self.next_key)
    }

    fn record_update(&mut self, statement: SqlStatement) -> DriverResult<UpdateOutcome> {
        self.check(&statement.sql)?;
        let mut outcome = UpdateOutcome::rows(self.affected.unwrap_or(1));
        if statement.generated_key.is_some() {
            let key = self.key();
            outcome = outcome.with_key(key);
        }
        self.executed.push(Executed::Update(statement));
        Ok(outcome)
    }

    fn record_batch(&mut self, statement: BatchStatement) -> DriverResult<BatchOutcome> {
        self.check(&statement.sql)?;
        let mut outcome = BatchOutcome {
            rows_affected: vec![self.affected.unwrap_or(1); statement.rows.len()],
            generated_keys: Vec::new(),
        };
        if statement.generated_key.is_some() {
            for _ in 0..statement.rows.len() {
                let key = self.key();
                outcome.generated_keys.push(key);
            }
        }
        self.executed.push(Executed::Batch(statement));
        Ok(outcome)
    }

    fn record_query(&mut self, statement: SqlStatement) -> DriverResult<Vec<Row>> {
        self.check(&statement.sql)?;
        self.executed.push(Executed::Query(statement));
        Ok(self.rows.clone())
    }
}

impl BlockingConnection for RecordingConnection {
    fn execute_update(&mut self, statement: SqlStatement) -> DriverResult<UpdateOutcome> {
        self.record_update(statement)
    }

    fn execute_batch(&mut self, statement: BatchStatement) -> DriverResult<BatchOutcome> {
        self.record_batch(statement)
    }

    fn query(&mut self, statement: SqlStatement) -> DriverResult<Vec<Row>> {
        self.record_query(statement)
    }
}

#[async_trait]
impl ReactiveConnection for RecordingConnection {
    async fn execute_update(&mut self, statement: SqlStatement) -> DriverResult<UpdateOutcome> {
        self.record_update(statement)
    }

    async fn execute_batch(&mut self, statement: BatchStatement) -> DriverResult<BatchOutcome> {
        self.record_batch(statement)
    }

    fn query_stream<'a>(&'a mut self, statement: SqlStatement) -> BoxStream<'a, DriverResult<Row>> {
        match self.record_query(statement) {
            Ok(rows) => stream::iter(rows.into_iter().map(Ok)).boxed(),
            Err(err) => stream::once(async move { Err::<Row, anyhow::Error>(err) }).boxed(),
        }
    }
}

/// Lends one recording connection to every call.
#[derive(Default)]
pub struct SharedConnection {
    pub connection: Mutex<RecordingConnection>,
}

impl SharedConnection {
    pub fn new(connection: RecordingConnection) -> Self {
        Self {
            connection: Mutex::new(connection),
        }
    }
}

impl ConnectionProvider for SharedConnection {
    fn with_connection<R>(&self, work: &mut dyn FnMut(&mut dyn BlockingConnection) -> Result<R>) -> Result<R> {
        let mut connection = self.connection.lock()?;
        work(&mut *connection)
    }
}
