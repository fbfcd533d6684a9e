//! Entity operation runtime shared by the blocking and reactive façades.

pub mod cascade;
pub mod context;
pub mod entity;
pub mod find;
pub mod lock;
pub mod row_state;
pub mod runner;

use std::sync::Arc;
use crate::binder::ParameterBinder;
use crate::config::OperationsConfig;
use crate::core::{DbError, Result};
use crate::model::{EntityRegistry, PersistentEntity};
use crate::query::{OperationKind, QueryKey, StatementCompiler, StoredQuery, StoredQueryCache};
use crate::runtime::{AutoPopulator, DefaultAutoPopulator, EventListenerRegistry};
use crate::sql::{DefaultSqlBuilder, SqlBuilder};

pub use cascade::{CascadeAction, CascadePhase};
pub use context::{OperationContext, PersistedSet};
pub use lock::verify;
pub use row_state::EntityRowState;
pub use runner::{BlockingRunner, ReactiveRunner, StatementRunner};

/// Everything an operation needs besides the connection.
///
/// One instance serves any number of concurrent calls; per-call state lives
/// in [`OperationContext`].
pub struct EntityOperations {
    config: OperationsConfig,
    registry: Arc<EntityRegistry>,
    builder: Arc<dyn SqlBuilder>,
    cache: StoredQueryCache,
    events: EventListenerRegistry,
    auto_populator: Arc<dyn AutoPopulator>,
}

impl EntityOperations {
    pub fn builder(config: OperationsConfig, registry: EntityRegistry) -> EntityOperationsBuilder {
        EntityOperationsBuilder {
            config,
            registry: Arc::new(registry),
            sql_builder: None,
            auto_populator: None,
            events: None,
        }
    }

    pub fn config(&self) -> &OperationsConfig {
        &self.config
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &StoredQueryCache {
        &self.cache
    }

    pub fn events(&self) -> &EventListenerRegistry {
        &self.events
    }

    pub fn sql_builder(&self) -> &dyn SqlBuilder {
        self.builder.as_ref()
    }

    pub fn context<'r>(&self, runner: &'r mut dyn StatementRunner) -> OperationContext<'r> {
        OperationContext::new(self.config.repository_type.clone(), self.config.dialect, runner)
    }

    pub(crate) fn binder(&self) -> ParameterBinder<'_> {
        ParameterBinder::new(self.config.dialect, self.auto_populator.as_ref()).trace(self.config.trace_bindings)
    }

    pub(crate) fn compiler(&self) -> StatementCompiler<'_> {
        StatementCompiler::new(self.builder.as_ref())
    }

    pub(crate) fn stored_query(
        &self,
        repository_type: &str,
        entity: &Arc<PersistentEntity>,
        kind: OperationKind,
    ) -> Result<Arc<StoredQuery>> {
        let key = QueryKey::new(repository_type, entity.name(), kind.clone());
        self.cache.resolve(key, || match kind {
            OperationKind::Insert => self.builder.build_insert(entity),
            OperationKind::Update => self.builder.build_update(entity),
            OperationKind::Delete => self.builder.build_delete(entity),
            OperationKind::JoinInsert(name) => {
                let association = entity.association(&name).ok_or_else(|| {
                    DbError::QueryConstruction(format!(
                        "Entity '{}' has no association '{}'",
                        entity.name(),
                        name
                    ))
                })?;
                let target = self.registry.require(&association.target)?;
                self.builder.build_join_table_insert(entity, association, &target)
            }
            OperationKind::Query(name) => Err(DbError::QueryConstruction(format!(
                "Query '{}' must be supplied as a prepared query",
                name
            ))),
        })
    }
}

pub struct EntityOperationsBuilder {
    config: OperationsConfig,
    registry: Arc<EntityRegistry>,
    sql_builder: Option<Arc<dyn SqlBuilder>>,
    auto_populator: Option<Arc<dyn AutoPopulator>>,
    events: Option<EventListenerRegistry>,
}

impl EntityOperationsBuilder {
    /// Replace the dialect's default SQL builder
    pub fn sql_builder(mut self, builder: Arc<dyn SqlBuilder>) -> Self {
        self.sql_builder = Some(builder);
        self
    }

    pub fn auto_populator(mut self, populator: Arc<dyn AutoPopulator>) -> Self {
        self.auto_populator = Some(populator);
        self
    }

    /// Listeners to use; the auto-population listener is prepended
    pub fn events(mut self, events: EventListenerRegistry) -> Self {
        self.events = Some(events);
        self
    }

    pub fn build(self) -> Result<EntityOperations> {
        self.config.validate().map_err(DbError::Configuration)?;

        let builder = self
            .sql_builder
            .unwrap_or_else(|| Arc::new(DefaultSqlBuilder::new(self.config.dialect)) as Arc<dyn SqlBuilder>);
        if builder.dialect() != self.config.dialect {
            return Err(DbError::Configuration(format!(
                "SQL builder targets {} but the configured dialect is {}",
                builder.dialect(),
                self.config.dialect
            )));
        }

        let auto_populator = self
            .auto_populator
            .unwrap_or_else(|| Arc::new(DefaultAutoPopulator) as Arc<dyn AutoPopulator>);
        let mut events = EventListenerRegistry::with_auto_population(Arc::clone(&auto_populator));
        if let Some(custom) = self.events {
            events.extend(custom);
        }

        Ok(EntityOperations {
            config: self.config,
            registry: self.registry,
            builder,
            cache: StoredQueryCache::new(),
            events,
            auto_populator,
        })
    }
}
