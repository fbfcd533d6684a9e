use std::sync::Arc;
use tracing::{Instrument, info_span};
use crate::core::{Result, Value};
use crate::driver::{Row, SqlStatement};
use crate::model::{EntityRef, PersistentEntity};
use crate::query::PreparedQuery;
use crate::runtime::EventType;
use super::{EntityOperations, OperationContext, verify};

impl EntityOperations {
    /// Resolves, compiles and binds `prepared`, recording the final SQL on it.
    ///
    /// Every resolution and binding error surfaces here, before anything runs.
    pub fn prepare_statement(&self, prepared: &mut PreparedQuery, single_result: bool) -> Result<SqlStatement> {
        let stored = Arc::clone(prepared.stored());
        let binder = self.binder();
        let root = prepared.root_entity();

        let previous = binder.collect_previous(&stored, root, prepared.arguments())?;
        let resolved = binder.resolve(&stored, root, prepared.arguments(), &previous)?;
        let sql = self
            .compiler()
            .compile(&stored, &resolved, prepared.page(), single_result)?;
        let parameters = binder.bind(&stored, &resolved)?;

        prepared.set_sql(sql.clone());
        Ok(SqlStatement::new(sql, parameters))
    }

    pub async fn find_all(&self, ctx: &mut OperationContext<'_>, mut prepared: PreparedQuery) -> Result<Vec<EntityRef>> {
        let entity = Arc::clone(prepared.stored().entity());
        let statement = self.prepare_statement(&mut prepared, false)?;
        let span = info_span!("entity.find_all", entity = %entity.name());
        let rows = ctx.runner.query(statement).instrument(span).await?;
        rows.iter().map(|row| self.load(&entity, row)).collect()
    }

    /// First matching entity; the page, if any, is clamped to one row.
    pub async fn find_one(&self, ctx: &mut OperationContext<'_>, mut prepared: PreparedQuery) -> Result<Option<EntityRef>> {
        let entity = Arc::clone(prepared.stored().entity());
        let statement = self.prepare_statement(&mut prepared, true)?;
        let span = info_span!("entity.find_one", entity = %entity.name());
        let rows = ctx.runner.query(statement).instrument(span).await?;
        rows.first().map(|row| self.load(&entity, row)).transpose()
    }

    pub async fn exists(&self, ctx: &mut OperationContext<'_>, mut prepared: PreparedQuery) -> Result<bool> {
        let statement = self.prepare_statement(&mut prepared, true)?;
        let span = info_span!("entity.exists", entity = %prepared.stored().entity().name());
        let rows = ctx.runner.query(statement).instrument(span).await?;
        Ok(!rows.is_empty())
    }

    /// Bulk update or delete. A query flagged optimistic must touch exactly one row.
    pub async fn execute_update(&self, ctx: &mut OperationContext<'_>, mut prepared: PreparedQuery) -> Result<u64> {
        let statement = self.prepare_statement(&mut prepared, false)?;
        let span = info_span!("entity.execute_update", entity = %prepared.stored().entity().name());
        let outcome = ctx.runner.update(statement).instrument(span).await?;

        if prepared.stored().is_optimistic_lock() && self.config.optimistic_locking {
            verify(1, outcome.rows_affected).map_err(|e| e.with_sql(prepared.sql()))?;
        }
        Ok(outcome.rows_affected)
    }

    /// Maps a row and fires post-load listeners.
    pub(crate) fn load(&self, entity: &Arc<PersistentEntity>, row: &Row) -> Result<EntityRef> {
        let instance = self.map_row(entity, row)?;
        self.events.fire_post(EventType::PostLoad, &instance)?;
        Ok(instance)
    }

    /// Builds an entity from a row by column name. Owning associations become
    /// identity-only instances of their target.
    pub fn map_row(&self, entity: &Arc<PersistentEntity>, row: &Row) -> Result<EntityRef> {
        let instance = EntityRef::new(entity);
        for property in entity.all_properties() {
            if let Some(value) = row.get(&property.column) {
                instance.set(&property.name, property.data_type.coerce(value.clone())?);
            }
        }
        for association in entity.associations().iter().filter(|a| !a.is_foreign_key()) {
            let Some(key) = row.get(&association.column).filter(|v| !v.is_null()) else {
                continue;
            };
            let target = self.registry.require(&association.target)?;
            let key = match target.identity() {
                Some(identity) => identity.data_type.coerce(key.clone())?,
                None => key.clone(),
            };
            let stub = EntityRef::new(&target);
            stub.set_id(key);
            instance.set(&association.name, Value::Entity(stub));
        }
        Ok(instance)
    }
}
