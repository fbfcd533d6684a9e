use std::sync::Arc;
use tracing::{Instrument, Level, event, info_span};
use crate::core::{DbError, Result, Value};
use crate::dialect::BatchKind;
use crate::driver::{BatchStatement, SqlStatement};
use crate::model::EntityRef;
use crate::query::{OperationKind, StoredQuery};
use crate::runtime::{EventOutcome, EventType};
use super::{CascadeAction, CascadePhase, EntityOperations, EntityRowState, OperationContext, verify};

/// Entity write performed by the row pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteKind {
    Persist,
    Update,
    Delete,
}

impl WriteKind {
    fn operation(self) -> OperationKind {
        match self {
            Self::Persist => OperationKind::Insert,
            Self::Update => OperationKind::Update,
            Self::Delete => OperationKind::Delete,
        }
    }

    fn pre_event(self) -> EventType {
        match self {
            Self::Persist => EventType::PrePersist,
            Self::Update => EventType::PreUpdate,
            Self::Delete => EventType::PreRemove,
        }
    }

    fn post_event(self) -> EventType {
        match self {
            Self::Persist => EventType::PostPersist,
            Self::Update => EventType::PostUpdate,
            Self::Delete => EventType::PostRemove,
        }
    }

    fn batch_kind(self) -> BatchKind {
        match self {
            Self::Persist => BatchKind::Insert,
            Self::Update => BatchKind::Update,
            Self::Delete => BatchKind::Delete,
        }
    }

    fn cascade_action(self) -> Option<CascadeAction> {
        match self {
            Self::Persist => Some(CascadeAction::Persist),
            Self::Update => Some(CascadeAction::Update),
            Self::Delete => None,
        }
    }
}

/// Bound statement of one active row.
struct RowStatement {
    row: usize,
    sql: String,
    parameters: Vec<Value>,
}

impl EntityOperations {
    /// Inserts `entity` and cascades to its associations. Returns the same
    /// handle, with its generated identity assigned.
    pub async fn persist(&self, ctx: &mut OperationContext<'_>, entity: EntityRef) -> Result<EntityRef> {
        let span = info_span!("entity.persist", entity = %entity.entity().name());
        self.execute_rows(ctx, WriteKind::Persist, vec![entity.clone()])
            .instrument(span)
            .await?;
        Ok(entity)
    }

    pub async fn persist_all(&self, ctx: &mut OperationContext<'_>, entities: Vec<EntityRef>) -> Result<Vec<EntityRef>> {
        let span = info_span!("entity.persist_all", entity = %entity_name(&entities), rows = entities.len());
        let rows = self
            .execute_rows(ctx, WriteKind::Persist, entities)
            .instrument(span)
            .await?;
        Ok(rows.into_iter().map(|row| row.entity).collect())
    }

    pub async fn update(&self, ctx: &mut OperationContext<'_>, entity: EntityRef) -> Result<EntityRef> {
        let span = info_span!("entity.update", entity = %entity.entity().name());
        self.execute_rows(ctx, WriteKind::Update, vec![entity.clone()])
            .instrument(span)
            .await?;
        Ok(entity)
    }

    pub async fn update_all(&self, ctx: &mut OperationContext<'_>, entities: Vec<EntityRef>) -> Result<Vec<EntityRef>> {
        let span = info_span!("entity.update_all", entity = %entity_name(&entities), rows = entities.len());
        let rows = self
            .execute_rows(ctx, WriteKind::Update, entities)
            .instrument(span)
            .await?;
        Ok(rows.into_iter().map(|row| row.entity).collect())
    }

    /// Deletes `entity` by identity; returns the affected-row count.
    pub async fn delete(&self, ctx: &mut OperationContext<'_>, entity: EntityRef) -> Result<u64> {
        let span = info_span!("entity.delete", entity = %entity.entity().name());
        let rows = self
            .execute_rows(ctx, WriteKind::Delete, vec![entity])
            .instrument(span)
            .await?;
        Ok(rows.iter().map(|row| row.rows_updated).sum())
    }

    pub async fn delete_all(&self, ctx: &mut OperationContext<'_>, entities: Vec<EntityRef>) -> Result<u64> {
        let span = info_span!("entity.delete_all", entity = %entity_name(&entities), rows = entities.len());
        let rows = self
            .execute_rows(ctx, WriteKind::Delete, entities)
            .instrument(span)
            .await?;
        Ok(rows.iter().map(|row| row.rows_updated).sum())
    }

    /// Runs the row pipeline for entities of one type:
    /// previous values, pre event, cascade before owner, bind and execute,
    /// generated keys, lock verification, cascade after owner, post event.
    pub(crate) async fn execute_rows(
        &self,
        ctx: &mut OperationContext<'_>,
        kind: WriteKind,
        entities: Vec<EntityRef>,
    ) -> Result<Vec<EntityRowState>> {
        let Some(first) = entities.first() else {
            return Ok(Vec::new());
        };
        let entity = Arc::clone(first.entity());
        if let Some(other) = entities.iter().find(|e| e.entity().name() != entity.name()) {
            return Err(DbError::QueryConstruction(format!(
                "Cannot mix '{}' and '{}' entities in one batch",
                entity.name(),
                other.entity().name()
            )));
        }
        let stored = self.stored_query(&ctx.repository_type, &entity, kind.operation())?;

        let mut rows: Vec<EntityRowState> = entities.into_iter().map(EntityRowState::new).collect();
        {
            let binder = self.binder();
            for row in &mut rows {
                row.previous = binder.collect_previous(&stored, Some(&row.entity), &[])?;
            }
        }
        for row in &mut rows {
            row.vetoed = self.events.fire_pre(kind.pre_event(), &row.entity)? == EventOutcome::Veto;
        }

        let cascade = kind.cascade_action();
        if cascade.is_some() {
            for row in rows.iter().filter(|row| row.is_active()) {
                ctx.persisted.insert(&row.entity);
            }
        }
        if let Some(action) = cascade {
            let owners = active_entities(&rows);
            self.cascade(ctx, &owners, CascadePhase::BeforeOwner, action).await?;
        }

        for row in rows.iter().filter(|row| row.is_active()) {
            ensure_identity(kind, &row.entity)?;
        }
        self.execute(ctx, kind, &stored, &mut rows).await?;
        if kind == WriteKind::Persist {
            for row in rows.iter().filter(|row| row.is_active()) {
                ctx.persisted.mark_inserted(&row.entity);
            }
        }

        if let Some(action) = cascade {
            let owners = active_entities(&rows);
            self.cascade(ctx, &owners, CascadePhase::AfterOwner, action).await?;
        }

        for row in rows.iter().filter(|row| row.is_active()) {
            self.events.fire_post(kind.post_event(), &row.entity)?;
        }

        event!(
            Level::DEBUG,
            entity = %entity.name(),
            operation = %kind.operation(),
            rows = rows.len(),
            vetoed = rows.iter().filter(|row| row.vetoed).count(),
            "entity operation completed"
        );
        Ok(rows)
    }

    /// Binds every active row before running anything, then executes them as
    /// native batches when the dialect allows it and one by one otherwise.
    async fn execute(
        &self,
        ctx: &mut OperationContext<'_>,
        kind: WriteKind,
        stored: &StoredQuery,
        rows: &mut [EntityRowState],
    ) -> Result<()> {
        let mut statements = Vec::new();
        {
            let binder = self.binder();
            let compiler = self.compiler();
            for (index, row) in rows.iter().enumerate().filter(|(_, row)| row.is_active()) {
                let resolved = binder.resolve(stored, Some(&row.entity), &[], &row.previous)?;
                statements.push(RowStatement {
                    row: index,
                    sql: compiler.compile(stored, &resolved, None, false)?,
                    parameters: binder.bind(stored, &resolved)?,
                });
            }
        }
        if statements.is_empty() {
            return Ok(());
        }

        let key_column = stored.generated_key_column().map(str::to_string);
        let verify_lock = stored.is_optimistic_lock() && self.config.optimistic_locking;

        if statements.len() > 1 && ctx.dialect.supports_batch(kind.batch_kind(), stored.entity()) {
            let mut pending = statements.into_iter().peekable();
            while pending.peek().is_some() {
                let chunk: Vec<RowStatement> = pending.by_ref().take(self.config.max_batch_size).collect();
                let Some(sql) = chunk.first().map(|s| s.sql.clone()) else {
                    break;
                };
                let indices: Vec<usize> = chunk.iter().map(|s| s.row).collect();
                let batch = BatchStatement::new(sql.clone(), chunk.into_iter().map(|s| s.parameters).collect())
                    .returning(key_column.clone());

                let outcome = ctx.runner.batch(batch).await?;
                let total = outcome.total();
                for (position, &index) in indices.iter().enumerate() {
                    rows[index].rows_updated = outcome.rows_affected.get(position).copied().unwrap_or(0);
                }
                if key_column.is_some() {
                    assign_generated_keys(rows, &indices, outcome.generated_keys)?;
                }
                if verify_lock {
                    verify(indices.len() as u64, total).map_err(|e| e.with_sql(&sql))?;
                }
            }
        } else {
            for statement in statements {
                let RowStatement { row, sql, parameters } = statement;
                let outcome = ctx
                    .runner
                    .update(SqlStatement::new(sql.clone(), parameters).returning(key_column.clone()))
                    .await?;
                rows[row].rows_updated = outcome.rows_affected;
                if key_column.is_some() {
                    assign_generated_keys(rows, &[row], outcome.generated_keys)?;
                }
                if verify_lock {
                    verify(1, outcome.rows_affected).map_err(|e| e.with_sql(&sql))?;
                }
            }
        }
        Ok(())
    }
}

fn entity_name(entities: &[EntityRef]) -> String {
    entities
        .first()
        .map(|e| e.entity().name().to_string())
        .unwrap_or_default()
}

fn active_entities(rows: &[EntityRowState]) -> Vec<EntityRef> {
    rows.iter()
        .filter(|row| row.is_active())
        .map(|row| row.entity.clone())
        .collect()
}

/// Updates and deletes address rows by identity; inserts need one unless the
/// database generates it.
fn ensure_identity(kind: WriteKind, entity: &EntityRef) -> Result<()> {
    let metadata = entity.entity();
    let required = match (kind, metadata.identity()) {
        (_, None) => kind != WriteKind::Persist,
        (WriteKind::Persist, Some(identity)) => !identity.generated,
        (_, Some(_)) => true,
    };
    if required && !entity.has_id() {
        return Err(DbError::MissingIdentity(metadata.name().to_string()));
    }
    Ok(())
}

/// Assigns keys to rows positionally, in submission order.
fn assign_generated_keys(rows: &[EntityRowState], indices: &[usize], keys: Vec<Value>) -> Result<()> {
    let mut keys = keys.into_iter();
    for &index in indices {
        let entity = &rows[index].entity;
        let key = keys
            .next()
            .filter(|key| !key.is_null())
            .ok_or_else(|| DbError::GeneratedId(entity.to_string()))?;
        let key = match entity.entity().identity() {
            Some(identity) => identity.data_type.coerce(key)?,
            None => key,
        };
        entity.set_id(key);
    }
    Ok(())
}
