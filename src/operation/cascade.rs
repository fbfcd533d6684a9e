use std::collections::HashSet;
use std::sync::Arc;
use async_recursion::async_recursion;
use tracing::{Level, event};
use crate::binder::PreviousValues;
use crate::core::{Result, Value};
use crate::dialect::BatchKind;
use crate::driver::{BatchStatement, SqlStatement};
use crate::model::{Association, Cascade, EntityRef, PersistentEntity, Relation};
use crate::query::OperationKind;
use super::entity::WriteKind;
use super::{EntityOperations, OperationContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadePhase {
    /// Associations whose rows the owner's foreign key points at.
    BeforeOwner,
    /// Inverse-side and join-table associations.
    AfterOwner,
}

/// Top-level write being propagated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeAction {
    Persist,
    Update,
}

impl CascadeAction {
    fn applies_to(self, cascade: &Cascade) -> bool {
        match self {
            Self::Persist => cascade.persist,
            Self::Update => cascade.update,
        }
    }
}

/// One association to walk, with its target metadata already resolved.
#[derive(Debug)]
pub(crate) enum CascadeTarget {
    Single {
        association: Association,
        entity: Arc<PersistentEntity>,
        child: EntityRef,
    },
    Many {
        association: Association,
        entity: Arc<PersistentEntity>,
        children: Vec<EntityRef>,
    },
}

impl EntityOperations {
    fn cascade_targets(
        &self,
        owner: &EntityRef,
        phase: CascadePhase,
        action: CascadeAction,
    ) -> Result<Vec<CascadeTarget>> {
        let metadata = Arc::clone(owner.entity());
        let mut targets = Vec::new();
        for association in metadata.associations() {
            let before = association.cascades_before_owner();
            if before != (phase == CascadePhase::BeforeOwner) || !action.applies_to(&association.cascade) {
                continue;
            }
            let children = owner.related(&association.name);
            if children.is_empty() {
                continue;
            }
            let entity = self.registry.require(&association.target)?;
            if association.is_many() {
                targets.push(CascadeTarget::Many {
                    association: association.clone(),
                    entity,
                    children,
                });
            } else if let Some(child) = children.into_iter().next() {
                targets.push(CascadeTarget::Single {
                    association: association.clone(),
                    entity,
                    child,
                });
            }
        }
        Ok(targets)
    }

    /// Walks the owners' associations for one phase. Children are written
    /// depth first, each with its own before/after cascades.
    #[async_recursion]
    pub(crate) async fn cascade<'a, 'r>(
        &'a self,
        ctx: &'a mut OperationContext<'r>,
        owners: &'a [EntityRef],
        phase: CascadePhase,
        action: CascadeAction,
    ) -> Result<()> {
        for owner in owners {
            for target in self.cascade_targets(owner, phase, action)? {
                match target {
                    CascadeTarget::Single {
                        association,
                        entity,
                        child,
                    } => {
                        self.write_children(ctx, owner, &association, &entity, vec![child.clone()], action)
                            .await?;
                        if phase == CascadePhase::BeforeOwner {
                            owner.set(&association.name, child);
                        }
                    }
                    CascadeTarget::Many {
                        association,
                        entity,
                        children,
                    } => {
                        self.write_children(ctx, owner, &association, &entity, children, action)
                            .await?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Persists new children, updates existing ones and links them through the
    /// join table when the association has one.
    async fn write_children(
        &self,
        ctx: &mut OperationContext<'_>,
        owner: &EntityRef,
        association: &Association,
        entity: &Arc<PersistentEntity>,
        children: Vec<EntityRef>,
        action: CascadeAction,
    ) -> Result<()> {
        let back_reference = match association.kind {
            Relation::OneToMany | Relation::OneToOne => association.mapped_by.as_deref(),
            _ => None,
        };

        let mut seen = HashSet::new();
        let children: Vec<EntityRef> = children
            .into_iter()
            .filter(|child| seen.insert(child.object_id()))
            .collect();

        let mut fresh = Vec::new();
        let mut existing = Vec::new();
        for child in &children {
            if let Some(property) = back_reference {
                child.set(property, owner.clone());
            }
            if ctx.persisted.contains(child) {
                continue;
            }
            if !child.has_id() {
                if association.cascade.persist {
                    fresh.push(child.clone());
                }
            } else if association.cascade.update {
                existing.push(child.clone());
            }
        }

        event!(
            Level::TRACE,
            owner = %owner,
            association = %association.name,
            persist = fresh.len(),
            update = existing.len(),
            "cascading"
        );
        if !fresh.is_empty() {
            self.execute_rows(ctx, WriteKind::Persist, fresh).await?;
        }
        if !existing.is_empty() {
            self.execute_rows(ctx, WriteKind::Update, existing).await?;
        }

        if association.requires_join_table() {
            // An updated owner only gains links to children inserted during this call.
            let linked = match action {
                CascadeAction::Persist => children,
                CascadeAction::Update => children
                    .into_iter()
                    .filter(|child| ctx.persisted.was_inserted(child))
                    .collect(),
            };
            self.insert_join_rows(ctx, owner, association, entity, linked).await?;
        }
        Ok(())
    }

    async fn insert_join_rows(
        &self,
        ctx: &mut OperationContext<'_>,
        owner: &EntityRef,
        association: &Association,
        entity: &PersistentEntity,
        children: Vec<EntityRef>,
    ) -> Result<()> {
        let join = association.resolve_join_table(owner.entity(), entity);
        let pending: Vec<EntityRef> = children
            .into_iter()
            .filter(|child| child.has_id() && ctx.persisted.insert_join(&join.name, owner, child))
            .collect();
        if pending.is_empty() {
            return Ok(());
        }

        let stored = self.stored_query(
            &ctx.repository_type,
            owner.entity(),
            OperationKind::JoinInsert(association.name.clone()),
        )?;
        let mut rows = Vec::with_capacity(pending.len());
        {
            let binder = self.binder();
            for child in &pending {
                let arguments = [Value::Entity(owner.clone()), Value::Entity(child.clone())];
                let resolved = binder.resolve(&stored, None, &arguments, &PreviousValues::new())?;
                rows.push(binder.bind(&stored, &resolved)?);
            }
        }

        if rows.len() > 1 && ctx.dialect.supports_batch(BatchKind::JoinInsert, owner.entity()) {
            for chunk in rows.chunks(self.config.max_batch_size) {
                ctx.runner
                    .batch(BatchStatement::new(stored.sql(), chunk.to_vec()))
                    .await?;
            }
        } else {
            for row in rows {
                ctx.runner.update(SqlStatement::new(stored.sql(), row)).await?;
            }
        }
        Ok(())
    }
}
