use std::collections::HashSet;
use crate::dialect::Dialect;
use crate::model::{EntityRef, ObjectId};
use super::StatementRunner;

/// Entities and join rows already written by one top-level call.
#[derive(Debug, Default)]
pub struct PersistedSet {
    entities: HashSet<ObjectId>,
    inserted: HashSet<ObjectId>,
    joins: HashSet<(String, ObjectId, ObjectId)>,
}

impl PersistedSet {
    pub fn contains(&self, entity: &EntityRef) -> bool {
        self.entities.contains(&entity.object_id())
    }

    /// False when the entity was already present.
    pub fn insert(&mut self, entity: &EntityRef) -> bool {
        self.entities.insert(entity.object_id())
    }

    /// Records an entity whose INSERT ran during this call.
    pub fn mark_inserted(&mut self, entity: &EntityRef) {
        self.inserted.insert(entity.object_id());
    }

    pub fn was_inserted(&self, entity: &EntityRef) -> bool {
        self.inserted.contains(&entity.object_id())
    }

    /// False when this (join table, owner, child) row was already written.
    pub fn insert_join(&mut self, table: &str, owner: &EntityRef, child: &EntityRef) -> bool {
        self.joins
            .insert((table.to_string(), owner.object_id(), child.object_id()))
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// State of one top-level call, owned by that call alone.
pub struct OperationContext<'r> {
    pub repository_type: String,
    pub dialect: Dialect,
    pub(crate) runner: &'r mut dyn StatementRunner,
    pub persisted: PersistedSet,
}

impl<'r> OperationContext<'r> {
    pub fn new(repository_type: impl Into<String>, dialect: Dialect, runner: &'r mut dyn StatementRunner) -> Self {
        Self {
            repository_type: repository_type.into(),
            dialect,
            runner,
            persisted: PersistedSet::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::model::PersistentEntity;

    #[test]
    fn test_persisted_set_uses_object_identity() {
        let entity = Arc::new(PersistentEntity::new("Tag", "tag"));
        let first = EntityRef::new(&entity).with("name", "rust");
        let twin = EntityRef::new(&entity).with("name", "rust");

        let mut set = PersistedSet::default();
        assert!(set.insert(&first));
        assert!(!set.insert(&first.clone()));
        assert!(!set.contains(&twin));
        assert!(set.insert_join("book_tag", &twin, &first));
        assert!(!set.insert_join("book_tag", &twin, &first));
        assert!(set.insert_join("book_label", &twin, &first));
    }

    #[test]
    fn test_inserted_tracked_apart_from_visited() {
        let entity = Arc::new(PersistentEntity::new("Tag", "tag"));
        let tag = EntityRef::new(&entity).with("name", "async");

        let mut set = PersistedSet::default();
        set.insert(&tag);
        assert!(!set.was_inserted(&tag));
        set.mark_inserted(&tag);
        assert!(set.was_inserted(&tag));
        assert_eq!(set.len(), 1);
    }
}
