use std::collections::HashMap;
use std::sync::Arc;
use crate::core::{DbError, Result};
use super::PersistentEntity;

/// Entity metadata by name; association targets are looked up here.
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    entities: HashMap<String, Arc<PersistentEntity>>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, entity: PersistentEntity) -> Arc<PersistentEntity> {
        let entity = Arc::new(entity);
        self.entities.insert(entity.name().to_string(), Arc::clone(&entity));
        entity
    }

    pub fn get(&self, name: &str) -> Option<&Arc<PersistentEntity>> {
        self.entities.get(name)
    }

    pub fn require(&self, name: &str) -> Result<Arc<PersistentEntity>> {
        self.entities
            .get(name)
            .cloned()
            .ok_or_else(|| DbError::Configuration(format!("Unknown entity '{}'", name)))
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
