use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use crate::core::Value;
use super::PersistentEntity;

/// Object identity of a live entity instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(usize);

struct EntityInstance {
    entity: Arc<PersistentEntity>,
    values: Mutex<HashMap<String, Value>>,
}

/// Shared handle to a live entity instance.
///
/// Clones refer to the same instance: an update through one clone is seen by
/// all of them, which is how a child reachable through two associations ends
/// up with one identity. Locks are held only for the duration of a single
/// read or write, never across an await point.
#[derive(Clone)]
pub struct EntityRef {
    inner: Arc<EntityInstance>,
}

impl EntityRef {
    pub fn new(entity: &Arc<PersistentEntity>) -> Self {
        Self {
            inner: Arc::new(EntityInstance {
                entity: Arc::clone(entity),
                values: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Set a value while building an instance
    pub fn with(self, name: &str, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn entity(&self) -> &Arc<PersistentEntity> {
        &self.inner.entity
    }

    pub fn object_id(&self) -> ObjectId {
        ObjectId(Arc::as_ptr(&self.inner) as usize)
    }

    pub fn ptr_eq(&self, other: &EntityRef) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn values(&self) -> MutexGuard<'_, HashMap<String, Value>> {
        self.inner.values.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current value of a property or association, NULL when unset.
    pub fn get(&self, name: &str) -> Value {
        self.values().get(name).cloned().unwrap_or(Value::Null)
    }

    pub fn set(&self, name: &str, value: impl Into<Value>) {
        self.values().insert(name.to_string(), value.into());
    }

    pub fn id(&self) -> Value {
        match self.inner.entity.identity() {
            Some(identity) => self.get(&identity.name),
            None => Value::Null,
        }
    }

    pub fn set_id(&self, value: impl Into<Value>) {
        if let Some(identity) = self.inner.entity.identity() {
            self.set(&identity.name, value);
        }
    }

    pub fn has_id(&self) -> bool {
        !self.id().is_null()
    }

    /// Entity instances held by an association, in iteration order.
    pub fn related(&self, name: &str) -> Vec<EntityRef> {
        match self.get(name) {
            Value::Entity(entity) => vec![entity],
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Entity(entity) => Some(entity),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(id={})", self.inner.entity.name(), self.id())
    }
}

impl fmt::Debug for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Snapshot first: printing a nested entity locks that entity.
        let values = self.values().clone();
        let mut names: Vec<&String> = values.keys().collect();
        names.sort();

        let mut debug = f.debug_struct(self.inner.entity.name());
        for name in names {
            // Nested entities print as Name(id=..) so cyclic graphs terminate.
            match &values[name] {
                Value::Entity(entity) => debug.field(name, &format_args!("{}", entity)),
                Value::Array(items) if items.iter().any(|i| matches!(i, Value::Entity(_))) => {
                    debug.field(name, &format_args!("<{} related>", items.len()))
                }
                other => debug.field(name, other),
            };
        }
        debug.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DataType;
    use crate::model::PersistentProperty;

    fn author() -> Arc<PersistentEntity> {
        Arc::new(
            PersistentEntity::new("Author", "author")
                .with_identity(PersistentProperty::new("id", DataType::Integer).generated())
                .with_property(PersistentProperty::new("name", DataType::Text)),
        )
    }

    #[test]
    fn test_clones_share_state() {
        let entity = author();
        let a = EntityRef::new(&entity).with("name", "Ann");
        let b = a.clone();
        b.set_id(7i64);

        assert!(a.ptr_eq(&b));
        assert_eq!(a.object_id(), b.object_id());
        assert_eq!(a.id(), Value::Integer(7));
        assert_eq!(a.to_string(), "Author(id=7)");
    }

    #[test]
    fn test_distinct_instances() {
        let entity = author();
        let a = EntityRef::new(&entity);
        let b = EntityRef::new(&entity);
        assert_ne!(a.object_id(), b.object_id());
        assert!(!a.has_id());
        assert_eq!(a.get("missing"), Value::Null);
    }
}
