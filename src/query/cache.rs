use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use once_cell::sync::OnceCell;
use tracing::{Level, event};
use crate::core::Result;
use super::{OperationKind, StoredQuery};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub repository: String,
    pub entity: String,
    pub kind: OperationKind,
}

impl QueryKey {
    pub fn new(repository: impl Into<String>, entity: impl Into<String>, kind: OperationKind) -> Self {
        Self {
            repository: repository.into(),
            entity: entity.into(),
            kind,
        }
    }
}

type Slot = Arc<OnceCell<Arc<StoredQuery>>>;

/// Stored queries per (repository, entity, operation), built once.
///
/// The map only hands out slots; each slot is initialized by exactly one
/// builder call while concurrent callers for the same key wait for it. A
/// failed build leaves the slot empty so the next caller retries.
#[derive(Debug, Default)]
pub struct StoredQueryCache {
    slots: RwLock<HashMap<QueryKey, Slot>>,
}

impl StoredQueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve<F>(&self, key: QueryKey, build: F) -> Result<Arc<StoredQuery>>
    where
        F: FnOnce() -> Result<StoredQuery>,
    {
        let slot = self.slot(&key)?;
        let query = slot.get_or_try_init(|| {
            let query = build()?;
            event!(
                Level::DEBUG,
                repository = %key.repository,
                entity = %key.entity,
                kind = %key.kind,
                sql = %query.sql(),
                "stored query built"
            );
            Ok::<_, crate::core::DbError>(Arc::new(query))
        })?;
        Ok(Arc::clone(query))
    }

    fn slot(&self, key: &QueryKey) -> Result<Slot> {
        if let Some(slot) = self.slots.read()?.get(key) {
            return Ok(Arc::clone(slot));
        }
        let mut slots = self.slots.write()?;
        Ok(Arc::clone(slots.entry(key.clone()).or_default()))
    }

    /// Number of keys whose query has been built.
    pub fn len(&self) -> usize {
        self.slots
            .read()
            .map(|slots| slots.values().filter(|slot| slot.get().is_some()).count())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use crate::dialect::Dialect;
    use crate::model::PersistentEntity;

    fn build(counter: &AtomicUsize) -> Result<StoredQuery> {
        counter.fetch_add(1, Ordering::SeqCst);
        thread::sleep(std::time::Duration::from_millis(10));
        StoredQuery::new(
            Dialect::H2,
            Arc::new(PersistentEntity::new("Book", "book")),
            OperationKind::Insert,
            "INSERT INTO book DEFAULT VALUES",
            Vec::new(),
        )
    }

    #[test]
    fn test_second_resolve_returns_cached_instance() {
        let cache = StoredQueryCache::new();
        let counter = AtomicUsize::new(0);
        let key = QueryKey::new("BookRepository", "Book", OperationKind::Insert);

        let first = cache.resolve(key.clone(), || build(&counter)).unwrap();
        let second = cache.resolve(key, || build(&counter)).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_concurrent_first_access_builds_once() {
        let cache = Arc::new(StoredQueryCache::new());
        let counter = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    let key = QueryKey::new("BookRepository", "Book", OperationKind::Insert);
                    cache.resolve(key, || build(&counter)).unwrap()
                })
            })
            .collect();

        let queries: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(queries.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn test_failed_build_is_retried() {
        let cache = StoredQueryCache::new();
        let key = QueryKey::new("BookRepository", "Book", OperationKind::Update);

        let failed = cache.resolve(key.clone(), || {
            Err(crate::core::DbError::QueryConstruction("no identity".into()))
        });
        assert!(failed.is_err());
        assert!(cache.is_empty());

        let counter = AtomicUsize::new(0);
        assert!(cache.resolve(key, || build(&counter)).is_ok());
        assert_eq!(cache.len(), 1);
    }
}
