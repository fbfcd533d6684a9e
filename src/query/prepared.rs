use std::sync::Arc;
use crate::core::Value;
use crate::model::EntityRef;
use super::{Pageable, StoredQuery};

/// Per-call derivative of a [`StoredQuery`].
///
/// Its SQL text starts as the stored template and is rewritten at execution
/// time to match the argument cardinalities and the requested page.
#[derive(Debug, Clone)]
pub struct PreparedQuery {
    stored: Arc<StoredQuery>,
    sql: String,
    arguments: Vec<Value>,
    root: Option<EntityRef>,
    pageable: Option<Pageable>,
}

impl PreparedQuery {
    pub fn new(stored: Arc<StoredQuery>, arguments: Vec<Value>) -> Self {
        Self {
            sql: stored.sql().to_string(),
            stored,
            arguments,
            root: None,
            pageable: None,
        }
    }

    /// Entity that property-path bindings are resolved against
    pub fn root(mut self, entity: EntityRef) -> Self {
        self.root = Some(entity);
        self
    }

    pub fn pageable(mut self, pageable: Pageable) -> Self {
        self.pageable = Some(pageable);
        self
    }

    pub fn stored(&self) -> &Arc<StoredQuery> {
        &self.stored
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub(crate) fn set_sql(&mut self, sql: String) {
        self.sql = sql;
    }

    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    pub fn root_entity(&self) -> Option<&EntityRef> {
        self.root.as_ref()
    }

    pub fn page(&self) -> Option<&Pageable> {
        self.pageable.as_ref()
    }
}
