use std::fmt;
use std::sync::Arc;
use serde::{Deserialize, Serialize};
use crate::core::{DbError, Result};
use crate::dialect::Dialect;
use crate::model::PersistentEntity;
use super::ParameterBindingDescriptor;

/// What a stored query does; part of the cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Insert,
    Update,
    Delete,
    /// Join-row insert for the named association.
    JoinInsert(String),
    /// Custom query or bulk update produced by the query front end.
    Query(String),
}

impl OperationKind {
    /// Writes rows rather than reading them; pagination never applies.
    pub fn is_write(&self) -> bool {
        !matches!(self, Self::Query(_))
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Insert => write!(f, "INSERT"),
            Self::Update => write!(f, "UPDATE"),
            Self::Delete => write!(f, "DELETE"),
            Self::JoinInsert(association) => write!(f, "JOIN_INSERT({})", association),
            Self::Query(name) => write!(f, "QUERY({})", name),
        }
    }
}

/// Immutable compiled statement template.
///
/// When any binding is expandable the template is also kept as text
/// fragments; binding `i` sits between fragment `i` and fragment `i + 1`.
#[derive(Debug, Clone)]
pub struct StoredQuery {
    dialect: Dialect,
    entity: Arc<PersistentEntity>,
    kind: OperationKind,
    sql: String,
    fragments: Option<Vec<String>>,
    bindings: Vec<ParameterBindingDescriptor>,
    optimistic_lock: bool,
    update: bool,
    generated_key: Option<String>,
}

impl StoredQuery {
    pub fn new(
        dialect: Dialect,
        entity: Arc<PersistentEntity>,
        kind: OperationKind,
        sql: impl Into<String>,
        bindings: Vec<ParameterBindingDescriptor>,
    ) -> Result<Self> {
        let sql = sql.into();
        let fragments = if bindings.iter().any(|b| b.expandable) {
            let fragments: Vec<String> = dialect
                .placeholder_format()
                .pattern()
                .split(&sql)
                .map(str::to_string)
                .collect();
            if fragments.len() != bindings.len() + 1 {
                return Err(DbError::QueryConstruction(format!(
                    "Expandable query has {} parameter bindings but {} placeholders: {}",
                    bindings.len(),
                    fragments.len() - 1,
                    sql
                )));
            }
            Some(fragments)
        } else {
            None
        };

        Ok(Self {
            dialect,
            entity,
            update: kind.is_write(),
            kind,
            sql,
            fragments,
            bindings,
            optimistic_lock: false,
            generated_key: None,
        })
    }

    /// Flag the query for affected-row verification
    pub fn optimistic_lock(mut self, optimistic_lock: bool) -> Self {
        self.optimistic_lock = optimistic_lock;
        self
    }

    /// Ask the driver to return this column's generated values
    pub fn generated_key(mut self, column: impl Into<String>) -> Self {
        self.generated_key = Some(column.into());
        self
    }

    /// Mark a front-end query as a bulk update/delete
    pub fn update(mut self, update: bool) -> Self {
        self.update = update;
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn entity(&self) -> &Arc<PersistentEntity> {
        &self.entity
    }

    pub fn kind(&self) -> &OperationKind {
        &self.kind
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn fragments(&self) -> Option<&[String]> {
        self.fragments.as_deref()
    }

    pub fn is_expandable(&self) -> bool {
        self.fragments.is_some()
    }

    pub fn bindings(&self) -> &[ParameterBindingDescriptor] {
        &self.bindings
    }

    pub fn is_optimistic_lock(&self) -> bool {
        self.optimistic_lock
    }

    pub fn is_update(&self) -> bool {
        self.update
    }

    pub fn generated_key_column(&self) -> Option<&str> {
        self.generated_key.as_deref()
    }

    /// Bindings whose pre-mutation value must be captured, with their positions.
    pub fn previous_value_bindings(&self) -> impl Iterator<Item = (usize, &ParameterBindingDescriptor)> {
        self.bindings
            .iter()
            .enumerate()
            .filter(|(_, b)| b.requires_previous_populated_value())
    }
}
