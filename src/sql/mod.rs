//! SQL text generation for entity-level statements.
//!
//! The operation runtime only talks to the [`SqlBuilder`] trait. Query-method
//! derivation lives elsewhere and hands over finished [`StoredQuery`] values.

pub mod builder;

use std::sync::Arc;
use crate::core::Result;
use crate::dialect::Dialect;
use crate::model::{Association, PersistentEntity};
use crate::query::{Pageable, Sort, StoredQuery};

pub use builder::DefaultSqlBuilder;

pub trait SqlBuilder: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Insert of every persistable column.
    fn build_insert(&self, entity: &Arc<PersistentEntity>) -> Result<StoredQuery>;

    /// Update of every updatable column held in the entity's own table, by identity.
    fn build_update(&self, entity: &Arc<PersistentEntity>) -> Result<StoredQuery>;

    fn build_delete(&self, entity: &Arc<PersistentEntity>) -> Result<StoredQuery>;

    /// Insert of one (owner id, target id) row; binds owner as argument 0 and target as argument 1.
    fn build_join_table_insert(
        &self,
        owner: &Arc<PersistentEntity>,
        association: &Association,
        target: &PersistentEntity,
    ) -> Result<StoredQuery>;

    /// ` ORDER BY ...` clause, with the leading space.
    fn build_order_by(&self, entity: &PersistentEntity, sort: &Sort) -> Result<String>;

    /// Pagination clause, with the leading space; empty for unpaged requests.
    fn build_pagination(&self, pageable: &Pageable) -> String;
}
