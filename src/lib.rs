// ============================================================================
// sqlentity: entity operations over SQL drivers
// ============================================================================
//
// Repository writes and queries compiled against a target dialect, with
// parameter binding, cascades across associations, batching and optimistic
// lock verification. Connections are supplied by the caller through the
// `driver` traits; one pipeline serves both the blocking and the reactive
// façade.

pub mod binder;
pub mod config;
pub mod core;
pub mod dialect;
pub mod driver;
pub mod facade;
pub mod model;
pub mod operation;
pub mod prelude;
pub mod query;
pub mod runtime;
pub mod sql;

pub use core::{DataType, DbError, Result, Value};
pub use config::OperationsConfig;
pub use dialect::Dialect;

// Re-export façades
pub use facade::{AsyncBlockingOperations, BlockingRepositoryOperations, ReactiveRepositoryOperations};
pub use operation::{EntityOperations, EntityOperationsBuilder, OperationContext};

// Re-export metadata API
pub use model::{
    Association, AutoPopulated, Cascade, EntityRef, EntityRegistry, JoinTable, PersistentEntity,
    PersistentProperty, Relation,
};
pub use query::{Pageable, PreparedQuery, Sort, StoredQuery};
