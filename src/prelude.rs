//! Recommended imports grouped by abstraction level.
//!
//! `repository` covers what application code needs to describe entities and
//! run operations. `advanced` exposes the seams for custom drivers, SQL
//! builders and listeners.

pub mod repository {
    //! Metadata, façades and query values.
    pub use crate::{
        AsyncBlockingOperations, BlockingRepositoryOperations, Cascade, DataType, DbError, Dialect,
        EntityOperations, EntityRef, EntityRegistry, OperationsConfig, Pageable, PersistentEntity,
        PersistentProperty, PreparedQuery, ReactiveRepositoryOperations, Relation, Result, Sort,
        Value,
    };
}

pub mod advanced {
    //! Extension points below the façades.
    pub use crate::driver::{
        BatchOutcome, BatchStatement, BlockingConnection, ConnectionProvider, DriverResult,
        ReactiveConnection, Row, SqlStatement, UpdateOutcome,
    };
    pub use crate::runtime::{AutoPopulator, EntityEventListener, EventOutcome, EventType};
    pub use crate::sql::SqlBuilder;
}
