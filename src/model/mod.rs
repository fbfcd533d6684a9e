//! Entity metadata and live entity instances.
//!
//! Metadata is normally produced by annotation scanning elsewhere; this module
//! only defines the shapes the operation runtime queries.

pub mod association;
pub mod entity;
pub mod instance;
pub mod path;
pub mod registry;

pub use association::{Association, Cascade, JoinTable, Relation};
pub use entity::{AutoPopulated, PersistentEntity, PersistentProperty};
pub use instance::{EntityRef, ObjectId};
pub use path::PropertyPath;
pub use registry::EntityRegistry;
