//! Services the operation runtime calls into: auto-population and entity events.

pub mod autopopulate;
pub mod events;

pub use autopopulate::{AutoPopulator, DefaultAutoPopulator};
pub use events::{AutoPopulatedListener, EntityEventListener, EventListenerRegistry, EventOutcome, EventType};
