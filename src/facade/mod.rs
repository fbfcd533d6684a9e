pub mod blocking;
pub mod reactive;

pub use blocking::{AsyncBlockingOperations, BlockingRepositoryOperations};
pub use reactive::ReactiveRepositoryOperations;
