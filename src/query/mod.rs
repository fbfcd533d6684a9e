pub mod binding;
pub mod cache;
pub mod compiler;
pub mod pageable;
pub mod prepared;
pub mod stored;

pub use binding::{BindingSource, ParameterBindingDescriptor, PreviousValueSource};
pub use cache::{QueryKey, StoredQueryCache};
pub use compiler::StatementCompiler;
pub use pageable::{Direction, Order, Pageable, Sort};
pub use prepared::PreparedQuery;
pub use stored::{OperationKind, StoredQuery};
