pub mod error;
pub mod types;
pub mod value;

pub use error::{BoxError, DbError, ErrorKind, Result};
pub use types::DataType;
pub use value::Value;
