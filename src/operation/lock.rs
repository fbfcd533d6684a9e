use crate::core::{DbError, Result};

/// Fails with an optimistic-lock conflict when the affected-row count differs
/// from the number of rows submitted.
pub fn verify(expected: u64, actual: u64) -> Result<()> {
    if expected != actual {
        return Err(DbError::OptimisticLock {
            expected,
            actual,
            sql: None,
        });
    }
    Ok(())
}
