use crate::dialect::Dialect;

/// Settings shared by every operation of one repository-operations instance
#[derive(Debug, Clone)]
pub struct OperationsConfig {
    /// SQL dialect statements are built and compiled for
    pub dialect: Dialect,

    /// Repository name; first part of the stored-query cache key
    pub repository_type: String,

    /// Rows per native batch; larger batches run as consecutive statements
    pub max_batch_size: usize,

    /// Emit a TRACE event for every bound parameter
    pub trace_bindings: bool,

    /// Verify affected-row counts of version-checked statements
    pub optimistic_locking: bool,
}

impl OperationsConfig {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            repository_type: "default".to_string(),
            max_batch_size: 1000,
            trace_bindings: false,
            optimistic_locking: true,
        }
    }

    pub fn repository_type(mut self, repository_type: &str) -> Self {
        self.repository_type = repository_type.to_string();
        self
    }

    pub fn max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = size;
        self
    }

    pub fn trace_bindings(mut self, enabled: bool) -> Self {
        self.trace_bindings = enabled;
        self
    }

    pub fn optimistic_locking(mut self, enabled: bool) -> Self {
        self.optimistic_locking = enabled;
        self
    }

    /// Detect the dialect from a connection URL
    ///
    /// ```ignore
    /// let config = OperationsConfig::from_url("postgres://app@localhost/books")?;
    /// ```
    pub fn from_url(url: &str) -> Result<Self, String> {
        Dialect::from_url(url)
            .map(Self::new)
            .ok_or_else(|| format!("Cannot detect SQL dialect from URL '{}'", url))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.repository_type.trim().is_empty() {
            return Err("repository_type cannot be empty".to_string());
        }

        if self.max_batch_size == 0 {
            return Err("max_batch_size must be > 0".to_string());
        }

        Ok(())
    }
}

impl Default for OperationsConfig {
    fn default() -> Self {
        Self::new(Dialect::Ansi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OperationsConfig::default();
        assert_eq!(config.dialect, Dialect::Ansi);
        assert_eq!(config.max_batch_size, 1000);
        assert!(config.optimistic_locking);
        assert!(!config.trace_bindings);
    }

    #[test]
    fn test_builder_pattern() {
        let config = OperationsConfig::new(Dialect::MySql)
            .repository_type("BookRepository")
            .max_batch_size(50)
            .trace_bindings(true);

        assert_eq!(config.repository_type, "BookRepository");
        assert_eq!(config.max_batch_size, 50);
        assert!(config.trace_bindings);
    }

    #[test]
    fn test_from_url() {
        let config = OperationsConfig::from_url("jdbc:sqlserver://db:1433;databaseName=books").unwrap();
        assert_eq!(config.dialect, Dialect::SqlServer);
        assert!(OperationsConfig::from_url("redis://localhost/0").is_err());
    }

    #[test]
    fn test_validate() {
        assert!(OperationsConfig::default().validate().is_ok());
        assert!(OperationsConfig::default().max_batch_size(0).validate().is_err());
        assert!(OperationsConfig::default().repository_type(" ").validate().is_err());
    }
}
