use std::fmt;
use crate::core::{DbError, Result, Value};
use super::EntityRef;

/// Dotted property path such as `manager.id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyPath {
    segments: Vec<String>,
}

impl PropertyPath {
    pub fn parse(path: &str) -> Self {
        Self {
            segments: path
                .split('.')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Crosses at least one association.
    pub fn is_nested(&self) -> bool {
        self.segments.len() > 1
    }

    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Walks the path starting at `root`.
    ///
    /// A NULL intermediate stops the walk and yields NULL. Naming a member the
    /// entity does not declare, or stepping into a non-entity value, is an error.
    pub fn resolve(&self, root: &Value) -> Result<Value> {
        let mut current = root.clone();
        for segment in &self.segments {
            current = match current {
                Value::Null => return Ok(Value::Null),
                Value::Entity(entity) => {
                    if !entity.entity().has_member(segment) {
                        return Err(DbError::ParameterResolution(format!(
                            "Entity '{}' has no property '{}' (path '{}')",
                            entity.entity().name(),
                            segment,
                            self
                        )));
                    }
                    entity.get(segment)
                }
                other => {
                    return Err(DbError::ParameterResolution(format!(
                        "Cannot resolve '{}' of path '{}' on a {} value",
                        segment,
                        self,
                        other.type_name()
                    )));
                }
            };
        }
        Ok(current)
    }

    /// Writes `value` at the end of the path, creating nothing on the way.
    pub fn assign(&self, root: &EntityRef, value: Value) -> Result<()> {
        let Some((last, parents)) = self.segments.split_last() else {
            return Err(DbError::ParameterResolution("Empty property path".into()));
        };
        let mut target = root.clone();
        for segment in parents {
            target = match target.get(segment) {
                Value::Entity(next) => next,
                _ => {
                    return Err(DbError::ParameterResolution(format!(
                        "Cannot assign path '{}': '{}' is not an entity",
                        self, segment
                    )));
                }
            };
        }
        target.set(last, value);
        Ok(())
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

impl From<&str> for PropertyPath {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}
