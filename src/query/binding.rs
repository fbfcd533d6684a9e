use crate::core::{DataType, Value};
use crate::model::PropertyPath;

/// Where the pre-mutation value of a binding comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviousValueSource {
    /// Another call argument.
    Argument(usize),
    /// A property of the root entity, read before any pre-persist/pre-update mutation.
    Property(PropertyPath),
    /// No previous value; binds as NULL.
    Absent,
}

/// Where the bound value of a position comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingSource {
    /// `arguments[index]`.
    Argument(usize),
    /// Path walked from the root entity, or from an argument when `argument` is set.
    Property {
        path: PropertyPath,
        argument: Option<usize>,
    },
    /// Fresh value from the auto-population service for the root entity's property.
    AutoPopulated { path: PropertyPath },
}

/// Describes how to obtain the value of one bind position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterBindingDescriptor {
    pub name: String,
    pub source: BindingSource,
    pub data_type: DataType,
    /// The value may be a collection that fans out to one placeholder per element.
    pub expandable: bool,
    /// Set when the binding needs the value an auto-populated property had
    /// before the call (optimistic-lock comparisons).
    pub previous: Option<PreviousValueSource>,
}

impl ParameterBindingDescriptor {
    pub fn argument(name: impl Into<String>, index: usize, data_type: DataType) -> Self {
        Self::from_source(name, BindingSource::Argument(index), data_type)
    }

    pub fn property(name: impl Into<String>, path: impl Into<PropertyPath>, data_type: DataType) -> Self {
        Self::from_source(
            name,
            BindingSource::Property {
                path: path.into(),
                argument: None,
            },
            data_type,
        )
    }

    /// Path resolved against an argument instead of the root entity
    pub fn argument_property(
        name: impl Into<String>,
        index: usize,
        path: impl Into<PropertyPath>,
        data_type: DataType,
    ) -> Self {
        Self::from_source(
            name,
            BindingSource::Property {
                path: path.into(),
                argument: Some(index),
            },
            data_type,
        )
    }

    pub fn auto_populated(name: impl Into<String>, path: impl Into<PropertyPath>, data_type: DataType) -> Self {
        Self::from_source(name, BindingSource::AutoPopulated { path: path.into() }, data_type)
    }

    fn from_source(name: impl Into<String>, source: BindingSource, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            source,
            data_type,
            expandable: false,
            previous: None,
        }
    }

    pub fn expandable(mut self) -> Self {
        self.expandable = true;
        self
    }

    pub fn with_previous(mut self, source: PreviousValueSource) -> Self {
        self.previous = Some(source);
        self
    }

    pub fn requires_previous_populated_value(&self) -> bool {
        self.previous.is_some()
    }

    /// Placeholders this binding occupies for `value`.
    pub fn cardinality(&self, value: &Value) -> usize {
        if self.expandable { value.cardinality() } else { 1 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cardinality_respects_expandable_flag() {
        let list = Value::from(vec![1i64, 2, 3]);
        let plain = ParameterBindingDescriptor::argument("ids", 0, DataType::Integer);
        assert_eq!(plain.cardinality(&list), 1);
        assert_eq!(plain.clone().expandable().cardinality(&list), 3);
        assert_eq!(plain.expandable().cardinality(&Value::Array(vec![])), 1);
    }

    #[test]
    fn test_previous_marker() {
        let version = ParameterBindingDescriptor::property("version", "version", DataType::Integer)
            .with_previous(PreviousValueSource::Property(PropertyPath::parse("version")));
        assert!(version.requires_previous_populated_value());
    }
}
