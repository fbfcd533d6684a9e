//! Parameter value resolution and driver-ready binding.
//!
//! Resolution walks each [`ParameterBindingDescriptor`] against the call
//! arguments and the root entity. Binding then turns the resolved values
//! into what a driver accepts: entities become their identities, UUIDs may
//! become text, JSON is serialized and collections fan out element-wise.

use std::collections::HashMap;
use tracing::{Level, event};
use crate::core::{DataType, DbError, Result, Value};
use crate::dialect::Dialect;
use crate::model::{EntityRef, PropertyPath};
use crate::query::{BindingSource, ParameterBindingDescriptor, PreviousValueSource, StoredQuery};
use crate::runtime::AutoPopulator;

/// Pre-call values keyed by binding position.
pub type PreviousValues = HashMap<usize, Value>;

pub struct ParameterBinder<'a> {
    dialect: Dialect,
    auto_populator: &'a dyn AutoPopulator,
    trace: bool,
}

impl<'a> ParameterBinder<'a> {
    pub fn new(dialect: Dialect, auto_populator: &'a dyn AutoPopulator) -> Self {
        Self {
            dialect,
            auto_populator,
            trace: false,
        }
    }

    /// Emit a TRACE event per bound position
    pub fn trace(mut self, enabled: bool) -> Self {
        self.trace = enabled;
        self
    }

    /// Captures the values optimistic comparisons need. Must run before any
    /// pre-persist or pre-update mutation of `root`.
    pub fn collect_previous(
        &self,
        stored: &StoredQuery,
        root: Option<&EntityRef>,
        arguments: &[Value],
    ) -> Result<PreviousValues> {
        let mut previous = PreviousValues::new();
        for (position, binding) in stored.previous_value_bindings() {
            let value = match &binding.previous {
                Some(PreviousValueSource::Argument(index)) => argument(arguments, *index, binding)?,
                Some(PreviousValueSource::Property(path)) => walk_root(path, root, binding)?,
                Some(PreviousValueSource::Absent) | None => Value::Null,
            };
            previous.insert(position, value);
        }
        Ok(previous)
    }

    /// One resolved value per binding, in template order.
    pub fn resolve(
        &self,
        stored: &StoredQuery,
        root: Option<&EntityRef>,
        arguments: &[Value],
        previous: &PreviousValues,
    ) -> Result<Vec<Value>> {
        stored
            .bindings()
            .iter()
            .enumerate()
            .map(|(position, binding)| match &binding.source {
                BindingSource::Argument(index) => argument(arguments, *index, binding),
                BindingSource::Property { .. } if binding.requires_previous_populated_value() => {
                    Ok(previous.get(&position).cloned().unwrap_or(Value::Null))
                }
                BindingSource::Property { path, argument: None } => walk_root(path, root, binding),
                BindingSource::Property {
                    path,
                    argument: Some(index),
                } => path.resolve(&argument(arguments, *index, binding)?),
                BindingSource::AutoPopulated { path } => {
                    let name = path.last().unwrap_or(binding.name.as_str());
                    let property = stored.entity().property(name).ok_or_else(|| {
                        DbError::ParameterResolution(format!(
                            "Entity '{}' has no auto-populated property '{}'",
                            stored.entity().name(),
                            path
                        ))
                    })?;
                    let before = previous.get(&position).cloned().unwrap_or(Value::Null);
                    self.auto_populator.populate(property, &before)
                }
            })
            .collect()
    }

    /// Driver-ready values; collections occupy one position per element.
    pub fn bind(&self, stored: &StoredQuery, resolved: &[Value]) -> Result<Vec<Value>> {
        let mut bound = Vec::with_capacity(resolved.len());
        for (binding, value) in stored.bindings().iter().zip(resolved) {
            match value {
                Value::Array(items) if binding.expandable => {
                    if items.is_empty() {
                        self.push(&mut bound, binding, Value::Null);
                    }
                    for item in items {
                        let item = self.convert(binding, item)?;
                        self.push(&mut bound, binding, item);
                    }
                }
                other => {
                    let converted = self.convert(binding, other)?;
                    self.push(&mut bound, binding, converted);
                }
            }
        }
        Ok(bound)
    }

    fn push(&self, bound: &mut Vec<Value>, binding: &ParameterBindingDescriptor, value: Value) {
        if self.trace {
            event!(
                Level::TRACE,
                position = bound.len() + 1,
                parameter = %binding.name,
                value = %value,
                "binding parameter"
            );
        }
        bound.push(value);
    }

    fn convert(&self, binding: &ParameterBindingDescriptor, value: &Value) -> Result<Value> {
        match value {
            Value::Entity(entity) => {
                let id = entity.id();
                if id.is_null() {
                    return Err(DbError::TransientEntity {
                        entity: entity.entity().name().to_string(),
                        parameter: binding.name.clone(),
                    });
                }
                self.convert(binding, &id)
            }
            Value::Uuid(uuid) if self.dialect.requires_string_uuid() => Ok(Value::Text(uuid.to_string())),
            Value::Null | Value::Text(_) => Ok(value.clone()),
            _ if binding.data_type == DataType::Json => Ok(Value::Text(serde_json::to_string(&to_json(value)?)?)),
            Value::Array(items) => Ok(Value::Array(
                items
                    .iter()
                    .map(|item| self.convert(binding, item))
                    .collect::<Result<Vec<_>>>()?,
            )),
            other => Ok(other.clone()),
        }
    }
}

fn argument(arguments: &[Value], index: usize, binding: &ParameterBindingDescriptor) -> Result<Value> {
    arguments.get(index).cloned().ok_or_else(|| {
        DbError::ParameterResolution(format!(
            "Parameter '{}' refers to argument {} but only {} were supplied",
            binding.name,
            index,
            arguments.len()
        ))
    })
}

fn walk_root(path: &PropertyPath, root: Option<&EntityRef>, binding: &ParameterBindingDescriptor) -> Result<Value> {
    let root = root.ok_or_else(|| {
        DbError::ParameterResolution(format!(
            "Parameter '{}' reads property '{}' but no entity was supplied",
            binding.name, path
        ))
    })?;
    path.resolve(&Value::Entity(root.clone()))
}

fn to_json(value: &Value) -> Result<serde_json::Value> {
    Ok(match value {
        Value::Null => serde_json::Value::Null,
        Value::Integer(i) => serde_json::Value::from(*i),
        Value::Float(f) => serde_json::Value::from(*f),
        Value::Text(s) => serde_json::Value::from(s.as_str()),
        Value::Boolean(b) => serde_json::Value::from(*b),
        Value::Bytes(bytes) => serde_json::Value::from(bytes.clone()),
        Value::Uuid(uuid) => serde_json::Value::from(uuid.to_string()),
        Value::Timestamp(ts) => serde_json::Value::from(ts.to_rfc3339()),
        Value::Json(json) => json.clone(),
        Value::Array(items) => serde_json::Value::Array(items.iter().map(to_json).collect::<Result<_>>()?),
        Value::Entity(entity) => {
            return Err(DbError::ParameterResolution(format!(
                "Entity {} cannot be serialized as JSON",
                entity
            )));
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use uuid::Uuid;
    use crate::model::{Association, AutoPopulated, PersistentEntity, PersistentProperty, Relation};
    use crate::query::OperationKind;
    use crate::runtime::DefaultAutoPopulator;
    use crate::sql::{DefaultSqlBuilder, SqlBuilder};

    fn author() -> Arc<PersistentEntity> {
        Arc::new(
            PersistentEntity::new("Author", "author")
                .with_identity(PersistentProperty::new("id", DataType::Uuid))
                .with_property(PersistentProperty::new("name", DataType::Text)),
        )
    }

    fn book() -> Arc<PersistentEntity> {
        Arc::new(
            PersistentEntity::new("Book", "book")
                .with_identity(PersistentProperty::new("id", DataType::Integer).generated())
                .with_property(PersistentProperty::new("title", DataType::Text))
                .with_property(PersistentProperty::new("meta", DataType::Json))
                .with_property(
                    PersistentProperty::new("version", DataType::Integer).auto_populated(AutoPopulated::Version),
                )
                .with_association(Association::new("author", Relation::ManyToOne, "Author")),
        )
    }

    fn query(dialect: Dialect, sql: &str, bindings: Vec<ParameterBindingDescriptor>) -> StoredQuery {
        StoredQuery::new(dialect, book(), OperationKind::Query("test".into()), sql, bindings).unwrap()
    }

    #[test]
    fn test_transient_entity_is_rejected() {
        let populator = DefaultAutoPopulator;
        let binder = ParameterBinder::new(Dialect::H2, &populator);
        let stored = query(
            Dialect::H2,
            "SELECT * FROM book WHERE author_id = ?",
            vec![ParameterBindingDescriptor::argument("author", 0, DataType::Entity)],
        );

        let transient = Value::Entity(EntityRef::new(&author()).with("name", "Ann"));
        let err = binder.bind(&stored, &[transient]).unwrap_err();
        assert!(matches!(err, DbError::TransientEntity { .. }));
        assert!(err.is_data_access());
    }

    #[test]
    fn test_entity_binds_as_string_uuid_where_required() {
        let populator = DefaultAutoPopulator;
        let id = Uuid::new_v4();
        let saved = Value::Entity(EntityRef::new(&author()).with("id", id));
        let stored = query(
            Dialect::MySql,
            "SELECT * FROM book WHERE author_id = ?",
            vec![ParameterBindingDescriptor::argument("author", 0, DataType::Entity)],
        );

        let mysql = ParameterBinder::new(Dialect::MySql, &populator).bind(&stored, &[saved.clone()]).unwrap();
        assert_eq!(mysql, vec![Value::Text(id.to_string())]);
        let postgres = ParameterBinder::new(Dialect::Postgres, &populator).bind(&stored, &[saved]).unwrap();
        assert_eq!(postgres, vec![Value::Uuid(id)]);
    }

    #[test]
    fn test_collections_fan_out_and_empty_binds_null() {
        let populator = DefaultAutoPopulator;
        let binder = ParameterBinder::new(Dialect::H2, &populator).trace(true);
        let stored = query(
            Dialect::H2,
            "SELECT * FROM book WHERE id IN (?) AND title = ?",
            vec![
                ParameterBindingDescriptor::argument("ids", 0, DataType::Integer).expandable(),
                ParameterBindingDescriptor::argument("title", 1, DataType::Text),
            ],
        );

        let bound = binder
            .bind(&stored, &[Value::from(vec![3i64, 1, 2]), Value::from("x")])
            .unwrap();
        assert_eq!(bound, vec![3i64.into(), 1i64.into(), 2i64.into(), Value::from("x")]);

        let bound = binder.bind(&stored, &[Value::Array(vec![]), Value::from("x")]).unwrap();
        assert_eq!(bound, vec![Value::Null, Value::from("x")]);
    }

    #[test]
    fn test_json_is_serialized_unless_textual() {
        let populator = DefaultAutoPopulator;
        let binder = ParameterBinder::new(Dialect::Postgres, &populator);
        let stored = query(
            Dialect::Postgres,
            "UPDATE book SET meta = $1",
            vec![ParameterBindingDescriptor::argument("meta", 0, DataType::Json)],
        );

        let bound = binder.bind(&stored, &[Value::Json(serde_json::json!({"a": 1}))]).unwrap();
        assert_eq!(bound, vec![Value::Text(r#"{"a":1}"#.into())]);
        let bound = binder.bind(&stored, &[Value::from("{\"raw\":true}")]).unwrap();
        assert_eq!(bound, vec![Value::from("{\"raw\":true}")]);
    }

    #[test]
    fn test_previous_version_is_captured_before_mutation() {
        let populator = DefaultAutoPopulator;
        let binder = ParameterBinder::new(Dialect::H2, &populator);
        let stored = DefaultSqlBuilder::new(Dialect::H2).build_update(&book()).unwrap();
        let entity = EntityRef::new(&book())
            .with("id", 10i64)
            .with("title", "Dune")
            .with("version", 3i64);

        let previous = binder.collect_previous(&stored, Some(&entity), &[]).unwrap();
        entity.set("version", 4i64);
        let resolved = binder.resolve(&stored, Some(&entity), &[], &previous).unwrap();

        // title, meta, version, author, id, previous version
        assert_eq!(resolved.len(), 6);
        assert_eq!(resolved[2], Value::Integer(4));
        assert_eq!(resolved[5], Value::Integer(3));
    }

    #[test]
    fn test_auto_populated_bindings_derive_from_argument() {
        let populator = DefaultAutoPopulator;
        let binder = ParameterBinder::new(Dialect::H2, &populator);
        let stamped = Arc::new(
            PersistentEntity::new("Note", "note")
                .with_identity(PersistentProperty::new("id", DataType::Integer))
                .with_property(
                    PersistentProperty::new("updated", DataType::Timestamp).auto_populated(AutoPopulated::DateUpdated),
                )
                .with_property(
                    PersistentProperty::new("version", DataType::Integer).auto_populated(AutoPopulated::Version),
                ),
        );
        let stored = StoredQuery::new(
            Dialect::H2,
            stamped,
            OperationKind::Query("touch".into()),
            "UPDATE note SET updated = ?, version = ? WHERE version = ?",
            vec![
                ParameterBindingDescriptor::auto_populated("updated", "updated", DataType::Timestamp),
                ParameterBindingDescriptor::auto_populated("version", "version", DataType::Integer)
                    .with_previous(PreviousValueSource::Argument(0)),
                ParameterBindingDescriptor::argument("expected", 0, DataType::Integer),
            ],
        )
        .unwrap();
        let arguments = [Value::Integer(4)];

        let previous = binder.collect_previous(&stored, None, &arguments).unwrap();
        let resolved = binder.resolve(&stored, None, &arguments, &previous).unwrap();

        assert_eq!(previous.get(&1), Some(&Value::Integer(4)));
        assert!(matches!(resolved[0], Value::Timestamp(_)));
        assert_eq!(resolved[1], Value::Integer(5));
        assert_eq!(resolved[2], Value::Integer(4));
    }

    #[test]
    fn test_nested_path_through_null_is_null() {
        let populator = DefaultAutoPopulator;
        let binder = ParameterBinder::new(Dialect::H2, &populator);
        let stored = query(
            Dialect::H2,
            "SELECT * FROM book WHERE author_name = ?",
            vec![ParameterBindingDescriptor::argument_property("name", 0, "author.name", DataType::Text)],
        );
        let orphan = Value::Entity(EntityRef::new(&book()).with("title", "Untitled"));

        let resolved = binder.resolve(&stored, None, &[orphan], &PreviousValues::new()).unwrap();
        assert_eq!(resolved, vec![Value::Null]);
    }

    #[test]
    fn test_missing_argument_is_a_resolution_error() {
        let populator = DefaultAutoPopulator;
        let binder = ParameterBinder::new(Dialect::H2, &populator);
        let stored = query(
            Dialect::H2,
            "SELECT * FROM book WHERE title = ?",
            vec![ParameterBindingDescriptor::argument("title", 0, DataType::Text)],
        );
        let err = binder.resolve(&stored, None, &[], &PreviousValues::new()).unwrap_err();
        assert!(matches!(err, DbError::ParameterResolution(_)));
    }
}
