use chrono::Utc;
use uuid::Uuid;
use crate::core::{DataType, DbError, Result, Value};
use crate::model::{AutoPopulated, PersistentProperty};

/// Supplies values for properties the runtime fills in itself.
pub trait AutoPopulator: Send + Sync {
    /// Fresh value for `property`; `previous` is its value before the call
    /// (NULL when unknown).
    fn populate(&self, property: &PersistentProperty, previous: &Value) -> Result<Value>;
}

/// Wall-clock timestamps, random v4 UUIDs and incrementing versions.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultAutoPopulator;

impl DefaultAutoPopulator {
    fn now(data_type: DataType) -> Value {
        let now = Utc::now();
        match data_type {
            DataType::Integer => Value::Integer(now.timestamp_millis()),
            DataType::Text => Value::Text(now.to_rfc3339()),
            _ => Value::Timestamp(now),
        }
    }

    fn next_version(property: &PersistentProperty, previous: &Value) -> Result<Value> {
        match previous {
            Value::Null => Ok(Value::Integer(0)),
            other => other
                .as_i64()
                .map(|current| Value::Integer(current + 1))
                .ok_or_else(|| {
                    DbError::ParameterResolution(format!(
                        "Version property '{}' holds a non-numeric {} value",
                        property.name,
                        other.type_name()
                    ))
                }),
        }
    }
}

impl AutoPopulator for DefaultAutoPopulator {
    fn populate(&self, property: &PersistentProperty, previous: &Value) -> Result<Value> {
        match property.auto_populated {
            Some(AutoPopulated::DateCreated | AutoPopulated::DateUpdated) => Ok(Self::now(property.data_type)),
            Some(AutoPopulated::Uuid) => {
                let uuid = Uuid::new_v4();
                Ok(match property.data_type {
                    DataType::Text => Value::Text(uuid.to_string()),
                    _ => Value::Uuid(uuid),
                })
            }
            Some(AutoPopulated::Version) => Self::next_version(property, previous),
            None => Err(DbError::ParameterResolution(format!(
                "Property '{}' is not auto-populated",
                property.name
            ))),
        }
    }
}
