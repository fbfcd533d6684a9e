use std::fmt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use super::{DbError, Result, Value};

/// Data-type tag carried by properties and binding descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Integer,
    Float,
    Text,
    Boolean,
    Bytes,
    Uuid,
    Timestamp,
    Json,
    /// Reference to another entity; binds as that entity's identity.
    Entity,
    Object,
}

impl DataType {
    pub fn is_compatible(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (Self::Object, _) => true,
            (Self::Integer, Value::Integer(_)) => true,
            (Self::Float, Value::Float(_) | Value::Integer(_)) => true,
            (Self::Text, Value::Text(_)) => true,
            (Self::Boolean, Value::Boolean(_)) => true,
            (Self::Bytes, Value::Bytes(_)) => true,
            (Self::Uuid, Value::Uuid(_) | Value::Text(_)) => true,
            (Self::Timestamp, Value::Timestamp(_)) => true,
            (Self::Json, _) => true,
            (Self::Entity, Value::Entity(_)) => true,
            (_, Value::Array(items)) => items.iter().all(|item| self.is_compatible(item)),
            _ => false,
        }
    }

    /// Converts a driver-returned value (for example a generated key) to this type.
    pub fn coerce(&self, value: Value) -> Result<Value> {
        match (self, value) {
            (_, Value::Null) => Ok(Value::Null),
            (Self::Integer, Value::Float(f)) => Value::Float(f)
                .as_i64()
                .map(Value::Integer)
                .ok_or_else(|| DbError::data_access(format!("Cannot convert {} to INTEGER", f))),
            (Self::Integer, Value::Text(s)) => s
                .trim()
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| DbError::data_access(format!("Cannot convert '{}' to INTEGER", s))),
            (Self::Float, Value::Integer(i)) => Ok(Value::Float(i as f64)),
            (Self::Uuid, Value::Text(s)) => Uuid::parse_str(&s)
                .map(Value::Uuid)
                .map_err(|e| DbError::data_access(format!("Cannot convert '{}' to UUID: {}", s, e))),
            (Self::Text, Value::Uuid(u)) => Ok(Value::Text(u.to_string())),
            (Self::Json, Value::Text(s)) => Ok(Value::Json(serde_json::from_str(&s)?)),
            (_, value) => Ok(value),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer => write!(f, "INTEGER"),
            Self::Float => write!(f, "FLOAT"),
            Self::Text => write!(f, "TEXT"),
            Self::Boolean => write!(f, "BOOLEAN"),
            Self::Bytes => write!(f, "BYTES"),
            Self::Uuid => write!(f, "UUID"),
            Self::Timestamp => write!(f, "TIMESTAMP"),
            Self::Json => write!(f, "JSON"),
            Self::Entity => write!(f, "ENTITY"),
            Self::Object => write!(f, "OBJECT"),
        }
    }
}
