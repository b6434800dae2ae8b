//! Column metadata and type-directed value conversion
//!
//! Every value crossing the statement boundary goes through its column's
//! [`ColumnType`]: outbound with [`ColumnType::to_sql`] before binding, inbound
//! with [`ColumnType::from_sql`] when a row is extracted.

use super::error::{DatabaseError, Result};
use super::marshal::DataMarshaller;
use super::value::DatabaseValue;
use serde::{Deserialize, Serialize};

/// Logical type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ColumnType {
    /// Binary large object
    Binary,
    /// Date, time or timestamp; read back as epoch milliseconds
    Timestamp,
    /// 32-bit integer
    Integer,
    /// Boolean; an absent value binds as `false`
    Boolean,
    /// Business object stored as text through a `DataMarshaller`
    Marshalled,
    /// Passed through unchanged
    #[default]
    Other,
}

impl ColumnType {
    /// Convert a caller value into the value bound to the statement.
    ///
    /// `Null` stays `Null` for every type; use [`ColumnType::null_value`] for
    /// the binding of an absent value.
    ///
    /// # Errors
    ///
    /// Returns a type mismatch when the value cannot represent this type, or
    /// the marshaller's error for `Marshalled`.
    pub fn to_sql(
        &self,
        value: &DatabaseValue,
        marshaller: &dyn DataMarshaller,
    ) -> Result<DatabaseValue> {
        if value.is_null() {
            return Ok(DatabaseValue::Null);
        }

        match self {
            ColumnType::Binary => match value {
                DatabaseValue::Bytes(bytes) => Ok(DatabaseValue::Bytes(bytes.clone())),
                other => Err(DatabaseError::type_mismatch("bytes", other.type_name())),
            },
            ColumnType::Timestamp => match value {
                DatabaseValue::Timestamp(_) | DatabaseValue::Int(_) | DatabaseValue::Long(_) => value
                    .as_timestamp()
                    .map(DatabaseValue::Timestamp)
                    .ok_or_else(|| DatabaseError::type_mismatch("timestamp", "out of range")),
                other => Err(DatabaseError::type_mismatch("timestamp", other.type_name())),
            },
            ColumnType::Integer => narrow_int(value)
                .ok_or_else(|| DatabaseError::type_mismatch("integer", value.type_name())),
            ColumnType::Marshalled => {
                let object = match value {
                    DatabaseValue::Object(object) => object.clone(),
                    DatabaseValue::String(text) => serde_json::Value::String(text.clone()),
                    DatabaseValue::Bool(flag) => serde_json::Value::Bool(*flag),
                    DatabaseValue::Int(n) => serde_json::Value::from(*n),
                    DatabaseValue::Long(n) => serde_json::Value::from(*n),
                    DatabaseValue::Double(n) => serde_json::Value::from(*n),
                    other => return Err(DatabaseError::type_mismatch("object", other.type_name())),
                };
                Ok(DatabaseValue::String(marshaller.marshal(&object)?))
            }
            ColumnType::Boolean | ColumnType::Other => Ok(value.clone()),
        }
    }

    /// Value bound when the caller supplies none
    pub fn null_value(&self) -> DatabaseValue {
        match self {
            ColumnType::Boolean => DatabaseValue::Bool(false),
            _ => DatabaseValue::Null,
        }
    }

    /// Convert a raw result value; `None` means the row has no value here.
    ///
    /// # Errors
    ///
    /// Returns the marshaller's error for a `Marshalled` column holding text
    /// it cannot read, or a type mismatch for an unreadable timestamp.
    pub fn from_sql(
        &self,
        raw: DatabaseValue,
        marshaller: &dyn DataMarshaller,
    ) -> Result<Option<DatabaseValue>> {
        if raw.is_null() {
            return Ok(None);
        }

        let value = match self {
            ColumnType::Binary => match raw {
                DatabaseValue::Bytes(bytes) => DatabaseValue::Bytes(bytes),
                DatabaseValue::String(text) => DatabaseValue::Bytes(text.into_bytes()),
                other => other,
            },
            ColumnType::Timestamp => {
                let millis = raw
                    .as_epoch_millis()
                    .ok_or_else(|| DatabaseError::type_mismatch("timestamp", raw.type_name()))?;
                DatabaseValue::Long(millis)
            }
            // Drivers may hand back a wider number than the column holds
            ColumnType::Integer => narrow_int(&raw).unwrap_or(raw),
            ColumnType::Boolean => raw.as_bool().map(DatabaseValue::Bool).unwrap_or(raw),
            ColumnType::Marshalled => match raw {
                DatabaseValue::String(text) if text.is_empty() => return Ok(None),
                DatabaseValue::String(text) => DatabaseValue::Object(marshaller.demarshal(&text)?),
                other => other,
            },
            ColumnType::Other => raw,
        };

        Ok(Some(value))
    }
}

/// Cast to 32 bits, keeping the low bits of wider numbers
fn narrow_int(value: &DatabaseValue) -> Option<DatabaseValue> {
    match value {
        DatabaseValue::Int(n) => Some(DatabaseValue::Int(*n)),
        other => other.as_long().map(|n| DatabaseValue::Int(n as i32)),
    }
}

/// Name, type and auto-generation flags of one column
///
/// Sequence, create-date and modify-date columns never take a caller value:
/// the query builder skips them when binding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnMetadata {
    name: String,
    column_type: ColumnType,
    sequence: bool,
    create_date: bool,
    modify_date: bool,
}

impl ColumnMetadata {
    pub fn new<S: Into<String>>(name: S, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            sequence: false,
            create_date: false,
            modify_date: false,
        }
    }

    /// Mark as assigned by the database (auto-increment)
    pub fn as_sequence(mut self) -> Self {
        self.sequence = true;
        self
    }

    /// Mark as set to the current time on insert
    pub fn as_create_date(mut self) -> Self {
        self.create_date = true;
        self
    }

    /// Mark as set to the current time on insert and update
    pub fn as_modify_date(mut self) -> Self {
        self.modify_date = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    pub fn is_sequence(&self) -> bool {
        self.sequence
    }

    pub fn is_create_date(&self) -> bool {
        self.create_date
    }

    pub fn is_modify_date(&self) -> bool {
        self.modify_date
    }

    /// Whether the value comes from the database rather than the caller
    pub fn is_generated(&self) -> bool {
        self.sequence || self.create_date || self.modify_date
    }

    pub fn set_name<S: Into<String>>(&mut self, name: S) {
        self.name = name.into();
    }

    pub fn set_column_type(&mut self, column_type: ColumnType) {
        self.column_type = column_type;
    }

    pub fn set_sequence(&mut self, sequence: bool) {
        self.sequence = sequence;
    }

    pub fn set_create_date(&mut self, create_date: bool) {
        self.create_date = create_date;
    }

    pub fn set_modify_date(&mut self, modify_date: bool) {
        self.modify_date = modify_date;
    }
}

impl std::fmt::Display for ColumnMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}
