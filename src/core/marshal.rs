//! Object marshalling for opaque columns
//!
//! Columns of type [`ColumnType::Marshalled`](super::column::ColumnType) store a
//! business object as text. The query layer never serializes objects itself; it
//! calls the [`DataMarshaller`] it was given.

use super::error::{DatabaseError, Result};

/// Converts business objects to and from their stored string form
pub trait DataMarshaller: Send + Sync {
    /// Object to stored text
    fn marshal(&self, object: &serde_json::Value) -> Result<String>;

    /// Stored text to object
    fn demarshal(&self, text: &str) -> Result<serde_json::Value>;
}

/// Stores objects as compact JSON
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonMarshaller;

impl DataMarshaller for JsonMarshaller {
    fn marshal(&self, object: &serde_json::Value) -> Result<String> {
        serde_json::to_string(object).map_err(|e| DatabaseError::marshal(e.to_string()))
    }

    fn demarshal(&self, text: &str) -> Result<serde_json::Value> {
        serde_json::from_str(text).map_err(|e| DatabaseError::marshal(e.to_string()))
    }
}
