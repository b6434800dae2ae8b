//! Values bound to statements and read back from result rows

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Text layout used for timestamps in databases without a native timestamp type
pub const SQL_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// One SQL parameter or result cell
///
/// Drivers produce the wide variants (`Long`, `Double`, `String`, `Bytes`);
/// column conversion narrows them to what the column metadata declares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DatabaseValue {
    /// SQL NULL
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    /// Text
    String(String),
    /// Binary column content
    Bytes(Vec<u8>),
    /// Point in time (UTC, millisecond precision once stored)
    Timestamp(DateTime<Utc>),
    /// Business object stored through a `DataMarshaller`
    Object(serde_json::Value),
}

impl DatabaseValue {
    /// Read as a flag. Numbers are true when non-zero; text accepts
    /// `true/false`, `1/0` and `yes/no` in any case.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DatabaseValue::Bool(flag) => Some(*flag),
            DatabaseValue::Int(n) => Some(*n != 0),
            DatabaseValue::Long(n) => Some(*n != 0),
            DatabaseValue::String(text) => {
                let text = text.trim();
                if ["true", "1", "yes"].iter().any(|t| text.eq_ignore_ascii_case(t)) {
                    Some(true)
                } else if ["false", "0", "no"].iter().any(|t| text.eq_ignore_ascii_case(t)) {
                    Some(false)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Read as a 32-bit integer; `None` when the value does not fit
    pub fn as_int(&self) -> Option<i32> {
        match self {
            DatabaseValue::Int(n) => Some(*n),
            DatabaseValue::Bool(flag) => Some(i32::from(*flag)),
            other => other.as_long().and_then(|n| i32::try_from(n).ok()),
        }
    }

    /// Read as a 64-bit integer. Timestamps read as epoch milliseconds and
    /// doubles are truncated.
    pub fn as_long(&self) -> Option<i64> {
        match self {
            DatabaseValue::Long(n) => Some(*n),
            DatabaseValue::Int(n) => Some(i64::from(*n)),
            DatabaseValue::Bool(flag) => Some(i64::from(*flag)),
            DatabaseValue::Double(n) => Some(*n as i64),
            DatabaseValue::String(text) => text.trim().parse().ok(),
            DatabaseValue::Timestamp(at) => Some(at.timestamp_millis()),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            DatabaseValue::Double(n) => Some(*n),
            DatabaseValue::String(text) => text.trim().parse().ok(),
            DatabaseValue::Int(_) | DatabaseValue::Long(_) => self.as_long().map(|n| n as f64),
            _ => None,
        }
    }

    /// Borrow text content
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DatabaseValue::String(text) => Some(text),
            _ => None,
        }
    }

    /// Render any value as text; see the `Display` impl
    pub fn as_string(&self) -> String {
        self.to_string()
    }

    /// Borrow binary content; text is returned as its UTF-8 bytes
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            DatabaseValue::Bytes(bytes) => Some(bytes),
            DatabaseValue::String(text) => Some(text.as_bytes()),
            _ => None,
        }
    }

    /// Read as a point in time.
    ///
    /// Integers are read as epoch milliseconds and strings are parsed in the
    /// layouts SQL engines commonly return.
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            DatabaseValue::Timestamp(at) => Some(*at),
            DatabaseValue::Int(_) | DatabaseValue::Long(_) => {
                self.as_long().and_then(DateTime::from_timestamp_millis)
            }
            DatabaseValue::String(text) => parse_sql_timestamp(text),
            _ => None,
        }
    }

    /// Read as milliseconds since the Unix epoch
    pub fn as_epoch_millis(&self) -> Option<i64> {
        self.as_timestamp().map(|at| at.timestamp_millis())
    }

    /// Borrow the marshalled business object
    pub fn as_object(&self) -> Option<&serde_json::Value> {
        match self {
            DatabaseValue::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, DatabaseValue::Null)
    }

    /// Short variant name used in type mismatch errors
    pub fn type_name(&self) -> &'static str {
        match self {
            DatabaseValue::Null => "null",
            DatabaseValue::Bool(_) => "bool",
            DatabaseValue::Int(_) => "int",
            DatabaseValue::Long(_) => "long",
            DatabaseValue::Double(_) => "double",
            DatabaseValue::String(_) => "string",
            DatabaseValue::Bytes(_) => "bytes",
            DatabaseValue::Timestamp(_) => "timestamp",
            DatabaseValue::Object(_) => "object",
        }
    }
}

impl fmt::Display for DatabaseValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseValue::Null => f.write_str("null"),
            DatabaseValue::Bool(flag) => write!(f, "{}", flag),
            DatabaseValue::Int(n) => write!(f, "{}", n),
            DatabaseValue::Long(n) => write!(f, "{}", n),
            DatabaseValue::Double(n) => write!(f, "{}", n),
            DatabaseValue::String(text) => f.write_str(text),
            DatabaseValue::Bytes(bytes) => write!(f, "<{} bytes>", bytes.len()),
            DatabaseValue::Timestamp(at) => f.write_str(&format_sql_timestamp(at)),
            DatabaseValue::Object(object) => write!(f, "{}", object),
        }
    }
}

/// Render a timestamp in [`SQL_TIMESTAMP_FORMAT`]
pub fn format_sql_timestamp(value: &DateTime<Utc>) -> String {
    value.format(SQL_TIMESTAMP_FORMAT).to_string()
}

/// Parse the timestamp layouts returned by SQL engines, assuming UTC when no
/// offset is present.
pub fn parse_sql_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();

    if let Ok(v) = DateTime::parse_from_rfc3339(text) {
        return Some(v.with_timezone(&Utc));
    }

    for layout in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(v) = NaiveDateTime::parse_from_str(text, layout) {
            return Some(v.and_utc());
        }
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|v| v.and_utc())
}

macro_rules! impl_from {
    ($($source:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$source> for DatabaseValue {
                fn from(v: $source) -> Self {
                    DatabaseValue::$variant(v)
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool,
    i32 => Int,
    i64 => Long,
    f64 => Double,
    String => String,
    Vec<u8> => Bytes,
    DateTime<Utc> => Timestamp,
    serde_json::Value => Object,
}

impl From<&str> for DatabaseValue {
    fn from(v: &str) -> Self {
        DatabaseValue::String(v.to_owned())
    }
}

impl<T: Into<DatabaseValue>> From<Option<T>> for DatabaseValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(DatabaseValue::Null, Into::into)
    }
}

/// A row of values keyed by property name (the result's column label)
pub type DatabaseRow = HashMap<String, DatabaseValue>;
