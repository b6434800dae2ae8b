//! Positional bind values

use super::column::ColumnType;
use super::value::DatabaseValue;

/// Ordered (type, value) pairs for the `?` placeholders of a hand-written clause
///
/// Order matters: the n-th entry binds the n-th placeholder of the where or
/// supplemental clause.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindArray {
    entries: Vec<(ColumnType, DatabaseValue)>,
}

impl BindArray {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value
    pub fn add<V: Into<DatabaseValue>>(&mut self, column_type: ColumnType, value: V) -> &mut Self {
        self.entries.push((column_type, value.into()));
        self
    }

    /// Append a value, builder style
    pub fn with<V: Into<DatabaseValue>>(mut self, column_type: ColumnType, value: V) -> Self {
        self.add(column_type, value);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get_type(&self, index: usize) -> Option<ColumnType> {
        self.entries.get(index).map(|(t, _)| *t)
    }

    pub fn get_value(&self, index: usize) -> Option<&DatabaseValue> {
        self.entries.get(index).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ColumnType, &DatabaseValue)> {
        self.entries.iter().map(|(t, v)| (*t, v))
    }
}

impl<'a> IntoIterator for &'a BindArray {
    type Item = &'a (ColumnType, DatabaseValue);
    type IntoIter = std::slice::Iter<'a, (ColumnType, DatabaseValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
