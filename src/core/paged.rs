//! Paged result lists

use serde::Serialize;
use std::ops::{Deref, DerefMut};

/// One page of items plus the size of the full result
///
/// `total_size` is independent of the page length and stays `0` until the
/// caller sets it from a count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PagedResult<T> {
    items: Vec<T>,
    total_size: u64,
}

impl<T> Default for PagedResult<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            total_size: 0,
        }
    }
}

impl<T> PagedResult<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A page whose total is already known
    pub fn from_items(items: Vec<T>, total_size: u64) -> Self {
        Self { items, total_size }
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn set_total_size(&mut self, total_size: u64) {
        self.total_size = total_size;
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }

    /// Convert every item, keeping the total
    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> PagedResult<U> {
        PagedResult {
            items: self.items.into_iter().map(f).collect(),
            total_size: self.total_size,
        }
    }
}

impl<T> Deref for PagedResult<T> {
    type Target = Vec<T>;

    fn deref(&self) -> &Self::Target {
        &self.items
    }
}

impl<T> DerefMut for PagedResult<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.items
    }
}

impl<T> IntoIterator for PagedResult<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a PagedResult<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T> FromIterator<T> for PagedResult<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
            total_size: 0,
        }
    }
}
