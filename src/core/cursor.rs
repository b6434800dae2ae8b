//! Forward-only cursor over query results

use super::connection::ResultSet;
use super::error::Result;
use super::query::Query;
use super::value::DatabaseRow;

/// Forward-only view of a query's rows, one row at a time
///
/// The cursor owns a single row map that is cleared and refilled by every
/// [`advance`](ResultCursor::advance); the borrow returned by
/// [`row`](ResultCursor::row) cannot outlive the next advance. Closing or
/// dropping the cursor closes the owning [`Query`].
pub struct ResultCursor<'q, 'c> {
    query: &'q mut Query<'c>,
    results: ResultSet,
    row: DatabaseRow,
}

impl<'q, 'c> ResultCursor<'q, 'c> {
    pub(crate) fn new(query: &'q mut Query<'c>, results: ResultSet) -> Self {
        Self {
            query,
            results,
            row: DatabaseRow::new(),
        }
    }

    /// Fetch the next row; `false` once the results are exhausted
    pub fn advance(&mut self) -> Result<bool> {
        self.row.clear();

        match self.results.next() {
            Some(raw) => {
                self.query
                    .extract_row(self.results.column_labels(), raw, &mut self.row)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Values of the current row, keyed by column label
    pub fn row(&self) -> &DatabaseRow {
        &self.row
    }

    /// Column labels of the result
    pub fn column_labels(&self) -> &[String] {
        self.results.column_labels()
    }

    /// Drain the remaining rows into owned maps, then close
    pub fn into_rows(mut self) -> Result<Vec<DatabaseRow>> {
        let mut rows = Vec::with_capacity(self.results.remaining());
        while self.advance()? {
            rows.push(std::mem::take(&mut self.row));
        }
        Ok(rows)
    }

    /// Close the owning query
    pub fn close(self) {}
}

impl Drop for ResultCursor<'_, '_> {
    fn drop(&mut self) {
        self.query.close();
    }
}
