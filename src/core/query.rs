//! Metadata-driven statement builder and executor
//!
//! A [`Query`] is bound to one table and a set of [`ColumnMetadata`] keyed by
//! property name. From that it builds parameterized INSERT, UPDATE, DELETE and
//! SELECT statements, converts every bound value through its column type and
//! extracts result rows back into property-keyed maps.
//!
//! A query either owns its connection (built from a [`Database`]) or borrows
//! one from the caller. [`Query::close`] always releases the statement first;
//! it closes the connection only when the query owns it.

use super::bind::BindArray;
use super::column::{ColumnMetadata, ColumnType};
use super::connection::{Connection, ResultSet, Statement};
use super::cursor::ResultCursor;
use super::database::Database;
use super::database_types::DatabaseType;
use super::error::{DatabaseError, Result};
use super::marshal::{DataMarshaller, JsonMarshaller};
use super::paged::PagedResult;
use super::trace::QueryTracer;
use super::value::{DatabaseRow, DatabaseValue};
use std::sync::Arc;
use tracing::{debug, warn};

/// Largest row count accepted by every supported dialect; stands in for
/// "no limit" when only an offset is set.
const UNBOUNDED_LIMIT: u64 = i64::MAX as u64;

enum ConnectionHandle<'c> {
    Owned {
        database: Arc<dyn Database>,
        connection: Option<Box<dyn Connection>>,
    },
    Borrowed(&'c mut dyn Connection),
}

impl ConnectionHandle<'_> {
    fn get(&mut self) -> Result<&mut dyn Connection> {
        match self {
            ConnectionHandle::Owned {
                connection: Some(conn),
                ..
            } => Ok(conn.as_mut()),
            ConnectionHandle::Owned {
                database,
                connection: None,
            } => Err(DatabaseError::connection(format!(
                "Query on database '{}' is closed",
                database.name()
            ))),
            ConnectionHandle::Borrowed(conn) => Ok(&mut **conn),
        }
    }

    fn database_type(&self) -> DatabaseType {
        match self {
            ConnectionHandle::Owned {
                connection: Some(conn),
                ..
            } => conn.database_type(),
            ConnectionHandle::Owned {
                connection: None, ..
            } => DatabaseType::None,
            ConnectionHandle::Borrowed(conn) => conn.database_type(),
        }
    }
}

/// Statement builder and executor for one table
pub struct Query<'c> {
    handle: ConnectionHandle<'c>,
    table: String,
    join_tables: Vec<String>,
    distinct: bool,
    columns: Vec<(String, ColumnMetadata)>,
    where_clause: Option<String>,
    supp_clause: Option<String>,
    bind_values: Vec<DatabaseValue>,
    offset: Option<u64>,
    limit: Option<u64>,
    statement: Option<Statement>,
    marshaller: Arc<dyn DataMarshaller>,
    tracer: Option<Arc<QueryTracer>>,
}

impl Query<'static> {
    /// Create a query that opens, and later closes, its own connection.
    ///
    /// # Errors
    ///
    /// Returns the database's error if no connection can be opened.
    pub fn new<S: Into<String>>(database: Arc<dyn Database>, table: S) -> Result<Self> {
        let connection = database.connection()?;
        Ok(Self::from_handle(
            ConnectionHandle::Owned {
                database,
                connection: Some(connection),
            },
            table.into(),
        ))
    }
}

impl<'c> Query<'c> {
    /// Create a query on a caller-owned connection; `close` never closes it
    pub fn with_connection<S: Into<String>>(connection: &'c mut dyn Connection, table: S) -> Self {
        Self::from_handle(ConnectionHandle::Borrowed(connection), table.into())
    }

    fn from_handle(handle: ConnectionHandle<'c>, table: String) -> Self {
        Self {
            handle,
            table,
            join_tables: Vec::new(),
            distinct: false,
            columns: Vec::new(),
            where_clause: None,
            supp_clause: None,
            bind_values: Vec::new(),
            offset: None,
            limit: None,
            statement: None,
            marshaller: Arc::new(JsonMarshaller),
            tracer: None,
        }
    }

    /// Use `marshaller` for `Marshalled` columns (JSON by default)
    #[must_use]
    pub fn with_marshaller(mut self, marshaller: Arc<dyn DataMarshaller>) -> Self {
        self.marshaller = marshaller;
        self
    }

    /// Time SELECT statements with `tracer`
    #[must_use]
    pub fn with_tracer(mut self, tracer: Arc<QueryTracer>) -> Self {
        self.tracer = Some(tracer);
        self
    }

    /// Reset columns, clauses, bind values and paging for reuse.
    ///
    /// A query that owns its connection reopens one if it was closed.
    pub fn init(&mut self) -> Result<()> {
        self.release_statement();
        self.join_tables.clear();
        self.distinct = false;
        self.columns.clear();
        self.where_clause = None;
        self.supp_clause = None;
        self.bind_values.clear();
        self.offset = None;
        self.limit = None;

        if let ConnectionHandle::Owned {
            database,
            connection: connection @ None,
        } = &mut self.handle
        {
            *connection = Some(database.connection()?);
        }

        Ok(())
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn set_table<S: Into<String>>(&mut self, table: S) -> &mut Self {
        self.table = table.into();
        self
    }

    /// Whether `close` will close the connection
    pub fn owns_connection(&self) -> bool {
        matches!(self.handle, ConnectionHandle::Owned { .. })
    }

    /// Add a table to the FROM list of SELECT and COUNT statements
    pub fn add_join_table<S: Into<String>>(&mut self, table: S) -> &mut Self {
        self.join_tables.push(table.into());
        self
    }

    pub fn set_distinct(&mut self, distinct: bool) -> &mut Self {
        self.distinct = distinct;
        self
    }

    /// Map `property` to `column`. Re-adding a property replaces its column
    /// but keeps its position.
    pub fn add_column<S: Into<String>>(&mut self, property: S, column: ColumnMetadata) -> &mut Self {
        let property = property.into();
        match self.columns.iter_mut().find(|(p, _)| *p == property) {
            Some(entry) => entry.1 = column,
            None => self.columns.push((property, column)),
        }
        self
    }

    /// Add columns keyed by their own names
    pub fn add_columns<I: IntoIterator<Item = ColumnMetadata>>(&mut self, columns: I) -> &mut Self {
        for column in columns {
            let property = column.name().to_string();
            self.add_column(property, column);
        }
        self
    }

    pub fn column(&self, property: &str) -> Option<&ColumnMetadata> {
        self.columns
            .iter()
            .find(|(p, _)| p == property)
            .map(|(_, c)| c)
    }

    /// Columns in insertion order, with their property names
    pub fn columns(&self) -> impl Iterator<Item = (&str, &ColumnMetadata)> {
        self.columns.iter().map(|(p, c)| (p.as_str(), c))
    }

    /// Set the WHERE clause (without the keyword); may contain `?` placeholders
    pub fn set_where_clause<S: Into<String>>(&mut self, clause: S) -> &mut Self {
        self.where_clause = Some(clause.into());
        self
    }

    /// Set SQL appended after the WHERE clause, e.g. `ORDER BY name`
    pub fn set_supplemental_clause<S: Into<String>>(&mut self, clause: S) -> &mut Self {
        self.supp_clause = Some(clause.into());
        self
    }

    pub fn set_offset(&mut self, offset: Option<u64>) -> &mut Self {
        self.offset = offset;
        self
    }

    pub fn set_limit(&mut self, limit: Option<u64>) -> &mut Self {
        self.limit = limit;
        self
    }

    /// Append a value for the next placeholder of the where or supplemental
    /// clause, converted for `column_type`.
    pub fn add_bind_value<V: Into<DatabaseValue>>(
        &mut self,
        column_type: ColumnType,
        value: V,
    ) -> Result<&mut Self> {
        let value = column_type.to_sql(&value.into(), self.marshaller.as_ref())?;
        self.bind_values.push(value);
        Ok(self)
    }

    /// Replace the bind values with the contents of `binds`
    pub fn set_bind_values(&mut self, binds: &BindArray) -> Result<&mut Self> {
        self.bind_values.clear();
        for (column_type, value) in binds.iter() {
            self.add_bind_value(column_type, value.clone())?;
        }
        Ok(self)
    }

    /// Converted bind values in placeholder order
    pub fn bind_values(&self) -> &[DatabaseValue] {
        &self.bind_values
    }

    /// Insert one row. `values` is keyed by property; sequence, create-date and
    /// modify-date columns ignore any supplied value. The query is closed
    /// afterwards, whatever the outcome.
    pub fn insert(&mut self, values: &DatabaseRow) -> Result<u64> {
        let result = self.run_insert(values);
        self.close();
        result
    }

    /// Update the rows matching the where clause. Column values are bound
    /// first, then the explicit bind values. The query is closed afterwards.
    pub fn update(&mut self, values: &DatabaseRow) -> Result<u64> {
        let result = self.run_column_update(values);
        self.close();
        result
    }

    /// Delete the rows matching the where clause. The query is closed afterwards.
    pub fn delete(&mut self) -> Result<u64> {
        let sql = self.delete_sql();
        let params = self.bind_values.clone();
        let result = self.run_update(&sql, params);
        self.close();
        result
    }

    /// Run a caller-supplied statement with the explicit bind values. The query
    /// is closed afterwards.
    pub fn execute_update(&mut self, sql: &str) -> Result<u64> {
        let params = self.bind_values.clone();
        let result = self.run_update(sql, params);
        self.close();
        result
    }

    /// Run the SELECT built from this query's metadata
    #[track_caller]
    pub fn select(&mut self) -> Result<ResultCursor<'_, 'c>> {
        let sql = self.select_sql();
        self.open_cursor(&sql)
    }

    /// Run a caller-supplied SELECT with the explicit bind values; rows are
    /// extracted through this query's metadata.
    #[track_caller]
    pub fn execute_query(&mut self, sql: &str) -> Result<ResultCursor<'_, 'c>> {
        self.open_cursor(sql)
    }

    /// Count the rows the SELECT would return, ignoring paging. Releases the
    /// statement but keeps the connection open.
    #[track_caller]
    pub fn count(&mut self) -> Result<u64> {
        let sql = self.count_sql();
        let params = self.bind_values.clone();
        let results = self.run_query(&sql, params);
        self.release_statement();

        let count = results?
            .next()
            .and_then(|row| row.into_iter().next())
            .and_then(|value| value.as_long())
            .ok_or_else(|| DatabaseError::query(format!("No count returned by: {}", sql)))?;

        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Fetch `page_size` rows starting at `offset`. A known `count` is reused;
    /// otherwise it is computed first. The query is closed afterwards.
    #[track_caller]
    pub fn select_page(
        &mut self,
        count: Option<u64>,
        offset: u64,
        page_size: u64,
    ) -> Result<PagedResult<DatabaseRow>> {
        let result = self.fetch_page(count, offset, page_size);
        self.close();
        result
    }

    #[track_caller]
    fn fetch_page(
        &mut self,
        count: Option<u64>,
        offset: u64,
        page_size: u64,
    ) -> Result<PagedResult<DatabaseRow>> {
        let total = match count {
            Some(total) => total,
            None => self.count()?,
        };

        self.offset = Some(offset);
        self.limit = Some(page_size);
        let rows = self.select()?.into_rows()?;

        Ok(PagedResult::from_items(rows, total))
    }

    /// SQL of [`Query::insert`]
    ///
    /// # Errors
    ///
    /// Returns a data access error when no columns are configured.
    pub fn insert_sql(&self) -> Result<String> {
        self.require_columns()?;

        let dialect = self.handle.database_type();
        let mut names = Vec::with_capacity(self.columns.len());
        let mut values = Vec::with_capacity(self.columns.len());

        for (_, column) in &self.columns {
            names.push(column.name());
            values.push(if column.is_sequence() {
                dialect.sequence_value_sql()
            } else if column.is_create_date() || column.is_modify_date() {
                dialect.current_timestamp_sql()
            } else {
                "?"
            });
        }

        Ok(format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table,
            names.join(", "),
            values.join(", ")
        ))
    }

    /// SQL of [`Query::update`]
    ///
    /// # Errors
    ///
    /// Returns a data access error when no column can be updated.
    pub fn update_sql(&self) -> Result<String> {
        self.require_columns()?;

        let now = self.handle.database_type().current_timestamp_sql();
        let assignments: Vec<String> = self
            .columns
            .iter()
            .map(|(_, column)| column)
            .filter(|column| !column.is_sequence() && !column.is_create_date())
            .map(|column| {
                if column.is_modify_date() {
                    format!("{} = {}", column.name(), now)
                } else {
                    format!("{} = ?", column.name())
                }
            })
            .collect();

        if assignments.is_empty() {
            return Err(DatabaseError::data_access(format!(
                "No updatable columns for table {}",
                self.table
            )));
        }

        let mut sql = format!("UPDATE {} SET {}", self.table, assignments.join(", "));
        self.push_where(&mut sql);
        Ok(sql)
    }

    /// SQL of [`Query::delete`]
    pub fn delete_sql(&self) -> String {
        let mut sql = format!("DELETE FROM {}", self.table);
        self.push_where(&mut sql);
        sql
    }

    /// SQL of [`Query::select`]
    pub fn select_sql(&self) -> String {
        let mut sql = format!("SELECT {}", self.select_list());
        self.push_from_where(&mut sql);

        // Add supplemental clause (ordering, grouping)
        if let Some(supp) = &self.supp_clause {
            sql.push(' ');
            sql.push_str(supp);
        }

        // Add LIMIT / OFFSET
        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) => {
                sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset))
            }
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {}", limit)),
            (None, Some(offset)) => {
                sql.push_str(&format!(" LIMIT {} OFFSET {}", UNBOUNDED_LIMIT, offset))
            }
            (None, None) => {}
        }

        sql
    }

    /// SQL of [`Query::count`]
    pub fn count_sql(&self) -> String {
        if self.distinct {
            let mut inner = format!("SELECT {}", self.select_list());
            self.push_from_where(&mut inner);
            return format!("SELECT COUNT(*) FROM ({}) AS counted", inner);
        }

        let mut sql = "SELECT COUNT(*)".to_string();
        self.push_from_where(&mut sql);
        sql
    }

    /// Convert one raw result row into `row`, keyed by column label. Labels
    /// without metadata pass through unconverted; null values are left out.
    pub fn extract_row(
        &self,
        labels: &[String],
        raw: Vec<DatabaseValue>,
        row: &mut DatabaseRow,
    ) -> Result<()> {
        for (label, value) in labels.iter().zip(raw) {
            let column_type = self
                .column_for_label(label)
                .map(ColumnMetadata::column_type)
                .unwrap_or_default();

            if let Some(value) = column_type.from_sql(value, self.marshaller.as_ref())? {
                row.insert(label.clone(), value);
            }
        }
        Ok(())
    }

    /// Release the statement, then the connection if this query owns it.
    /// Failures are logged, never returned. Safe to call repeatedly.
    pub fn close(&mut self) {
        self.release_statement();

        if let ConnectionHandle::Owned {
            database,
            connection,
        } = &mut self.handle
        {
            if let Some(mut conn) = connection.take() {
                if let Err(e) = conn.close() {
                    warn!(database = database.name(), error = %e, "Failed to close connection");
                }
            }
        }
    }

    fn release_statement(&mut self) {
        let Some(statement) = self.statement.take() else {
            return;
        };

        match self.handle.get() {
            Ok(conn) => {
                if let Err(e) = conn.close_statement(statement) {
                    warn!(table = %self.table, error = %e, "Failed to close statement");
                }
            }
            Err(e) => debug!(error = %e, "Statement released without a connection"),
        }
    }

    fn run_insert(&mut self, values: &DatabaseRow) -> Result<u64> {
        let sql = self.insert_sql()?;
        let params = self.column_params(values)?;
        self.run_update(&sql, params)
    }

    fn run_column_update(&mut self, values: &DatabaseRow) -> Result<u64> {
        let sql = self.update_sql()?;
        let mut params = self.column_params(values)?;
        params.extend(self.bind_values.iter().cloned());
        self.run_update(&sql, params)
    }

    fn require_columns(&self) -> Result<()> {
        if self.columns.is_empty() {
            return Err(DatabaseError::data_access(format!(
                "Missing column information for table {}",
                self.table
            )));
        }
        Ok(())
    }

    /// Caller values for every non-generated column, in column order
    fn column_params(&self, values: &DatabaseRow) -> Result<Vec<DatabaseValue>> {
        let mut params = Vec::with_capacity(self.columns.len());

        for (property, column) in &self.columns {
            if column.is_generated() {
                continue;
            }

            let column_type = column.column_type();
            let value = match values.get(property) {
                Some(value) if !value.is_null() => {
                    column_type.to_sql(value, self.marshaller.as_ref())?
                }
                _ => column_type.null_value(),
            };
            params.push(value);
        }

        Ok(params)
    }

    fn column_for_label(&self, label: &str) -> Option<&ColumnMetadata> {
        self.columns
            .iter()
            .find(|(p, _)| p.eq_ignore_ascii_case(label))
            .or_else(|| {
                self.columns
                    .iter()
                    .find(|(_, c)| c.name().eq_ignore_ascii_case(label))
            })
            .map(|(_, c)| c)
    }

    fn select_list(&self) -> String {
        let mut list = String::new();
        if self.distinct {
            list.push_str("DISTINCT ");
        }

        if self.columns.is_empty() {
            list.push('*');
            return list;
        }

        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|(property, column)| {
                if property == column.name() {
                    property.clone()
                } else {
                    format!("{} AS {}", column.name(), property)
                }
            })
            .collect();
        list.push_str(&columns.join(", "));
        list
    }

    fn push_from_where(&self, sql: &mut String) {
        sql.push_str(&format!(" FROM {}", self.table));
        for join in &self.join_tables {
            sql.push_str(&format!(", {}", join));
        }
        self.push_where(sql);
    }

    fn push_where(&self, sql: &mut String) {
        if let Some(clause) = self.where_clause.as_deref().filter(|c| !c.trim().is_empty()) {
            sql.push_str(&format!(" WHERE {}", clause));
        }
    }

    fn run_update(&mut self, sql: &str, params: Vec<DatabaseValue>) -> Result<u64> {
        self.release_statement();
        debug!(sql, params = params.len(), "Executing update");

        let conn = self.handle.get()?;
        let mut statement = conn.prepare(sql)?;
        for value in params {
            statement.bind(value);
        }

        let result = conn.execute_update(&statement);
        self.statement = Some(statement);
        result
    }

    #[track_caller]
    fn run_query(&mut self, sql: &str, params: Vec<DatabaseValue>) -> Result<ResultSet> {
        self.release_statement();
        debug!(sql, params = params.len(), "Executing query");

        let conn = self.handle.get()?;
        let mut statement = conn.prepare(sql)?;
        for value in params {
            statement.bind(value);
        }

        let result = match &self.tracer {
            Some(tracer) => tracer.execute_query(conn, &statement),
            None => conn.execute_query(&statement),
        };
        self.statement = Some(statement);
        result
    }

    #[track_caller]
    fn open_cursor(&mut self, sql: &str) -> Result<ResultCursor<'_, 'c>> {
        let params = self.bind_values.clone();
        let results = self.run_query(sql, params)?;
        Ok(ResultCursor::new(self, results))
    }
}

impl Drop for Query<'_> {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Query<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("table", &self.table)
            .field("owns_connection", &self.owns_connection())
            .field("columns", &self.columns)
            .field("where_clause", &self.where_clause)
            .field("bind_values", &self.bind_values)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{recording_database, RecordingConnection};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn player_columns(query: &mut Query<'_>) {
        query
            .add_column("id", ColumnMetadata::new("id", ColumnType::Integer).as_sequence())
            .add_column(
                "created",
                ColumnMetadata::new("create_date", ColumnType::Timestamp).as_create_date(),
            )
            .add_column("name", ColumnMetadata::new("name", ColumnType::Other))
            .add_column("chips", ColumnMetadata::new("chips", ColumnType::Integer));
    }

    fn row(pairs: Vec<(&str, DatabaseValue)>) -> DatabaseRow {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn test_insert_binds_only_plain_columns() {
        let conn = RecordingConnection::new();
        let mut handle = conn.clone();
        let mut query = Query::with_connection(&mut handle, "players");
        player_columns(&mut query);

        let values = row(vec![
            ("id", DatabaseValue::Int(99)),
            ("created", DatabaseValue::Long(0)),
            ("name", DatabaseValue::from("bar")),
            ("chips", DatabaseValue::Long(42)),
        ]);
        let rows = query.insert(&values).unwrap();
        drop(query);

        assert_eq!(rows, 1);
        let log = conn.log();
        let stmt = log.last_update().unwrap();
        assert_eq!(
            stmt.sql(),
            "INSERT INTO players (id, create_date, name, chips) VALUES (NULL, NOW(), ?, ?)"
        );
        assert_eq!(stmt.placeholder_count(), 2);
        assert_eq!(
            stmt.params(),
            &[DatabaseValue::from("bar"), DatabaseValue::Int(42)]
        );
        assert_eq!(log.statement_closes, 1);
        assert_eq!(log.connection_closes, 0);
    }

    #[test]
    fn test_insert_uses_dialect_expressions() {
        let conn = RecordingConnection::new().with_database_type(DatabaseType::Postgres);
        let mut handle = conn.clone();
        let mut query = Query::with_connection(&mut handle, "players");
        player_columns(&mut query);

        assert_eq!(
            query.insert_sql().unwrap(),
            "INSERT INTO players (id, create_date, name, chips) VALUES (DEFAULT, NOW(), ?, ?)"
        );
    }

    #[test]
    fn test_insert_null_boolean_binds_false() {
        let conn = RecordingConnection::new();
        let mut handle = conn.clone();
        let mut query = Query::with_connection(&mut handle, "prefs");
        query
            .add_column("muted", ColumnMetadata::new("muted", ColumnType::Boolean))
            .add_column("theme", ColumnMetadata::new("theme", ColumnType::Other));

        query.insert(&DatabaseRow::new()).unwrap();
        drop(query);

        assert_eq!(
            conn.log().last_update().unwrap().params(),
            &[DatabaseValue::Bool(false), DatabaseValue::Null]
        );
    }

    #[test]
    fn test_insert_without_columns_fails() {
        let conn = RecordingConnection::new();
        let mut handle = conn.clone();
        let mut query = Query::with_connection(&mut handle, "players");

        let err = query.insert(&DatabaseRow::new()).unwrap_err();
        assert!(matches!(err, DatabaseError::DataAccess(_)));
        drop(query);
        assert!(conn.log().prepared.is_empty());
    }

    #[test]
    fn test_update_binds_columns_then_where_values() {
        let conn = RecordingConnection::new().with_affected_rows(3);
        let mut handle = conn.clone();
        let mut query = Query::with_connection(&mut handle, "players");
        player_columns(&mut query);
        query.add_column(
            "modified",
            ColumnMetadata::new("modify_date", ColumnType::Timestamp).as_modify_date(),
        );
        query.set_where_clause("id = ?");
        query.add_bind_value(ColumnType::Integer, 7).unwrap();

        let values = row(vec![
            ("name", DatabaseValue::from("bar")),
            ("chips", DatabaseValue::Int(42)),
            ("modified", DatabaseValue::Long(5)),
        ]);
        assert_eq!(query.update(&values).unwrap(), 3);
        drop(query);

        let log = conn.log();
        let stmt = log.last_update().unwrap();
        assert_eq!(
            stmt.sql(),
            "UPDATE players SET name = ?, chips = ?, modify_date = NOW() WHERE id = ?"
        );
        assert_eq!(
            stmt.params(),
            &[
                DatabaseValue::from("bar"),
                DatabaseValue::Int(42),
                DatabaseValue::Int(7)
            ]
        );
    }

    #[test]
    fn test_update_needs_an_updatable_column() {
        let mut conn = RecordingConnection::new();
        let mut query = Query::with_connection(&mut conn, "players");
        query.add_column("id", ColumnMetadata::new("id", ColumnType::Integer).as_sequence());

        let err = query.update(&DatabaseRow::new()).unwrap_err();
        assert!(matches!(err, DatabaseError::DataAccess(_)));
    }

    #[test]
    fn test_delete_binds_only_bind_values() {
        let conn = RecordingConnection::new();
        let mut handle = conn.clone();
        let mut query = Query::with_connection(&mut handle, "players");
        player_columns(&mut query);

        let mut binds = BindArray::new();
        binds
            .add(ColumnType::Other, "ann")
            .add(ColumnType::Timestamp, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        query.set_where_clause("name = ? AND create_date < ?");
        query.set_bind_values(&binds).unwrap();
        query.delete().unwrap();
        drop(query);

        let log = conn.log();
        let stmt = log.last_update().unwrap();
        assert_eq!(
            stmt.sql(),
            "DELETE FROM players WHERE name = ? AND create_date < ?"
        );
        assert_eq!(stmt.params().len(), 2);
        assert!(matches!(stmt.params()[1], DatabaseValue::Timestamp(_)));
    }

    #[test]
    fn test_select_and_count_sql() {
        let mut conn = RecordingConnection::new();
        let mut query = Query::with_connection(&mut conn, "players p");
        query
            .add_column("id", ColumnMetadata::new("p.id", ColumnType::Integer))
            .add_column("name", ColumnMetadata::new("name", ColumnType::Other))
            .add_join_table("seats s")
            .set_where_clause("s.player_id = p.id AND s.table_id = ?")
            .set_supplemental_clause("ORDER BY name")
            .set_limit(Some(10))
            .set_offset(Some(20));

        assert_eq!(
            query.select_sql(),
            "SELECT p.id AS id, name FROM players p, seats s \
             WHERE s.player_id = p.id AND s.table_id = ? ORDER BY name LIMIT 10 OFFSET 20"
        );
        assert_eq!(
            query.count_sql(),
            "SELECT COUNT(*) FROM players p, seats s WHERE s.player_id = p.id AND s.table_id = ?"
        );

        query.set_distinct(true).set_limit(None);
        assert_eq!(
            query.count_sql(),
            "SELECT COUNT(*) FROM (SELECT DISTINCT p.id AS id, name FROM players p, seats s \
             WHERE s.player_id = p.id AND s.table_id = ?) AS counted"
        );
        assert!(query
            .select_sql()
            .ends_with(&format!("LIMIT {} OFFSET 20", UNBOUNDED_LIMIT)));
    }

    #[test]
    fn test_extract_row_converts_by_label() {
        let mut conn = RecordingConnection::new();
        let mut query = Query::with_connection(&mut conn, "hands");
        query
            .add_column("played", ColumnMetadata::new("played_at", ColumnType::Timestamp))
            .add_column("state", ColumnMetadata::new("state", ColumnType::Marshalled))
            .add_column("raw", ColumnMetadata::new("raw", ColumnType::Binary));

        let at = Utc.with_ymd_and_hms(2024, 5, 4, 3, 2, 1).unwrap();
        let labels: Vec<String> = ["played", "state", "raw", "extra"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let raw = vec![
            DatabaseValue::from("2024-05-04 03:02:01.000"),
            DatabaseValue::from(r#"{"pot":10}"#),
            DatabaseValue::Null,
            DatabaseValue::Long(8),
        ];

        let mut out = DatabaseRow::new();
        query.extract_row(&labels, raw, &mut out).unwrap();

        assert_eq!(
            out.get("played"),
            Some(&DatabaseValue::Long(at.timestamp_millis()))
        );
        assert_eq!(out.get("state"), Some(&DatabaseValue::Object(json!({"pot": 10}))));
        assert!(!out.contains_key("raw"));
        assert_eq!(out.get("extra"), Some(&DatabaseValue::Long(8)));
    }

    #[test]
    fn test_borrowed_connection_is_never_closed() {
        let conn = RecordingConnection::new();
        let mut handle = conn.clone();
        let mut query = Query::with_connection(&mut handle, "players");
        assert!(!query.owns_connection());

        query.execute_update("DELETE FROM players").unwrap();
        query.close();
        query.close();
        drop(query);

        let log = conn.log();
        assert_eq!(log.statement_closes, 1);
        assert_eq!(log.connection_closes, 0);
    }

    #[test]
    fn test_owned_connection_closed_once() {
        let conn = RecordingConnection::new();
        let (database, driver) = recording_database("main", conn.clone()).unwrap();

        let mut query = Query::new(database, "players").unwrap();
        assert!(query.owns_connection());
        query.execute_update("DELETE FROM players").unwrap();
        query.close();
        query.close();

        assert_eq!(conn.log().connection_closes, 1);
        assert!(query.delete().is_err());

        query.init().unwrap();
        assert_eq!(query.delete().unwrap(), 1);
        assert_eq!(driver.requests().len(), 2);
        assert_eq!(conn.log().connection_closes, 2);
    }

    #[test]
    fn test_close_failures_are_swallowed() {
        let conn = RecordingConnection::new().failing_close();
        let (database, _driver) = recording_database("main", conn.clone()).unwrap();

        let mut query = Query::new(database, "players").unwrap();
        assert_eq!(query.execute_update("DELETE FROM players").unwrap(), 1);
        query.close();

        let log = conn.log();
        assert_eq!(log.statement_closes, 1);
        assert_eq!(log.connection_closes, 1);
    }

    #[test]
    fn test_select_page_reuses_known_count() {
        let conn = RecordingConnection::new();
        conn.push_result(ResultSet::new(
            vec!["id".to_string()],
            (0..7).map(|i| vec![DatabaseValue::Long(130 + i)]).collect(),
        ));
        let mut handle = conn.clone();

        let mut query = Query::with_connection(&mut handle, "players");
        query.add_column("id", ColumnMetadata::new("id", ColumnType::Integer));
        let page = query.select_page(Some(137), 130, 10).unwrap();
        drop(query);

        assert_eq!(page.len(), 7);
        assert_eq!(page.total_size(), 137);
        let log = conn.log();
        assert_eq!(log.queries.len(), 1);
        assert_eq!(
            log.last_query().unwrap().sql(),
            "SELECT id FROM players LIMIT 10 OFFSET 130"
        );
    }

    #[test]
    fn test_select_page_counts_when_unknown() {
        let conn = RecordingConnection::new();
        conn.push_result(ResultSet::new(
            vec!["COUNT(*)".to_string()],
            vec![vec![DatabaseValue::Long(3)]],
        ));
        conn.push_result(ResultSet::new(
            vec!["id".to_string()],
            vec![vec![DatabaseValue::Long(1)]],
        ));
        let mut handle = conn.clone();

        let mut query = Query::with_connection(&mut handle, "players");
        query.set_where_clause("chips > ?");
        query.add_bind_value(ColumnType::Integer, 100).unwrap();
        let page = query.select_page(None, 0, 1).unwrap();
        drop(query);

        assert_eq!(page.total_size(), 3);
        let log = conn.log();
        assert_eq!(log.queries[0].sql(), "SELECT COUNT(*) FROM players WHERE chips > ?");
        assert_eq!(log.queries[0].params(), &[DatabaseValue::Int(100)]);
        assert_eq!(log.queries[1].params(), &[DatabaseValue::Int(100)]);
    }
}
