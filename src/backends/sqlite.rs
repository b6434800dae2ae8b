//! SQLite driver
//!
//! Connection strings are a file path, `sqlite:<path>` or `:memory:`.
//! Credentials are accepted and ignored. Timestamps are stored as UTC text in
//! [`SQL_TIMESTAMP_FORMAT`](crate::core::value::SQL_TIMESTAMP_FORMAT), the same
//! layout SQLite's `strftime('%Y-%m-%d %H:%M:%f')` produces.

use crate::core::connection::{Connection, Driver, ResultSet, Statement};
use crate::core::database_types::DatabaseType;
use crate::core::error::{DatabaseError, Result};
use crate::core::value::{format_sql_timestamp, DatabaseValue};
use rusqlite::types::ValueRef;
use rusqlite::{params_from_iter, ToSql};

/// Driver opening [`SqliteConnection`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDriver;

impl Driver for SqliteDriver {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Sqlite
    }

    fn connect(
        &self,
        url: &str,
        _username: Option<&str>,
        _password: Option<&str>,
    ) -> Result<Box<dyn Connection>> {
        Ok(Box::new(SqliteConnection::open(url)?))
    }
}

/// A SQLite connection
///
/// Prepared statements live in rusqlite's statement cache, so releasing a
/// [`Statement`] is a no-op and re-running the same SQL skips the parse.
pub struct SqliteConnection {
    conn: Option<rusqlite::Connection>,
}

impl SqliteConnection {
    /// Open a database file (created if missing) or an in-memory database
    pub fn open(url: &str) -> Result<Self> {
        let path = url.strip_prefix("sqlite:").unwrap_or(url);

        let conn = if path.is_empty() || path == ":memory:" {
            rusqlite::Connection::open_in_memory()?
        } else {
            rusqlite::Connection::open(path)?
        };

        // Enable foreign keys
        conn.execute("PRAGMA foreign_keys = ON", [])?;

        Ok(Self { conn: Some(conn) })
    }

    /// Run semicolon separated statements without parameters (schema setup)
    pub fn execute_batch(&mut self, sql: &str) -> Result<()> {
        self.conn()?.execute_batch(sql)?;
        Ok(())
    }

    fn conn(&self) -> Result<&rusqlite::Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| DatabaseError::connection("Not connected to database"))
    }

    /// Convert DatabaseValue to rusqlite parameter
    fn value_to_param(value: &DatabaseValue) -> Box<dyn ToSql> {
        match value {
            DatabaseValue::Null => Box::new(None::<i64>),
            DatabaseValue::Bool(v) => Box::new(*v),
            DatabaseValue::Int(v) => Box::new(*v),
            DatabaseValue::Long(v) => Box::new(*v),
            DatabaseValue::Double(v) => Box::new(*v),
            DatabaseValue::String(v) => Box::new(v.clone()),
            DatabaseValue::Bytes(v) => Box::new(v.clone()),
            DatabaseValue::Timestamp(v) => Box::new(format_sql_timestamp(v)),
            DatabaseValue::Object(v) => Box::new(v.to_string()),
        }
    }

    fn value_from_ref(value: ValueRef<'_>) -> DatabaseValue {
        match value {
            ValueRef::Null => DatabaseValue::Null,
            ValueRef::Integer(v) => DatabaseValue::Long(v),
            ValueRef::Real(v) => DatabaseValue::Double(v),
            // SQLite does not enforce UTF-8 in TEXT; keep invalid text as bytes
            ValueRef::Text(v) => match std::str::from_utf8(v) {
                Ok(text) => DatabaseValue::String(text.to_string()),
                Err(_) => DatabaseValue::Bytes(v.to_vec()),
            },
            ValueRef::Blob(v) => DatabaseValue::Bytes(v.to_vec()),
        }
    }

    fn params(statement: &Statement) -> Vec<Box<dyn ToSql>> {
        statement.params().iter().map(Self::value_to_param).collect()
    }
}

impl Connection for SqliteConnection {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Sqlite
    }

    fn prepare(&mut self, sql: &str) -> Result<Statement> {
        self.conn()?.prepare_cached(sql)?;
        Ok(Statement::new(sql))
    }

    fn execute_update(&mut self, statement: &Statement) -> Result<u64> {
        let mut stmt = self.conn()?.prepare_cached(statement.sql())?;
        let params = Self::params(statement);
        let affected = stmt.execute(params_from_iter(params.iter()))?;
        Ok(affected as u64)
    }

    fn execute_query(&mut self, statement: &Statement) -> Result<ResultSet> {
        let mut stmt = self.conn()?.prepare_cached(statement.sql())?;
        let labels: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        let column_count = labels.len();

        let params = Self::params(statement);
        let mut rows = stmt.query(params_from_iter(params.iter()))?;

        let mut results = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(column_count);
            for i in 0..column_count {
                values.push(Self::value_from_ref(row.get_ref(i)?));
            }
            results.push(values);
        }

        Ok(ResultSet::new(labels, results))
    }

    fn close_statement(&mut self, _statement: Statement) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        match self.conn.take() {
            Some(conn) => conn.close().map_err(|(_, e)| DatabaseError::from(e)),
            None => Ok(()),
        }
    }

    fn is_closed(&self) -> bool {
        self.conn.is_none()
    }
}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("closed", &self.is_closed())
            .finish()
    }
}
