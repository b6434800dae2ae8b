//! Connection, statement and driver primitives
//!
//! The query layer never talks to a database library directly. It prepares a
//! [`Statement`], binds values to its placeholders in order and hands it to a
//! [`Connection`]. Drivers are looked up by identifier in a [`DriverManager`].

use super::database_types::DatabaseType;
use super::error::{DatabaseError, Result};
use super::value::DatabaseValue;
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// A live connection to a database
///
/// A connection is used by one operation at a time; it must be `Send` so it can
/// move onto a blocking thread, but it is never shared between threads.
pub trait Connection: Send {
    /// SQL dialect spoken by this connection
    fn database_type(&self) -> DatabaseType;

    /// Prepare a statement, validating its SQL
    fn prepare(&mut self, sql: &str) -> Result<Statement>;

    /// Execute a statement that returns no rows; yields the affected row count
    fn execute_update(&mut self, statement: &Statement) -> Result<u64>;

    /// Execute a statement that returns rows
    fn execute_query(&mut self, statement: &Statement) -> Result<ResultSet>;

    /// Release a prepared statement
    fn close_statement(&mut self, statement: Statement) -> Result<()>;

    /// Close the connection. Closing a closed connection is a no-op.
    fn close(&mut self) -> Result<()>;

    /// Whether `close` has been called
    fn is_closed(&self) -> bool;
}

/// A prepared statement: SQL text plus values bound to its `?` placeholders
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    sql: String,
    params: Vec<DatabaseValue>,
}

impl Statement {
    /// Create an unbound statement
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// SQL text
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Bound values in placeholder order
    pub fn params(&self) -> &[DatabaseValue] {
        &self.params
    }

    /// Bind the next placeholder
    pub fn bind(&mut self, value: DatabaseValue) {
        self.params.push(value);
    }

    /// Number of `?` placeholders outside of quoted literals
    pub fn placeholder_count(&self) -> usize {
        let mut count = 0;
        let mut quote: Option<char> = None;

        for c in self.sql.chars() {
            match quote {
                Some(q) if c == q => quote = None,
                Some(_) => {}
                None if c == '\'' || c == '"' => quote = Some(c),
                None if c == '?' => count += 1,
                None => {}
            }
        }

        count
    }
}

/// Forward-only rows returned by a query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    labels: Vec<String>,
    rows: VecDeque<Vec<DatabaseValue>>,
}

impl ResultSet {
    /// Create a result set from column labels and rows
    pub fn new(labels: Vec<String>, rows: Vec<Vec<DatabaseValue>>) -> Self {
        Self {
            labels,
            rows: rows.into(),
        }
    }

    /// Column labels (aliases when the query used `AS`)
    pub fn column_labels(&self) -> &[String] {
        &self.labels
    }

    /// Rows not yet fetched
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }
}

impl Iterator for ResultSet {
    type Item = Vec<DatabaseValue>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rows.pop_front()
    }
}

/// A database driver: turns a resolved connection string into connections
pub trait Driver: Send + Sync {
    /// SQL dialect of connections made by this driver
    fn database_type(&self) -> DatabaseType;

    /// Open a new connection
    fn connect(
        &self,
        url: &str,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<Box<dyn Connection>>;
}

/// Table of drivers keyed by identifier
#[derive(Clone, Default)]
pub struct DriverManager {
    drivers: Arc<RwLock<HashMap<String, Arc<dyn Driver>>>>,
}

impl DriverManager {
    /// Create an empty driver table
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a driver table holding the drivers compiled into this crate
    pub fn with_defaults() -> Self {
        let manager = Self::new();

        #[cfg(feature = "sqlite")]
        {
            let sqlite: Arc<dyn Driver> = Arc::new(crate::backends::SqliteDriver);
            manager.register_shared("sqlite", Arc::clone(&sqlite));
            manager.register_shared("sqlite3", sqlite);
        }

        manager
    }

    /// Register a driver under an identifier, replacing any previous one
    pub fn register<D: Driver + 'static>(&self, id: &str, driver: D) {
        self.register_shared(id, Arc::new(driver));
    }

    /// Register an already shared driver
    pub fn register_shared(&self, id: &str, driver: Arc<dyn Driver>) {
        self.drivers.write().insert(id.to_lowercase(), driver);
    }

    /// Whether a driver is registered under `id`
    pub fn contains(&self, id: &str) -> bool {
        self.drivers.read().contains_key(&id.to_lowercase())
    }

    /// Look up a driver.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unknown identifier.
    pub fn driver(&self, id: &str) -> Result<Arc<dyn Driver>> {
        self.drivers
            .read()
            .get(&id.to_lowercase())
            .cloned()
            .ok_or_else(|| DatabaseError::configuration(format!("Unknown driver: '{}'", id)))
    }
}

impl std::fmt::Debug for DriverManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<String> = self.drivers.read().keys().cloned().collect();
        ids.sort();
        f.debug_struct("DriverManager").field("drivers", &ids).finish()
    }
}
