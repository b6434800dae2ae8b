//! Shared test utilities for unit and integration tests.
//!
//! [`RecordingConnection`] is an in-memory [`Connection`] that records every
//! prepared statement and close call, so tests can assert on generated SQL and
//! on the exact order of bound parameters.

use crate::core::connection::{Connection, Driver, DriverManager, ResultSet, Statement};
use crate::core::database::{Database, DatabaseSettings, StandardDatabase};
use crate::core::database_types::DatabaseType;
use crate::core::error::{DatabaseError, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Everything a [`RecordingConnection`] was asked to do
#[derive(Debug, Clone, Default)]
pub struct ConnectionLog {
    /// SQL passed to `prepare`, in order
    pub prepared: Vec<String>,
    /// Statements run through `execute_update`
    pub updates: Vec<Statement>,
    /// Statements run through `execute_query`
    pub queries: Vec<Statement>,
    /// Number of `close_statement` calls
    pub statement_closes: usize,
    /// Number of `close` calls that actually closed the connection
    pub connection_closes: usize,
}

impl ConnectionLog {
    /// The most recently executed update statement
    pub fn last_update(&self) -> Option<&Statement> {
        self.updates.last()
    }

    /// The most recently executed query statement
    pub fn last_query(&self) -> Option<&Statement> {
        self.queries.last()
    }
}

/// Connection double that records statements instead of running them
#[derive(Clone)]
pub struct RecordingConnection {
    log: Arc<Mutex<ConnectionLog>>,
    results: Arc<Mutex<VecDeque<ResultSet>>>,
    database_type: DatabaseType,
    affected_rows: u64,
    fail_statement_close: bool,
    fail_close: bool,
    closed: bool,
}

impl Default for RecordingConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingConnection {
    /// Create a connection speaking generic SQL that reports one affected row
    pub fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(ConnectionLog::default())),
            results: Arc::new(Mutex::new(VecDeque::new())),
            database_type: DatabaseType::None,
            affected_rows: 1,
            fail_statement_close: false,
            fail_close: false,
            closed: false,
        }
    }

    /// Report a different dialect
    pub fn with_database_type(mut self, database_type: DatabaseType) -> Self {
        self.database_type = database_type;
        self
    }

    /// Report a different affected row count from `execute_update`
    pub fn with_affected_rows(mut self, rows: u64) -> Self {
        self.affected_rows = rows;
        self
    }

    /// Make `close_statement` and `close` fail (after recording the call)
    pub fn failing_close(mut self) -> Self {
        self.fail_statement_close = true;
        self.fail_close = true;
        self
    }

    /// Queue a result set for the next `execute_query`
    pub fn push_result(&self, results: ResultSet) {
        self.results.lock().push_back(results);
    }

    /// Snapshot of the calls recorded so far (shared between clones)
    pub fn log(&self) -> ConnectionLog {
        self.log.lock().clone()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(DatabaseError::connection("Connection is closed"));
        }
        Ok(())
    }
}

impl Connection for RecordingConnection {
    fn database_type(&self) -> DatabaseType {
        self.database_type
    }

    fn prepare(&mut self, sql: &str) -> Result<Statement> {
        self.ensure_open()?;
        self.log.lock().prepared.push(sql.to_string());
        Ok(Statement::new(sql))
    }

    fn execute_update(&mut self, statement: &Statement) -> Result<u64> {
        self.ensure_open()?;
        self.log.lock().updates.push(statement.clone());
        Ok(self.affected_rows)
    }

    fn execute_query(&mut self, statement: &Statement) -> Result<ResultSet> {
        self.ensure_open()?;
        self.log.lock().queries.push(statement.clone());
        Ok(self.results.lock().pop_front().unwrap_or_default())
    }

    fn close_statement(&mut self, _statement: Statement) -> Result<()> {
        self.log.lock().statement_closes += 1;
        if self.fail_statement_close {
            return Err(DatabaseError::connection("statement close failed"));
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.log.lock().connection_closes += 1;
        if self.fail_close {
            return Err(DatabaseError::connection("connection close failed"));
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Arguments a [`RecordingDriver`] was connected with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Driver handing out clones of one [`RecordingConnection`]
#[derive(Clone, Default)]
pub struct RecordingDriver {
    connection: RecordingConnection,
    requests: Arc<Mutex<Vec<ConnectRequest>>>,
}

impl RecordingDriver {
    /// Create a driver whose connections share `connection`'s log
    pub fn new(connection: RecordingConnection) -> Self {
        Self {
            connection,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every `connect` call so far
    pub fn requests(&self) -> Vec<ConnectRequest> {
        self.requests.lock().clone()
    }
}

impl Driver for RecordingDriver {
    fn database_type(&self) -> DatabaseType {
        self.connection.database_type
    }

    fn connect(
        &self,
        url: &str,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<Box<dyn Connection>> {
        self.requests.lock().push(ConnectRequest {
            url: url.to_string(),
            username: username.map(str::to_string),
            password: password.map(str::to_string),
        });
        Ok(Box::new(self.connection.clone()))
    }
}

/// An initialized [`StandardDatabase`] named `name`, served by a
/// [`RecordingDriver`] around `connection`
pub fn recording_database(
    name: &str,
    connection: RecordingConnection,
) -> Result<(Arc<dyn Database>, RecordingDriver)> {
    let driver = RecordingDriver::new(connection);
    let drivers = DriverManager::new();
    drivers.register("recording", driver.clone());

    let settings = DatabaseSettings::new()
        .with_driver("recording")
        .with_url("recording:{0}")
        .with_username("test")
        .with_password("test");

    let mut database = StandardDatabase::with_settings(name, settings);
    database.init(&drivers)?;

    Ok((Arc::new(database), driver))
}
