//! Registry of named databases
//!
//! The registry is built once at startup from flat configuration parameters and
//! then shared (usually behind an `Arc`) by everything that needs a database.
//! Lookups take a read lock only.

use super::connection::{Connection, DriverManager, ResultSet, Statement};
use super::database::{Database, DatabaseSettings, StandardDatabase};
use super::error::{DatabaseError, Result};
use super::query::Query;
use super::trace::QueryTracer;
use crate::config::{param_value, RegistryConfig, PARAM_CLASS};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// Constructor of an alternate [`Database`] implementation, given the database name
pub type DatabaseFactory = Arc<dyn Fn(&str) -> Result<Box<dyn Database>> + Send + Sync>;

/// Databases keyed by name
pub struct DatabaseRegistry {
    databases: RwLock<HashMap<String, Arc<dyn Database>>>,
    factories: RwLock<HashMap<String, DatabaseFactory>>,
    drivers: DriverManager,
    initialized: AtomicBool,
    default_database: RwLock<Option<String>>,
    tracer: Arc<QueryTracer>,
}

impl Default for DatabaseRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DatabaseRegistry {
    /// Create an empty registry using the drivers compiled into this crate
    pub fn new() -> Self {
        Self::with_drivers(DriverManager::with_defaults())
    }

    /// Create an empty registry using `drivers`
    pub fn with_drivers(drivers: DriverManager) -> Self {
        Self {
            databases: RwLock::new(HashMap::new()),
            factories: RwLock::new(HashMap::new()),
            drivers,
            initialized: AtomicBool::new(false),
            default_database: RwLock::new(None),
            tracer: Arc::new(QueryTracer::new()),
        }
    }

    /// Create a registry and load every database listed in `config`
    ///
    /// # Errors
    ///
    /// Returns the first configuration error encountered.
    pub fn from_config(config: &RegistryConfig) -> Result<Self> {
        let registry = Self::new();
        registry.load_config(config)?;
        Ok(registry)
    }

    /// Apply `config`: tracing flag, default database and the `init` databases
    pub fn load_config(&self, config: &RegistryConfig) -> Result<()> {
        self.tracer.set_enabled(config.debug_perf());

        if let Some(default) = config.default_database() {
            self.set_default_database(default);
        }

        for name in config.init_databases() {
            self.add_database(&name, config.params())?;
        }

        Ok(())
    }

    pub fn drivers(&self) -> &DriverManager {
        &self.drivers
    }

    /// Slow-query tracer shared by queries created through [`DatabaseRegistry::query`]
    pub fn tracer(&self) -> &Arc<QueryTracer> {
        &self.tracer
    }

    /// Make `class` available to the `class` parameter
    pub fn register_factory<F>(&self, class: &str, factory: F)
    where
        F: Fn(&str) -> Result<Box<dyn Database>> + Send + Sync + 'static,
    {
        self.factories
            .write()
            .insert(class.to_string(), Arc::new(factory));
    }

    /// Create, configure and initialize the database `name` from `params`.
    ///
    /// The `class` parameter selects a registered factory; without it a
    /// [`StandardDatabase`] is created. An existing database of the same name
    /// is replaced.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unknown class, a failing factory or
    /// a database that fails to initialize.
    pub fn add_database(
        &self,
        name: &str,
        params: &HashMap<String, String>,
    ) -> Result<Arc<dyn Database>> {
        self.initialized.store(true, Ordering::SeqCst);

        let mut database: Box<dyn Database> = match param_value(params, name, PARAM_CLASS) {
            Some(class) => {
                let factory = self.factories.read().get(class).cloned().ok_or_else(|| {
                    DatabaseError::configuration(format!(
                        "Unknown class '{}' for database '{}'",
                        class, name
                    ))
                })?;

                factory(name).map_err(|e| {
                    DatabaseError::configuration_with_source(
                        format!("Unable to create database '{}' of class '{}'", name, class),
                        Box::new(e),
                    )
                })?
            }
            None => Box::new(StandardDatabase::new(name)),
        };

        database.configure(DatabaseSettings::from_params(name, params));
        database.init(&self.drivers)?;

        let database: Arc<dyn Database> = Arc::from(database);
        self.databases
            .write()
            .insert(name.to_string(), Arc::clone(&database));

        info!("Loaded database: {}", database.describe());
        Ok(database)
    }

    /// The database registered as `name`, if any
    pub fn get_database(&self, name: &str) -> Option<Arc<dyn Database>> {
        self.databases.read().get(name).cloned()
    }

    /// Registered names, sorted
    pub fn database_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.databases.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Whether any database has been added
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn set_default_database(&self, name: &str) {
        *self.default_database.write() = Some(name.to_string());
    }

    /// The default database, once it is registered
    pub fn default_database(&self) -> Option<Arc<dyn Database>> {
        let name = self.default_database.read().clone()?;
        self.get_database(&name)
    }

    /// Start a traced query on database `name` that owns its connection
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unknown database, or the
    /// database's error if it cannot connect.
    pub fn query(&self, name: &str, table: &str) -> Result<Query<'static>> {
        let database = self.get_database(name).ok_or_else(|| {
            DatabaseError::configuration(format!("Unknown database: '{}'", name))
        })?;

        Ok(Query::new(database, table)?.with_tracer(Arc::clone(&self.tracer)))
    }

    /// Execute a query statement, timed by the registry's tracer
    #[track_caller]
    pub fn execute_query(
        &self,
        connection: &mut dyn Connection,
        statement: &Statement,
    ) -> Result<ResultSet> {
        self.tracer.execute_query(connection, statement)
    }
}

impl std::fmt::Debug for DatabaseRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseRegistry")
            .field("databases", &self.database_names())
            .field("drivers", &self.drivers)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}
