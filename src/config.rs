//! Database configuration
//!
//! Databases are described by flat key/value parameters. A parameter is looked
//! up first under its qualified key `settings.database.<name>.<param>` and then
//! under its bare key `<param>`, so shared defaults are written once and
//! overridden per database:
//!
//! ```toml
//! driver = "sqlite"
//! username = "app"
//! password = ""
//!
//! [settings.database]
//! init = "main, archive"
//!
//! [settings.database.main]
//! url = "/var/lib/app/{0}.db"
//!
//! [settings.database.archive]
//! url = "/var/lib/app/archive-{0}.db"
//! ```

use crate::core::error::{DatabaseError, Result};
use config::{Config, Source};
use std::collections::HashMap;
use std::path::Path;

/// Prefix of qualified database parameter keys
pub const PROPERTY_PREFIX: &str = "settings.database.";

/// Comma separated databases to load at startup
pub const PARAM_INIT: &str = "init";
/// Opaque per-database value handed to the database implementation
pub const PARAM_KEY: &str = "key";
/// Name of the default database
pub const PARAM_DEFAULT: &str = "default";
/// Alternate `Database` implementation, by registered name
pub const PARAM_CLASS: &str = "class";
/// Driver identifier
pub const PARAM_DRIVER: &str = "driver";
/// Connection string template
pub const PARAM_URL: &str = "url";
/// Connection username
pub const PARAM_USERNAME: &str = "username";
/// Connection password
pub const PARAM_PASSWORD: &str = "password";

/// Enables slow-query tracing
pub const DEBUG_PERF_KEY: &str = "settings.debug.dbperf";

/// Look up a database parameter: qualified key first, bare key second.
pub fn param_value<'a>(
    params: &'a HashMap<String, String>,
    database: &str,
    param: &str,
) -> Option<&'a str> {
    let qualified = format!("{}{}.{}", PROPERTY_PREFIX, database, param);
    params
        .get(&qualified)
        .or_else(|| params.get(param))
        .map(String::as_str)
}

/// Flat parameter map describing the databases of a process
#[derive(Debug, Clone, Default)]
pub struct RegistryConfig {
    params: HashMap<String, String>,
}

impl RegistryConfig {
    /// Wrap an existing parameter map
    pub fn from_params(params: HashMap<String, String>) -> Self {
        Self { params }
    }

    /// Load parameters from an optional file and the environment.
    ///
    /// The file format follows its extension (TOML, JSON, YAML, INI). Nested
    /// tables are flattened into dotted keys. Environment variables named
    /// `<PREFIX>__SETTINGS__DATABASE__MAIN__URL` map to
    /// `settings.database.main.url`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the file cannot be read or parsed.
    pub fn load(path: Option<&Path>, env_prefix: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(p) = path {
            builder = builder.add_source(config::File::from(p));
        }

        if let Some(prefix) = env_prefix {
            builder = builder.add_source(config::Environment::with_prefix(prefix).separator("__"));
        }

        let settings = builder.build().map_err(|e| {
            DatabaseError::configuration_with_source("Failed to build configuration", Box::new(e))
        })?;

        let table = settings.collect().map_err(|e| {
            DatabaseError::configuration_with_source("Failed to read configuration", Box::new(e))
        })?;

        let mut params = HashMap::new();
        flatten("", table, &mut params)?;

        Ok(Self { params })
    }

    /// All parameters
    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    /// Set a parameter
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params.insert(key.into(), value.into());
    }

    /// Look up a parameter for `database` (qualified key wins)
    pub fn param(&self, database: &str, name: &str) -> Option<&str> {
        param_value(&self.params, database, name)
    }

    /// Databases to load at startup, in listed order
    pub fn init_databases(&self) -> Vec<String> {
        self.global(PARAM_INIT)
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Name of the default database
    pub fn default_database(&self) -> Option<&str> {
        self.global(PARAM_DEFAULT)
    }

    /// Whether slow-query tracing is requested
    pub fn debug_perf(&self) -> bool {
        self.params
            .get(DEBUG_PERF_KEY)
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "on"))
            .unwrap_or(false)
    }

    fn global(&self, name: &str) -> Option<&str> {
        self.params
            .get(&format!("{}{}", PROPERTY_PREFIX, name))
            .or_else(|| self.params.get(name))
            .map(String::as_str)
    }
}

fn flatten(
    prefix: &str,
    table: config::Map<String, config::Value>,
    out: &mut HashMap<String, String>,
) -> Result<()> {
    for (key, value) in table {
        let full_key = if prefix.is_empty() {
            key
        } else {
            format!("{}.{}", prefix, key)
        };

        match value.clone().into_table() {
            Ok(nested) => flatten(&full_key, nested, out)?,
            Err(_) => {
                let text = value.into_string().map_err(|e| {
                    DatabaseError::configuration_with_source(
                        format!("Unsupported value for '{}'", full_key),
                        Box::new(e),
                    )
                })?;
                out.insert(full_key, text);
            }
        }
    }

    Ok(())
}
