//! Named database endpoints
//!
//! A [`Database`] describes one logical database: the driver that serves it, a
//! connection string template and credentials. It is configured and
//! initialized once by the registry, then hands out connections for the rest
//! of the process lifetime.

use super::connection::{Connection, Driver, DriverManager};
use super::error::{DatabaseError, Result};
use crate::config::{
    param_value, PARAM_DRIVER, PARAM_KEY, PARAM_PASSWORD, PARAM_URL, PARAM_USERNAME,
};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// A named database that produces connections
///
/// Implementations other than [`StandardDatabase`] are plugged into the
/// registry through a named factory (the `class` parameter).
pub trait Database: Send + Sync {
    /// Registry name of this database
    fn name(&self) -> &str;

    /// Current settings
    fn settings(&self) -> &DatabaseSettings;

    /// Replace the settings. Called by the registry before [`Database::init`].
    fn configure(&mut self, settings: DatabaseSettings);

    /// Prepare the database for use. Called exactly once, after `configure`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the driver is unknown, a required
    /// setting is missing or the url template is malformed.
    fn init(&mut self, drivers: &DriverManager) -> Result<()>;

    /// Open a new connection
    fn connection(&self) -> Result<Box<dyn Connection>>;

    /// Short description for logs; never includes the password
    fn describe(&self) -> String {
        format!(
            "{} ({})",
            self.name(),
            self.settings().url().unwrap_or("no url")
        )
    }
}

/// Driver, url template and credentials of a database
#[derive(Clone, Default, PartialEq, Eq)]
pub struct DatabaseSettings {
    driver: Option<String>,
    url: Option<String>,
    username: Option<String>,
    password: Option<String>,
    key: Option<String>,
}

impl DatabaseSettings {
    /// Create empty settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the settings of `name` from a flat parameter map
    pub fn from_params(name: &str, params: &HashMap<String, String>) -> Self {
        let get = |param: &str| param_value(params, name, param).map(str::to_string);

        Self {
            driver: get(PARAM_DRIVER),
            url: get(PARAM_URL),
            username: get(PARAM_USERNAME),
            password: get(PARAM_PASSWORD),
            key: get(PARAM_KEY),
        }
    }

    /// Set the driver identifier
    pub fn with_driver<S: Into<String>>(mut self, driver: S) -> Self {
        self.driver = Some(driver.into());
        self
    }

    /// Set the url template
    pub fn with_url<S: Into<String>>(mut self, url: S) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set the username
    pub fn with_username<S: Into<String>>(mut self, username: S) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set the password
    pub fn with_password<S: Into<String>>(mut self, password: S) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the opaque key
    pub fn with_key<S: Into<String>>(mut self, key: S) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn driver(&self) -> Option<&str> {
        self.driver.as_deref()
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn set_driver(&mut self, driver: Option<String>) {
        self.driver = driver;
    }

    pub fn set_url(&mut self, url: Option<String>) {
        self.url = url;
    }

    pub fn set_username(&mut self, username: Option<String>) {
        self.username = username;
    }

    pub fn set_password(&mut self, password: Option<String>) {
        self.password = password;
    }

    pub fn set_key(&mut self, key: Option<String>) {
        self.key = key;
    }
}

impl std::fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("driver", &self.driver)
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("key", &self.key)
            .finish()
    }
}

/// Database served by a registered [`Driver`]
///
/// The url template is resolved once in [`Database::init`] with the database
/// name, username and password as positional arguments `{0}`, `{1}`, `{2}`.
pub struct StandardDatabase {
    name: String,
    settings: DatabaseSettings,
    driver: Option<Arc<dyn Driver>>,
    resolved_url: OnceLock<String>,
}

impl StandardDatabase {
    /// Create an unconfigured database
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            settings: DatabaseSettings::default(),
            driver: None,
            resolved_url: OnceLock::new(),
        }
    }

    /// Create a database with settings already applied
    pub fn with_settings<S: Into<String>>(name: S, settings: DatabaseSettings) -> Self {
        let mut db = Self::new(name);
        db.settings = settings;
        db
    }

    /// Connection string computed by `init`
    pub fn resolved_url(&self) -> Option<&str> {
        self.resolved_url.get().map(String::as_str)
    }

    /// Whether `init` has completed
    pub fn is_initialized(&self) -> bool {
        self.resolved_url.get().is_some()
    }

    fn required<'a>(&self, value: Option<&'a str>, param: &str) -> Result<&'a str> {
        value.ok_or_else(|| {
            DatabaseError::configuration(format!(
                "Database '{}' is missing required parameter '{}'",
                self.name, param
            ))
        })
    }
}

impl Database for StandardDatabase {
    fn name(&self) -> &str {
        &self.name
    }

    fn settings(&self) -> &DatabaseSettings {
        &self.settings
    }

    fn configure(&mut self, settings: DatabaseSettings) {
        self.settings = settings;
    }

    fn init(&mut self, drivers: &DriverManager) -> Result<()> {
        if self.is_initialized() {
            return Err(DatabaseError::configuration(format!(
                "Database '{}' is already initialized",
                self.name
            )));
        }

        let driver_id = self.required(self.settings.driver(), PARAM_DRIVER)?;
        let template = self.required(self.settings.url(), PARAM_URL)?;
        let username = self.required(self.settings.username(), PARAM_USERNAME)?;
        let password = self.required(self.settings.password(), PARAM_PASSWORD)?;

        let driver = drivers.driver(driver_id).map_err(|e| {
            DatabaseError::configuration_with_source(
                format!("Database '{}' cannot load driver '{}'", self.name, driver_id),
                Box::new(e),
            )
        })?;

        let url = format_connection_url(template, &[&self.name, username, password])?;

        self.driver = Some(driver);
        self.resolved_url.get_or_init(|| url);
        Ok(())
    }

    fn connection(&self) -> Result<Box<dyn Connection>> {
        let (driver, url) = match (&self.driver, self.resolved_url.get()) {
            (Some(driver), Some(url)) => (driver, url),
            _ => {
                return Err(DatabaseError::configuration(format!(
                    "Database '{}' is not initialized",
                    self.name
                )))
            }
        };

        driver
            .connect(url, self.settings.username(), self.settings.password())
            .map_err(|e| DatabaseError::connection_failed(self.name.clone(), e))
    }
}

impl std::fmt::Debug for StandardDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StandardDatabase")
            .field("name", &self.name)
            .field("settings", &self.settings)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

/// Fill the positional slots `{0}`, `{1}`, ... of a connection string template.
///
/// Text between single quotes is copied literally and `''` stands for one
/// quote. A slot without a matching argument is kept as written.
///
/// # Errors
///
/// Returns a configuration error for an unclosed `{` or a non-numeric slot.
pub fn format_connection_url(template: &str, args: &[&str]) -> Result<String> {
    let malformed = |reason: &str| {
        DatabaseError::configuration(format!(
            "Malformed connection template '{}': {}",
            template, reason
        ))
    };

    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    let mut quoted = false;

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                if chars.peek() == Some(&'\'') {
                    chars.next();
                    out.push('\'');
                } else {
                    quoted = !quoted;
                }
            }
            '{' if !quoted => {
                let mut slot = String::new();
                let mut closed = false;
                for d in chars.by_ref() {
                    if d == '}' {
                        closed = true;
                        break;
                    }
                    slot.push(d);
                }

                if !closed {
                    return Err(malformed("unmatched brace"));
                }

                let index: usize = slot
                    .trim()
                    .parse()
                    .map_err(|_| malformed("argument index must be a number"))?;

                match args.get(index) {
                    Some(arg) => out.push_str(arg),
                    None => {
                        out.push('{');
                        out.push_str(&slot);
                        out.push('}');
                    }
                }
            }
            _ => out.push(c),
        }
    }

    Ok(out)
}
