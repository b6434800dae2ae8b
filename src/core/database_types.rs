//! SQL dialects
//!
//! Each driver reports the SQL dialect it speaks. The query builder asks the
//! dialect for the server-side expressions it writes literally into statements.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Supported SQL dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DatabaseType {
    /// No dialect specified; generic SQL
    #[default]
    None,
    Postgres,
    /// MySQL or MariaDB
    Mysql,
    Sqlite,
}

impl DatabaseType {
    /// Lowercase dialect name
    pub fn to_str(&self) -> &'static str {
        match self {
            DatabaseType::None => "none",
            DatabaseType::Postgres => "postgres",
            DatabaseType::Mysql => "mysql",
            DatabaseType::Sqlite => "sqlite",
        }
    }

    /// SQL expression evaluating to the current timestamp on the server.
    ///
    /// SQLite has no `NOW()`; its expression keeps milliseconds so stored
    /// values round-trip through epoch milliseconds.
    pub fn current_timestamp_sql(&self) -> &'static str {
        match self {
            DatabaseType::Sqlite => "strftime('%Y-%m-%d %H:%M:%f', 'now')",
            DatabaseType::None | DatabaseType::Postgres | DatabaseType::Mysql => "NOW()",
        }
    }

    /// SQL written in place of a sequence column's value on insert
    pub fn sequence_value_sql(&self) -> &'static str {
        match self {
            DatabaseType::Postgres => "DEFAULT",
            DatabaseType::None | DatabaseType::Mysql | DatabaseType::Sqlite => "NULL",
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_str())
    }
}

impl FromStr for DatabaseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(DatabaseType::None),
            "postgres" | "postgresql" => Ok(DatabaseType::Postgres),
            "mysql" | "mariadb" => Ok(DatabaseType::Mysql),
            "sqlite" | "sqlite3" => Ok(DatabaseType::Sqlite),
            _ => Err(format!("Invalid database type: '{}'", s)),
        }
    }
}
