//! # dbquery
//!
//! A metadata-driven SQL access layer. Tables are described by column metadata
//! (name, logical type, sequence and timestamp flags); from that, [`Query`]
//! builds parameterized INSERT, UPDATE, DELETE and SELECT statements, converts
//! every value through its column type and extracts result rows into maps keyed
//! by column label.
//!
//! ## Features
//!
//! - **Named databases**: a [`DatabaseRegistry`] loads databases from flat
//!   key/value configuration with per-database overrides
//! - **Automatic columns**: sequence, create-date and modify-date columns never
//!   take caller values
//! - **Type conversion**: binary, timestamp, integer, boolean and marshalled
//!   object columns round-trip through one conversion table
//! - **Paging**: [`PagedResult`] pages that remember the full result size
//! - **Search terms**: LIKE wildcard escaping with an exact-match prefix
//! - **Slow-query tracing**: elapsed time plus the calling application frames
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dbquery::prelude::*;
//! use std::collections::HashMap;
//!
//! fn main() -> Result<()> {
//!     let mut params = HashMap::new();
//!     params.insert("driver".to_string(), "sqlite".to_string());
//!     params.insert("url".to_string(), "/tmp/{0}.db".to_string());
//!     params.insert("username".to_string(), String::new());
//!     params.insert("password".to_string(), String::new());
//!
//!     let registry = DatabaseRegistry::new();
//!     registry.add_database("poker", &params)?;
//!
//!     let mut query = registry.query("poker", "players")?;
//!     query
//!         .add_column("id", ColumnMetadata::new("id", ColumnType::Integer).as_sequence())
//!         .add_column("name", ColumnMetadata::new("name", ColumnType::Other));
//!
//!     let mut row = DatabaseRow::new();
//!     row.insert("name".to_string(), "ann".into());
//!     query.insert(&row)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Project Structure
//!
//! ```text
//! src/
//! ├── core/          # Query layer: metadata, statements, registry
//! ├── backends/      # Drivers (SQLite)
//! ├── config.rs      # Configuration loading
//! └── test_utils.rs  # Recording connection for tests
//! ```

/// Query layer types and traits
pub mod core;

/// Database driver implementations
pub mod backends;

/// Configuration loading
pub mod config;

/// Test doubles shared by unit and integration tests
pub mod test_utils;

/// Prelude for convenient imports
///
/// ```rust
/// use dbquery::prelude::*;
///
/// let pattern = wildcard(Some("ann"));
/// assert_eq!(pattern, "%ann%");
/// ```
pub mod prelude {
    pub use crate::config::RegistryConfig;
    pub use crate::core::search::{exact_match, wildcard};
    pub use crate::core::{
        BindArray, ColumnMetadata, ColumnType, Database, DatabaseError, DatabaseRegistry,
        DatabaseRow, DatabaseType, DatabaseValue, PagedResult, Query, ResultCursor, Result,
    };

    #[cfg(feature = "sqlite")]
    pub use crate::backends::SqliteDriver;
}

// Re-export at root level for convenience
pub use crate::core::{
    BindArray, ColumnMetadata, ColumnType, Database, DatabaseError, DatabaseRegistry,
    DatabaseRow, DatabaseType, DatabaseValue, PagedResult, Query, ResultCursor, Result,
};
