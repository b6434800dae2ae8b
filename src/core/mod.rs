//! Query layer types and traits
//!
//! Leaves first: values and errors, connections and drivers, named databases
//! and their registry, column metadata, then the query builder with its cursor
//! and paging container.

pub mod bind;
pub mod column;
pub mod connection;
pub mod cursor;
pub mod database;
pub mod database_types;
pub mod error;
pub mod marshal;
pub mod paged;
pub mod query;
pub mod registry;
pub mod search;
pub mod task;
pub mod trace;
pub mod value;

// Re-export commonly used types
pub use bind::BindArray;
pub use column::{ColumnMetadata, ColumnType};
pub use connection::{Connection, Driver, DriverManager, ResultSet, Statement};
pub use cursor::ResultCursor;
pub use database::{format_connection_url, Database, DatabaseSettings, StandardDatabase};
pub use database_types::DatabaseType;
pub use error::{DatabaseError, Result};
pub use marshal::{DataMarshaller, JsonMarshaller};
pub use paged::PagedResult;
pub use query::Query;
pub use registry::{DatabaseFactory, DatabaseRegistry};
pub use trace::QueryTracer;
pub use value::{DatabaseRow, DatabaseValue};
