//! Database driver implementations
//!
//! Each backend provides a [`Driver`](crate::core::connection::Driver) and the
//! [`Connection`](crate::core::connection::Connection) it opens.

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteConnection, SqliteDriver};
