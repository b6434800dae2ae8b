//! Basic query layer example
//!
//! This example demonstrates:
//! - Registering a SQLite database from flat configuration
//! - Describing a table with column metadata
//! - Inserting rows with generated columns
//! - Updating, paging and searching
//! - Running a query off the async runtime
//!
//! Run with: cargo run --example basic_usage

use dbquery::backends::SqliteConnection;
use dbquery::core::search::like_clause;
use dbquery::core::task::run_blocking;
use dbquery::core::Connection;
use dbquery::prelude::*;
use std::sync::Arc;

fn player_columns(query: &mut Query<'_>) {
    query
        .add_column("id", ColumnMetadata::new("id", ColumnType::Integer).as_sequence())
        .add_column(
            "created",
            ColumnMetadata::new("create_date", ColumnType::Timestamp).as_create_date(),
        )
        .add_column(
            "modified",
            ColumnMetadata::new("modify_date", ColumnType::Timestamp).as_modify_date(),
        )
        .add_column("name", ColumnMetadata::new("name", ColumnType::Other))
        .add_column("chips", ColumnMetadata::new("chips", ColumnType::Integer))
        .add_column("active", ColumnMetadata::new("active", ColumnType::Boolean));
}

#[tokio::main]
async fn main() -> Result<()> {
    println!("=== dbquery - Basic Usage Example ===\n");

    let dir = tempfile::tempdir().map_err(|e| DatabaseError::other(e.to_string()))?;

    // Create the schema directly through the driver
    println!("1. Creating schema...");
    let mut conn = SqliteConnection::open(&dir.path().join("poker.db").to_string_lossy())?;
    conn.execute_batch(
        "CREATE TABLE players (
            id INTEGER PRIMARY KEY,
            create_date TEXT NOT NULL,
            modify_date TEXT,
            name TEXT NOT NULL,
            chips INTEGER,
            active INTEGER NOT NULL
        )",
    )?;
    conn.close()?;
    println!("   ✓ Table created\n");

    // Register the database; {0} in the url is the database name
    println!("2. Registering database...");
    let mut config = RegistryConfig::default();
    config.set("settings.database.init", "poker");
    config.set("settings.database.default", "poker");
    config.set("driver", "sqlite");
    config.set("username", "demo");
    config.set("password", "");
    config.set(
        "settings.database.poker.url",
        format!("sqlite:{}/{{0}}.db", dir.path().display()),
    );
    let registry = Arc::new(DatabaseRegistry::from_config(&config)?);
    println!("   ✓ Databases: {:?}\n", registry.database_names());

    // Insert rows; id and create_date are generated
    println!("3. Inserting players...");
    for (name, chips) in [("ann", 1500), ("bob", 800), ("carol_b", 2200), ("dave", 50)] {
        let mut query = registry.query("poker", "players")?;
        player_columns(&mut query);

        let mut row = DatabaseRow::new();
        row.insert("name".to_string(), name.into());
        row.insert("chips".to_string(), chips.into());
        if chips > 100 {
            row.insert("active".to_string(), true.into());
        }
        query.insert(&row)?;
        println!("   ✓ Inserted {}", name);
    }
    println!();

    // Update one row
    println!("4. Updating bob...");
    let mut query = registry.query("poker", "players")?;
    query
        .add_column("chips", ColumnMetadata::new("chips", ColumnType::Integer))
        .add_column(
            "modified",
            ColumnMetadata::new("modify_date", ColumnType::Timestamp).as_modify_date(),
        );
    query.set_where_clause("name = ?");
    query.add_bind_value(ColumnType::Other, "bob")?;
    let mut row = DatabaseRow::new();
    row.insert("chips".to_string(), 950.into());
    println!("   ✓ Updated {} row(s)\n", query.update(&row)?);

    // Walk the table with a cursor
    println!("5. Listing players...");
    let mut query = registry.query("poker", "players")?;
    player_columns(&mut query);
    query.set_supplemental_clause("ORDER BY id");
    let mut cursor = query.select()?;
    while cursor.advance()? {
        let row = cursor.row();
        println!(
            "   {} | {:8} | chips {:5} | active {}",
            row.get("id").map(|v| v.as_string()).unwrap_or_default(),
            row.get("name").map(|v| v.as_string()).unwrap_or_default(),
            row.get("chips").map(|v| v.as_string()).unwrap_or_default(),
            row.get("active").map(|v| v.as_string()).unwrap_or_default(),
        );
    }
    cursor.close();
    println!();

    // Page through the table
    println!("6. Paging...");
    let mut query = registry.query("poker", "players")?;
    player_columns(&mut query);
    query.set_supplemental_clause("ORDER BY chips DESC");
    let page = query.select_page(None, 0, 2)?;
    println!("   ✓ Page of {} out of {} players", page.len(), page.total_size());
    for row in &page {
        println!("     {}", row.get("name").map(|v| v.as_string()).unwrap_or_default());
    }
    println!();

    // Search; '_' in the term is matched literally
    println!("7. Searching...");
    for term in ["_b", "=_b", "a"] {
        let mut query = registry.query("poker", "players")?;
        player_columns(&mut query);
        query.set_where_clause(like_clause("name"));
        query.add_bind_value(ColumnType::Other, wildcard(Some(term)))?;
        println!("   '{}' matches {} player(s)", term, query.count()?);
    }
    println!();

    // Run a query on the blocking pool
    println!("8. Counting from a blocking task...");
    let shared = Arc::clone(&registry);
    let active = run_blocking(move || {
        let mut query = shared.query("poker", "players")?;
        query.set_where_clause("active = ?");
        query.add_bind_value(ColumnType::Boolean, true)?;
        query.count()
    })
    .await?;
    println!("   ✓ {} active player(s)\n", active);

    println!("=== Example completed successfully ===");
    Ok(())
}
