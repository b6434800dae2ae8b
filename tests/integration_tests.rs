//! Integration tests for the query layer
//!
//! These tests run the full stack against SQLite database files:
//! - Registry configuration and database loading
//! - Insert, update and delete with automatic columns
//! - Paging with total counts
//! - Type conversion round-trips
//! - Search term escaping
//! - Concurrent readers

#[cfg(feature = "sqlite")]
mod sqlite_tests {
    use dbquery::backends::SqliteConnection;
    use dbquery::config::RegistryConfig;
    use dbquery::core::search::{like_clause, wildcard};
    use dbquery::core::task::run_blocking;
    use dbquery::core::{Connection, DatabaseRegistry, Statement};
    use dbquery::prelude::*;
    use serde_json::json;
    use std::collections::HashMap;
    use std::io::Write;
    use std::sync::Arc;
    use tempfile::TempDir;

    const SCHEMA: &str = "
        CREATE TABLE players (
            id INTEGER PRIMARY KEY,
            create_date TEXT NOT NULL,
            modify_date TEXT,
            name TEXT NOT NULL,
            chips INTEGER
        );
        CREATE TABLE hands (
            id INTEGER PRIMARY KEY,
            played TEXT,
            raw BLOB,
            state TEXT,
            showdown INTEGER NOT NULL
        );
    ";

    struct Fixture {
        dir: TempDir,
        registry: DatabaseRegistry,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().expect("Failed to create temp dir");

            let mut conn = SqliteConnection::open(&db_path(&dir)).expect("Failed to open");
            conn.execute_batch(SCHEMA).expect("Failed to create schema");
            conn.close().expect("Failed to close");

            let registry = DatabaseRegistry::new();
            registry
                .add_database("poker", &params(&dir))
                .expect("Failed to add database");

            Self { dir, registry }
        }

        fn connection(&self) -> SqliteConnection {
            SqliteConnection::open(&db_path(&self.dir)).expect("Failed to open")
        }
    }

    fn db_path(dir: &TempDir) -> String {
        dir.path().join("poker.db").to_string_lossy().to_string()
    }

    fn params(dir: &TempDir) -> HashMap<String, String> {
        let template = format!("sqlite:{}/{{0}}.db", dir.path().display());
        [
            ("driver", "sqlite".to_string()),
            ("url", template),
            ("username", "app".to_string()),
            ("password", String::new()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }

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
            .add_column("chips", ColumnMetadata::new("chips", ColumnType::Integer));
    }

    fn player(name: &str, chips: i32) -> DatabaseRow {
        let mut row = DatabaseRow::new();
        row.insert("name".to_string(), name.into());
        row.insert("chips".to_string(), chips.into());
        row
    }

    fn insert_players(fixture: &Fixture, count: i32) {
        let mut conn = fixture.connection();
        for i in 1..=count {
            let mut query = Query::with_connection(&mut conn, "players");
            player_columns(&mut query);
            query
                .insert(&player(&format!("player{}", i), i * 10))
                .expect("Insert failed");
        }
        assert!(!conn.is_closed());
    }

    #[test]
    fn test_insert_generates_automatic_columns() {
        let fixture = Fixture::new();

        let mut query = fixture.registry.query("poker", "players").expect("No query");
        player_columns(&mut query);

        let mut values = player("bar", 42);
        values.insert("id".to_string(), DatabaseValue::Int(500));
        values.insert("created".to_string(), DatabaseValue::Long(0));

        let sql = query.insert_sql().expect("No SQL");
        assert_eq!(Statement::new(sql.as_str()).placeholder_count(), 2);
        assert_eq!(query.insert(&values).expect("Insert failed"), 1);

        let mut query = fixture.registry.query("poker", "players").expect("No query");
        player_columns(&mut query);
        let rows = query.select().expect("Select failed").into_rows().expect("Rows");

        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.get("id"), Some(&DatabaseValue::Int(1)));
        assert_eq!(row.get("name"), Some(&DatabaseValue::from("bar")));
        assert_eq!(row.get("chips"), Some(&DatabaseValue::Int(42)));

        let created = row.get("created").and_then(|v| v.as_long()).expect("created");
        let now = chrono::Utc::now().timestamp_millis();
        assert!((now - created).abs() < 60_000);
        assert_eq!(row.get("modified").and_then(|v| v.as_long()), Some(created));
    }

    #[test]
    fn test_update_binds_where_values_last() {
        let fixture = Fixture::new();
        insert_players(&fixture, 7);

        let mut query = fixture.registry.query("poker", "players").expect("No query");
        player_columns(&mut query);
        query.set_where_clause("id = ?");
        query
            .add_bind_value(ColumnType::Integer, 7)
            .expect("Bind failed");

        let updated = query.update(&player("renamed", 1000)).expect("Update failed");
        assert_eq!(updated, 1);

        let mut query = fixture.registry.query("poker", "players").expect("No query");
        player_columns(&mut query);
        query.set_where_clause("chips >= ?").set_supplemental_clause("ORDER BY id");
        query
            .add_bind_value(ColumnType::Integer, 60)
            .expect("Bind failed");
        let rows = query.select().expect("Select failed").into_rows().expect("Rows");

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("name"), Some(&DatabaseValue::from("player6")));
        assert_eq!(rows[1].get("name"), Some(&DatabaseValue::from("renamed")));
        assert_eq!(rows[1].get("chips"), Some(&DatabaseValue::Int(1000)));
    }

    #[test]
    fn test_delete_with_bind_array() {
        let fixture = Fixture::new();
        insert_players(&fixture, 5);

        let binds = BindArray::new()
            .with(ColumnType::Integer, 20)
            .with(ColumnType::Integer, 40);

        let mut query = fixture.registry.query("poker", "players").expect("No query");
        query.set_where_clause("chips > ? AND chips <= ?");
        query.set_bind_values(&binds).expect("Bind failed");
        assert_eq!(query.delete().expect("Delete failed"), 2);

        let mut query = fixture.registry.query("poker", "players").expect("No query");
        assert_eq!(query.count().expect("Count failed"), 3);
    }

    #[test]
    fn test_paging_reports_total_size() {
        let fixture = Fixture::new();
        insert_players(&fixture, 137);

        let mut query = fixture.registry.query("poker", "players").expect("No query");
        player_columns(&mut query);
        query.set_supplemental_clause("ORDER BY id");

        let page = query.select_page(None, 130, 10).expect("Page failed");
        assert_eq!(page.len(), 7);
        assert_eq!(page.total_size(), 137);
        assert_eq!(page[0].get("id"), Some(&DatabaseValue::Int(131)));

        // A known total skips the count
        let mut query = fixture.registry.query("poker", "players").expect("No query");
        player_columns(&mut query);
        let page = query
            .select_page(Some(page.total_size()), 0, 10)
            .expect("Page failed");
        assert_eq!(page.len(), 10);
        assert_eq!(page.total_size(), 137);
    }

    fn hand_columns(query: &mut Query<'_>) {
        query
            .add_column("id", ColumnMetadata::new("id", ColumnType::Integer).as_sequence())
            .add_column("played", ColumnMetadata::new("played", ColumnType::Timestamp))
            .add_column("raw", ColumnMetadata::new("raw", ColumnType::Binary))
            .add_column("state", ColumnMetadata::new("state", ColumnType::Marshalled))
            .add_column("showdown", ColumnMetadata::new("showdown", ColumnType::Boolean));
    }

    #[test]
    fn test_column_types_round_trip() {
        let fixture = Fixture::new();
        let played = 1_709_251_199_123_i64;
        let raw: Vec<u8> = (0..=255).collect();
        let state = json!({"board": ["Ah", "Kh", "Qh"], "pot": 1200, "allIn": false});

        let mut values = DatabaseRow::new();
        values.insert("played".to_string(), DatabaseValue::Long(played));
        values.insert("raw".to_string(), DatabaseValue::Bytes(raw.clone()));
        values.insert("state".to_string(), DatabaseValue::Object(state.clone()));

        let mut query = fixture.registry.query("poker", "hands").expect("No query");
        hand_columns(&mut query);
        query.insert(&values).expect("Insert failed");

        let mut query = fixture.registry.query("poker", "hands").expect("No query");
        hand_columns(&mut query);
        let mut cursor = query.select().expect("Select failed");
        assert!(cursor.advance().expect("Advance failed"));

        let row = cursor.row();
        assert_eq!(row.get("played"), Some(&DatabaseValue::Long(played)));
        assert_eq!(row.get("raw"), Some(&DatabaseValue::Bytes(raw)));
        assert_eq!(row.get("state"), Some(&DatabaseValue::Object(state)));
        assert_eq!(row.get("showdown"), Some(&DatabaseValue::Bool(false)));

        assert!(!cursor.advance().expect("Advance failed"));
        cursor.close();
    }

    #[test]
    fn test_marshalled_text_and_wide_integers_read_back() {
        let fixture = Fixture::new();

        let mut values = DatabaseRow::new();
        values.insert("state".to_string(), DatabaseValue::from("hello"));

        let mut query = fixture.registry.query("poker", "hands").expect("No query");
        hand_columns(&mut query);
        assert_eq!(query.insert(&values).expect("Insert failed"), 1);

        let mut conn = fixture.connection();
        let mut query = Query::with_connection(&mut conn, "players");
        player_columns(&mut query);
        query
            .insert(&player("wide", 0))
            .expect("Insert failed");
        query
            .execute_update("UPDATE players SET chips = 5000000000")
            .expect("Update failed");

        let mut query = fixture.registry.query("poker", "hands").expect("No query");
        hand_columns(&mut query);
        let rows = query.select().expect("Select failed").into_rows().expect("Rows");
        assert_eq!(rows[0].get("state"), Some(&DatabaseValue::Object(json!("hello"))));

        let mut query = fixture.registry.query("poker", "players").expect("No query");
        player_columns(&mut query);
        let rows = query.select().expect("Select failed").into_rows().expect("Rows");
        assert_eq!(rows[0].get("chips"), Some(&DatabaseValue::Int(5_000_000_000_i64 as i32)));
    }

    #[test]
    fn test_wildcard_search() {
        let fixture = Fixture::new();
        let mut conn = fixture.connection();
        for name in ["50% off", "500 off", "a_b", "axb"] {
            let mut query = Query::with_connection(&mut conn, "players");
            player_columns(&mut query);
            query.insert(&player(name, 1)).expect("Insert failed");
        }

        let mut search = |term: &str| -> Vec<String> {
            let mut query = Query::with_connection(&mut conn, "players");
            query.add_column("name", ColumnMetadata::new("name", ColumnType::Other));
            query
                .set_where_clause(like_clause("name"))
                .set_supplemental_clause("ORDER BY name");
            query
                .add_bind_value(ColumnType::Other, wildcard(Some(term)))
                .expect("Bind failed");
            let rows = query.select().expect("Select failed").into_rows().expect("Rows");
            rows.iter()
                .filter_map(|row| row.get("name").map(|v| v.as_string()))
                .collect()
        };

        assert_eq!(search("50%"), vec!["50% off"]);
        assert_eq!(search("a_b"), vec!["a_b"]);
        assert_eq!(search("=a_b"), vec!["a_b", "axb"]);
        assert_eq!(search("off"), vec!["50% off", "500 off"]);
        assert_eq!(search(""), vec!["50% off", "500 off", "a_b", "axb"]);
    }

    #[test]
    fn test_registry_from_config_file() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config_path = dir.path().join("databases.toml");
        let mut file = std::fs::File::create(&config_path).expect("Failed to create config");
        write!(
            file,
            r#"
driver = "sqlite"
username = "app"
password = ""

[settings.database]
init = "poker, archive"
default = "poker"

[settings.database.poker]
url = "{dir}/{{0}}.db"

[settings.database.archive]
url = ":memory:"

[settings.debug]
dbperf = true
"#,
            dir = dir.path().display()
        )
        .expect("Failed to write config");

        let config = RegistryConfig::load(Some(&config_path), None).expect("Failed to load");
        let registry = DatabaseRegistry::from_config(&config).expect("Failed to build");

        assert_eq!(registry.database_names(), vec!["archive", "poker"]);
        assert!(registry.tracer().is_enabled());
        let default = registry.default_database().expect("No default");
        assert_eq!(default.name(), "poker");

        let mut conn = default.connection().expect("No connection");
        let stmt = conn.prepare("SELECT 1 AS one").expect("Prepare failed");
        let rows = registry.execute_query(conn.as_mut(), &stmt).expect("Query failed");
        assert_eq!(rows.column_labels(), &["one"]);
        assert!(dir.path().join("poker.db").exists());
    }

    #[tokio::test]
    async fn test_concurrent_readers() {
        let fixture = Fixture::new();
        insert_players(&fixture, 25);
        let registry = Arc::new(fixture.registry);

        let mut handles = vec![];
        for i in 0..8u64 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(run_blocking(move || {
                let mut query = registry.query("poker", "players")?;
                query.set_where_clause("chips > ?");
                query.add_bind_value(ColumnType::Integer, (i * 10) as i32)?;
                query.count()
            })));
        }

        for (i, handle) in handles.into_iter().enumerate() {
            let count = handle
                .await
                .expect("Task panicked")
                .expect("Count failed");
            assert_eq!(count, 25 - i as u64);
        }
    }

    #[test]
    fn test_unknown_driver_fails_fast() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let mut params = params(&dir);
        params.insert(
            "settings.database.broken.driver".to_string(),
            "org.example.Driver".to_string(),
        );

        let registry = DatabaseRegistry::new();
        let err = registry.add_database("broken", &params).err().expect("Should fail");
        assert!(err.is_configuration());
        assert!(registry.get_database("broken").is_none());
    }
}
