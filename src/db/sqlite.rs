use std::path::Path;

use rusqlite::Connection;
use tracing;

use super::DatabaseError;

/// Open a SQLite connection to the given path and run migrations
pub fn open_database(path: &Path) -> Result<Connection, DatabaseError> {
    let conn = Connection::open(path)?;
    configure_pragmas(&conn)?;
    run_migrations(&conn)?;
    Ok(conn)
}

/// Open an in-memory database (for testing)
pub fn open_memory_database() -> Result<Connection, DatabaseError> {
    let conn = Connection::open_in_memory()?;
    configure_pragmas(&conn)?;
    run_migrations(&conn)?;
    Ok(conn)
}

fn configure_pragmas(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         PRAGMA foreign_keys=ON;",
    )?;
    Ok(())
}

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    let current_version = get_current_version(conn);

    let migrations: Vec<(i64, &str)> = vec![
        (1, include_str!("../../resources/migrations/001_initial.sql")),
    ];

    for (version, sql) in migrations {
        if version > current_version {
            tracing::info!("Running migration v{version}");
            conn.execute_batch(sql).map_err(|e| DatabaseError::MigrationFailed {
                version,
                reason: e.to_string(),
            })?;
        }
    }

    Ok(())
}

/// Get the current schema version (0 if no schema exists yet)
fn get_current_version(conn: &Connection) -> i64 {
    conn.query_row(
        "SELECT MAX(version) FROM schema_version",
        [],
        |row| row.get::<_, i64>(0),
    )
    .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_initializes_all_tables() {
        let conn = open_memory_database().unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        // medical_records + sub_documents + email_history + schema_version
        assert_eq!(count, 4);
    }

    #[test]
    fn schema_version_is_current() {
        let conn = open_memory_database().unwrap();
        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn migration_idempotent() {
        let conn = open_memory_database().unwrap();
        let result = run_migrations(&conn);
        assert!(result.is_ok());
    }

    #[test]
    fn identity_key_is_unique() {
        let conn = open_memory_database().unwrap();
        conn.execute(
            "INSERT INTO medical_records (id, request_id, patient_name, created_at, last_updated)
             VALUES ('r1', 'REQ1', 'John Doe', '2026-01-01 00:00:00', '2026-01-01 00:00:00')",
            [],
        )
        .unwrap();
        let dup = conn.execute(
            "INSERT INTO medical_records (id, request_id, patient_name, created_at, last_updated)
             VALUES ('r2', 'REQ1', 'John Doe', '2026-01-01 00:00:00', '2026-01-01 00:00:00')",
            [],
        );
        assert!(dup.is_err());
    }

    #[test]
    fn foreign_keys_enabled() {
        let conn = open_memory_database().unwrap();
        let fk: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1);
    }
}
