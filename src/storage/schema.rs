//! Staging template and connection setup.

use rusqlite::{Connection, Result};

/// DDL for both sides of the staging store.
pub const TEMPLATE_SQL: &str = include_str!("../../sql/schema.sql");

/// Logical tables staged per side.
pub const TABLES: [&str; 4] = ["dataset", "dataitem", "relationship", "join"];

/// Per-connection pragmas.
pub fn configure(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "cache_size", "-16000")?; // 16MB cache
    conn.pragma_update(None, "temp_store", "MEMORY")?;
    Ok(())
}

/// Create the staging tables from `template`.
pub fn apply_template(conn: &Connection, template: &str) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    configure(conn)?;
    conn.execute_batch(template)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables(conn: &Connection) -> Vec<String> {
        conn.prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn test_apply_template() {
        let conn = Connection::open_in_memory().unwrap();
        apply_template(&conn, TEMPLATE_SQL).expect("Failed to apply template");

        let tables = tables(&conn);
        for prefix in ["db_", "dh_"] {
            for table in TABLES {
                assert!(tables.contains(&format!("{prefix}{table}")), "{prefix}{table}");
            }
        }
        assert_eq!(tables.len(), 8);
    }

    #[test]
    fn test_template_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        apply_template(&conn, TEMPLATE_SQL).expect("First apply failed");
        apply_template(&conn, TEMPLATE_SQL).expect("Second apply failed");
    }

    #[test]
    fn test_key_columns_ignore_case() {
        let conn = Connection::open_in_memory().unwrap();
        apply_template(&conn, TEMPLATE_SQL).unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO db_dataset (schema, physical_nm) VALUES ('Sales', 'Orders')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO db_dataset (schema, physical_nm) VALUES ('sales', 'ORDERS')",
            [],
        )
        .unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM db_dataset", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
