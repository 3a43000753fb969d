use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Open (creating if needed) the prediction database at `path` and make sure
/// the schema exists. Parent directories are created so a fresh install works
/// without any manual setup.
pub fn ensure_schema(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create data directory")?;
    }

    let conn = Connection::open(path).context("failed to open SQLite database")?;
    create_tables(&conn)?;
    tracing::debug!(path = %path.display(), "prediction database ready");
    Ok(conn)
}

/// Private in-memory database with the same schema. Used by tests and by the
/// application as a fallback when the on-disk file cannot be opened.
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
    create_tables(&conn)?;
    Ok(conn)
}

fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS predictions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            label TEXT NOT NULL,
            image_path TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    )
    .context("failed to create predictions table")?;
    Ok(())
}
