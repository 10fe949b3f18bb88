pub mod gateway;
pub mod models;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::path::Path;

use crate::error::AppResult;

pub type DbPool = Pool<SqliteConnectionManager>;
type Conn = PooledConnection<SqliteConnectionManager>;

const READ_POOL_SIZE: u32 = 10;

pub const MIGRATIONS: &[(&str, &str)] = &[(
    "001_initial",
    include_str!("../../migrations/001_initial.sql"),
)];

/// Persistence gateway over a single SQLite file.
///
/// Reads run concurrently on a bounded pool; every write checks out the one
/// connection in the writer pool, so compound mutations (token consumption,
/// the user-deletion cascade) are never interleaved with another request's
/// writes.
pub struct Database {
    readers: DbPool,
    writer: DbPool,
}

impl Database {
    pub fn open(db_path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        fn manager(db_path: &Path) -> SqliteConnectionManager {
            SqliteConnectionManager::file(db_path).with_init(|conn| {
                conn.execute_batch(
                    "
                    PRAGMA journal_mode = WAL;
                    PRAGMA synchronous = NORMAL;
                    PRAGMA busy_timeout = 5000;
                    ",
                )
            })
        }

        let writer = Pool::builder().max_size(1).build(manager(db_path))?;
        let readers = Pool::builder()
            .max_size(READ_POOL_SIZE)
            .build(manager(db_path))?;

        let db = Self { readers, writer };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> anyhow::Result<()> {
        let conn = self.writer.get()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_version (
                name TEXT PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            );",
        )?;

        for (name, sql) in MIGRATIONS {
            let already_applied: bool = conn.query_row(
                "SELECT COUNT(*) > 0 FROM schema_version WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )?;

            if !already_applied {
                tracing::info!("applying migration: {}", name);
                conn.execute_batch(sql)?;
                conn.execute(
                    "INSERT INTO schema_version (name) VALUES (?1)",
                    params![name],
                )?;
            }
        }

        Ok(())
    }

    /// Check out a read connection. Many may be live at once.
    pub(crate) fn read(&self) -> AppResult<Conn> {
        Ok(self.readers.get()?)
    }

    /// Check out the single write connection. Holding it for the duration of
    /// a statement sequence is what serializes compound mutations.
    pub(crate) fn write(&self) -> AppResult<Conn> {
        Ok(self.writer.get()?)
    }
}
