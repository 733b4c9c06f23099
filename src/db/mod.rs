pub mod migrations;
pub mod queries;
pub mod sqlite;
pub mod store;

use anyhow::Context;
use rusqlite::Connection;

pub use sqlite::SqliteStore;
pub use store::{Key, PrefixQuery, PutOutcome, Record, Store, StoreError, UpdateOutcome};

pub fn init_db(path: &str) -> anyhow::Result<Connection> {
    let conn = Connection::open(path).context("failed to open database")?;

    // WAL lets other processes read while one writer holds the lock; the busy
    // timeout makes competing writers wait instead of failing outright.
    conn.execute_batch("PRAGMA busy_timeout=5000; PRAGMA journal_mode=WAL;")
        .context("failed to set database pragmas")?;

    migrations::run_migrations(&conn)?;

    Ok(conn)
}
