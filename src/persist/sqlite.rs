//! SQLite-backed duplicate cache.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use hashbrown::HashSet;
use rusqlite::{Connection, params};
use tracing::warn;

use crate::types::DupeKey;

use super::{DupeCache, PersistResult};

/// Cache keyed by row, so concurrent processes add keys without losing each
/// other's writes.
pub struct SqliteDupeCache {
    conn: Connection,
}

impl SqliteDupeCache {
    /// Opens or creates a cache database at `path`.
    ///
    /// Enables WAL mode and sets `synchronous=NORMAL`.
    pub fn open(path: impl AsRef<Path>) -> PersistResult<Self> {
        if let Some(dir) = path.as_ref().parent() {
            std::fs::create_dir_all(dir)?;
        }
        let conn = Connection::open(path)?;
        Self::init_connection(conn)
    }

    /// Opens an in-memory cache.
    pub fn open_in_memory() -> PersistResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(conn)
    }

    fn init_connection(conn: Connection) -> PersistResult<Self> {
        conn.execute_batch(include_str!("schema.sql"))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(Self { conn })
    }

    /// Number of stored keys.
    pub fn len(&self) -> PersistResult<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM uploaded", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    fn load_keys(&self) -> PersistResult<HashSet<DupeKey>> {
        let mut stmt = self.conn.prepare("SELECT key FROM uploaded")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut out = HashSet::new();
        for row in rows {
            out.insert(DupeKey::from_stored(row?));
        }
        Ok(out)
    }
}

impl DupeCache for SqliteDupeCache {
    fn load(&self) -> HashSet<DupeKey> {
        self.load_keys().unwrap_or_else(|err| {
            warn!(error = %err, "duplicate cache unreadable, treating as empty");
            HashSet::new()
        })
    }

    fn add(&mut self, key: &DupeKey) -> PersistResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO uploaded(key, ts_ms) VALUES (?1, ?2)",
            params![key.as_str(), now_ms() as i64],
        )?;
        Ok(())
    }

    fn clear(&mut self) -> PersistResult<()> {
        self.conn.execute("DELETE FROM uploaded", [])?;
        Ok(())
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
