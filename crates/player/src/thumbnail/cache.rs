// Lookup table from (source url, position) to a cached thumbnail file

use crate::error::Result;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};

const TABLE_NAME: &str = "cacheObject";

pub struct ThumbnailCache {
    conn: Connection,
    dir: PathBuf,
}

impl ThumbnailCache {
    /// Open (or create) the table at `db_path`; image files live under `dir`
    pub fn open(db_path: &Path, dir: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        Self::with_connection(conn, dir)
    }

    pub fn in_memory(dir: &Path) -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, dir)
    }

    fn with_connection(conn: Connection, dir: &Path) -> Result<Self> {
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {TABLE_NAME} (
                id           INTEGER PRIMARY KEY,
                url          TEXT NOT NULL,
                position     INTEGER NOT NULL,
                relativePath TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_{TABLE_NAME}_url_position
                ON {TABLE_NAME}(url, position);"
        ))?;
        Ok(Self {
            conn,
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn insert(&self, url: &str, position_ms: u64, filename: &str) -> Result<()> {
        self.conn.execute(
            &format!("INSERT INTO {TABLE_NAME} (url, position, relativePath) VALUES (?1, ?2, ?3)"),
            params![url, position_ms as i64, filename],
        )?;
        Ok(())
    }

    pub fn delete(&self, url: &str, position_ms: u64) -> Result<()> {
        self.conn.execute(
            &format!("DELETE FROM {TABLE_NAME} WHERE url = ?1 AND position = ?2"),
            params![url, position_ms as i64],
        )?;
        Ok(())
    }

    /// Stored file name for the pair, most recent entry first
    pub fn query_path(&self, url: &str, position_ms: u64) -> Result<Option<String>> {
        let path = self
            .conn
            .query_row(
                &format!(
                    "SELECT relativePath FROM {TABLE_NAME}
                     WHERE url = ?1 AND position = ?2 ORDER BY id DESC LIMIT 1"
                ),
                params![url, position_ms as i64],
                |row| row.get(0),
            )
            .optional()?;
        Ok(path)
    }

    /// Cached file for the pair if it is still on disk. Stale rows are removed.
    pub fn lookup(&self, url: &str, position_ms: u64) -> Result<Option<PathBuf>> {
        let Some(relative) = self.query_path(url, position_ms)? else {
            return Ok(None);
        };
        let path = self.dir.join(relative);
        if path.exists() {
            Ok(Some(path))
        } else {
            log::debug!("Thumbnail {} missing on disk, dropping entry", path.display());
            self.delete(url, position_ms)?;
            Ok(None)
        }
    }
}
