//! SQLite implementation of the Engine trait.
//!
//! This is the primary engine behind a session. It uses rusqlite with
//! bundled SQLite and runs every call on the caller's thread.

use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{params_from_iter, Connection, OpenFlags};
use tracing::{debug, warn};

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::traits::{Engine, OpenMode, Row, TransactionMode, Value};

/// SQLite-based engine.
pub struct SqliteEngine {
    conn: Connection,
    /// File backing the connection; `None` for in-memory engines.
    path: Option<PathBuf>,
    /// Mode of the transaction this engine started, if still open.
    mode: Option<TransactionMode>,
}

impl SqliteEngine {
    /// Open a SQLite database at the given path.
    ///
    /// Unless `mode` is [`OpenMode::RWCreate`], a missing file is reported as
    /// [`StoreError::NotFound`] before SQLite is involved.
    pub fn open(path: impl AsRef<Path>, mode: OpenMode, config: &StoreConfig) -> Result<Self> {
        let path = path.as_ref();
        if mode != OpenMode::RWCreate && !path.exists() {
            return Err(StoreError::NotFound(path.to_path_buf()));
        }

        let conn = Connection::open_with_flags(path, open_flags(mode))?;
        configure(&conn, mode, config)?;
        debug!(path = %path.display(), ?mode, "opened sqlite store");

        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
            mode: None,
        })
    }

    /// Open an in-memory SQLite database.
    pub fn open_memory(config: &StoreConfig) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        configure(&conn, OpenMode::RWCreate, config)?;
        Ok(Self {
            conn,
            path: None,
            mode: None,
        })
    }

    /// Path of the backing file, `None` for in-memory engines.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Borrow the underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Take the write lock inside a deferred transaction.
    ///
    /// Rewriting `user_version` with its current value is the cheapest write
    /// that needs the reserved lock and leaves the data untouched.
    fn promote(&mut self, mode: TransactionMode) -> Result<()> {
        let version: i64 = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?;
        self.conn
            .execute_batch(&format!("PRAGMA user_version = {version}"))?;
        self.mode = Some(mode);
        debug!(?mode, "promoted sqlite transaction");
        Ok(())
    }
}

fn open_flags(mode: OpenMode) -> OpenFlags {
    let access = match mode {
        OpenMode::ReadOnly => OpenFlags::SQLITE_OPEN_READ_ONLY,
        OpenMode::ReadWrite => OpenFlags::SQLITE_OPEN_READ_WRITE,
        OpenMode::RWCreate => OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
    };
    access | OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX
}

fn configure(conn: &Connection, mode: OpenMode, config: &StoreConfig) -> Result<()> {
    conn.busy_timeout(config.busy_timeout)?;
    conn.pragma_update(None, "synchronous", config.synchronous.as_pragma())?;
    conn.pragma_update(None, "foreign_keys", config.foreign_keys)?;
    if mode != OpenMode::ReadOnly {
        conn.pragma_update(None, "journal_mode", config.journal_mode.as_pragma())?;
    }
    Ok(())
}

fn begin_sql(mode: TransactionMode) -> &'static str {
    match mode {
        TransactionMode::ReadOnly => "BEGIN DEFERRED",
        TransactionMode::Write => "BEGIN IMMEDIATE",
        TransactionMode::Exclusive => "BEGIN EXCLUSIVE",
    }
}

/// Remove `<file>-journal` when SQLite leaves it behind empty.
fn remove_empty_journal(path: &Path) {
    let mut journal = path.as_os_str().to_owned();
    journal.push("-journal");
    let journal = PathBuf::from(journal);

    match fs::metadata(&journal) {
        Ok(meta) if meta.is_file() && meta.len() == 0 => {
            if let Err(e) = fs::remove_file(&journal) {
                warn!(path = %journal.display(), error = %e, "failed to remove empty journal");
            }
        }
        _ => {}
    }
}

impl Engine for SqliteEngine {
    fn begin(&mut self, mode: TransactionMode) -> Result<()> {
        match self.transaction_mode() {
            None => {
                self.conn.execute_batch(begin_sql(mode))?;
                self.mode = Some(mode);
                debug!(?mode, "began sqlite transaction");
                Ok(())
            }
            Some(TransactionMode::ReadOnly) if mode.is_write() => self.promote(mode),
            Some(current) => Err(StoreError::assertion(format!(
                "cannot begin {mode:?} transaction inside {current:?} transaction"
            ))),
        }
    }

    fn commit(&mut self) -> Result<()> {
        self.conn.execute_batch("COMMIT")?;
        self.mode = None;
        debug!("committed sqlite transaction");
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.mode = None;
        self.conn.execute_batch("ROLLBACK")?;
        debug!("rolled back sqlite transaction");
        Ok(())
    }

    fn transaction_mode(&self) -> Option<TransactionMode> {
        // SQLite ends a transaction on its own after some errors.
        if self.conn.is_autocommit() {
            None
        } else {
            self.mode.or(Some(TransactionMode::ReadOnly))
        }
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<usize> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        Ok(stmt.execute(params_from_iter(params.iter()))?)
    }

    fn execute_batch(&self, sql: &str) -> Result<()> {
        Ok(self.conn.execute_batch(sql)?)
    }

    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let mut stmt = self.conn.prepare_cached(sql)?;
        let width = stmt.column_count();
        let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
            (0..width).map(|i| row.get::<_, Value>(i)).collect()
        })?;
        Ok(rows.collect::<std::result::Result<Vec<Row>, _>>()?)
    }

    fn table_names(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")?;
        let names = stmt.query_map([], |row| row.get(0))?;
        Ok(names.collect::<std::result::Result<Vec<String>, _>>()?)
    }

    fn open_temporary(&self, config: &StoreConfig) -> Result<Self> {
        Self::open_memory(config)
    }

    fn close(self) -> Result<()> {
        let path = self.path.clone();
        self.conn.close().map_err(|(_, e)| StoreError::Database(e))?;
        if let Some(path) = path {
            remove_empty_journal(&path);
            debug!(path = %path.display(), "closed sqlite store");
        }
        Ok(())
    }
}
