//! Engine configuration applied when a store is opened.

use std::time::Duration;

/// How often SQLite syncs to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynchronousLevel {
    Off,
    Normal,
    Full,
}

impl SynchronousLevel {
    pub fn as_pragma(&self) -> &'static str {
        match self {
            SynchronousLevel::Off => "OFF",
            SynchronousLevel::Normal => "NORMAL",
            SynchronousLevel::Full => "FULL",
        }
    }
}

/// SQLite rollback-journal strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalMode {
    Delete,
    Truncate,
    Wal,
}

impl JournalMode {
    pub fn as_pragma(&self) -> &'static str {
        match self {
            JournalMode::Delete => "DELETE",
            JournalMode::Truncate => "TRUNCATE",
            JournalMode::Wal => "WAL",
        }
    }
}

/// Configuration for a store session.
///
/// The defaults suit working-copy metadata: a single local writer, data
/// that can be rebuilt from the repository, and a bounded wait when another
/// process holds the lock.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// How long a locked database is retried before a busy error surfaces.
    pub busy_timeout: Duration,
    /// Durability level.
    pub synchronous: SynchronousLevel,
    /// Journal mode. Not applied to read-only handles.
    pub journal_mode: JournalMode,
    /// Whether SQLite enforces foreign keys.
    pub foreign_keys: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_secs(10),
            synchronous: SynchronousLevel::Off,
            journal_mode: JournalMode::Delete,
            foreign_keys: true,
        }
    }
}
