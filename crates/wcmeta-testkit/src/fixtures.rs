//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use wcmeta::{WcDb, WcDbConfig, WcError};
use wcmeta_core::{
    ConflictAction, ConflictReason, ConflictVersion, NodeKind, Operation, TreeConflictDescription,
};
use wcmeta_store::{EngineLog, RecordingEngine, Session};

/// Name of the store file inside a fixture's admin directory.
pub const DB_NAME: &str = "wc.db";

/// A working copy in a temporary directory with an on-disk store.
///
/// The directory is removed when the fixture is dropped.
pub struct TestFixture {
    dir: TempDir,
    pub db: WcDb,
}

impl TestFixture {
    /// Create a fresh working copy with an installed schema.
    pub fn new() -> Result<Self, WcError> {
        let dir = TempDir::new().map_err(wcmeta_store::StoreError::from)?;
        std::fs::create_dir_all(dir.path().join(".svn"))
            .map_err(wcmeta_store::StoreError::from)?;
        let db = WcDb::create(dir.path(), db_path(dir.path()), WcDbConfig::default())?;
        Ok(Self { dir, db })
    }

    /// Working-copy root.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn db_path(&self) -> PathBuf {
        db_path(self.dir.path())
    }

    /// Absolute path of `relpath` inside the working copy.
    pub fn path(&self, relpath: &str) -> PathBuf {
        relpath
            .split('/')
            .filter(|part| !part.is_empty())
            .fold(self.root().to_path_buf(), |path, part| path.join(part))
    }

    /// Close the store and open it again with `mode`.
    pub fn reopen(self, mode: wcmeta::OpenMode) -> Result<Self, WcError> {
        let Self { dir, db } = self;
        db.close()?;
        let db = WcDb::open(dir.path(), db_path(dir.path()), mode, WcDbConfig::default())?;
        Ok(Self { dir, db })
    }

    /// A conflict on `victim` inside the directory `dir_relpath`.
    pub fn conflict(
        &self,
        dir_relpath: &str,
        victim: &str,
        action: ConflictAction,
        reason: ConflictReason,
    ) -> TreeConflictDescription {
        TreeConflictDescription::new(
            self.path(dir_relpath),
            victim,
            NodeKind::File,
            Operation::Update,
            action,
            reason,
        )
        .with_source_left(ConflictVersion::new(
            "http://svn.example.com/repos",
            format!("trunk/{victim}"),
            10,
            NodeKind::File,
        ))
        .with_source_right(ConflictVersion::new(
            "http://svn.example.com/repos",
            format!("trunk/{victim}"),
            11,
            NodeKind::None,
        ))
    }
}

fn db_path(root: &Path) -> PathBuf {
    root.join(".svn").join(DB_NAME)
}

/// A session over a [`RecordingEngine`], plus the engine's log.
pub fn recording_session() -> (Session<RecordingEngine>, EngineLog) {
    let engine = RecordingEngine::new();
    let log = engine.log();
    (Session::with_engine(engine), log)
}
