//! An engine that records calls instead of storing data.
//!
//! This is primarily for testing. It tracks transaction state the way a real
//! engine would, answers queries from scripted responses, and can be told to
//! fail specific calls.

use std::cell::RefCell;
use std::rc::Rc;

use rusqlite::ffi;

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::traits::{Engine, Row, TransactionMode, Value};

/// One call made against a [`RecordingEngine`].
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Begin(TransactionMode),
    Commit,
    Rollback,
    Execute { sql: String, params: Vec<Value> },
    Query { sql: String, params: Vec<Value> },
    OpenTemporary,
    Close,
}

/// Shared view of an engine's event log.
///
/// Stays readable after the engine is moved into a session or closed.
#[derive(Debug, Clone, Default)]
pub struct EngineLog {
    events: Rc<RefCell<Vec<EngineEvent>>>,
}

impl EngineLog {
    fn push(&self, event: EngineEvent) {
        self.events.borrow_mut().push(event);
    }

    /// Snapshot of every event so far.
    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.borrow().clone()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    /// Modes of every engine begin, in order.
    pub fn begins(&self) -> Vec<TransactionMode> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                EngineEvent::Begin(mode) => Some(*mode),
                _ => None,
            })
            .collect()
    }

    pub fn commits(&self) -> usize {
        self.count(|event| matches!(event, EngineEvent::Commit))
    }

    pub fn rollbacks(&self) -> usize {
        self.count(|event| matches!(event, EngineEvent::Rollback))
    }

    /// SQL of every execute call, in order.
    pub fn executed(&self) -> Vec<(String, Vec<Value>)> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                EngineEvent::Execute { sql, params } => Some((sql.clone(), params.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.count(|event| matches!(event, EngineEvent::Close)) > 0
    }

    fn count(&self, pred: impl Fn(&EngineEvent) -> bool) -> usize {
        self.events.borrow().iter().filter(|event| pred(event)).count()
    }
}

/// Engine calls that can be made to fail.
#[derive(Debug, Clone, Copy, Default)]
struct Failures {
    begin: bool,
    commit: bool,
    rollback: bool,
    close: bool,
}

/// Recording engine.
#[derive(Debug, Default)]
pub struct RecordingEngine {
    log: EngineLog,
    mode: Option<TransactionMode>,
    tables: Vec<String>,
    responses: Vec<(String, Vec<Row>)>,
    failures: Failures,
}

impl RecordingEngine {
    /// Create an engine with an empty schema and a fresh log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle on this engine's event log.
    pub fn log(&self) -> EngineLog {
        self.log.clone()
    }

    /// Report `names` from [`Engine::table_names`].
    pub fn with_tables<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tables = names.into_iter().map(Into::into).collect();
        self
    }

    /// Answer queries whose SQL contains `fragment` with `rows`.
    ///
    /// The first matching response wins; unmatched queries return no rows.
    pub fn respond(mut self, fragment: impl Into<String>, rows: Vec<Row>) -> Self {
        self.responses.push((fragment.into(), rows));
        self
    }

    pub fn failing_begin(mut self) -> Self {
        self.failures.begin = true;
        self
    }

    pub fn failing_commit(mut self) -> Self {
        self.failures.commit = true;
        self
    }

    pub fn failing_rollback(mut self) -> Self {
        self.failures.rollback = true;
        self
    }

    pub fn failing_close(mut self) -> Self {
        self.failures.close = true;
        self
    }
}

fn injected(code: std::os::raw::c_int, message: &str) -> StoreError {
    StoreError::Database(rusqlite::Error::SqliteFailure(
        ffi::Error::new(code),
        Some(message.to_string()),
    ))
}

impl Engine for RecordingEngine {
    fn begin(&mut self, mode: TransactionMode) -> Result<()> {
        self.log.push(EngineEvent::Begin(mode));
        if self.failures.begin {
            return Err(injected(ffi::SQLITE_BUSY, "database is locked"));
        }
        self.mode = Some(mode);
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.log.push(EngineEvent::Commit);
        if self.failures.commit {
            return Err(injected(ffi::SQLITE_BUSY, "database is locked"));
        }
        if self.mode.take().is_none() {
            return Err(injected(
                ffi::SQLITE_ERROR,
                "cannot commit - no transaction is active",
            ));
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.log.push(EngineEvent::Rollback);
        self.mode = None;
        if self.failures.rollback {
            return Err(injected(ffi::SQLITE_IOERR, "disk I/O error"));
        }
        Ok(())
    }

    fn transaction_mode(&self) -> Option<TransactionMode> {
        self.mode
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<usize> {
        self.log.push(EngineEvent::Execute {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        Ok(1)
    }

    fn execute_batch(&self, sql: &str) -> Result<()> {
        self.log.push(EngineEvent::Execute {
            sql: sql.to_string(),
            params: Vec::new(),
        });
        Ok(())
    }

    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.log.push(EngineEvent::Query {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        Ok(self
            .responses
            .iter()
            .find(|(fragment, _)| sql.contains(fragment.as_str()))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default())
    }

    fn table_names(&self) -> Result<Vec<String>> {
        Ok(self.tables.clone())
    }

    fn open_temporary(&self, _config: &StoreConfig) -> Result<Self> {
        self.log.push(EngineEvent::OpenTemporary);
        Ok(Self::new())
    }

    fn close(self) -> Result<()> {
        self.log.push(EngineEvent::Close);
        if self.failures.close {
            return Err(injected(ffi::SQLITE_BUSY, "unable to close due to unfinalized statements"));
        }
        Ok(())
    }
}
