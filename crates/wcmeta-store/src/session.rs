//! Store sessions: one engine handle plus its statement cache and
//! transaction bookkeeping.
//!
//! Transactions nest. The session counts `begin` calls and only asks the
//! engine to begin when it is outside a transaction or when a read-only
//! transaction must be promoted to take the write lock. The engine commit
//! happens when the count returns to zero.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, warn};

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::migration;
use crate::sqlite::SqliteEngine;
use crate::statement::{PristineRefcountTrigger, Statement, StatementKind, StatementRegistry};
use crate::traits::{Engine, OpenMode, Row, TransactionMode, Value};
use wcmeta_core::ErrorKind;

/// A session on one store.
///
/// Not safe to share between threads: cached statements are mutable and
/// reused. Callers serialize access, typically with one session per unit of
/// work.
pub struct Session<E: Engine = SqliteEngine> {
    /// `None` only while closing.
    engine: Option<E>,
    config: StoreConfig,
    registry: StatementRegistry,
    statements: HashMap<StatementKind, Box<dyn Statement>>,
    open_count: usize,
    temporary: Option<Box<Session<E>>>,
}

impl Session<SqliteEngine> {
    /// Open the store file at `path` with the default configuration.
    pub fn open(path: impl AsRef<Path>, mode: OpenMode) -> Result<Self> {
        Self::open_with_config(path, mode, StoreConfig::default())
    }

    /// Open the store file at `path`.
    ///
    /// Unless `mode` is [`OpenMode::RWCreate`], a missing file fails with
    /// [`StoreError::NotFound`].
    pub fn open_with_config(
        path: impl AsRef<Path>,
        mode: OpenMode,
        config: StoreConfig,
    ) -> Result<Self> {
        let engine = SqliteEngine::open(path, mode, &config)?;
        Ok(Self::with_config(engine, config))
    }

    /// Open a session on a private in-memory database.
    pub fn open_memory() -> Result<Self> {
        let config = StoreConfig::default();
        let engine = SqliteEngine::open_memory(&config)?;
        Ok(Self::with_config(engine, config))
    }
}

impl<E: Engine> Session<E> {
    /// Wrap an already opened engine.
    pub fn with_engine(engine: E) -> Self {
        Self::with_config(engine, StoreConfig::default())
    }

    pub fn with_config(engine: E, config: StoreConfig) -> Self {
        Self::with_registry(engine, config, StatementRegistry::standard())
    }

    /// Wrap an engine with a custom statement registry.
    pub fn with_registry(engine: E, config: StoreConfig, registry: StatementRegistry) -> Self {
        Self {
            engine: Some(engine),
            config,
            registry,
            statements: HashMap::new(),
            open_count: 0,
            temporary: None,
        }
    }

    /// The engine behind this session.
    pub fn engine(&self) -> Result<&E> {
        self.engine.as_ref().ok_or_else(closed)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Depth of nested transactions currently open.
    pub fn open_count(&self) -> usize {
        self.open_count
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Close the session.
    ///
    /// The scratch store is closed first and a failure there is only logged.
    /// A failure closing the primary engine is returned.
    pub fn close(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        if let Some(temporary) = self.temporary.take() {
            if let Err(e) = temporary.close() {
                warn!(error = %e, "failed to close temporary store");
            }
        }
        self.statements.clear();
        match self.engine.take() {
            Some(engine) => {
                debug!(open_count = self.open_count, "closing session");
                engine.close()
            }
            None => Ok(()),
        }
    }

    /// The session's scratch store, created on first use.
    ///
    /// It lives in memory, is never durable and is closed with this session.
    pub fn get_temporary_store(&mut self) -> Result<&mut Session<E>> {
        if self.temporary.is_none() {
            let engine = self.engine()?.open_temporary(&self.config)?;
            debug!("opened temporary store");
            self.temporary = Some(Box::new(Session::with_registry(
                engine,
                self.config.clone(),
                self.registry,
            )));
        }
        self.temporary
            .as_deref_mut()
            .ok_or_else(|| StoreError::assertion("temporary store missing after creation"))
    }

    /// Whether the schema has a table called exactly `name`.
    pub fn has_table(&self, name: &str) -> Result<bool> {
        Ok(self.engine()?.table_names()?.iter().any(|table| table == name))
    }

    /// Create or upgrade the schema in a write transaction.
    pub fn install_schema(&mut self) -> Result<()> {
        self.run_in_transaction(|session| migration::migrate(session.engine()?))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statements
    // ─────────────────────────────────────────────────────────────────────────

    /// The cached statement for `kind`, instantiated on first use.
    ///
    /// A statement that ran since its last reset is reset before it is
    /// returned. Statements that mutate `nodes` carry the pristine
    /// reference-count trigger.
    pub fn get_statement(&mut self, kind: StatementKind) -> Result<&mut dyn Statement> {
        if self.engine.is_none() {
            return Err(closed());
        }

        if !self.statements.contains_key(&kind) {
            let mut statement = self.registry.instantiate(kind)?;
            if kind.mutates_nodes() {
                statement.add_trigger(Box::new(PristineRefcountTrigger));
            }
            self.statements.insert(kind, statement);
        }

        let statement = self
            .statements
            .get_mut(&kind)
            .ok_or_else(|| StoreError::assertion(format!("statement '{kind}' not cached")))?;
        if statement.needs_reset() {
            statement.reset();
        }
        Ok(statement.as_mut())
    }

    /// Run the statement for `kind` with whatever is bound to it.
    pub fn exec_statement(&mut self, kind: StatementKind) -> Result<usize> {
        self.get_statement(kind)?;
        self.run_cached(kind, None)
    }

    /// Bind `params` to the statement for `kind` and run it.
    pub fn exec(&mut self, kind: StatementKind, params: &[Value]) -> Result<usize> {
        self.get_statement(kind)?.bind(params);
        self.run_cached(kind, None)
    }

    /// Bind `params` to the select for `kind` and collect its rows.
    pub fn query(&mut self, kind: StatementKind, params: &[Value]) -> Result<Vec<Row>> {
        self.get_statement(kind)?.bind(params);
        let mut rows = Vec::new();
        self.run_cached(kind, Some(&mut rows))?;
        Ok(rows)
    }

    /// First row of [`Session::query`], if any.
    pub fn query_row(&mut self, kind: StatementKind, params: &[Value]) -> Result<Option<Row>> {
        Ok(self.query(kind, params)?.into_iter().next())
    }

    fn run_cached(&mut self, kind: StatementKind, rows: Option<&mut Vec<Row>>) -> Result<usize> {
        let engine = self.engine.as_ref().ok_or_else(closed)?;
        let Some(statement) = self.statements.get_mut(&kind) else {
            return Ok(0);
        };
        match rows {
            Some(out) => {
                *out = statement.query(engine)?;
                Ok(out.len())
            }
            None => statement.exec(engine),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Transactions
    // ─────────────────────────────────────────────────────────────────────────

    /// Open a (possibly nested) transaction.
    ///
    /// Passing `None` is an assertion failure.
    pub fn begin(&mut self, mode: impl Into<Option<TransactionMode>>) -> Result<()> {
        let mode = mode
            .into()
            .ok_or_else(|| StoreError::assertion("transaction mode must be given"))?;
        let engine = self.engine.as_mut().ok_or_else(closed)?;

        self.open_count += 1;
        if needs_engine_begin(engine.transaction_mode(), mode) {
            engine.begin(mode)?;
        }
        Ok(())
    }

    /// Close one level of nesting, committing at the outermost level.
    pub fn commit(&mut self) -> Result<()> {
        if self.open_count == 0 {
            return Err(StoreError::assertion("no opened transactions"));
        }
        self.open_count -= 1;
        if self.open_count == 0 {
            let engine = self.engine.as_mut().ok_or_else(closed)?;
            if engine.is_in_transaction() {
                engine.commit()?;
            }
        }
        Ok(())
    }

    /// Roll back the engine transaction. Nesting depth is left alone.
    pub fn rollback(&mut self) -> Result<()> {
        self.engine.as_mut().ok_or_else(closed)?.rollback()
    }

    /// Run `body` inside a write transaction.
    pub fn run_in_transaction<T, F>(&mut self, body: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        self.run_in_transaction_with(TransactionMode::Write, body)
    }

    /// Run `body` inside a transaction of the given mode.
    ///
    /// If `begin` or `body` fails with an engine error the engine
    /// transaction is rolled back and the original error returned; a
    /// rollback failure is attached beneath it. Other errors leave the
    /// transaction, and any enclosing caller's work in it, untouched. The
    /// matching `commit` always runs so the nesting depth stays balanced.
    pub fn run_in_transaction_with<T, F>(&mut self, mode: TransactionMode, body: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let outcome = match self.begin(mode) {
            Ok(()) => body(self),
            Err(e) => Err(e),
        };

        let outcome = match outcome {
            Ok(value) => Ok(value),
            Err(original) => Err(self.roll_back_after(original)),
        };

        let committed = self.commit();
        match (outcome, committed) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(original), Ok(())) => Err(original),
            (Err(original), Err(e)) => {
                warn!(error = %e, "commit bookkeeping failed after transaction error");
                Err(original)
            }
        }
    }

    fn roll_back_after(&mut self, original: StoreError) -> StoreError {
        if original.kind() != ErrorKind::Engine {
            return original;
        }
        let in_transaction = self
            .engine
            .as_ref()
            .is_some_and(|engine| engine.is_in_transaction());
        if !in_transaction {
            return original;
        }
        match self.rollback() {
            Ok(()) => original,
            Err(rollback) => StoreError::RollbackFailed {
                original: Box::new(original),
                rollback: Box::new(rollback),
            },
        }
    }
}

impl<E: Engine> Drop for Session<E> {
    fn drop(&mut self) {
        if self.engine.is_some() {
            warn!("session dropped without close");
            if let Err(e) = self.shutdown() {
                warn!(error = %e, "failed to close dropped session");
            }
        }
    }
}

fn closed() -> StoreError {
    StoreError::assertion("session is closed")
}

/// Whether `requested` needs an engine begin given the engine's current mode.
fn needs_engine_begin(current: Option<TransactionMode>, requested: TransactionMode) -> bool {
    match current {
        None => true,
        Some(TransactionMode::ReadOnly) => requested.is_write(),
        Some(_) => false,
    }
}
