//! Statements: prepared, reusable units of SQL bound to a statement kind.
//!
//! Each [`StatementKind`] names one statement and carries its metadata: the
//! table it targets and what it does there. A [`StatementRegistry`] maps
//! kinds to constructors; a session instantiates each kind at most once and
//! reuses the instance, resetting it between uses.
//!
//! Mutating statements can carry [`RowTrigger`]s. Before a statement changes
//! rows it reads the checksum each affected row holds, and after the change
//! every trigger sees one [`RowChange`] per row.

use std::fmt;

use tracing::debug;

use crate::error::{Result, StoreError};
use crate::traits::{Engine, Row, Value};

// ─────────────────────────────────────────────────────────────────────────────
// Statement metadata
// ─────────────────────────────────────────────────────────────────────────────

/// Tables the statements operate on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Nodes,
    Pristine,
    ActualNode,
}

impl Table {
    /// The SQL table name.
    pub fn name(&self) -> &'static str {
        match self {
            Table::Nodes => "nodes",
            Table::Pristine => "pristine",
            Table::ActualNode => "actual_node",
        }
    }

    /// Look up a table by its SQL name. Names match exactly.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "nodes" => Some(Table::Nodes),
            "pristine" => Some(Table::Pristine),
            "actual_node" => Some(Table::ActualNode),
            _ => None,
        }
    }
}

/// What a statement does to its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementOp {
    Select,
    Insert,
    Update,
    Delete,
}

impl StatementOp {
    pub fn is_mutation(&self) -> bool {
        !matches!(self, StatementOp::Select)
    }
}

/// Every statement a session knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatementKind {
    /// `(local_relpath, op_depth, parent_relpath, kind, checksum)`
    InsertNode,
    /// `(local_relpath, op_depth, checksum)`
    UpdateNodeChecksum,
    /// `(local_relpath, op_depth)`
    DeleteNode,
    /// `(local_relpath)`: the node and everything below it, at every depth.
    DeleteNodesRecursive,
    /// `(local_relpath, op_depth)` → `(local_relpath, op_depth, parent_relpath, kind, checksum)`
    SelectNode,
    /// `(parent_relpath)` → `(local_relpath, op_depth, parent_relpath, kind, checksum)`
    SelectChildNodes,
    /// `(checksum, size)`: a no-op when the checksum is already present.
    InsertPristine,
    /// `(checksum)` → `(checksum, size, refcount)`
    SelectPristine,
    /// `()`: drop pristine rows no node references.
    DeleteUnreferencedPristines,
    /// `(local_relpath)` → `(tree_conflict_data)`
    SelectTreeConflictData,
    /// `(local_relpath, parent_relpath, tree_conflict_data)`
    UpsertTreeConflictData,
    /// `(local_relpath)`
    ClearTreeConflictData,
}

impl StatementKind {
    /// All kinds, in declaration order.
    pub const ALL: [StatementKind; 12] = [
        StatementKind::InsertNode,
        StatementKind::UpdateNodeChecksum,
        StatementKind::DeleteNode,
        StatementKind::DeleteNodesRecursive,
        StatementKind::SelectNode,
        StatementKind::SelectChildNodes,
        StatementKind::InsertPristine,
        StatementKind::SelectPristine,
        StatementKind::DeleteUnreferencedPristines,
        StatementKind::SelectTreeConflictData,
        StatementKind::UpsertTreeConflictData,
        StatementKind::ClearTreeConflictData,
    ];

    pub fn table(&self) -> Table {
        match self {
            StatementKind::InsertNode
            | StatementKind::UpdateNodeChecksum
            | StatementKind::DeleteNode
            | StatementKind::DeleteNodesRecursive
            | StatementKind::SelectNode
            | StatementKind::SelectChildNodes => Table::Nodes,
            StatementKind::InsertPristine
            | StatementKind::SelectPristine
            | StatementKind::DeleteUnreferencedPristines => Table::Pristine,
            StatementKind::SelectTreeConflictData
            | StatementKind::UpsertTreeConflictData
            | StatementKind::ClearTreeConflictData => Table::ActualNode,
        }
    }

    pub fn op(&self) -> StatementOp {
        match self {
            StatementKind::SelectNode
            | StatementKind::SelectChildNodes
            | StatementKind::SelectPristine
            | StatementKind::SelectTreeConflictData => StatementOp::Select,
            StatementKind::InsertNode
            | StatementKind::InsertPristine
            | StatementKind::UpsertTreeConflictData => StatementOp::Insert,
            StatementKind::UpdateNodeChecksum | StatementKind::ClearTreeConflictData => {
                StatementOp::Update
            }
            StatementKind::DeleteNode
            | StatementKind::DeleteNodesRecursive
            | StatementKind::DeleteUnreferencedPristines => StatementOp::Delete,
        }
    }

    /// True when the statement inserts, updates or deletes `nodes` rows.
    ///
    /// Such statements must carry the pristine reference-count trigger.
    pub fn mutates_nodes(&self) -> bool {
        self.table() == Table::Nodes && self.op().is_mutation()
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Triggers
// ─────────────────────────────────────────────────────────────────────────────

/// One row changed by a mutating statement, seen through its checksum column.
#[derive(Debug, Clone, PartialEq)]
pub struct RowChange {
    pub table: Table,
    /// Checksum the row held before the change; `None` for inserts.
    pub old_checksum: Option<Value>,
    /// Checksum the row holds after the change; `None` for deletes.
    pub new_checksum: Option<Value>,
}

/// Side effect run for every row a statement changes.
pub trait RowTrigger {
    fn on_change(&self, engine: &dyn Engine, change: &RowChange) -> Result<()>;
}

/// Keeps `pristine.refcount` equal to the number of node rows referencing
/// each checksum.
#[derive(Debug, Clone, Copy, Default)]
pub struct PristineRefcountTrigger;

impl PristineRefcountTrigger {
    const ADJUST_SQL: &'static str =
        "UPDATE pristine SET refcount = refcount + ?2 WHERE checksum = ?1";

    /// A new reference must name an installed pristine.
    fn adjust(engine: &dyn Engine, checksum: &Option<Value>, delta: i64) -> Result<()> {
        let Some(checksum) = checksum.as_ref().filter(|value| **value != Value::Null) else {
            return Ok(());
        };
        let changed =
            engine.execute(Self::ADJUST_SQL, &[checksum.clone(), Value::Integer(delta)])?;
        if changed == 0 && delta > 0 {
            let name = match checksum {
                Value::Text(hex) => hex.clone(),
                other => format!("{other:?}"),
            };
            return Err(StoreError::Constraint(format!(
                "node references pristine '{name}' which is not installed"
            )));
        }
        Ok(())
    }
}

impl RowTrigger for PristineRefcountTrigger {
    fn on_change(&self, engine: &dyn Engine, change: &RowChange) -> Result<()> {
        if change.old_checksum == change.new_checksum {
            return Ok(());
        }
        Self::adjust(engine, &change.new_checksum, 1)?;
        Self::adjust(engine, &change.old_checksum, -1)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Statement trait
// ─────────────────────────────────────────────────────────────────────────────

/// A reusable statement instance owned by a session's cache.
pub trait Statement {
    fn kind(&self) -> StatementKind;

    /// Replace the bound parameters.
    fn bind(&mut self, params: &[Value]);

    /// Run a mutating statement, returning the number of changed rows.
    fn exec(&mut self, engine: &dyn Engine) -> Result<usize>;

    /// Run a select and collect its rows.
    fn query(&mut self, engine: &dyn Engine) -> Result<Vec<Row>>;

    /// True once the statement has run and not been reset since.
    fn needs_reset(&self) -> bool;

    /// Clear bound parameters and the dirty flag.
    fn reset(&mut self);

    /// Attach a trigger. Select statements ignore triggers.
    fn add_trigger(&mut self, trigger: Box<dyn RowTrigger>);

    fn trigger_count(&self) -> usize;
}

/// Parameters and dirty flag shared by every statement family.
#[derive(Default)]
struct Binding {
    params: Vec<Value>,
    dirty: bool,
}

impl Binding {
    fn bind(&mut self, params: &[Value]) {
        self.params = params.to_vec();
    }

    fn reset(&mut self) {
        self.params.clear();
        self.dirty = false;
    }

    /// The first `n` bound parameters.
    fn leading(&self, n: usize, kind: StatementKind) -> Result<&[Value]> {
        self.params.get(..n).ok_or_else(|| {
            StoreError::assertion(format!(
                "statement {kind} needs {n} parameters, {} bound",
                self.params.len()
            ))
        })
    }
}

fn unsupported(kind: StatementKind, what: &str) -> StoreError {
    StoreError::assertion(format!("statement {kind} does not support {what}"))
}

/// Read the checksum column of every row a mutation is about to touch.
fn affected_checksums(
    engine: &dyn Engine,
    sql: &str,
    params: &[Value],
) -> Result<Vec<Option<Value>>> {
    Ok(engine
        .query(sql, params)?
        .into_iter()
        .map(|row| row.into_iter().next())
        .collect())
}

fn fire(
    triggers: &[Box<dyn RowTrigger>],
    engine: &dyn Engine,
    changes: &[RowChange],
) -> Result<()> {
    for change in changes {
        for trigger in triggers {
            trigger.on_change(engine, change)?;
        }
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Statement families
// ─────────────────────────────────────────────────────────────────────────────

/// A statement that reads rows.
pub struct SelectStatement {
    kind: StatementKind,
    sql: &'static str,
    binding: Binding,
}

impl SelectStatement {
    pub fn new(kind: StatementKind, sql: &'static str) -> Self {
        Self {
            kind,
            sql,
            binding: Binding::default(),
        }
    }
}

impl Statement for SelectStatement {
    fn kind(&self) -> StatementKind {
        self.kind
    }

    fn bind(&mut self, params: &[Value]) {
        self.binding.bind(params);
    }

    fn exec(&mut self, _engine: &dyn Engine) -> Result<usize> {
        Err(unsupported(self.kind, "exec"))
    }

    fn query(&mut self, engine: &dyn Engine) -> Result<Vec<Row>> {
        self.binding.dirty = true;
        engine.query(self.sql, &self.binding.params)
    }

    fn needs_reset(&self) -> bool {
        self.binding.dirty
    }

    fn reset(&mut self) {
        self.binding.reset();
    }

    fn add_trigger(&mut self, _trigger: Box<dyn RowTrigger>) {}

    fn trigger_count(&self) -> usize {
        0
    }
}

/// A statement that inserts one row.
pub struct InsertStatement {
    kind: StatementKind,
    sql: &'static str,
    /// Index of the bound parameter holding the new row's checksum.
    checksum_param: Option<usize>,
    binding: Binding,
    triggers: Vec<Box<dyn RowTrigger>>,
}

impl InsertStatement {
    pub fn new(kind: StatementKind, sql: &'static str) -> Self {
        Self {
            kind,
            sql,
            checksum_param: None,
            binding: Binding::default(),
            triggers: Vec::new(),
        }
    }

    pub fn with_checksum_param(mut self, index: usize) -> Self {
        self.checksum_param = Some(index);
        self
    }
}

impl Statement for InsertStatement {
    fn kind(&self) -> StatementKind {
        self.kind
    }

    fn bind(&mut self, params: &[Value]) {
        self.binding.bind(params);
    }

    fn exec(&mut self, engine: &dyn Engine) -> Result<usize> {
        self.binding.dirty = true;
        let changed = engine.execute(self.sql, &self.binding.params)?;
        if changed > 0 && !self.triggers.is_empty() {
            let change = RowChange {
                table: self.kind.table(),
                old_checksum: None,
                new_checksum: self
                    .checksum_param
                    .and_then(|i| self.binding.params.get(i).cloned()),
            };
            fire(&self.triggers, engine, &[change])?;
        }
        Ok(changed)
    }

    fn query(&mut self, _engine: &dyn Engine) -> Result<Vec<Row>> {
        Err(unsupported(self.kind, "query"))
    }

    fn needs_reset(&self) -> bool {
        self.binding.dirty
    }

    fn reset(&mut self) {
        self.binding.reset();
    }

    fn add_trigger(&mut self, trigger: Box<dyn RowTrigger>) {
        self.triggers.push(trigger);
    }

    fn trigger_count(&self) -> usize {
        self.triggers.len()
    }
}

/// A statement that updates rows.
///
/// Bound parameters list the row-selecting values first (`where_arity` of
/// them), then the new values. `affected_sql` reads the checksum of the rows
/// the update will touch, given only the row-selecting parameters.
pub struct UpdateStatement {
    kind: StatementKind,
    sql: &'static str,
    affected_sql: Option<&'static str>,
    where_arity: usize,
    checksum_param: Option<usize>,
    binding: Binding,
    triggers: Vec<Box<dyn RowTrigger>>,
}

impl UpdateStatement {
    pub fn new(kind: StatementKind, sql: &'static str, where_arity: usize) -> Self {
        Self {
            kind,
            sql,
            affected_sql: None,
            where_arity,
            checksum_param: None,
            binding: Binding::default(),
            triggers: Vec::new(),
        }
    }

    /// Track the checksum column: `affected_sql` reads the old values and
    /// parameter `index` holds the new one.
    pub fn tracking_checksum(mut self, affected_sql: &'static str, index: usize) -> Self {
        self.affected_sql = Some(affected_sql);
        self.checksum_param = Some(index);
        self
    }
}

impl Statement for UpdateStatement {
    fn kind(&self) -> StatementKind {
        self.kind
    }

    fn bind(&mut self, params: &[Value]) {
        self.binding.bind(params);
    }

    fn exec(&mut self, engine: &dyn Engine) -> Result<usize> {
        self.binding.dirty = true;
        let before = match self.affected_sql {
            Some(sql) if !self.triggers.is_empty() => {
                let keys = self.binding.leading(self.where_arity, self.kind)?;
                affected_checksums(engine, sql, keys)?
            }
            _ => Vec::new(),
        };

        let changed = engine.execute(self.sql, &self.binding.params)?;

        if !before.is_empty() {
            let new_checksum = self
                .checksum_param
                .and_then(|i| self.binding.params.get(i).cloned());
            let changes: Vec<RowChange> = before
                .into_iter()
                .map(|old_checksum| RowChange {
                    table: self.kind.table(),
                    old_checksum,
                    new_checksum: new_checksum.clone(),
                })
                .collect();
            fire(&self.triggers, engine, &changes)?;
        }
        Ok(changed)
    }

    fn query(&mut self, _engine: &dyn Engine) -> Result<Vec<Row>> {
        Err(unsupported(self.kind, "query"))
    }

    fn needs_reset(&self) -> bool {
        self.binding.dirty
    }

    fn reset(&mut self) {
        self.binding.reset();
    }

    fn add_trigger(&mut self, trigger: Box<dyn RowTrigger>) {
        self.triggers.push(trigger);
    }

    fn trigger_count(&self) -> usize {
        self.triggers.len()
    }
}

/// A statement that deletes rows.
///
/// `affected_sql` takes the same parameters as the delete and reads the
/// checksum of every row it will remove.
pub struct DeleteStatement {
    kind: StatementKind,
    sql: &'static str,
    affected_sql: Option<&'static str>,
    binding: Binding,
    triggers: Vec<Box<dyn RowTrigger>>,
}

impl DeleteStatement {
    pub fn new(kind: StatementKind, sql: &'static str) -> Self {
        Self {
            kind,
            sql,
            affected_sql: None,
            binding: Binding::default(),
            triggers: Vec::new(),
        }
    }

    pub fn tracking_checksum(mut self, affected_sql: &'static str) -> Self {
        self.affected_sql = Some(affected_sql);
        self
    }
}

impl Statement for DeleteStatement {
    fn kind(&self) -> StatementKind {
        self.kind
    }

    fn bind(&mut self, params: &[Value]) {
        self.binding.bind(params);
    }

    fn exec(&mut self, engine: &dyn Engine) -> Result<usize> {
        self.binding.dirty = true;
        let before = match self.affected_sql {
            Some(sql) if !self.triggers.is_empty() => {
                affected_checksums(engine, sql, &self.binding.params)?
            }
            _ => Vec::new(),
        };

        let changed = engine.execute(self.sql, &self.binding.params)?;

        let changes: Vec<RowChange> = before
            .into_iter()
            .map(|old_checksum| RowChange {
                table: self.kind.table(),
                old_checksum,
                new_checksum: None,
            })
            .collect();
        fire(&self.triggers, engine, &changes)?;
        Ok(changed)
    }

    fn query(&mut self, _engine: &dyn Engine) -> Result<Vec<Row>> {
        Err(unsupported(self.kind, "query"))
    }

    fn needs_reset(&self) -> bool {
        self.binding.dirty
    }

    fn reset(&mut self) {
        self.binding.reset();
    }

    fn add_trigger(&mut self, trigger: Box<dyn RowTrigger>) {
        self.triggers.push(trigger);
    }

    fn trigger_count(&self) -> usize {
        self.triggers.len()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Registry
// ─────────────────────────────────────────────────────────────────────────────

/// Constructor for one statement kind.
#[derive(Clone, Copy)]
pub struct Registration {
    pub kind: StatementKind,
    pub build: fn() -> Box<dyn Statement>,
}

/// Fixed mapping from statement kinds to constructors.
#[derive(Clone, Copy)]
pub struct StatementRegistry {
    entries: &'static [Registration],
}

impl StatementRegistry {
    /// Registry with every standard statement.
    pub fn standard() -> Self {
        Self { entries: STANDARD }
    }

    /// Registry over a custom set of constructors.
    pub fn custom(entries: &'static [Registration]) -> Self {
        Self { entries }
    }

    pub fn is_registered(&self, kind: StatementKind) -> bool {
        self.entries.iter().any(|entry| entry.kind == kind)
    }

    /// Build a fresh statement for `kind`.
    ///
    /// A kind with no constructor is a caller bug and reported as an
    /// assertion failure.
    pub fn instantiate(&self, kind: StatementKind) -> Result<Box<dyn Statement>> {
        let entry = self
            .entries
            .iter()
            .find(|entry| entry.kind == kind)
            .ok_or_else(|| StoreError::assertion(format!("statement '{kind}' not defined")))?;
        debug!(%kind, "prepared statement");
        Ok((entry.build)())
    }
}

impl Default for StatementRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Debug for StatementRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|entry| entry.kind))
            .finish()
    }
}

fn insert_node() -> Box<dyn Statement> {
    Box::new(
        InsertStatement::new(
            StatementKind::InsertNode,
            "INSERT INTO nodes (local_relpath, op_depth, parent_relpath, kind, checksum) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .with_checksum_param(4),
    )
}

fn update_node_checksum() -> Box<dyn Statement> {
    Box::new(
        UpdateStatement::new(
            StatementKind::UpdateNodeChecksum,
            "UPDATE nodes SET checksum = ?3 WHERE local_relpath = ?1 AND op_depth = ?2",
            2,
        )
        .tracking_checksum(
            "SELECT checksum FROM nodes WHERE local_relpath = ?1 AND op_depth = ?2",
            2,
        ),
    )
}

fn delete_node() -> Box<dyn Statement> {
    Box::new(
        DeleteStatement::new(
            StatementKind::DeleteNode,
            "DELETE FROM nodes WHERE local_relpath = ?1 AND op_depth = ?2",
        )
        .tracking_checksum("SELECT checksum FROM nodes WHERE local_relpath = ?1 AND op_depth = ?2"),
    )
}

fn delete_nodes_recursive() -> Box<dyn Statement> {
    // The empty relpath is the working-copy root and matches every row.
    Box::new(
        DeleteStatement::new(
            StatementKind::DeleteNodesRecursive,
            "DELETE FROM nodes WHERE ?1 = '' OR local_relpath = ?1 \
             OR substr(local_relpath, 1, length(?1) + 1) = ?1 || '/'",
        )
        .tracking_checksum(
            "SELECT checksum FROM nodes WHERE ?1 = '' OR local_relpath = ?1 \
             OR substr(local_relpath, 1, length(?1) + 1) = ?1 || '/'",
        ),
    )
}

fn select_node() -> Box<dyn Statement> {
    Box::new(SelectStatement::new(
        StatementKind::SelectNode,
        "SELECT local_relpath, op_depth, parent_relpath, kind, checksum \
         FROM nodes WHERE local_relpath = ?1 AND op_depth = ?2",
    ))
}

fn select_child_nodes() -> Box<dyn Statement> {
    Box::new(SelectStatement::new(
        StatementKind::SelectChildNodes,
        "SELECT local_relpath, op_depth, parent_relpath, kind, checksum \
         FROM nodes WHERE parent_relpath = ?1 ORDER BY local_relpath, op_depth",
    ))
}

fn insert_pristine() -> Box<dyn Statement> {
    Box::new(InsertStatement::new(
        StatementKind::InsertPristine,
        "INSERT OR IGNORE INTO pristine (checksum, size, refcount) VALUES (?1, ?2, 0)",
    ))
}

fn select_pristine() -> Box<dyn Statement> {
    Box::new(SelectStatement::new(
        StatementKind::SelectPristine,
        "SELECT checksum, size, refcount FROM pristine WHERE checksum = ?1",
    ))
}

fn delete_unreferenced_pristines() -> Box<dyn Statement> {
    Box::new(DeleteStatement::new(
        StatementKind::DeleteUnreferencedPristines,
        "DELETE FROM pristine WHERE refcount <= 0",
    ))
}

fn select_tree_conflict_data() -> Box<dyn Statement> {
    Box::new(SelectStatement::new(
        StatementKind::SelectTreeConflictData,
        "SELECT tree_conflict_data FROM actual_node WHERE local_relpath = ?1",
    ))
}

fn upsert_tree_conflict_data() -> Box<dyn Statement> {
    Box::new(InsertStatement::new(
        StatementKind::UpsertTreeConflictData,
        "INSERT INTO actual_node (local_relpath, parent_relpath, tree_conflict_data) \
         VALUES (?1, ?2, ?3) \
         ON CONFLICT(local_relpath) DO UPDATE SET tree_conflict_data = excluded.tree_conflict_data",
    ))
}

fn clear_tree_conflict_data() -> Box<dyn Statement> {
    Box::new(UpdateStatement::new(
        StatementKind::ClearTreeConflictData,
        "UPDATE actual_node SET tree_conflict_data = NULL WHERE local_relpath = ?1",
        1,
    ))
}

static STANDARD: &[Registration] = &[
    Registration { kind: StatementKind::InsertNode, build: insert_node },
    Registration { kind: StatementKind::UpdateNodeChecksum, build: update_node_checksum },
    Registration { kind: StatementKind::DeleteNode, build: delete_node },
    Registration { kind: StatementKind::DeleteNodesRecursive, build: delete_nodes_recursive },
    Registration { kind: StatementKind::SelectNode, build: select_node },
    Registration { kind: StatementKind::SelectChildNodes, build: select_child_nodes },
    Registration { kind: StatementKind::InsertPristine, build: insert_pristine },
    Registration { kind: StatementKind::SelectPristine, build: select_pristine },
    Registration {
        kind: StatementKind::DeleteUnreferencedPristines,
        build: delete_unreferenced_pristines,
    },
    Registration {
        kind: StatementKind::SelectTreeConflictData,
        build: select_tree_conflict_data,
    },
    Registration {
        kind: StatementKind::UpsertTreeConflictData,
        build: upsert_tree_conflict_data,
    },
    Registration {
        kind: StatementKind::ClearTreeConflictData,
        build: clear_tree_conflict_data,
    },
];
