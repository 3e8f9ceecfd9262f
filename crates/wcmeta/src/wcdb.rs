//! WcDb: unified API over one working copy's metadata store.
//!
//! WcDb maps working-copy paths to store rows and runs every multi-step
//! update in a transaction. Tree conflicts of a directory live in the
//! `tree_conflict_data` column of that directory's `actual_node` row as one
//! skel-encoded registry.

use std::path::{Component, Path, PathBuf};

use tracing::debug;

use wcmeta_core::{
    decode_registry, encode_registry, Checksum, NodeKind, TreeConflictDescription,
    TreeConflictRegistry,
};
use wcmeta_store::{
    Engine, OpenMode, Row, Session, SqliteEngine, StatementKind, StoreConfig, StoreError,
    TransactionMode, Value,
};

use crate::error::{Result, WcError};

/// Configuration for a [`WcDb`].
#[derive(Debug, Clone)]
pub struct WcDbConfig {
    /// Engine settings for the store session.
    pub store: StoreConfig,
    /// Whether to create or upgrade the schema when the store is opened for writing.
    pub install_schema: bool,
}

impl Default for WcDbConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            install_schema: true,
        }
    }
}

/// One row of the `nodes` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRecord {
    /// Path relative to the working-copy root, `/`-separated; `""` is the root.
    pub local_relpath: String,
    /// 0 for the base layer, higher for working layers.
    pub op_depth: i64,
    pub kind: NodeKind,
    /// Pristine text of a file node.
    pub checksum: Option<Checksum>,
}

impl NodeRecord {
    pub fn file(local_relpath: impl Into<String>, checksum: Checksum) -> Self {
        Self {
            local_relpath: local_relpath.into(),
            op_depth: 0,
            kind: NodeKind::File,
            checksum: Some(checksum),
        }
    }

    pub fn dir(local_relpath: impl Into<String>) -> Self {
        Self {
            local_relpath: local_relpath.into(),
            op_depth: 0,
            kind: NodeKind::Dir,
            checksum: None,
        }
    }

    pub fn at_depth(mut self, op_depth: i64) -> Self {
        self.op_depth = op_depth;
        self
    }

    /// Relpath of the parent directory, `None` for the root.
    pub fn parent_relpath(&self) -> Option<&str> {
        parent_relpath(&self.local_relpath)
    }
}

/// A pristine row: a content checksum and how many nodes reference it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PristineInfo {
    pub checksum: Checksum,
    pub size: i64,
    pub refcount: i64,
}

/// The main WcDb struct.
///
/// Provides a unified API for:
/// - Reading and writing a directory's tree conflicts
/// - Recording node rows and their pristine references
/// - Installing and pruning pristine rows
pub struct WcDb<E: Engine = SqliteEngine> {
    /// Working-copy root every path is resolved against.
    root: PathBuf,
    session: Session<E>,
}

impl WcDb<SqliteEngine> {
    /// Open the existing store of the working copy at `root`.
    pub fn open(
        root: impl Into<PathBuf>,
        db_path: impl AsRef<Path>,
        mode: OpenMode,
        config: WcDbConfig,
    ) -> Result<Self> {
        let session = Session::open_with_config(db_path, mode, config.store.clone())?;
        Self::with_session(root, session, &config, mode != OpenMode::ReadOnly)
    }

    /// Open the store at `db_path`, creating it if needed.
    pub fn create(
        root: impl Into<PathBuf>,
        db_path: impl AsRef<Path>,
        config: WcDbConfig,
    ) -> Result<Self> {
        Self::open(root, db_path, OpenMode::RWCreate, config)
    }

    /// A database kept entirely in memory.
    pub fn open_memory(root: impl Into<PathBuf>) -> Result<Self> {
        let config = WcDbConfig::default();
        let engine = SqliteEngine::open_memory(&config.store)?;
        let session = Session::with_config(engine, config.store.clone());
        Self::with_session(root, session, &config, true)
    }
}

impl<E: Engine> WcDb<E> {
    /// Build a database over an existing session.
    pub fn with_session(
        root: impl Into<PathBuf>,
        mut session: Session<E>,
        config: &WcDbConfig,
        writable: bool,
    ) -> Result<Self> {
        if config.install_schema && writable {
            session.install_schema()?;
        }
        let root = root.into();
        debug!(root = %root.display(), "opened working-copy database");
        Ok(Self { root, session })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The underlying session, for callers that need raw statements.
    pub fn session(&mut self) -> &mut Session<E> {
        &mut self.session
    }

    pub fn close(self) -> Result<()> {
        Ok(self.session.close()?)
    }

    /// Relpath of `path` inside this working copy.
    pub fn relpath(&self, path: &Path) -> Result<String> {
        let outside = || WcError::OutsideWorkingCopy {
            path: path.to_path_buf(),
            root: self.root.clone(),
        };
        let relative = path.strip_prefix(&self.root).map_err(|_| outside())?;

        let mut parts = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
                Component::CurDir => {}
                _ => return Err(outside()),
            }
        }
        Ok(parts.join("/"))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Tree Conflicts
    // ─────────────────────────────────────────────────────────────────────────

    /// All tree conflicts recorded on `dir`.
    pub fn read_tree_conflicts(&mut self, dir: &Path) -> Result<TreeConflictRegistry> {
        let relpath = self.relpath(dir)?;
        let registry = self
            .session
            .run_in_transaction_with(TransactionMode::ReadOnly, |session| {
                load_registry(session, &relpath, dir)
            })?;
        Ok(registry)
    }

    /// The tree conflict on `victim` inside `dir`, if any.
    pub fn tree_conflict(
        &mut self,
        dir: &Path,
        victim: &str,
    ) -> Result<Option<TreeConflictDescription>> {
        let mut registry = self.read_tree_conflicts(dir)?;
        Ok(registry.remove(victim))
    }

    /// Replace the tree conflicts of the registry's directory.
    ///
    /// An empty registry clears the column.
    pub fn write_tree_conflicts(&mut self, registry: &TreeConflictRegistry) -> Result<()> {
        let relpath = self.relpath(registry.directory())?;
        self.session
            .run_in_transaction(|session| store_registry(session, &relpath, registry))?;
        Ok(())
    }

    /// Record `conflict` on its directory, replacing any conflict on the same victim.
    pub fn add_tree_conflict(&mut self, conflict: TreeConflictDescription) -> Result<()> {
        let dir = conflict.directory().to_path_buf();
        let relpath = self.relpath(&dir)?;
        self.session.run_in_transaction(|session| {
            let mut registry = load_registry(session, &relpath, &dir)?;
            registry.insert(conflict);
            store_registry(session, &relpath, &registry)
        })?;
        Ok(())
    }

    /// Remove the conflict on `victim` in `dir`. Returns whether one existed.
    pub fn remove_tree_conflict(&mut self, dir: &Path, victim: &str) -> Result<bool> {
        let relpath = self.relpath(dir)?;
        let removed = self.session.run_in_transaction(|session| {
            let mut registry = load_registry(session, &relpath, dir)?;
            if registry.remove(victim).is_none() {
                return Ok(false);
            }
            store_registry(session, &relpath, &registry)?;
            Ok(true)
        })?;
        Ok(removed)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Pristine Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Record a pristine text and return its checksum.
    ///
    /// Installing the same content twice keeps one row. A new row starts
    /// unreferenced.
    pub fn install_pristine(&mut self, content: &[u8]) -> Result<Checksum> {
        let checksum = Checksum::of(content);
        let size = i64::try_from(content.len()).unwrap_or(i64::MAX);
        self.session.run_in_transaction(|session| {
            session.exec(
                StatementKind::InsertPristine,
                &[checksum_value(&checksum), Value::Integer(size)],
            )
        })?;
        Ok(checksum)
    }

    pub fn pristine(&mut self, checksum: &Checksum) -> Result<Option<PristineInfo>> {
        let row = self
            .session
            .query_row(StatementKind::SelectPristine, &[checksum_value(checksum)])?;
        row.map(|row| pristine_from_row(&row)).transpose()
    }

    /// Number of nodes referencing `checksum`, `None` if it is not installed.
    pub fn pristine_refcount(&mut self, checksum: &Checksum) -> Result<Option<i64>> {
        Ok(self.pristine(checksum)?.map(|info| info.refcount))
    }

    /// Drop every pristine row no node references. Returns how many went.
    pub fn remove_unreferenced_pristines(&mut self) -> Result<usize> {
        let removed = self.session.run_in_transaction(|session| {
            session.exec(StatementKind::DeleteUnreferencedPristines, &[])
        })?;
        debug!(removed, "pruned unreferenced pristines");
        Ok(removed)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Node Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a node row. Its pristine reference is counted.
    pub fn insert_node(&mut self, node: &NodeRecord) -> Result<()> {
        let params = [
            Value::Text(node.local_relpath.clone()),
            Value::Integer(node.op_depth),
            optional_text(node.parent_relpath()),
            Value::Text(node.kind.as_str().to_string()),
            node.checksum.as_ref().map_or(Value::Null, checksum_value),
        ];
        self.session
            .run_in_transaction(|session| session.exec(StatementKind::InsertNode, &params))?;
        Ok(())
    }

    pub fn node(&mut self, local_relpath: &str, op_depth: i64) -> Result<Option<NodeRecord>> {
        let row = self.session.query_row(
            StatementKind::SelectNode,
            &[Value::Text(local_relpath.to_string()), Value::Integer(op_depth)],
        )?;
        row.map(|row| node_from_row(&row)).transpose()
    }

    /// Node rows whose parent is `parent_relpath`, ordered by path then depth.
    pub fn children(&mut self, parent_relpath: &str) -> Result<Vec<NodeRecord>> {
        let rows = self.session.query(
            StatementKind::SelectChildNodes,
            &[Value::Text(parent_relpath.to_string())],
        )?;
        rows.iter().map(node_from_row).collect()
    }

    /// Point a node at a different pristine text, or at none.
    pub fn set_node_checksum(
        &mut self,
        local_relpath: &str,
        op_depth: i64,
        checksum: Option<&Checksum>,
    ) -> Result<()> {
        let params = [
            Value::Text(local_relpath.to_string()),
            Value::Integer(op_depth),
            checksum.map_or(Value::Null, checksum_value),
        ];
        let changed = self.session.run_in_transaction(|session| {
            session.exec(StatementKind::UpdateNodeChecksum, &params)
        })?;
        if changed == 0 {
            return Err(WcError::NodeNotFound {
                relpath: local_relpath.to_string(),
                op_depth,
            });
        }
        Ok(())
    }

    /// Delete one node row. Returns whether it existed.
    pub fn delete_node(&mut self, local_relpath: &str, op_depth: i64) -> Result<bool> {
        let params = [Value::Text(local_relpath.to_string()), Value::Integer(op_depth)];
        let changed = self
            .session
            .run_in_transaction(|session| session.exec(StatementKind::DeleteNode, &params))?;
        Ok(changed > 0)
    }

    /// Delete `local_relpath` and everything below it, at every depth.
    pub fn delete_subtree(&mut self, local_relpath: &str) -> Result<usize> {
        let params = [Value::Text(local_relpath.to_string())];
        let changed = self.session.run_in_transaction(|session| {
            session.exec(StatementKind::DeleteNodesRecursive, &params)
        })?;
        Ok(changed)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row helpers
// ─────────────────────────────────────────────────────────────────────────────

fn parent_relpath(relpath: &str) -> Option<&str> {
    if relpath.is_empty() {
        return None;
    }
    Some(relpath.rsplit_once('/').map_or("", |(parent, _)| parent))
}

fn optional_text(text: Option<&str>) -> Value {
    text.map_or(Value::Null, |text| Value::Text(text.to_string()))
}

fn checksum_value(checksum: &Checksum) -> Value {
    Value::Text(checksum.to_hex())
}

fn invalid_column(index: usize, name: &str, found: &Value) -> StoreError {
    StoreError::Database(rusqlite::Error::InvalidColumnType(
        index,
        name.to_string(),
        found.data_type(),
    ))
}

fn column(row: &Row, index: usize) -> wcmeta_store::Result<&Value> {
    row.get(index)
        .ok_or(StoreError::Database(rusqlite::Error::InvalidColumnIndex(index)))
}

fn text_column(row: &Row, index: usize, name: &str) -> wcmeta_store::Result<String> {
    match column(row, index)? {
        Value::Text(text) => Ok(text.clone()),
        other => Err(invalid_column(index, name, other)),
    }
}

fn integer_column(row: &Row, index: usize, name: &str) -> wcmeta_store::Result<i64> {
    match column(row, index)? {
        Value::Integer(value) => Ok(*value),
        other => Err(invalid_column(index, name, other)),
    }
}

fn checksum_column(row: &Row, index: usize, name: &str) -> wcmeta_store::Result<Option<Checksum>> {
    match column(row, index)? {
        Value::Null => Ok(None),
        value @ Value::Text(hex) => Checksum::from_hex(hex)
            .map(Some)
            .map_err(|_| invalid_column(index, name, value)),
        other => Err(invalid_column(index, name, other)),
    }
}

fn node_from_row(row: &Row) -> Result<NodeRecord> {
    let kind = text_column(row, 3, "kind")?;
    Ok(NodeRecord {
        local_relpath: text_column(row, 0, "local_relpath")?,
        op_depth: integer_column(row, 1, "op_depth")?,
        kind: NodeKind::parse(&kind).unwrap_or(NodeKind::Unknown),
        checksum: checksum_column(row, 4, "checksum")?,
    })
}

fn pristine_from_row(row: &Row) -> Result<PristineInfo> {
    let checksum = checksum_column(row, 0, "checksum")?
        .ok_or_else(|| invalid_column(0, "checksum", &Value::Null))?;
    Ok(PristineInfo {
        checksum,
        size: integer_column(row, 1, "size")?,
        refcount: integer_column(row, 2, "refcount")?,
    })
}

/// Raw bytes of the conflict column. Text and blob values carry the same skel.
fn conflict_bytes(value: &Value) -> wcmeta_store::Result<Option<Vec<u8>>> {
    match value {
        Value::Null => Ok(None),
        Value::Text(text) => Ok(Some(text.clone().into_bytes())),
        Value::Blob(data) => Ok(Some(data.clone())),
        other => Err(invalid_column(0, "tree_conflict_data", other)),
    }
}

/// Valid UTF-8 is stored as text, anything else as a blob.
fn conflict_value(bytes: Vec<u8>) -> Value {
    match String::from_utf8(bytes) {
        Ok(text) => Value::Text(text),
        Err(e) => Value::Blob(e.into_bytes()),
    }
}

fn load_registry<E: Engine>(
    session: &mut Session<E>,
    relpath: &str,
    dir: &Path,
) -> wcmeta_store::Result<TreeConflictRegistry> {
    let row = session.query_row(
        StatementKind::SelectTreeConflictData,
        &[Value::Text(relpath.to_string())],
    )?;
    let bytes = match row {
        Some(row) => conflict_bytes(column(&row, 0)?)?,
        None => None,
    };
    Ok(decode_registry(bytes.as_deref(), dir)?)
}

fn store_registry<E: Engine>(
    session: &mut Session<E>,
    relpath: &str,
    registry: &TreeConflictRegistry,
) -> wcmeta_store::Result<()> {
    if registry.is_empty() {
        session.exec(
            StatementKind::ClearTreeConflictData,
            &[Value::Text(relpath.to_string())],
        )?;
        return Ok(());
    }

    let data = encode_registry(registry)?;
    session.exec(
        StatementKind::UpsertTreeConflictData,
        &[
            Value::Text(relpath.to_string()),
            optional_text(parent_relpath(relpath)),
            conflict_value(data),
        ],
    )?;
    Ok(())
}
