//! Tree conflicts stored through WcDb on a real SQLite file.

use anyhow::Result;
use proptest::prelude::*;

use wcmeta::store::{Engine, StatementKind, Value};
use wcmeta::{
    describe_conflict, ConflictAction, ConflictReason, ConflictVersion, ErrorKind, NodeKind,
    OpenMode, TransactionMode, TreeConflictRegistry,
};
use wcmeta_testkit::generators::registry;
use wcmeta_testkit::TestFixture;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[test]
fn test_add_and_read_back() -> Result<()> {
    let mut fixture = TestFixture::new()?;
    let conflict = fixture.conflict("", "a.c", ConflictAction::Edit, ConflictReason::Deleted);
    fixture.db.add_tree_conflict(conflict.clone())?;

    let registry = fixture.db.read_tree_conflicts(&fixture.root().to_path_buf())?;
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.get("a.c"), Some(&conflict));
    assert_eq!(
        describe_conflict(&conflict),
        "local file delete, incoming file edit upon update"
    );
    Ok(())
}

#[test]
fn test_directory_without_conflicts_is_empty() -> Result<()> {
    let mut fixture = TestFixture::new()?;
    let dir = fixture.path("sub/dir");
    let registry = fixture.db.read_tree_conflicts(&dir)?;
    assert!(registry.is_empty());
    assert_eq!(registry.directory(), dir.as_path());
    Ok(())
}

#[test]
fn test_conflicts_are_scoped_per_directory() -> Result<()> {
    let mut fixture = TestFixture::new()?;
    let top = fixture.conflict("", "x", ConflictAction::Add, ConflictReason::Obstructed);
    let nested = fixture.conflict("sub", "x", ConflictAction::Delete, ConflictReason::Edited);
    fixture.db.add_tree_conflict(top)?;
    fixture.db.add_tree_conflict(nested.clone())?;

    let sub = fixture.path("sub");
    assert_eq!(fixture.db.tree_conflict(&sub, "x")?, Some(nested));
    assert_eq!(
        fixture.db.read_tree_conflicts(&fixture.root().to_path_buf())?.get("x").map(|c| c.action),
        Some(ConflictAction::Add)
    );
    Ok(())
}

#[test]
fn test_adding_same_victim_replaces() -> Result<()> {
    let mut fixture = TestFixture::new()?;
    let first = fixture.conflict("", "a.c", ConflictAction::Edit, ConflictReason::Deleted);
    let second = fixture.conflict("", "a.c", ConflictAction::Delete, ConflictReason::Edited);
    fixture.db.add_tree_conflict(first)?;
    fixture.db.add_tree_conflict(second.clone())?;

    let registry = fixture.db.read_tree_conflicts(&fixture.root().to_path_buf())?;
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.get("a.c"), Some(&second));
    Ok(())
}

#[test]
fn test_remove_last_conflict_clears_column() -> Result<()> {
    let mut fixture = TestFixture::new()?;
    let conflict = fixture.conflict("", "a.c", ConflictAction::Edit, ConflictReason::Deleted);
    fixture.db.add_tree_conflict(conflict)?;

    let root = fixture.root().to_path_buf();
    assert!(fixture.db.remove_tree_conflict(&root, "a.c")?);
    assert!(!fixture.db.remove_tree_conflict(&root, "a.c")?);

    let row = fixture
        .db
        .session()
        .query_row(StatementKind::SelectTreeConflictData, &[Value::Text(String::new())])?;
    assert_eq!(row, Some(vec![Value::Null]));
    Ok(())
}

#[test]
fn test_conflicts_survive_reopen() -> Result<()> {
    init_tracing();
    let mut fixture = TestFixture::new()?;
    let conflict = fixture.conflict("sub", "b", ConflictAction::Replace, ConflictReason::Missing);
    fixture.db.add_tree_conflict(conflict.clone())?;

    let mut fixture = fixture.reopen(OpenMode::ReadOnly)?;
    let sub = fixture.path("sub");
    assert_eq!(fixture.db.tree_conflict(&sub, "b")?, Some(conflict));
    Ok(())
}

#[test]
fn test_text_and_blob_columns_read_alike() -> Result<()> {
    let mut fixture = TestFixture::new()?;
    let conflict = fixture.conflict("", "a.c", ConflictAction::Edit, ConflictReason::Deleted);
    let mut registry = TreeConflictRegistry::new(fixture.root());
    registry.insert(conflict);
    fixture.db.write_tree_conflicts(&registry)?;
    let bytes = wcmeta::core::encode_registry(&registry)?;

    fixture.db.session().exec(
        StatementKind::UpsertTreeConflictData,
        &[Value::Text(String::new()), Value::Null, Value::Blob(bytes)],
    )?;
    assert_eq!(fixture.db.read_tree_conflicts(&fixture.root().to_path_buf())?, registry);
    Ok(())
}

#[test]
fn test_corrupt_registry_is_reported_and_isolated() -> Result<()> {
    init_tracing();
    let mut fixture = TestFixture::new()?;
    let healthy = fixture.conflict("ok", "a", ConflictAction::Edit, ConflictReason::Deleted);
    fixture.db.add_tree_conflict(healthy.clone())?;

    fixture.db.session().exec(
        StatementKind::UpsertTreeConflictData,
        &[
            Value::Text("bad".into()),
            Value::Text(String::new()),
            Value::Text("((conflict a file update bogus edited))".into()),
        ],
    )?;

    let bad = fixture.path("bad");
    let err = fixture.db.read_tree_conflicts(&bad).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Corruption);

    let ok = fixture.path("ok");
    assert_eq!(fixture.db.tree_conflict(&ok, "a")?, Some(healthy));
    Ok(())
}

#[test]
fn test_corrupt_read_keeps_callers_transaction() -> Result<()> {
    let mut fixture = TestFixture::new()?;
    fixture.db.session().exec(
        StatementKind::UpsertTreeConflictData,
        &[
            Value::Text("bad".into()),
            Value::Text(String::new()),
            Value::Text("(conflict".into()),
        ],
    )?;

    fixture.db.session().begin(TransactionMode::Write)?;
    let checksum = fixture.db.install_pristine(b"outer work")?;
    let bad = fixture.path("bad");
    let err = fixture.db.read_tree_conflicts(&bad).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Corruption);
    assert!(fixture.db.session().engine()?.is_in_transaction());
    fixture.db.session().commit()?;

    assert_eq!(fixture.db.pristine_refcount(&checksum)?, Some(0));
    Ok(())
}

#[test]
fn test_unknown_action_names_the_field() -> Result<()> {
    let mut fixture = TestFixture::new()?;
    fixture.db.session().exec(
        StatementKind::UpsertTreeConflictData,
        &[
            Value::Text(String::new()),
            Value::Null,
            Value::Text(
                "((conflict a file update bogus edited (version 0  2 -1 0  0 ) \
                 (version 0  2 -1 0  0 )))"
                    .into(),
            ),
        ],
    )?;
    let err = fixture.db.read_tree_conflicts(&fixture.root().to_path_buf()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Corruption);
    assert!(err.to_string().contains("conflict action"), "{err}");
    Ok(())
}

#[test]
fn test_unencodable_root_is_refused_before_writing() -> Result<()> {
    let mut fixture = TestFixture::new()?;
    let existing = fixture.conflict("", "a.c", ConflictAction::Edit, ConflictReason::Deleted);
    fixture.db.add_tree_conflict(existing.clone())?;

    let bad = fixture
        .conflict("", "b.c", ConflictAction::Edit, ConflictReason::Deleted)
        .with_source_left(ConflictVersion::new("repos", "trunk/b.c", 3, NodeKind::File));
    let err = fixture.db.add_tree_conflict(bad).unwrap_err();
    assert!(err.to_string().contains("invalid repository root 'repos'"), "{err}");

    let registry = fixture.db.read_tree_conflicts(&fixture.root().to_path_buf())?;
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.get("a.c"), Some(&existing));

    let other = fixture.conflict("", "c.c", ConflictAction::Add, ConflictReason::Obstructed);
    fixture.db.add_tree_conflict(other)?;
    assert_eq!(fixture.db.read_tree_conflicts(&fixture.root().to_path_buf())?.len(), 2);
    Ok(())
}

#[test]
fn test_path_outside_working_copy_is_rejected() -> Result<()> {
    let mut fixture = TestFixture::new()?;
    let elsewhere = std::env::temp_dir().join("definitely-not-the-fixture");
    let err = fixture.db.read_tree_conflicts(&elsewhere).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AssertionFailure);
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn test_registry_survives_store(
        generated in registry("/placeholder".into(), 6)
    ) {
        let mut fixture = TestFixture::new().unwrap();
        let dir = fixture.path("d");
        let mut registry = TreeConflictRegistry::new(&dir);
        for conflict in generated.iter() {
            let mut conflict = conflict.clone();
            conflict.directory = dir.clone();
            registry.insert(conflict);
        }

        fixture.db.write_tree_conflicts(&registry).unwrap();
        let read = fixture.db.read_tree_conflicts(&dir).unwrap();
        prop_assert_eq!(read.len(), generated.len());
        prop_assert_eq!(read, registry);
    }
}
