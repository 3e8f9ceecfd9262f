//! Pristine reference counts kept in step with node rows.

use anyhow::Result;
use proptest::prelude::*;

use wcmeta::{Checksum, ErrorKind, NodeRecord, OpenMode, WcDb};
use wcmeta_testkit::TestFixture;

fn refcount(db: &mut WcDb, checksum: &Checksum) -> Result<i64> {
    Ok(db.pristine_refcount(checksum)?.unwrap_or(-1))
}

#[test]
fn test_install_is_idempotent_and_unreferenced() -> Result<()> {
    let mut fixture = TestFixture::new()?;
    let first = fixture.db.install_pristine(b"hello\n")?;
    let second = fixture.db.install_pristine(b"hello\n")?;
    assert_eq!(first, second);

    let info = fixture.db.pristine(&first)?.expect("pristine installed");
    assert_eq!(info.size, 6);
    assert_eq!(info.refcount, 0);
    Ok(())
}

#[test]
fn test_refcount_follows_node_lifecycle() -> Result<()> {
    let mut fixture = TestFixture::new()?;
    let db = &mut fixture.db;
    let a = db.install_pristine(b"a")?;
    let b = db.install_pristine(b"b")?;

    db.insert_node(&NodeRecord::file("x", a))?;
    db.insert_node(&NodeRecord::file("y", a))?;
    assert_eq!(refcount(db, &a)?, 2);

    db.set_node_checksum("x", 0, Some(&b))?;
    assert_eq!(refcount(db, &a)?, 1);
    assert_eq!(refcount(db, &b)?, 1);

    db.set_node_checksum("x", 0, Some(&b))?;
    assert_eq!(refcount(db, &b)?, 1);

    db.set_node_checksum("y", 0, None)?;
    assert_eq!(refcount(db, &a)?, 0);

    assert!(db.delete_node("x", 0)?);
    assert!(!db.delete_node("x", 0)?);
    assert_eq!(refcount(db, &b)?, 0);
    Ok(())
}

#[test]
fn test_subtree_delete_releases_every_depth() -> Result<()> {
    let mut fixture = TestFixture::new()?;
    let db = &mut fixture.db;
    let text = db.install_pristine(b"shared")?;

    db.insert_node(&NodeRecord::dir("A"))?;
    db.insert_node(&NodeRecord::file("A/f", text))?;
    db.insert_node(&NodeRecord::file("A/f", text).at_depth(1))?;
    db.insert_node(&NodeRecord::file("A/B/g", text))?;
    db.insert_node(&NodeRecord::file("AB", text))?;
    assert_eq!(refcount(db, &text)?, 4);

    assert_eq!(db.delete_subtree("A")?, 4);
    assert_eq!(refcount(db, &text)?, 1);
    assert!(db.node("AB", 0)?.is_some());
    assert!(db.children("A")?.is_empty());
    Ok(())
}

#[test]
fn test_prune_keeps_referenced_pristines() -> Result<()> {
    let mut fixture = TestFixture::new()?;
    let db = &mut fixture.db;
    let kept = db.install_pristine(b"kept")?;
    let dropped = db.install_pristine(b"dropped")?;
    db.insert_node(&NodeRecord::file("k", kept))?;

    assert_eq!(db.remove_unreferenced_pristines()?, 1);
    assert!(db.pristine(&dropped)?.is_none());
    assert_eq!(refcount(db, &kept)?, 1);
    Ok(())
}

#[test]
fn test_reference_to_uninstalled_pristine_is_refused() -> Result<()> {
    let mut fixture = TestFixture::new()?;
    let db = &mut fixture.db;
    let body = Checksum::of(b"body");

    let err = db.insert_node(&NodeRecord::file("f", body)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Engine);
    assert!(db.node("f", 0)?.is_none());

    assert_eq!(db.install_pristine(b"body")?, body);
    assert_eq!(refcount(db, &body)?, 0);
    db.insert_node(&NodeRecord::file("f", body))?;
    assert_eq!(refcount(db, &body)?, 1);
    assert_eq!(db.remove_unreferenced_pristines()?, 0);
    assert!(db.pristine(&body)?.is_some());

    let err = db
        .set_node_checksum("f", 0, Some(&Checksum::of(b"other")))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Engine);
    assert_eq!(db.node("f", 0)?.and_then(|node| node.checksum), Some(body));
    assert_eq!(refcount(db, &body)?, 1);
    Ok(())
}

#[test]
fn test_missing_node_update_is_not_found() -> Result<()> {
    let mut fixture = TestFixture::new()?;
    let err = fixture.db.set_node_checksum("ghost", 0, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    Ok(())
}

#[test]
fn test_children_and_records_survive_reopen() -> Result<()> {
    let mut fixture = TestFixture::new()?;
    let text = fixture.db.install_pristine(b"body")?;
    fixture.db.insert_node(&NodeRecord::dir("d"))?;
    fixture.db.insert_node(&NodeRecord::file("d/one", text))?;
    fixture.db.insert_node(&NodeRecord::file("d/two", text))?;

    let mut fixture = fixture.reopen(OpenMode::ReadOnly)?;
    let children = fixture.db.children("d")?;
    let names: Vec<_> = children.iter().map(|n| n.local_relpath.as_str()).collect();
    assert_eq!(names, ["d/one", "d/two"]);
    assert_eq!(children[0].checksum, Some(text));
    assert_eq!(refcount(&mut fixture.db, &text)?, 2);

    let err = fixture.db.insert_node(&NodeRecord::file("d/three", text)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Engine);
    Ok(())
}

#[derive(Debug, Clone)]
enum Step {
    Insert(usize, usize),
    Repoint(usize, Option<usize>),
    Delete(usize),
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        (0..4usize, 0..3usize).prop_map(|(n, t)| Step::Insert(n, t)),
        (0..4usize, proptest::option::of(0..3usize)).prop_map(|(n, t)| Step::Repoint(n, t)),
        (0..4usize).prop_map(Step::Delete),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn test_refcount_equals_referencing_rows(steps in proptest::collection::vec(step(), 1..20)) {
        let mut db = WcDb::open_memory("/wc").unwrap();
        let texts: Vec<Checksum> = (0..3u8)
            .map(|i| db.install_pristine(&[i]).unwrap())
            .collect();
        let mut model: [Option<Option<usize>>; 4] = [None; 4];

        for step in steps {
            match step {
                Step::Insert(n, t) if model[n].is_none() => {
                    db.insert_node(&NodeRecord::file(format!("n{n}"), texts[t])).unwrap();
                    model[n] = Some(Some(t));
                }
                Step::Repoint(n, t) if model[n].is_some() => {
                    db.set_node_checksum(&format!("n{n}"), 0, t.map(|t| &texts[t])).unwrap();
                    model[n] = Some(t);
                }
                Step::Delete(n) => {
                    let existed = db.delete_node(&format!("n{n}"), 0).unwrap();
                    prop_assert_eq!(existed, model[n].is_some());
                    model[n] = None;
                }
                _ => {}
            }
        }

        for (t, checksum) in texts.iter().enumerate() {
            let expected = model.iter().filter(|slot| **slot == Some(Some(t))).count() as i64;
            prop_assert_eq!(db.pristine_refcount(checksum).unwrap(), Some(expected));
        }
    }
}
