//! Handover patches between groups and threads.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use ntest::timeout;

use colstore_core::{DbError, Group, HandoverPatch, RowRead, TableKey};

use super::helpers::{people, small_group, ID, NAME};

#[timeout(1000)]
#[test]
fn test_handover_round_trip_same_group() {
    let group = small_group();
    let table = people(&group, 10).unwrap();
    for index in [0, 4, 9] {
        let row = table.row(index).unwrap();
        let patch = row.capture().unwrap();
        assert_eq!(patch.table(), table.key());
        assert_eq!(patch.row(), index);

        let restored = patch.apply(&group).unwrap();
        assert_eq!(restored.table(), row.table());
        assert_eq!(restored.index(), row.index());
        assert_eq!(restored.get_int(ID).unwrap(), index as i64);

        let read_only = patch.apply_const(&group).unwrap();
        assert_eq!(read_only.index(), Some(index));
    }
    // every apply produced an independent handle; all were dropped again
    assert_eq!(table.live_row_handles().unwrap(), 0);
}

#[timeout(1000)]
#[test]
fn test_handover_unresolved_in_other_group() {
    let group = small_group();
    let table = people(&group, 3).unwrap();
    let patch = table.row(1).unwrap().capture().unwrap();

    // same table name, different group: keys never match
    let other = small_group();
    people(&other, 3).unwrap();
    let err = patch.apply(&other).unwrap_err();
    assert_eq!(
        err,
        DbError::UnresolvedHandover {
            table: table.key().0,
            row: 1
        }
    );

    // the patch is not consumed
    assert_eq!(patch.apply(&group).unwrap().index(), Some(1));
}

#[timeout(1000)]
#[test]
fn test_handover_unresolved_after_changes() {
    let group = small_group();
    let table = people(&group, 3).unwrap();
    let patch = table.back().unwrap().capture().unwrap();

    table.remove(0).unwrap();
    assert!(matches!(
        patch.apply_const(&group),
        Err(DbError::UnresolvedHandover { row: 2, .. })
    ));

    group.remove_table("people").unwrap();
    let first = HandoverPatch::from_json(&format!(r#"{{"table":{},"row":0}}"#, table.key().0))
        .unwrap();
    assert!(matches!(
        first.apply(&group),
        Err(DbError::UnresolvedHandover { row: 0, .. })
    ));
}

#[timeout(1000)]
#[test]
fn test_handover_json() {
    let group = small_group();
    let table = people(&group, 2).unwrap();
    let patch = table.row(1).unwrap().capture().unwrap();

    let json = patch.to_json().unwrap();
    assert_eq!(json, format!(r#"{{"table":{},"row":1}}"#, table.key().0));
    assert_eq!(HandoverPatch::from_json(&json).unwrap(), patch);
    assert!(matches!(
        HandoverPatch::from_json("{\"table\":1}"),
        Err(DbError::SerializationError(_))
    ));
    assert_eq!(TableKey(7).to_string(), "#7");
}

#[timeout(5000)]
#[test]
fn test_handover_across_threads() {
    let group = Arc::new(small_group());
    let table = people(&group, 20).unwrap();
    let (tx, rx) = mpsc::channel();

    let worker = {
        let group = Arc::clone(&group);
        thread::spawn(move || {
            let table = group.get_table("people").unwrap();
            let found = table
                .read()
                .unwrap()
                .find_first_string(NAME, "person 13")
                .unwrap()
                .unwrap();
            let row = table.const_row(found).unwrap();
            tx.send(row.capture().unwrap()).unwrap();
        })
    };
    worker.join().unwrap();

    let patch = rx.recv().unwrap();
    let row = patch.apply(&group).unwrap();
    assert_eq!(row.get_string(NAME).unwrap(), "person 13");
    row.set_int(ID, 1300).unwrap();
    assert_eq!(table.read().unwrap().get_int(ID, 13).unwrap(), 1300);
}

#[timeout(5000)]
#[test]
fn test_concurrent_readers_while_writer_removes() {
    let group = Arc::new(small_group());
    let table = people(&group, 200).unwrap();
    let watched: Vec<_> = (0..200).step_by(10).map(|i| table.row(i).unwrap()).collect();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let table = table.clone();
            thread::spawn(move || {
                for _ in 0..50 {
                    let row = match table.row(0) {
                        Ok(row) => row,
                        Err(DbError::OutOfRange { .. }) => break,
                        Err(e) => panic!("unexpected error: {e}"),
                    };
                    let _ = row.get_int(ID);
                }
            })
        })
        .collect();

    for _ in 0..50 {
        table.remove(1).unwrap();
    }
    for reader in readers {
        reader.join().unwrap();
    }

    // watched handles on rows 10, 20, ... moved down by the 50 removals of row 1
    for (n, row) in watched.iter().enumerate() {
        let original = n * 10;
        if (1..=50).contains(&original) {
            assert!(!row.is_attached(), "row {original} should be detached");
        } else if original == 0 {
            assert_eq!(row.index(), Some(0));
        } else {
            assert_eq!(row.index(), Some(original - 50));
            assert_eq!(row.get_int(ID).unwrap(), original as i64);
        }
    }
    assert_eq!(group.table_count().unwrap(), 1);
}

#[timeout(1000)]
#[test]
fn test_group_of_patch_must_hold_table() {
    let group = Group::new();
    let patch = HandoverPatch::from_json(r#"{"table":18446744073709551615,"row":0}"#).unwrap();
    assert!(matches!(
        patch.apply(&group),
        Err(DbError::UnresolvedHandover { .. })
    ));
}
