//! Row accessor lifecycle and registry adjustment.

use ntest::timeout;

use colstore_core::{ColumnType, ConstRow, DbError, Row, RowHandle, RowRead};

use super::helpers::{people, small_group, ACTIVE, ID, NAME};

#[timeout(1000)]
#[test]
fn test_row_reads_and_writes() {
    let group = small_group();
    let table = people(&group, 6).unwrap();
    let row = table.row(4).unwrap();

    assert!(row.is_attached());
    assert_eq!(row.index(), Some(4));
    assert_eq!(row.table(), Some(table.clone()));
    assert_eq!(row.get_int(ID).unwrap(), 4);
    assert_eq!(row.get_string(NAME).unwrap(), "person 4");
    assert!(!row.get_bool(ACTIVE).unwrap());

    row.set_int(ID, 40).unwrap();
    row.set_string(NAME, "renamed with a long enough name").unwrap();
    row.set_bool(ACTIVE, true).unwrap();
    let read_back = table.const_row(4).unwrap();
    assert_eq!(read_back.get_int(ID).unwrap(), 40);
    assert_eq!(
        read_back.get_string(NAME).unwrap(),
        "renamed with a long enough name"
    );
    assert!(read_back.get_bool(ACTIVE).unwrap());

    assert_eq!(row.column_count().unwrap(), 3);
    assert_eq!(row.column_name(NAME).unwrap(), "name");
    assert_eq!(row.column_index("active").unwrap(), ACTIVE);
    assert_eq!(row.column_type(ID).unwrap(), ColumnType::Int);
    assert!(matches!(
        row.get_binary(NAME),
        Err(DbError::TypeMismatch { .. })
    ));
}

#[timeout(1000)]
#[test]
fn test_remove_adjusts_handles() {
    let group = small_group();
    let table = people(&group, 8).unwrap();
    let at0 = table.row(0).unwrap();
    let at2 = table.row(2).unwrap();
    let at5 = table.row(5).unwrap();
    assert_eq!(table.live_row_handles().unwrap(), 3);

    table.remove(2).unwrap();
    assert_eq!(at0.index(), Some(0));
    assert!(!at2.is_attached());
    assert_eq!(at2.index(), None);
    assert_eq!(at5.index(), Some(4));
    assert_eq!(at5.get_int(ID).unwrap(), 5);
    assert_eq!(table.live_row_handles().unwrap(), 2);

    table.remove(0).unwrap();
    assert!(!at0.is_attached());
    assert!(!at2.is_attached());
    assert_eq!(at5.index(), Some(3));
    assert_eq!(at5.get_int(ID).unwrap(), 5);
    assert_eq!(table.live_row_handles().unwrap(), 1);
}

#[timeout(1000)]
#[test]
fn test_move_last_over_adjusts_handles() {
    let group = small_group();
    let table = people(&group, 5).unwrap();
    let at1 = table.row(1).unwrap();
    let at4 = table.row(4).unwrap();

    table.move_last_over(1).unwrap();
    assert_eq!(table.row_count().unwrap(), 4);
    assert!(!at1.is_attached());
    assert_eq!(at4.index(), Some(1));
    assert_eq!(at4.get_int(ID).unwrap(), 4);
    assert_eq!(at4.get_string(NAME).unwrap(), "person 4");
}

#[timeout(1000)]
#[test]
fn test_insert_shifts_handles() {
    let group = small_group();
    let table = people(&group, 4).unwrap();
    let at1 = table.row(1).unwrap();
    let at3 = table.back().unwrap();
    let front = table.front().unwrap();

    table.insert_empty_row(2).unwrap();
    assert_eq!(front.index(), Some(0));
    assert_eq!(at1.index(), Some(1));
    assert_eq!(at3.index(), Some(4));
    assert_eq!(at3.get_int(ID).unwrap(), 3);

    table.insert_empty_row(0).unwrap();
    assert_eq!(front.index(), Some(1));
    assert_eq!(front.get_int(ID).unwrap(), 0);
}

#[timeout(1000)]
#[test]
fn test_remove_through_row() {
    let group = small_group();
    let table = people(&group, 5).unwrap();
    let doomed = table.row(1).unwrap();
    let later = table.row(3).unwrap();

    doomed.remove().unwrap();
    assert!(!doomed.is_attached());
    assert_eq!(later.index(), Some(2));
    assert!(matches!(doomed.remove(), Err(DbError::DetachedRow)));

    let swapped = table.row(0).unwrap();
    let last = table.back().unwrap();
    swapped.move_last_over().unwrap();
    assert!(!swapped.is_attached());
    assert_eq!(last.index(), Some(0));
    assert_eq!(last.get_int(ID).unwrap(), 4);
}

#[timeout(1000)]
#[test]
fn test_detached_row_operations_fail() {
    let row = Row::detached();
    assert!(!row.is_attached());
    assert_eq!(row.index(), None);
    assert!(row.table().is_none());
    assert!(matches!(row.get_int(0), Err(DbError::DetachedRow)));
    assert!(matches!(row.set_int(0, 1), Err(DbError::DetachedRow)));
    assert!(matches!(row.column_count(), Err(DbError::DetachedRow)));
    assert!(matches!(row.move_last_over(), Err(DbError::DetachedRow)));
    assert!(matches!(row.capture(), Err(DbError::DetachedRow)));

    let const_row = ConstRow::detached();
    assert!(matches!(const_row.get_string(1), Err(DbError::DetachedRow)));
}

#[timeout(1000)]
#[test]
fn test_detach_is_idempotent() {
    let group = small_group();
    let table = people(&group, 3).unwrap();
    let mut row = table.row(1).unwrap();
    let other = table.row(1).unwrap();

    row.detach();
    assert!(!row.is_attached());
    assert_eq!(table.live_row_handles().unwrap(), 1);
    row.detach();
    assert!(!row.is_attached());
    assert_eq!(table.live_row_handles().unwrap(), 1);
    assert_eq!(other.index(), Some(1));

    let mut handle = RowHandle::detached();
    handle.detach();
    handle.detach();
    assert!(!handle.is_attached());
}

#[timeout(1000)]
#[test]
fn test_attach_and_reattach() {
    let group = small_group();
    let table = people(&group, 3).unwrap();
    let mut handle = RowHandle::detached();

    assert!(matches!(
        handle.attach(&table, 3),
        Err(DbError::OutOfRange { index: 3, len: 3 })
    ));
    handle.attach(&table, 0).unwrap();
    assert_eq!(handle.index(), Some(0));
    assert!(matches!(
        handle.attach(&table, 1),
        Err(DbError::AlreadyAttached)
    ));

    handle.reattach(&table, 2).unwrap();
    assert_eq!(handle.index(), Some(2));
    assert_eq!(table.live_row_handles().unwrap(), 1);

    // a handle detached by a removal can be attached again
    table.remove(2).unwrap();
    assert!(!handle.is_attached());
    handle.attach(&table, 1).unwrap();
    assert_eq!(handle.index(), Some(1));
}

#[timeout(1000)]
#[test]
fn test_reattach_to_other_table() {
    let group = small_group();
    let table = people(&group, 3).unwrap();
    let other = group.add_table("other", vec![]).unwrap();
    other.add_empty_row().unwrap();

    let mut row = table.row(2).unwrap();
    row.reattach(&other, 0).unwrap();
    assert_eq!(row.table(), Some(other.clone()));
    assert_eq!(table.live_row_handles().unwrap(), 0);
    assert_eq!(other.live_row_handles().unwrap(), 1);
}

#[timeout(1000)]
#[test]
fn test_clone_gets_own_slot() {
    let group = small_group();
    let table = people(&group, 4).unwrap();
    let row = table.row(2).unwrap();
    let mut copy = row.clone();
    assert_eq!(table.live_row_handles().unwrap(), 2);
    assert_eq!(copy.index(), Some(2));

    copy.detach();
    assert!(row.is_attached());
    assert_eq!(table.live_row_handles().unwrap(), 1);

    let read_only: ConstRow = row.to_const();
    assert_eq!(read_only.get_int(ID).unwrap(), 2);
    table.remove(0).unwrap();
    assert_eq!(read_only.index(), Some(1));
    assert_eq!(row.index(), Some(1));

    let detached_copy = Row::detached().clone();
    assert!(!detached_copy.is_attached());
}

#[timeout(1000)]
#[test]
fn test_drop_releases_slot() {
    let group = small_group();
    let table = people(&group, 2).unwrap();
    {
        let _a = table.row(0).unwrap();
        let _b = table.const_row(1).unwrap();
        assert_eq!(table.live_row_handles().unwrap(), 2);
    }
    assert_eq!(table.live_row_handles().unwrap(), 0);
}

#[timeout(1000)]
#[test]
fn test_clear_detaches_all() {
    let group = small_group();
    let table = people(&group, 3).unwrap();
    let rows: Vec<Row> = (0..3).map(|i| table.row(i).unwrap()).collect();
    table.clear().unwrap();
    assert!(rows.iter().all(|row| !row.is_attached()));
    assert_eq!(table.live_row_handles().unwrap(), 0);
}

#[timeout(1000)]
#[test]
fn test_removed_table_detaches_handles() {
    let group = small_group();
    let table = people(&group, 3).unwrap();
    let row = table.row(1).unwrap();
    group.remove_table("people").unwrap();
    assert!(!row.is_attached());
    assert!(matches!(row.get_int(ID), Err(DbError::DetachedRow)));
    assert!(matches!(table.row(0), Err(DbError::TableDetached { .. })));
}

#[timeout(5000)]
#[test]
fn test_many_handles_track_random_removals() {
    let group = small_group();
    let table = people(&group, 60).unwrap();
    let rows: Vec<Row> = (0..60).map(|i| table.row(i).unwrap()).collect();

    // remove every third original row, from the back so positions stay simple
    for original in (0..60).rev().filter(|i| i % 3 == 0) {
        table.remove(original).unwrap();
    }
    for (original, row) in rows.iter().enumerate() {
        if original % 3 == 0 {
            assert!(!row.is_attached());
        } else {
            assert_eq!(row.get_int(ID).unwrap(), original as i64);
            assert_eq!(row.index(), Some(original - original / 3 - 1));
        }
    }
    table.read().unwrap().verify().unwrap();
}
