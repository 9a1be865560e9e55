//! Typed cells, nulls and links through row accessors.

use std::thread;

use ntest::timeout;

use colstore_core::{ColumnSpec, ColumnType, DbError, Group, RowRead, TableRef};

use super::helpers::{people, small_group, ID, NAME};

const TOTAL: usize = 0;
const BUYER: usize = 1;

fn orders(group: &Group, buyers: &[usize]) -> TableRef {
    let table = group
        .add_table(
            "orders",
            vec![
                ColumnSpec::new("total", ColumnType::Int),
                ColumnSpec::link("buyer", "people"),
            ],
        )
        .unwrap();
    for (n, buyer) in buyers.iter().enumerate() {
        let row = table.add_empty_row().unwrap();
        table.write().unwrap().set_int(TOTAL, row, n as i64).unwrap();
        table.set_link(BUYER, row, *buyer).unwrap();
    }
    table
}

#[timeout(1000)]
#[test]
fn test_typed_and_null_cells_through_rows() {
    let group = small_group();
    let table = group
        .add_table(
            "readings",
            vec![
                ColumnSpec::new("temp", ColumnType::Float),
                ColumnSpec::new("mean", ColumnType::Double).nullable(),
                ColumnSpec::new("at", ColumnType::DateTime),
            ],
        )
        .unwrap();
    table.add_empty_row().unwrap();
    let row = table.row(0).unwrap();

    row.set_float(0, 21.5).unwrap();
    row.set_datetime(2, 1_700_000_000).unwrap();
    assert!(row.is_null(1).unwrap());
    row.set_double(1, 0.1 + 0.2).unwrap();

    table.insert_empty_row(0).unwrap();
    let read_back = table.const_row(1).unwrap();
    assert_eq!(read_back.get_float(0).unwrap(), 21.5);
    assert_eq!(read_back.get_double(1).unwrap(), 0.1 + 0.2);
    assert_eq!(read_back.get_datetime(2).unwrap(), 1_700_000_000);
    assert!(!read_back.is_null(1).unwrap());

    row.set_null(1).unwrap();
    assert!(read_back.is_null(1).unwrap());
    assert!(matches!(
        row.set_null(0),
        Err(DbError::ColumnNotNullable { column, .. }) if column == "temp"
    ));
    assert!(matches!(row.get_int(0), Err(DbError::TypeMismatch { .. })));
}

#[timeout(1000)]
#[test]
fn test_follow_link_between_tables() {
    let group = small_group();
    let people = people(&group, 5).unwrap();
    let orders = orders(&group, &[3, 0]);

    let order = orders.row(0).unwrap();
    let buyer = order.follow_link(BUYER).unwrap().unwrap();
    assert_eq!(buyer.table(), Some(people.clone()));
    assert_eq!(buyer.get_string(NAME).unwrap(), "person 3");

    order.set_link(BUYER, 1).unwrap();
    assert_eq!(order.get_link(BUYER).unwrap(), Some(1));
    let buyer = order.to_const().follow_link(BUYER).unwrap().unwrap();
    assert_eq!(buyer.get_int(ID).unwrap(), 1);

    order.nullify_link(BUYER).unwrap();
    assert!(order.is_null_link(BUYER).unwrap());
    assert!(order.follow_link(BUYER).unwrap().is_none());

    assert!(matches!(
        order.set_link(BUYER, 5),
        Err(DbError::LinkOutOfRange { table, row: 5, len: 5 }) if table == "people"
    ));
    assert!(matches!(order.follow_link(TOTAL), Err(DbError::TypeMismatch { .. })));
}

#[timeout(1000)]
#[test]
fn test_links_track_target_rows() {
    let group = small_group();
    let people = people(&group, 6).unwrap();
    let orders = orders(&group, &[1, 4, 5, 1]);
    let followed = orders.row(1).unwrap().follow_link(BUYER).unwrap().unwrap();
    assert_eq!(followed.get_int(ID).unwrap(), 4);

    people.insert_empty_row(0).unwrap();
    let buyer_ids: Vec<Option<i64>> = (0..4)
        .map(|n| {
            orders
                .row(n)
                .unwrap()
                .follow_link(BUYER)
                .unwrap()
                .map(|row| row.get_int(ID).unwrap())
        })
        .collect();
    assert_eq!(buyer_ids, vec![Some(1), Some(4), Some(5), Some(1)]);

    // person 1 is removed: both orders by them lose their buyer
    people.remove(2).unwrap();
    let order = orders.row(0).unwrap();
    assert!(order.is_null_link(BUYER).unwrap());
    assert!(orders.row(3).unwrap().is_null_link(BUYER).unwrap());
    assert_eq!(followed.index(), Some(4));

    // person 5, the last row, moves over person 4
    people.move_last_over(4).unwrap();
    assert!(!followed.is_attached());
    let order = orders.row(2).unwrap();
    assert_eq!(order.get_link(BUYER).unwrap(), Some(4));
    assert_eq!(
        order.follow_link(BUYER).unwrap().unwrap().get_int(ID).unwrap(),
        5
    );
    assert!(orders.row(1).unwrap().is_null_link(BUYER).unwrap());

    people.read().unwrap().verify().unwrap();
    orders.read().unwrap().verify().unwrap();
}

#[timeout(1000)]
#[test]
fn test_self_link_follows_moved_row() {
    let group = small_group();
    let nodes = group
        .add_table(
            "nodes",
            vec![
                ColumnSpec::new("id", ColumnType::Int),
                ColumnSpec::link("next", "nodes"),
            ],
        )
        .unwrap();
    for id in 0..4 {
        let row = nodes.add_empty_row().unwrap();
        nodes.write().unwrap().set_int(0, row, id).unwrap();
    }
    let first = nodes.row(0).unwrap();
    first.set_link(1, 3).unwrap();
    nodes.row(3).unwrap().set_link(1, 0).unwrap();

    nodes.move_last_over(1).unwrap();
    let next = first.follow_link(1).unwrap().unwrap();
    assert_eq!(next.index(), Some(1));
    assert_eq!(next.get_int(0).unwrap(), 3);
    let back = next.follow_link(1).unwrap().unwrap();
    assert_eq!(back.index(), Some(0));

    first.remove().unwrap();
    assert!(next.is_null_link(1).unwrap());
    group.remove_table("nodes").unwrap();
    assert!(matches!(next.get_link(1), Err(DbError::DetachedRow)));
}

#[timeout(5000)]
#[test]
fn test_concurrent_target_and_origin_changes() {
    let group = small_group();
    let people = people(&group, 64).unwrap();
    let orders = orders(&group, &(0..64).collect::<Vec<_>>());

    let remover = {
        let people = people.clone();
        thread::spawn(move || {
            for _ in 0..32 {
                people.move_last_over(0).unwrap();
            }
        })
    };
    let linker = {
        let orders = orders.clone();
        thread::spawn(move || {
            for n in 0..64 {
                let row = orders.row(n).unwrap();
                match row.set_link(BUYER, 0) {
                    Ok(()) => {
                        let _ = row.follow_link(BUYER).unwrap();
                    }
                    Err(DbError::LinkOutOfRange { .. }) => {}
                    Err(e) => panic!("unexpected error: {e}"),
                }
            }
        })
    };
    remover.join().unwrap();
    linker.join().unwrap();

    let people_len = people.row_count().unwrap();
    assert_eq!(people_len, 32);
    let data = orders.read().unwrap();
    for row in 0..data.row_count() {
        if let Some(target) = data.get_link(BUYER, row).unwrap() {
            assert!(target < people_len);
        }
    }
    data.verify().unwrap();
}
