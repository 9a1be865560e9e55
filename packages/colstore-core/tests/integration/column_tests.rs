//! Columns used directly through the public API.

use ntest::timeout;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use colstore_core::packed::{bit_width, PackedArray};
use colstore_core::{Column, DbError, StoreConfig, StringColumn};

fn config(max_leaf_size: usize) -> StoreConfig {
    StoreConfig {
        max_leaf_size,
        ..Default::default()
    }
}

#[timeout(5000)]
#[test]
fn test_size_invariant_over_mixed_operations() {
    let mut rng = StdRng::seed_from_u64(2024);
    let mut column = Column::with_config(&config(5)).unwrap();
    let mut model = Vec::new();
    let (mut inserts, mut erases) = (0usize, 0usize);

    for _ in 0..3000 {
        if model.is_empty() || rng.gen_bool(0.55) {
            let pos = rng.gen_range(0..=model.len());
            let value: i64 = rng.gen_range(-1_000_000..1_000_000);
            column.insert(pos, value).unwrap();
            model.insert(pos, value);
            inserts += 1;
        } else {
            let pos = rng.gen_range(0..model.len());
            model.remove(pos);
            column.erase(pos).unwrap();
            erases += 1;
        }
    }
    assert_eq!(column.len(), inserts - erases);
    assert_eq!(column.to_vec(), model);
    column.verify().unwrap();
}

#[timeout(1000)]
#[test]
fn test_large_default_leaves() {
    let values: Vec<i64> = (0..5000).map(|v| v * 3).collect();
    let column = Column::from_values(&values, &StoreConfig::default()).unwrap();
    assert_eq!(column.height(), 2);
    assert_eq!(column.leaf_count(), 5);
    assert_eq!(column.get(4321).unwrap(), 12963);
    assert_eq!(column.find(12963).unwrap(), Some(4321));
    assert_eq!(column.find(1).unwrap(), None);
}

#[timeout(1000)]
#[test]
fn test_width_upgrade_keeps_neighbours() {
    let mut column = Column::from_values(&[1, 0, 1, 1], &config(4)).unwrap();
    for (pos, value) in [(1, 3), (2, 15), (3, -128), (0, 40_000), (1, i64::MAX)] {
        let before = column.to_vec();
        column.set(pos, value).unwrap();
        let after = column.to_vec();
        assert_eq!(after.len(), before.len());
        for i in 0..after.len() {
            if i != pos {
                assert_eq!(after[i], before[i]);
            }
        }
        assert_eq!(after[pos], value);
    }
}

#[timeout(1000)]
#[test]
fn test_packed_array_widths() {
    assert_eq!(bit_width(0), 0);
    assert_eq!(bit_width(1), 1);
    assert_eq!(bit_width(3), 2);
    assert_eq!(bit_width(15), 4);
    assert_eq!(bit_width(16), 8);
    assert_eq!(bit_width(-1), 8);
    assert_eq!(bit_width(i64::MIN), 64);

    let mut packed = PackedArray::from_values(&[0, 1, 1, 0]).unwrap();
    assert_eq!(packed.width(), 1);
    packed.insert(2, 300).unwrap();
    assert_eq!(packed.width(), 16);
    assert_eq!(packed.iter().collect::<Vec<_>>(), vec![0, 1, 300, 1, 0]);
}

#[timeout(1000)]
#[test]
fn test_index_agrees_after_edits() {
    let mut plain = Column::with_config(&config(4)).unwrap();
    let mut indexed = Column::with_config(&config(4)).unwrap();
    indexed.build_index().unwrap();
    for i in 0..64 {
        plain.insert(i / 2, i as i64 % 7).unwrap();
        indexed.insert(i / 2, i as i64 % 7).unwrap();
    }
    plain.increment(1, 10, 20).unwrap();
    indexed.increment(1, 10, 20).unwrap();
    for value in 0..9 {
        assert_eq!(plain.find(value).unwrap(), indexed.find(value).unwrap());
        assert_eq!(plain.find_all(value).unwrap(), indexed.find_all(value).unwrap());
    }
    indexed.verify().unwrap();
}

#[timeout(1000)]
#[test]
fn test_string_column_public_api() {
    let mut strings = StringColumn::with_config(&config(4)).unwrap();
    for i in 0..20 {
        strings.push(format!("entry-{i:03}-{}", "x".repeat(i)).as_bytes()).unwrap();
    }
    assert_eq!(strings.len(), 20);
    assert_eq!(
        strings.get(7).unwrap().as_ref(),
        format!("entry-007-{}", "x".repeat(7)).as_bytes()
    );
    assert_eq!(strings.find(b"entry-003-xxx").unwrap(), Some(3));
    assert!(matches!(strings.get(20), Err(DbError::OutOfRange { .. })));
    assert!(strings.byte_size() > 0);
    strings.verify().unwrap();
}
