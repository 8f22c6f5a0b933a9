// Copyright 2022 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use std::sync::atomic::{AtomicU32, AtomicU64};
use std::sync::Arc;

use vitals::{
    u64_decimal, Error, HistogramU32, SeriesU64, SeriesU64Handle, Simple, StartEnd, Tree,
};

fn shared_u64(v: u64) -> Arc<AtomicU64> {
    Arc::new(AtomicU64::new(v))
}

#[test]
fn create_remove_recreate() {
    let tree = Tree::new();

    let dir = tree.create_directory(None, "dir1").unwrap();
    assert!(matches!(
        tree.create_directory(None, "dir1"),
        Err(Error::AlreadyExists)
    ));

    tree.remove(dir);
    assert!(tree.lookup_item(None, "dir1").is_none());

    tree.create_directory(None, "dir1").unwrap();
    assert!(tree.lookup_item(None, "dir1").is_some());
}

#[test]
fn names_are_validated() {
    let tree = Tree::new();

    assert!(matches!(
        tree.create_directory(None, "start/end"),
        Err(Error::InvalidArgument)
    ));
    assert!(matches!(
        tree.create_directory(None, ""),
        Err(Error::InvalidArgument)
    ));
    assert!(matches!(
        tree.create_u64(None, "value_90%", &shared_u64(0)),
        Err(Error::InvalidArgument)
    ));

    tree.create_directory(None, "A-z.0_9").unwrap();
    tree.create_directory(
        None,
        "veryveryvery-longlonglong-name-that-does-not-fit-inline-anywhere",
    )
    .unwrap();
}

#[test]
fn nested_hierarchy() {
    let tree = Tree::new();
    let values: Vec<Arc<AtomicU32>> = (0..3).map(|_| Arc::new(AtomicU32::new(0))).collect();

    for i in 0..3 {
        let outer = tree
            .create_directory(None, &format!("outer-{}", i))
            .unwrap();
        for j in 0..3 {
            let inner = tree
                .create_directory(Some(outer), &format!("inner-{}", j))
                .unwrap();
            for (k, value) in values.iter().enumerate() {
                tree.create_u32(Some(inner), &format!("value-{}", k), value)
                    .unwrap();
            }
        }
    }

    let outer = tree.lookup_item(None, "outer-0").unwrap();
    let inner = tree.lookup_item(Some(outer), "inner-2").unwrap();
    assert!(tree.lookup_item(Some(inner), "value-1").is_some());

    tree.remove_by_name(None, "outer-0").unwrap();
    assert!(tree.lookup_item(None, "outer-0").is_none());
    assert!(tree.lookup_item(Some(outer), "inner-2").is_none());

    tree.create_directory(None, "outer-0").unwrap();
}

#[test]
fn files_are_not_parents() {
    let tree = Tree::new();
    tree.create_u64(None, "leaf", &shared_u64(0)).unwrap();
    let leaf = tree.lookup_item(None, "leaf").unwrap();

    assert!(matches!(
        tree.create_directory(Some(leaf), "child"),
        Err(Error::InvalidArgument)
    ));
    assert!(matches!(
        tree.create_aggregator(Some(leaf), "all"),
        Err(Error::InvalidArgument)
    ));
}

#[test]
fn simple_batch_rolls_back() {
    let tree = Tree::new();

    let batch = vec![
        Simple::new("a", u64_decimal(&shared_u64(1))),
        Simple::new("b", u64_decimal(&shared_u64(2))),
        Simple::new("a", u64_decimal(&shared_u64(3))),
    ];
    assert!(matches!(
        tree.create_simple(None, batch),
        Err(Error::AlreadyExists)
    ));

    // nothing from the failed batch is visible
    assert!(tree.lookup_item(None, "a").is_none());
    assert!(tree.lookup_item(None, "b").is_none());
}

#[test]
fn start_end_pairs() {
    let tree = Tree::new();
    let dir = tree.create_directory(None, "start-end").unwrap();

    let descriptors = vec![
        StartEnd::u64("s1", &shared_u64(1), &shared_u64(2)),
        StartEnd::u32(
            "s2",
            &Arc::new(AtomicU32::new(5)),
            &Arc::new(AtomicU32::new(6)),
        ),
    ];
    tree.create_start_end(Some(dir), descriptors).unwrap();

    let s1 = tree.lookup_item(Some(dir), "s1").unwrap();
    assert!(tree.lookup_item(Some(s1), "start").is_some());
    assert!(tree.lookup_item(Some(s1), "end").is_some());

    // registering the same names again must fail and leave the tree intact
    let again = vec![StartEnd::u64("s1", &shared_u64(0), &shared_u64(0))];
    assert!(matches!(
        tree.create_start_end(Some(dir), again),
        Err(Error::AlreadyExists)
    ));
    assert!(tree.lookup_item(Some(s1), "start").is_some());

    tree.remove(dir);
    assert!(tree.lookup_item(None, "start-end").is_none());
}

#[test]
fn series_directory_contents() {
    let tree = Tree::new();
    let series = Arc::new(SeriesU64::new());
    let dir = tree.create_u64_series(None, "series1", &series).unwrap();

    for name in [
        "sum",
        "count",
        "min",
        "max",
        "last",
        "avg",
        "mean",
        "stddev",
        "get_reset_interval_sec",
        "reset",
        "reset_interval_sec",
    ] {
        assert!(
            tree.lookup_item(Some(dir), name).is_some(),
            "missing {}",
            name
        );
    }

    assert!(Arc::ptr_eq(&tree.u64_series(dir).unwrap(), &series));
    assert!(tree.histogram_u32(dir).is_none());
}

#[test]
fn multiple_series_roll_back() {
    let tree = Tree::new();

    let descriptors = vec![
        SeriesU64Handle::new("s1", &Arc::new(SeriesU64::new())),
        SeriesU64Handle::new("s2", &Arc::new(SeriesU64::new())),
        SeriesU64Handle::new("s1", &Arc::new(SeriesU64::new())),
    ];
    assert!(matches!(
        tree.create_multiple_u64_series(None, descriptors),
        Err(Error::AlreadyExists)
    ));
    assert!(tree.lookup_item(None, "s1").is_none());
    assert!(tree.lookup_item(None, "s2").is_none());

    let descriptors = (1..=10)
        .map(|i| SeriesU64Handle::new(format!("s{}", i), &Arc::new(SeriesU64::new())))
        .collect();
    tree.create_multiple_u64_series(None, descriptors).unwrap();
    for i in 1..=10 {
        assert!(tree.lookup_item(None, &format!("s{}", i)).is_some());
    }
}

#[test]
fn histogram_directory_contents() {
    let tree = Tree::new();
    let histogram = Arc::new(HistogramU32::new(&[0.5, 0.99, 0.9999]).unwrap());
    let dir = tree
        .create_histogram_u32_series(None, "hist", &histogram)
        .unwrap();

    for name in [
        "sum",
        "count",
        "last",
        "avg",
        "50",
        "99",
        "99.99",
        "get_reset_interval_sec",
        "reset",
        "reset_interval_sec",
    ] {
        assert!(
            tree.lookup_item(Some(dir), name).is_some(),
            "missing {}",
            name
        );
    }

    assert!(Arc::ptr_eq(&tree.histogram_u32(dir).unwrap(), &histogram));
    assert!(tree.u64_series(dir).is_none());
}

#[test]
fn remove_root_detaches_children_only() {
    let tree = Tree::new();
    tree.create_directory(None, "a").unwrap();
    tree.create_u64(None, "b", &shared_u64(0)).unwrap();

    tree.remove(tree.root());
    assert!(tree.lookup_item(None, "a").is_none());
    assert!(tree.lookup_item(None, "b").is_none());

    // the root itself survives
    tree.create_directory(None, "a").unwrap();
}

#[test]
fn remove_is_idempotent() {
    let tree = Tree::new();
    let dir = tree.create_directory(None, "twice").unwrap();

    tree.remove(dir);
    tree.remove(dir);
    assert!(matches!(
        tree.remove_by_name(None, "twice"),
        Err(Error::NotFound)
    ));
}

#[test]
fn concurrent_registration() {
    let tree = Tree::new();

    std::thread::scope(|scope| {
        for t in 0..4 {
            let tree = &tree;
            scope.spawn(move || {
                for i in 0..100 {
                    tree.create_directory(None, &format!("t{}-{}", t, i)).unwrap();
                }
            });
        }
    });

    for t in 0..4 {
        for i in 0..100 {
            assert!(tree.lookup_item(None, &format!("t{}-{}", t, i)).is_some());
        }
    }
}
