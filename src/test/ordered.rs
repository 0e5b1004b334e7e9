use std::collections::HashMap;

use pretty_assertions::assert_eq;

use crate::ordered::{OrderedFrozenSet, OrderedSet};

#[test]
fn iteration_follows_insertion_order() {
    let mut set = OrderedSet::new();
    set.insert("c");
    set.insert("a");
    set.insert("b");

    let order: Vec<&str> = set.iter().copied().collect();
    assert_eq!(order, vec!["c", "a", "b"]);
}

#[test]
fn reinsertion_keeps_the_first_position() {
    let mut set = OrderedSet::new();
    assert!(set.insert(1));
    assert!(set.insert(2));
    assert!(!set.insert(1));

    let order: Vec<i32> = set.iter().copied().collect();
    assert_eq!(order, vec![1, 2]);
}

#[test]
fn removal_preserves_remaining_order() {
    let mut set: OrderedSet<i32> = [4, 7, 1, 9].into_iter().collect();
    assert!(set.remove(&7));
    assert!(!set.remove(&7));

    let order: Vec<i32> = set.iter().copied().collect();
    assert_eq!(order, vec![4, 1, 9]);
}

#[test]
fn equality_ignores_order() {
    let a: OrderedFrozenSet<&str> = ["x", "y", "z"].into_iter().collect();
    let b: OrderedFrozenSet<&str> = ["z", "x", "y"].into_iter().collect();
    let c: OrderedFrozenSet<&str> = ["x", "y"].into_iter().collect();

    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn permuted_sets_collide_as_map_keys() {
    let a: OrderedFrozenSet<i32> = [1, 2, 3].into_iter().collect();
    let b: OrderedFrozenSet<i32> = [3, 2, 1].into_iter().collect();

    let mut map = HashMap::new();
    map.insert(a, "first");
    map.insert(b, "second");
    assert_eq!(map.len(), 1);
}

#[test]
fn union_appends_new_elements_in_order() {
    let a: OrderedFrozenSet<&str> = ["p", "q"].into_iter().collect();
    let b: OrderedFrozenSet<&str> = ["q", "r", "s"].into_iter().collect();

    let union = a.union(&b);
    let order: Vec<&str> = union.iter().copied().collect();
    assert_eq!(order, vec!["p", "q", "r", "s"]);
}

#[test]
fn difference_and_intersection_keep_left_order() {
    let a: OrderedFrozenSet<i32> = [5, 3, 8, 1].into_iter().collect();
    let b: OrderedFrozenSet<i32> = [1, 5].into_iter().collect();

    let difference: Vec<i32> = a.difference(&b).iter().copied().collect();
    assert_eq!(difference, vec![3, 8]);

    let intersection: Vec<i32> = a.intersection(&b).iter().copied().collect();
    assert_eq!(intersection, vec![5, 1]);
}

#[test]
fn subset_checks() {
    let small: OrderedFrozenSet<i32> = [2, 4].into_iter().collect();
    let big: OrderedFrozenSet<i32> = [4, 2, 6].into_iter().collect();

    assert!(small.is_subset(&big));
    assert!(!big.is_subset(&small));
    assert!(OrderedFrozenSet::<i32>::new().is_subset(&small));
}

#[test]
fn freeze_and_thaw_round_trip() {
    let mut set = OrderedSet::new();
    set.insert("one");
    set.insert("two");

    let frozen = set.freeze();
    assert_eq!(frozen.len(), 2);
    assert!(frozen.contains(&"one"));

    let mut thawed = frozen.thaw();
    thawed.insert("three");
    let order: Vec<&str> = thawed.iter().copied().collect();
    assert_eq!(order, vec!["one", "two", "three"]);
}
