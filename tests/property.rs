//! # Property-Based Tests for the AA Tree
//!
//! This module contains property-based tests using proptest to
//! systematically discover edge cases through randomized testing. These
//! tests verify that tree invariants hold across thousands of random inputs.
//!
//! ## Test Properties
//!
//! - Insert-then-lookup: All inserted items must be retrievable
//! - Remove-then-lookup: Removed items must not be found
//! - Ordering: Iteration always yields sorted items
//! - Closest match: Floor and ceiling agree with a linear scan
//! - Ranges: A range yields exactly the items between its bounds
//! - Oracle comparison: Behavior matches a BTreeMap reference

use aatree::Tree;
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::ops::Bound;

// ===========================================================================
// Strategy Helpers
// ===========================================================================

/// Generate a vector of unique keys for testing
fn unique_keys(max_len: usize) -> impl Strategy<Value = Vec<i32>> {
	prop::collection::hash_set(any::<i32>(), 0..max_len).prop_map(|s| s.into_iter().collect())
}

/// Generate keys from a small domain so duplicates and near misses are common
fn dense_keys(max_len: usize) -> impl Strategy<Value = Vec<i32>> {
	prop::collection::vec(-200..200i32, 0..max_len)
}

/// Operations that can be performed on the tree
#[derive(Debug, Clone)]
enum Op {
	Insert(i32, i32),
	Remove(i32),
	Prune(i32, bool),
	Floor(i32),
	Ceiling(i32),
}

/// Generate a sequence of random operations
fn operations(max_ops: usize) -> impl Strategy<Value = Vec<Op>> {
	prop::collection::vec(
		prop_oneof![
			3 => (-500..500i32, any::<i32>()).prop_map(|(k, v)| Op::Insert(k, v)),
			1 => (-500..500i32).prop_map(Op::Remove),
			1 => (-500..500i32, any::<bool>()).prop_map(|(k, r)| Op::Prune(k, r)),
			1 => (-500..500i32).prop_map(Op::Floor),
			1 => (-500..500i32).prop_map(Op::Ceiling),
		],
		0..max_ops,
	)
}

/// Items are `(key, value)` pairs ordered by key only.
fn keyed() -> Tree<(i32, i32)> {
	Tree::new(|a: &(i32, i32), b: &(i32, i32)| a.0.cmp(&b.0))
}

fn ordered_from(keys: &[i32]) -> Tree<i32> {
	let tree = Tree::ordered();
	tree.insert_all(keys.iter().copied());
	tree
}

// ===========================================================================
// Insert-Then-Lookup Property
// ===========================================================================

proptest! {
	/// Property: After inserting an item, lookup returns the latest one
	#[test]
	fn insert_then_lookup(entries in prop::collection::vec((any::<i32>(), any::<i32>()), 0..500)) {
		let tree = keyed();
		let mut expected: BTreeMap<i32, i32> = BTreeMap::new();

		// Later items replace earlier ones with the same key
		for (k, v) in &entries {
			tree.insert((*k, *v));
			expected.insert(*k, *v);
		}

		tree.assert_invariants();

		for (k, v) in &expected {
			let result = tree.lookup(&(*k, 0), |item| item.1);
			prop_assert_eq!(result, Some(*v), "Key {} should have value {}", k, v);
		}

		prop_assert_eq!(tree.len(), expected.len());
	}

	/// Property: All inserted keys must be retrievable
	#[test]
	fn all_inserted_keys_exist(keys in unique_keys(500)) {
		let tree = ordered_from(&keys);

		tree.assert_invariants();

		for k in &keys {
			prop_assert!(tree.contains(k), "Key {} should exist after insertion", k);
		}
	}
}

// ===========================================================================
// Remove-Then-Lookup Property
// ===========================================================================

proptest! {
	/// Property: After removing a key, lookup returns None
	#[test]
	fn remove_then_lookup(keys in unique_keys(200)) {
		let tree = ordered_from(&keys);

		tree.assert_invariants();

		for k in &keys {
			let removed = tree.remove(k);
			prop_assert_eq!(removed, Some(*k), "Remove should return the item");
			prop_assert!(!tree.contains(k), "Key {} should not exist after removal", k);
		}

		tree.assert_invariants();
		prop_assert!(tree.is_empty(), "Tree should be empty after removing all keys");
	}

	/// Property: Removing a non-existent key returns None and changes nothing
	#[test]
	fn remove_nonexistent_returns_none(
		existing in unique_keys(100),
		nonexistent in unique_keys(100)
	) {
		let tree = ordered_from(&existing);
		let version = tree.version();

		for k in &nonexistent {
			if !existing.contains(k) {
				let removed = tree.remove(k);
				prop_assert_eq!(removed, None, "Removing non-existent key {} should return None", k);
			}
		}

		prop_assert_eq!(tree.version(), version);
		tree.assert_invariants();
	}

	/// Property: Pruning either way removes the same item and keeps the tree valid
	#[test]
	fn prune_direction_is_transparent(keys in unique_keys(200), pick in any::<prop::sample::Index>()) {
		prop_assume!(!keys.is_empty());
		let victim = keys[pick.index(keys.len())];

		let left = ordered_from(&keys);
		let right = left.clone();

		prop_assert_eq!(left.prune(&victim, false), Some(victim));
		prop_assert_eq!(right.prune(&victim, true), Some(victim));

		left.assert_invariants();
		right.assert_invariants();
		prop_assert_eq!(left.to_vec(), right.to_vec());
	}
}

// ===========================================================================
// Ordering Property
// ===========================================================================

proptest! {
	/// Property: Iteration always yields keys in strictly ascending order
	#[test]
	fn iteration_is_sorted(keys in dense_keys(500)) {
		let tree = ordered_from(&keys);

		let items: Vec<i32> = tree.iter().collect::<Result<_, _>>().unwrap();
		for pair in items.windows(2) {
			prop_assert!(pair[0] < pair[1], "Keys should be in ascending order: {:?}", pair);
		}
		prop_assert_eq!(items.len(), tree.len());
	}

	/// Property: The borrowing iterator agrees in both directions
	#[test]
	fn reverse_iteration_matches(keys in dense_keys(500)) {
		let tree = ordered_from(&keys);
		let read = tree.read();

		let forward: Vec<i32> = read.iter().copied().collect();
		let mut reverse: Vec<i32> = read.iter().rev().copied().collect();
		reverse.reverse();

		prop_assert_eq!(forward, reverse, "Forward and reverse iteration should yield same keys");
	}

	/// Property: First and last are the extremes of the inserted keys
	#[test]
	fn extremes_are_cached(keys in dense_keys(300)) {
		let tree = ordered_from(&keys);

		prop_assert_eq!(tree.first(), keys.iter().min().copied());
		prop_assert_eq!(tree.last(), keys.iter().max().copied());
	}
}

// ===========================================================================
// Closest Match Property
// ===========================================================================

proptest! {
	/// Property: Floor and ceiling agree with a linear scan
	#[test]
	fn closest_matches_linear_scan(keys in dense_keys(300), probes in dense_keys(50)) {
		let tree = ordered_from(&keys);

		for probe in &probes {
			let floor = keys.iter().filter(|&&k| k <= *probe).max().copied();
			let ceiling = keys.iter().filter(|&&k| k >= *probe).min().copied();
			prop_assert_eq!(tree.closest_to(probe, false), floor, "floor of {}", probe);
			prop_assert_eq!(tree.closest_to(probe, true), ceiling, "ceiling of {}", probe);
		}
	}

	/// Property: A bounded floor is the floor if it clears the lower limit
	#[test]
	fn bounded_closest_matches_filter(keys in dense_keys(300), target in -200..200i32, limit in -200..200i32) {
		let tree = ordered_from(&keys);

		let floor = keys.iter().filter(|&&k| k <= target).max().copied();
		let expected = floor.filter(|&f| f >= limit);
		let found = tree.closest_by_bounded(|i| i.cmp(&target), |i| i.cmp(&limit), false);
		prop_assert_eq!(found, expected);

		let ceiling = keys.iter().filter(|&&k| k >= target).min().copied();
		let expected = ceiling.filter(|&c| c <= limit);
		let found = tree.closest_by_bounded(|i| i.cmp(&target), |i| i.cmp(&limit), true);
		prop_assert_eq!(found, expected);
	}
}

// ===========================================================================
// Range Property
// ===========================================================================

proptest! {
	/// Property: range_for yields the oracle's items between the widened bounds
	#[test]
	fn range_matches_oracle(keys in dense_keys(300), a in -250..250i32, b in -250..250i32) {
		let tree = ordered_from(&keys);
		let oracle: std::collections::BTreeSet<i32> = keys.iter().copied().collect();

		let start = oracle.range(..=a).next_back().or(oracle.first()).copied();
		let end = oracle.range(b..).next().or(oracle.last()).copied();

		let expected: Vec<i32> = match (start, end) {
			(Some(s), Some(e)) if s <= e => oracle
				.range((Bound::Included(s), Bound::Included(e)))
				.copied()
				.collect(),
			_ => Vec::new(),
		};

		let mut range = tree.range_for(&a, &b);
		prop_assert_eq!(range.items().unwrap(), expected.clone());

		let mut stepped = Vec::new();
		while let Some(item) = range.next().unwrap() {
			stepped.push(item);
		}
		prop_assert_eq!(stepped, expected);
	}
}

// ===========================================================================
// Oracle Comparison
// ===========================================================================

proptest! {
	#![proptest_config(ProptestConfig::with_cases(64))]

	/// Property: A random operation sequence behaves like BTreeMap
	#[test]
	fn matches_btreemap_oracle(ops in operations(400)) {
		let tree = keyed();
		let mut oracle: BTreeMap<i32, i32> = BTreeMap::new();

		for op in ops {
			match op {
				Op::Insert(k, v) => {
					tree.insert((k, v));
					oracle.insert(k, v);
				}
				Op::Remove(k) => {
					let removed = tree.remove(&(k, 0));
					prop_assert_eq!(removed, oracle.remove(&k).map(|v| (k, v)));
				}
				Op::Prune(k, right) => {
					let removed = tree.prune(&(k, 0), right);
					prop_assert_eq!(removed, oracle.remove(&k).map(|v| (k, v)));
				}
				Op::Floor(k) => {
					let expected = oracle.range(..=k).next_back().map(|(k, v)| (*k, *v));
					prop_assert_eq!(tree.closest_to(&(k, 0), false), expected);
				}
				Op::Ceiling(k) => {
					let expected = oracle.range(k..).next().map(|(k, v)| (*k, *v));
					prop_assert_eq!(tree.closest_to(&(k, 0), true), expected);
				}
			}
		}

		tree.assert_invariants();
		let expected: Vec<(i32, i32)> = oracle.into_iter().collect();
		prop_assert_eq!(tree.to_vec(), expected);
	}

	/// Property: A structural copy is equal and independent
	#[test]
	fn clone_is_independent(keys in dense_keys(300), extra in dense_keys(50)) {
		let tree = ordered_from(&keys);
		let before = tree.to_vec();

		let copy = tree.clone();
		copy.assert_invariants();
		prop_assert_eq!(copy.to_vec(), before.clone());
		prop_assert_eq!(copy.dump(), tree.dump());

		for k in &extra {
			copy.insert(*k);
			copy.remove(&(k + 1));
		}

		copy.assert_invariants();
		prop_assert_eq!(tree.to_vec(), before);
	}
}
