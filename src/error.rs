//! # Error Types for the AA Tree
//!
//! This module defines the errors surfaced by the tree.
//!
//! ## Error Handling Strategy
//!
//! Absent keys are not errors. Lookups, closest-match searches and removals
//! of a key that is not in the tree return `None` (or do nothing). Errors are
//! reserved for misuse the tree can detect:
//!
//! - Construction without a comparator, or with a comparator that does not
//!   behave like a strict total order on the supplied samples.
//! - Stepping an iterator or range after the tree has been mutated.
//! - Dereferencing a [`NodeId`](crate::NodeId) whose node has been removed.
//!
//! ## Stale Iteration
//!
//! ```text
//! Range / Iter created ──► captures tree version
//!      │
//!      ▼
//! next() / prev() ──► acquire shared lock
//!      │
//!      ▼
//! version unchanged? ──── no ───► Err(ConcurrentModification)
//!      │
//!      ▼ yes
//! step to neighbour, return item
//! ```
//!
//! Reentrant acquisition of the tree lock from the thread that already holds
//! it for writing is not reported through this type: it panics, see
//! [`crate::latch`].

use thiserror::Error;

/// Errors that can occur while building, iterating or navigating a tree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
	/// The builder was finished without a comparator.
	#[error("a comparator is required to build a tree")]
	MissingComparator,

	/// The comparator disagreed with itself on the sample items.
	///
	/// Raised by [`TreeBuilder::check_against`](crate::TreeBuilder::check_against)
	/// when the comparator is not reflexive, not antisymmetric or not
	/// transitive over the provided samples.
	#[error("comparator is not a strict total order: {0}")]
	ComparatorNotTotal(&'static str),

	/// The tree was mutated after the iterator or range captured its version.
	///
	/// # Response
	///
	/// The cursor is unusable. Build a fresh range or iterator; it will observe
	/// the tree as it is now.
	#[error("tree was modified during iteration (expected version {expected}, found {found})")]
	ConcurrentModification {
		/// Version captured when the cursor was created.
		expected: u64,
		/// Version of the tree at the failed step.
		found: u64,
	},

	/// The node handle refers to a node that has since been removed.
	#[error("node handle no longer refers to a live node")]
	StaleNode,

	/// A range was requested whose start node follows its end node.
	#[error("range start follows range end")]
	InvertedBounds,
}

/// A Result type alias using our custom Error type.
pub type Result<T> = std::result::Result<T, Error>;
