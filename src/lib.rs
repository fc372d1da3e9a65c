//! # aatree: A Thread-Safe Ordered Index
//!
//! This crate provides a sorted container built on an Arne Andersson tree
//! (AA tree), a balanced binary search tree that keeps an integer *level* per
//! node instead of a colour. It is meant as a general purpose ordered index:
//! items are ordered by a comparator supplied at construction, and the tree
//! answers exact, floor and ceiling queries, builds bounded ranges, and
//! iterates in order.
//!
//! ## Design Overview
//!
//! ### Levels and Rebalancing
//!
//! Every node has a level. Leaves are at level 1. A left child is always one
//! level below its parent; a right child is either one level below or on the
//! same level (a *horizontal link*), but two horizontal links never follow
//! each other. Two small rotations restore these rules after a mutation:
//!
//! - **skew** rotates right to remove a left horizontal link,
//! - **split** rotates left to remove a double right horizontal link and
//!   promotes the middle node.
//!
//! Both insert and remove walk from the mutation point back to the root,
//! fixing levels and applying the same two primitives.
//!
//! ### Storage
//!
//! ```text
//!                    ┌──────────────────┐
//!                    │    TreeLatch     │  <- one reader/writer lock
//!                    │  root, first,    │
//!                    │  last, len,      │
//!                    │  version         │
//!                    └────────┬─────────┘
//!                             │
//!                             ▼
//!        ┌───────────┬───────────┬───────────┬───────────┐
//!        │  slot 0   │  slot 1   │  slot 2   │  vacant   │  <- arena of nodes
//!        │ level 2   │ level 1   │ level 1   │           │
//!        │ L:1 R:2   │ up:0      │ up:0      │           │
//!        └───────────┴───────────┴───────────┴───────────┘
//! ```
//!
//! Nodes live in an arena and refer to each other by index. Parent links are
//! navigation aids only, so rotations reassign indices and never move items.
//! The smallest and largest nodes are cached for O(1) access to both ends.
//!
//! ## Basic Usage
//!
//! ```
//! use aatree::Tree;
//!
//! let tree = Tree::new(|a: &i32, b: &i32| a.cmp(b));
//! for key in [10, 20, 5, 15, 25, 1] {
//! 	tree.insert(key);
//! }
//!
//! assert_eq!(tree.len(), 6);
//! assert_eq!(tree.first(), Some(1));
//! assert_eq!(tree.closest_to(&12, false), Some(10));
//! assert_eq!(tree.closest_to(&12, true), Some(15));
//!
//! let range = tree.range_for(&5, &15);
//! assert_eq!(range.items().unwrap(), vec![5, 10, 15]);
//! ```
//!
//! ## Thread Safety
//!
//! The tree can be shared across threads via `Arc<Tree<T>>`. A single
//! reader/writer latch guards the whole structure: queries take it shared,
//! mutations take it exclusively. No mutation is ever partially visible.
//!
//! Ranges and iterators release the latch between steps. They remember the
//! tree's version when created and fail with
//! [`Error::ConcurrentModification`](error::Error::ConcurrentModification)
//! on the first step after any structural change.
//!
//! Comparators and probe closures run while the latch is held. Calling back
//! into the same tree from inside them panics rather than deadlocking.

use std::cmp::Ordering;
use std::fmt;
use std::fmt::Write as _;
use std::sync::Arc;

mod builder;
pub mod error;
pub mod iter;
pub mod latch;
mod node;
pub mod range;
mod sync;
#[cfg(any(test, feature = "test-utils"))]
pub mod util;

pub use builder::TreeBuilder;
pub use iter::{Items, Iter};
pub use node::{NodeId, NodeRef};
pub use range::Range;

use error::Error;
use latch::{SharedGuard, TreeLatch};
use node::{Link, Node, Nodes};

/// A shared comparator. Must be a strict total order over the items.
pub type Comparator<T> = Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

// ---------------------------------------------------------------------------
// Core Tree Structure
// ---------------------------------------------------------------------------

/// A thread-safe ordered index built on an AA tree.
///
/// Items are unique under the comparator: inserting an item that compares
/// equal to a stored one replaces it in place.
///
/// # Internal Structure
///
/// - A [`TreeLatch`] around the node arena, the cached first/last nodes,
///   the item count and the version counter.
/// - The comparator, fixed at construction. It lives outside the latch and
///   can only be replaced through `&mut self`.
pub struct Tree<T> {
	latch: TreeLatch<State<T>>,
	cmp: Comparator<T>,
}

/// Everything the latch protects.
pub(crate) struct State<T> {
	pub(crate) nodes: Nodes<T>,
	pub(crate) first: Link,
	pub(crate) last: Link,
	pub(crate) len: usize,
	/// Bumped by every structural mutation.
	pub(crate) version: u64,
}

impl<T: Ord + 'static> Default for Tree<T> {
	fn default() -> Self {
		Self::ordered()
	}
}

// ---------------------------------------------------------------------------
// State: structural algorithms
// ---------------------------------------------------------------------------

impl<T> State<T> {
	pub(crate) fn with_capacity(capacity: usize) -> State<T> {
		State {
			nodes: Nodes::with_capacity(capacity),
			first: None,
			last: None,
			len: 0,
			version: 0,
		}
	}

	/// Recomputes the cached extremes by walking down from the root.
	pub(crate) fn refresh_extremes(&mut self) {
		self.first = self.nodes.root.map(|root| self.nodes.leftmost(root));
		self.last = self.nodes.root.map(|root| self.nodes.rightmost(root));
	}

	/// Inserts `item`, or replaces the item comparing equal to it.
	///
	/// # Algorithm
	///
	/// 1. Descend from the root to the matching node or an empty slot
	/// 2. On a match, swap the item in place and stop (no structural change)
	/// 3. Otherwise attach a level-1 leaf and update the cached extremes
	/// 4. Walk back up to the root applying skew then split at each node
	pub(crate) fn insert(&mut self, item: T, cmp: &dyn Fn(&T, &T) -> Ordering) -> usize {
		let mut parent = None;
		let mut went_left = false;
		let mut cursor = self.nodes.root;

		while let Some(index) = cursor {
			let node = self.nodes.node(index);
			match cmp(&item, &node.item) {
				Ordering::Less => {
					went_left = true;
					cursor = node.left;
				}
				Ordering::Greater => {
					went_left = false;
					cursor = node.right;
				}
				Ordering::Equal => {
					self.nodes.node_mut(index).item = item;
					return index;
				}
			}
			parent = Some(index);
		}

		let index = self.nodes.alloc(Node::leaf(item, parent));
		match parent {
			None => {
				self.nodes.root = Some(index);
				self.first = Some(index);
				self.last = Some(index);
			}
			Some(parent) if went_left => {
				self.nodes.node_mut(parent).left = Some(index);
				// The first node has no left child, so only it can gain a new minimum.
				if self.first == Some(parent) {
					self.first = Some(index);
				}
			}
			Some(parent) => {
				self.nodes.node_mut(parent).right = Some(index);
				if self.last == Some(parent) {
					self.last = Some(index);
				}
			}
		}

		self.len += 1;
		self.version += 1;

		let mut cursor = parent;
		while let Some(index) = cursor {
			let top = self.nodes.skew(index);
			let top = self.nodes.split(top);
			cursor = self.nodes.node(top).up;
		}

		tracing::trace!(len = self.len, version = self.version, "inserted node");
		index
	}

	/// Appends `item` after the current last item. The caller guarantees it
	/// sorts after every stored item.
	pub(crate) fn push_last(&mut self, item: T) -> usize {
		self.insert(item, &|_, _| Ordering::Greater)
	}

	/// Removes the item stored at `index` and returns it.
	///
	/// A node with two children is not unlinked itself: the in-order
	/// successor's item (or the predecessor's if `promote_predecessor`) is
	/// swapped into it and that neighbour, which has at most one child, is
	/// unlinked instead.
	pub(crate) fn remove_at(&mut self, index: usize, promote_predecessor: bool) -> T {
		let node = self.nodes.node(index);
		let victim = match (node.left, node.right) {
			(Some(left), Some(_)) if promote_predecessor => self.nodes.rightmost(left),
			(Some(_), Some(right)) => self.nodes.leftmost(right),
			_ => index,
		};
		self.nodes.swap_items(index, victim);

		let node = self.nodes.node(victim);
		let up = node.up;
		let child = node.left.or(node.right);
		if let Some(child) = child {
			self.nodes.node_mut(child).up = up;
		}
		self.nodes.replace_child(up, victim, child);

		let was_extreme = self.first == Some(victim) || self.last == Some(victim);
		let removed = self.nodes.free(victim);

		self.len -= 1;
		self.version += 1;

		let mut cursor = up;
		while let Some(index) = cursor {
			let top = self.nodes.rebalance_after_removal(index);
			cursor = self.nodes.node(top).up;
		}

		if was_extreme {
			self.refresh_extremes();
		}

		tracing::trace!(len = self.len, version = self.version, "removed node");
		removed.item
	}

	/// Drops every node.
	pub(crate) fn clear(&mut self) {
		self.nodes.clear();
		self.first = None;
		self.last = None;
		self.len = 0;
		self.version += 1;
	}

	// -----------------------------------------------------------------------
	// Searches
	// -----------------------------------------------------------------------

	/// Finds the node `probe` reports as `Equal`.
	///
	/// `probe` returns the order of a stored item relative to the target.
	pub(crate) fn find(&self, probe: &dyn Fn(&T) -> Ordering) -> Link {
		let mut cursor = self.nodes.root;
		while let Some(index) = cursor {
			let node = self.nodes.node(index);
			cursor = match probe(&node.item) {
				Ordering::Equal => return Some(index),
				Ordering::Greater => node.left,
				Ordering::Less => node.right,
			};
		}
		None
	}

	/// Floor (`reverse == false`) or ceiling (`reverse == true`) search.
	///
	/// # Algorithm
	///
	/// Descend as for an exact search. Every visited node on the correct side
	/// of the target becomes the candidate; the last one is the answer.
	pub(crate) fn closest(&self, probe: &dyn Fn(&T) -> Ordering, reverse: bool) -> Link {
		let overshoot = if reverse {
			Ordering::Less
		} else {
			Ordering::Greater
		};

		let mut best = None;
		let mut cursor = self.nodes.root;
		while let Some(index) = cursor {
			let node = self.nodes.node(index);
			let order = probe(&node.item);

			if order != overshoot {
				best = Some(index);
			}

			cursor = match order {
				Ordering::Equal => break,
				Ordering::Greater => node.left,
				Ordering::Less => node.right,
			};
		}
		best
	}
}

// ---------------------------------------------------------------------------
// Tree Implementation
// ---------------------------------------------------------------------------

impl<T> Tree<T> {
	// -----------------------------------------------------------------------
	// Construction
	// -----------------------------------------------------------------------

	/// Creates an empty tree ordered by `cmp`.
	///
	/// `cmp` must be a strict total order. Use [`TreeBuilder`] to have it
	/// checked against sample items first.
	///
	/// # Example
	///
	/// ```
	/// use aatree::Tree;
	///
	/// let tree = Tree::new(|a: &String, b: &String| a.len().cmp(&b.len()));
	/// tree.insert("ccc".to_string());
	/// tree.insert("a".to_string());
	/// assert_eq!(tree.first().as_deref(), Some("a"));
	/// ```
	pub fn new<F>(cmp: F) -> Self
	where
		F: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
	{
		Self::from_parts(Arc::new(cmp), 0)
	}

	/// Returns a builder for configuring a tree.
	pub fn builder() -> TreeBuilder<T> {
		TreeBuilder::new()
	}

	pub(crate) fn from_parts(cmp: Comparator<T>, capacity: usize) -> Self {
		Self::from_state(cmp, State::with_capacity(capacity))
	}

	pub(crate) fn from_state(cmp: Comparator<T>, state: State<T>) -> Self {
		Tree {
			latch: TreeLatch::new(state),
			cmp,
		}
	}

	/// The comparator the tree is ordered by.
	pub fn comparator(&self) -> &Comparator<T> {
		&self.cmp
	}

	/// Replaces the comparator and reorders the stored items under it.
	///
	/// Taking `&mut self` guarantees no other thread is using the tree. Items
	/// that compare equal under the new comparator collapse into one; the
	/// one that came later in the old order is kept.
	///
	/// Every call to `cmp` happens before the tree is touched. If `cmp`
	/// panics, the tree keeps its items, shape and old comparator.
	pub fn set_comparator<F>(&mut self, cmp: F)
	where
		F: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
	{
		let cmp: Comparator<T> = Arc::new(cmp);
		{
			let order_by = &*cmp;
			let mut state = self.latch.exclusive();

			// Sort slot indices, not items, so an unwinding comparator leaves
			// the nodes untouched. The sort is stable: equal items keep their
			// old relative order.
			let mut order = Vec::with_capacity(state.len);
			let mut cursor = state.first;
			while let Some(index) = cursor {
				order.push(index);
				cursor = state.nodes.next(index);
			}
			order.sort_by(|&a, &b| order_by(&state.nodes.node(a).item, &state.nodes.node(b).item));

			let mut kept = Vec::with_capacity(order.len());
			for (position, &index) in order.iter().enumerate() {
				let superseded = order.get(position + 1).is_some_and(|&next| {
					order_by(&state.nodes.node(index).item, &state.nodes.node(next).item)
						== Ordering::Equal
				});
				if !superseded {
					kept.push(index);
				}
			}

			let items: Vec<T> = kept.into_iter().map(|index| state.nodes.free(index).item).collect();
			let collapsed = state.len - items.len();
			state.clear();
			for item in items {
				state.push_last(item);
			}

			tracing::debug!(len = state.len, collapsed, "replaced comparator");
		}
		self.cmp = cmp;
	}

	pub(crate) fn shared(&self) -> SharedGuard<'_, State<T>> {
		self.latch.shared()
	}

	// -----------------------------------------------------------------------
	// Tree Metadata
	// -----------------------------------------------------------------------

	/// Number of items in the tree.
	pub fn len(&self) -> usize {
		self.latch.shared().len
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// The mutation counter. Bumped by every structural change; replacing an
	/// item in place does not count.
	pub fn version(&self) -> u64 {
		self.latch.shared().version
	}

	/// Level of the root, 0 for an empty tree. The height of the tree is at
	/// most twice this.
	pub fn height(&self) -> u32 {
		let state = self.latch.shared();
		state.nodes.level_of(state.nodes.root)
	}

	// -----------------------------------------------------------------------
	// Public API: Write Operations
	// -----------------------------------------------------------------------

	/// Inserts an item and returns a handle to the node holding it.
	///
	/// If an item comparing equal is already stored it is replaced in place,
	/// the node keeps its handle and the version is left alone.
	///
	/// # Example
	///
	/// ```
	/// use aatree::Tree;
	///
	/// let tree = Tree::new(|a: &(i32, &str), b: &(i32, &str)| a.0.cmp(&b.0));
	///
	/// let first = tree.insert((1, "one"));
	/// let again = tree.insert((1, "uno"));
	/// assert_eq!(first, again);
	/// assert_eq!(tree.len(), 1);
	/// assert_eq!(tree.get(&(1, "")), Some((1, "uno")));
	/// ```
	pub fn insert(&self, item: T) -> NodeId {
		let mut state = self.latch.exclusive();
		let index = state.insert(item, &*self.cmp);
		state.nodes.id(index)
	}

	/// Inserts every item under one exclusive acquisition.
	///
	/// Returns how many new nodes were created.
	pub fn insert_all<I>(&self, items: I) -> usize
	where
		I: IntoIterator<Item = T>,
	{
		let mut state = self.latch.exclusive();
		let before = state.len;
		for item in items {
			state.insert(item, &*self.cmp);
		}
		let added = state.len - before;
		tracing::debug!(added, len = state.len, "bulk insert");
		added
	}

	/// Removes the item comparing equal to `key`, returning it.
	///
	/// Absent keys leave the tree untouched.
	///
	/// # Example
	///
	/// ```
	/// use aatree::Tree;
	///
	/// let tree = Tree::ordered();
	/// tree.insert(1);
	///
	/// assert_eq!(tree.remove(&1), Some(1));
	/// assert_eq!(tree.remove(&1), None); // Already removed
	/// ```
	pub fn remove(&self, key: &T) -> Option<T> {
		self.prune(key, false)
	}

	/// Removes every item matching one of `keys` as a single atomic batch.
	///
	/// Readers observe either none or all of the removals. Returns how many
	/// items were removed.
	pub fn remove_all<'k, I>(&self, keys: I) -> usize
	where
		I: IntoIterator<Item = &'k T>,
		T: 'k,
	{
		let cmp = &*self.cmp;
		let mut state = self.latch.exclusive();
		let mut removed = 0;
		for key in keys {
			if let Some(index) = state.find(&|item| cmp(item, key)) {
				state.remove_at(index, false);
				removed += 1;
			}
		}
		tracing::debug!(removed, len = state.len, "bulk remove");
		removed
	}

	/// Removes the item comparing equal to `key`.
	///
	/// When its node has two children the in-order successor is promoted
	/// into it, or the predecessor if `right` is set.
	pub fn prune(&self, key: &T, right: bool) -> Option<T> {
		let cmp = &*self.cmp;
		let mut state = self.latch.exclusive();
		let index = state.find(&|item| cmp(item, key))?;
		Some(state.remove_at(index, right))
	}

	/// Removes the item held by `node`.
	///
	/// See [`prune`](Self::prune) for the meaning of `right`.
	///
	/// # Errors
	///
	/// [`Error::StaleNode`] if the handle no longer names a live node.
	pub fn prune_at(&self, node: NodeId, right: bool) -> error::Result<T> {
		let mut state = self.latch.exclusive();
		let index = state.nodes.resolve(node).ok_or(Error::StaleNode)?;
		Ok(state.remove_at(index, right))
	}

	/// Removes all items and releases the node storage.
	///
	/// Single removals keep their freed nodes for reuse by later inserts.
	pub fn clear(&self) {
		let mut state = self.latch.exclusive();
		let dropped = state.len;
		state.clear();
		tracing::trace!(dropped, version = state.version, "cleared tree");
	}

	// -----------------------------------------------------------------------
	// Public API: Exact Lookup
	// -----------------------------------------------------------------------

	/// Runs `f` on the item comparing equal to `key`.
	///
	/// `f` runs under the shared latch.
	pub fn lookup<R, F>(&self, key: &T, f: F) -> Option<R>
	where
		F: FnOnce(&T) -> R,
	{
		let cmp = &*self.cmp;
		let state = self.latch.shared();
		let index = state.find(&|item| cmp(item, key))?;
		Some(f(&state.nodes.node(index).item))
	}

	/// Returns `true` if an item comparing equal to `key` is stored.
	pub fn contains(&self, key: &T) -> bool {
		self.lookup(key, |_| ()).is_some()
	}

	/// Returns a clone of the item comparing equal to `key`.
	pub fn get(&self, key: &T) -> Option<T>
	where
		T: Clone,
	{
		self.lookup(key, T::clone)
	}

	/// Handle to the node holding the item comparing equal to `key`.
	pub fn find_node(&self, key: &T) -> Option<NodeId> {
		let cmp = &*self.cmp;
		let state = self.latch.shared();
		state.find(&|item| cmp(item, key)).map(|index| state.nodes.id(index))
	}

	/// Exact search with a custom probe.
	///
	/// `probe` returns the order of a stored item relative to the target and
	/// must be consistent with the tree's ordering.
	pub fn find_by<F>(&self, probe: F) -> Option<T>
	where
		F: Fn(&T) -> Ordering,
		T: Clone,
	{
		let state = self.latch.shared();
		state.find(&probe).map(|index| state.nodes.node(index).item.clone())
	}

	// -----------------------------------------------------------------------
	// Public API: Closest Match
	// -----------------------------------------------------------------------

	/// Floor or ceiling query.
	///
	/// With `reverse == false` returns the largest item not greater than
	/// `key`; with `reverse == true` the smallest item not less than `key`.
	///
	/// # Example
	///
	/// ```
	/// use aatree::Tree;
	///
	/// let tree = Tree::ordered();
	/// tree.insert_all([1, 3, 5, 7]);
	///
	/// assert_eq!(tree.closest_to(&4, false), Some(3));
	/// assert_eq!(tree.closest_to(&4, true), Some(5));
	/// assert_eq!(tree.closest_to(&0, false), None);
	/// assert_eq!(tree.closest_to(&8, true), None);
	/// ```
	pub fn closest_to(&self, key: &T, reverse: bool) -> Option<T>
	where
		T: Clone,
	{
		let cmp = &*self.cmp;
		self.closest_by(|item| cmp(item, key), reverse)
	}

	/// Handle to the node a [`closest_to`](Self::closest_to) query lands on.
	pub fn closest_node(&self, key: &T, reverse: bool) -> Option<NodeId> {
		let cmp = &*self.cmp;
		let state = self.latch.shared();
		state.closest(&|item| cmp(item, key), reverse).map(|index| state.nodes.id(index))
	}

	/// Floor or ceiling query with a custom probe.
	pub fn closest_by<F>(&self, probe: F, reverse: bool) -> Option<T>
	where
		F: Fn(&T) -> Ordering,
		T: Clone,
	{
		let state = self.latch.shared();
		state.closest(&probe, reverse).map(|index| state.nodes.node(index).item.clone())
	}

	/// Floor or ceiling query whose answer must also satisfy `bound`.
	///
	/// The floor (ceiling) is found by `probe` alone; `bound` then accepts or
	/// rejects that one item and never redirects the search. A floor is
	/// accepted when `bound(item) != Less`, a ceiling when
	/// `bound(item) != Greater`. With a `bound` consistent with the tree's
	/// order this intersects the floor (ceiling) with a lower (upper) limit.
	///
	/// # Example
	///
	/// ```
	/// use aatree::Tree;
	///
	/// let tree = Tree::ordered();
	/// tree.insert_all([1, 3, 5, 7]);
	///
	/// // Largest item <= 6 that is also >= 4.
	/// assert_eq!(tree.closest_by_bounded(|i| i.cmp(&6), |i| i.cmp(&4), false), Some(5));
	/// // Largest item <= 4 is 3, which is below the limit.
	/// assert_eq!(tree.closest_by_bounded(|i| i.cmp(&4), |i| i.cmp(&4), false), None);
	/// ```
	pub fn closest_by_bounded<F, B>(&self, probe: F, bound: B, reverse: bool) -> Option<T>
	where
		F: Fn(&T) -> Ordering,
		B: Fn(&T) -> Ordering,
		T: Clone,
	{
		let rejected = if reverse {
			Ordering::Greater
		} else {
			Ordering::Less
		};
		let state = self.latch.shared();
		let item = &state.nodes.node(state.closest(&probe, reverse)?).item;
		if bound(item) == rejected {
			return None;
		}
		Some(item.clone())
	}

	// -----------------------------------------------------------------------
	// Public API: Extremes
	// -----------------------------------------------------------------------

	/// The smallest item.
	pub fn first(&self) -> Option<T>
	where
		T: Clone,
	{
		let state = self.latch.shared();
		state.first.map(|index| state.nodes.node(index).item.clone())
	}

	/// The largest item.
	pub fn last(&self) -> Option<T>
	where
		T: Clone,
	{
		let state = self.latch.shared();
		state.last.map(|index| state.nodes.node(index).item.clone())
	}

	pub fn first_node(&self) -> Option<NodeId> {
		let state = self.latch.shared();
		state.first.map(|index| state.nodes.id(index))
	}

	pub fn last_node(&self) -> Option<NodeId> {
		let state = self.latch.shared();
		state.last.map(|index| state.nodes.id(index))
	}

	pub fn root(&self) -> Option<NodeId> {
		let state = self.latch.shared();
		state.nodes.root.map(|index| state.nodes.id(index))
	}

	// -----------------------------------------------------------------------
	// Public API: Ranges and Iteration
	// -----------------------------------------------------------------------

	/// Range from the floor of `start` to the ceiling of `end`.
	///
	/// A missing floor falls back to the first node and a missing ceiling to
	/// the last node. The range is empty for an empty tree or when the
	/// resolved start follows the resolved end.
	///
	/// # Example
	///
	/// ```
	/// use aatree::Tree;
	///
	/// let tree = Tree::ordered();
	/// tree.insert_all([1, 3, 5, 7, 9]);
	///
	/// assert_eq!(tree.range_for(&3, &7).items().unwrap(), vec![3, 5, 7]);
	/// assert_eq!(tree.range_for(&4, &6).items().unwrap(), vec![3, 5, 7]);
	/// ```
	pub fn range_for(&self, start: &T, end: &T) -> Range<'_, T> {
		let cmp = &*self.cmp;
		let state = self.latch.shared();
		let from = state.closest(&|item| cmp(item, start), false).or(state.first);
		let to = state.closest(&|item| cmp(item, end), true).or(state.last);

		let bounds = match (from, to) {
			(Some(from), Some(to)) => {
				let order = cmp(&state.nodes.node(from).item, &state.nodes.node(to).item);
				(order != Ordering::Greater).then_some((from, to))
			}
			_ => None,
		};
		Range::new(self, &state, bounds)
	}

	/// Singleton range at the floor of `key`, empty if there is none.
	pub fn range_enclosing(&self, key: &T) -> Range<'_, T> {
		let cmp = &*self.cmp;
		let state = self.latch.shared();
		let found = state.closest(&|item| cmp(item, key), false);
		Range::new(self, &state, found.map(|index| (index, index)))
	}

	/// Singleton range at the node `probe` reports as `Equal`.
	///
	/// Useful when items cover spans and the probe answers whether an item
	/// lies before, around or after a point.
	///
	/// # Example
	///
	/// ```
	/// use aatree::Tree;
	/// use std::cmp::Ordering;
	///
	/// // Spans [start, end) ordered by start.
	/// let tree = Tree::new(|a: &(u32, u32), b: &(u32, u32)| a.0.cmp(&b.0));
	/// tree.insert_all([(0, 10), (10, 25), (25, 40)]);
	///
	/// let point = 17;
	/// let range = tree.range_enclosing_by(|span: &(u32, u32)| {
	/// 	if span.1 <= point {
	/// 		Ordering::Less
	/// 	} else if span.0 > point {
	/// 		Ordering::Greater
	/// 	} else {
	/// 		Ordering::Equal
	/// 	}
	/// });
	/// assert!(range.is_singleton());
	/// assert_eq!(range.first().unwrap(), Some((10, 25)));
	/// ```
	pub fn range_enclosing_by<F>(&self, probe: F) -> Range<'_, T>
	where
		F: Fn(&T) -> Ordering,
	{
		let state = self.latch.shared();
		let found = state.find(&probe);
		Range::new(self, &state, found.map(|index| (index, index)))
	}

	/// In-order iterator over clones of the items.
	///
	/// Every call starts a fresh traversal from the first node. The latch is
	/// taken per step; a structural change between steps makes the next step
	/// yield [`Error::ConcurrentModification`].
	pub fn iter(&self) -> Iter<'_, T> {
		let state = self.latch.shared();
		Iter::new(self, &state)
	}

	/// Clones all items in order under a single shared acquisition.
	pub fn to_vec(&self) -> Vec<T>
	where
		T: Clone,
	{
		self.read().iter().cloned().collect()
	}

	/// Holds the shared latch and exposes read-only node navigation.
	///
	/// Mutating the tree from the same thread while the returned guard is
	/// alive panics.
	pub fn read(&self) -> TreeRef<'_, T> {
		TreeRef {
			state: self.latch.shared(),
		}
	}

	// -----------------------------------------------------------------------
	// Diagnostics
	// -----------------------------------------------------------------------

	/// Renders the tree sideways: right subtree first, then the node, then
	/// the left subtree, indented by depth.
	///
	/// ```text
	///         7 (1)
	///     5 (2)
	///         3 (1)
	/// ```
	pub fn dump(&self) -> String
	where
		T: fmt::Debug,
	{
		let state = self.latch.shared();
		let mut out = String::new();
		if let Some(root) = state.nodes.root {
			dump_node(&state.nodes, root, 0, &mut out);
		}
		out
	}

	/// Emits [`dump`](Self::dump) as a `debug` event.
	pub fn print(&self)
	where
		T: fmt::Debug,
	{
		tracing::debug!("tree:\n{}", self.dump());
	}
}

fn dump_node<T: fmt::Debug>(nodes: &Nodes<T>, index: usize, indent: usize, out: &mut String) {
	let node = nodes.node(index);
	if let Some(right) = node.right {
		dump_node(nodes, right, indent + 4, out);
	}
	let _ = writeln!(out, "{:indent$}{:?} ({})", "", node.item, node.level, indent = indent);
	if let Some(left) = node.left {
		dump_node(nodes, left, indent + 4, out);
	}
}

impl<T: Ord + 'static> Tree<T> {
	/// Creates an empty tree ordered by `T`'s `Ord` implementation.
	pub fn ordered() -> Self {
		Self::new(T::cmp)
	}
}

/// Structural copy.
///
/// The copy gets new nodes with the same shape, clones of the items, a fresh
/// version counter and its own latch. Wrap items in `Arc` to share them
/// between the two trees instead of duplicating them.
impl<T: Clone> Clone for Tree<T> {
	fn clone(&self) -> Self {
		let source = self.latch.shared();
		let mut state = State::with_capacity(source.len);

		// (source node, parent in the copy, attach as left child)
		let mut stack = Vec::new();
		if let Some(root) = source.nodes.root {
			stack.push((root, None, false));
		}
		while let Some((from, parent, is_left)) = stack.pop() {
			let node = source.nodes.node(from);
			let mut copy = Node::leaf(node.item.clone(), parent);
			copy.level = node.level;
			let index = state.nodes.alloc(copy);

			match parent {
				None => state.nodes.root = Some(index),
				Some(parent) if is_left => state.nodes.node_mut(parent).left = Some(index),
				Some(parent) => state.nodes.node_mut(parent).right = Some(index),
			}

			if let Some(right) = node.right {
				stack.push((right, Some(index), false));
			}
			if let Some(left) = node.left {
				stack.push((left, Some(index), true));
			}
		}

		state.len = source.len;
		state.refresh_extremes();
		Tree::from_state(Arc::clone(&self.cmp), state)
	}
}

impl<T: fmt::Debug> fmt::Debug for Tree<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let state = self.latch.shared();
		f.debug_set().entries(Items::new(&state.nodes, state.first, state.last, state.len)).finish()
	}
}

// ---------------------------------------------------------------------------
// Read Guard
// ---------------------------------------------------------------------------

/// Shared access to a tree for read-only navigation.
///
/// Holds the tree's latch in shared mode until dropped, so everything read
/// through it is one consistent snapshot.
pub struct TreeRef<'t, T> {
	state: SharedGuard<'t, State<T>>,
}

impl<'t, T> TreeRef<'t, T> {
	fn view(&self, link: Link) -> Option<NodeRef<'_, T>> {
		link.map(|index| NodeRef::new(&self.state.nodes, index))
	}

	pub fn len(&self) -> usize {
		self.state.len
	}

	pub fn is_empty(&self) -> bool {
		self.state.len == 0
	}

	pub fn version(&self) -> u64 {
		self.state.version
	}

	pub fn root(&self) -> Option<NodeRef<'_, T>> {
		self.view(self.state.nodes.root)
	}

	pub fn first(&self) -> Option<NodeRef<'_, T>> {
		self.view(self.state.first)
	}

	pub fn last(&self) -> Option<NodeRef<'_, T>> {
		self.view(self.state.last)
	}

	/// Resolves a handle, `None` if its node has been removed.
	pub fn node(&self, id: NodeId) -> Option<NodeRef<'_, T>> {
		self.view(self.state.nodes.resolve(id))
	}

	/// Borrowing in-order iterator. Needs no version checks because the
	/// latch is held for its whole lifetime.
	pub fn iter(&self) -> Items<'_, T> {
		Items::new(&self.state.nodes, self.state.first, self.state.last, self.state.len)
	}
}

impl<'a, 't, T> IntoIterator for &'a TreeRef<'t, T> {
	type Item = &'a T;
	type IntoIter = Items<'a, T>;

	fn into_iter(self) -> Items<'a, T> {
		self.iter()
	}
}

// ---------------------------------------------------------------------------
// Invariant Validation
// ---------------------------------------------------------------------------

impl<T: fmt::Debug> Tree<T> {
	/// Validates all tree invariants. Panics with diagnostic info if any
	/// invariant is violated.
	///
	/// # Invariants Checked
	///
	/// 1. Leaves are at level 1
	/// 2. Left children are exactly one level below their parent
	/// 3. Right children are on the parent's level or one below, and no two
	///    right horizontal links follow each other
	/// 4. Nodes above level 1 have two children
	/// 5. Parent links mirror child links
	/// 6. In-order traversal is strictly increasing under the comparator
	/// 7. `len`, the cached first/last nodes and the arena agree with the
	///    reachable nodes
	pub fn assert_invariants(&self) {
		let state = self.latch.shared();
		let nodes = &state.nodes;

		let Some(root) = nodes.root else {
			assert_eq!(state.len, 0, "Empty tree has len {}", state.len);
			assert!(state.first.is_none(), "Empty tree caches a first node");
			assert!(state.last.is_none(), "Empty tree caches a last node");
			assert_eq!(nodes.live(), 0, "Empty tree has {} live slots", nodes.live());
			return;
		};

		assert!(nodes.node(root).up.is_none(), "Root has a parent link");
		let reachable = self.validate_node_recursive(nodes, root);

		// Invariant 7: Length consistency
		assert_eq!(reachable, state.len, "Reachable nodes {} != len {}", reachable, state.len);
		assert_eq!(nodes.live(), state.len, "Live slots {} != len {}", nodes.live(), state.len);

		assert_eq!(state.first, Some(nodes.leftmost(root)), "Cached first node is not the minimum");
		assert_eq!(state.last, Some(nodes.rightmost(root)), "Cached last node is not the maximum");

		// Invariant 6: Key ordering
		let mut visited = 0;
		let mut previous: Option<usize> = None;
		let mut cursor = state.first;
		while let Some(index) = cursor {
			if let Some(previous) = previous {
				let (a, b) = (&nodes.node(previous).item, &nodes.node(index).item);
				assert_eq!(
					(*self.cmp)(a, b),
					Ordering::Less,
					"Items not strictly increasing: {:?} then {:?}",
					a,
					b
				);
			}
			visited += 1;
			previous = Some(index);
			cursor = nodes.next(index);
		}
		assert_eq!(visited, state.len, "In-order walk visited {} nodes, len is {}", visited, state.len);
		assert_eq!(previous, state.last, "In-order walk did not end at the last node");
	}

	/// Validates the subtree at `index` and returns its node count.
	fn validate_node_recursive(&self, nodes: &Nodes<T>, index: usize) -> usize {
		let node = nodes.node(index);
		let level = node.level;
		assert!(level >= 1, "Node {:?} has level 0", node.item);

		// Invariant 1: Leaf level
		if node.left.is_none() && node.right.is_none() {
			assert_eq!(level, 1, "Leaf {:?} has level {}", node.item, level);
		}

		// Invariant 4: Two children above level 1
		if level > 1 {
			assert!(
				node.left.is_some() && node.right.is_some(),
				"Node {:?} at level {} lacks a child",
				node.item,
				level
			);
		}

		let mut count = 1;

		if let Some(left) = node.left {
			let child = nodes.node(left);
			// Invariant 2: No left horizontal links
			assert_eq!(
				child.level + 1,
				level,
				"Left child {:?} of {:?} has level {} under level {}",
				child.item,
				node.item,
				child.level,
				level
			);
			// Invariant 5: Parent links
			assert_eq!(child.up, Some(index), "Left child {:?} has wrong parent", child.item);
			count += self.validate_node_recursive(nodes, left);
		}

		if let Some(right) = node.right {
			let child = nodes.node(right);
			// Invariant 3: At most one right horizontal link in a row
			assert!(
				child.level == level || child.level + 1 == level,
				"Right child {:?} of {:?} has level {} under level {}",
				child.item,
				node.item,
				child.level,
				level
			);
			if let Some(far) = child.right {
				let far = nodes.node(far);
				assert!(
					far.level < level,
					"Double horizontal link from {:?} through {:?} to {:?}",
					node.item,
					child.item,
					far.item
				);
			}
			assert_eq!(child.up, Some(index), "Right child {:?} has wrong parent", child.item);
			count += self.validate_node_recursive(nodes, right);
		}

		count
	}
}
