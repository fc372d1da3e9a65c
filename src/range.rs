//! Bounded cursors over a run of consecutive nodes.
//!
//! A [`Range`] names a start and an end node (inclusive) and keeps a cursor
//! that steps between them. It does not hold the tree's latch; every call
//! takes it in shared mode and first checks that the tree has not changed
//! structurally since the range was created.
//!
//! ```text
//!   BeforeStart ──next──► start ──next──► ... ──next──► end ──next──► AfterEnd
//!        ▲                  │                            ▲                │
//!        └──────prev────────┘                            └──────prev──────┘
//! ```
//!
//! Stepping off either end parks the cursor in a terminal state. It never
//! wraps around.

use std::cmp::Ordering;

use crate::error::{self, Error};
use crate::node::NodeId;
use crate::{State, Tree};

#[derive(Debug, PartialEq, Copy, Clone)]
enum Cursor {
	BeforeStart,
	At(NodeId),
	AfterEnd,
}

/// A cursor over the items between two nodes, both inclusive.
pub struct Range<'t, T> {
	tree: &'t Tree<T>,
	bounds: Option<(NodeId, NodeId)>,
	cursor: Cursor,
	version: u64,
}

impl<'t, T> Range<'t, T> {
	/// Builds a range over slot indices resolved under the caller's latch.
	pub(crate) fn new(
		tree: &'t Tree<T>,
		state: &State<T>,
		bounds: Option<(usize, usize)>,
	) -> Range<'t, T> {
		Range {
			tree,
			bounds: bounds.map(|(start, end)| (state.nodes.id(start), state.nodes.id(end))),
			cursor: Cursor::BeforeStart,
			version: state.version,
		}
	}

	/// Range between two node handles.
	///
	/// # Errors
	///
	/// - [`Error::StaleNode`] if either handle has been removed.
	/// - [`Error::InvertedBounds`] if `start` comes after `end`.
	pub fn from_nodes(tree: &'t Tree<T>, start: NodeId, end: NodeId) -> error::Result<Range<'t, T>> {
		let state = tree.shared();
		let from = state.nodes.resolve(start).ok_or(Error::StaleNode)?;
		let to = state.nodes.resolve(end).ok_or(Error::StaleNode)?;
		let order = (*tree.cmp)(&state.nodes.node(from).item, &state.nodes.node(to).item);
		if order == Ordering::Greater {
			return Err(Error::InvertedBounds);
		}
		Ok(Range::new(tree, &state, Some((from, to))))
	}

	/// The version of the tree this range was built against.
	pub fn version(&self) -> u64 {
		self.version
	}

	pub fn is_empty(&self) -> bool {
		self.bounds.is_none()
	}

	/// `true` if the range covers exactly one node.
	pub fn is_singleton(&self) -> bool {
		matches!(self.bounds, Some((start, end)) if start == end)
	}

	pub fn start(&self) -> Option<NodeId> {
		self.bounds.map(|(start, _)| start)
	}

	pub fn end(&self) -> Option<NodeId> {
		self.bounds.map(|(_, end)| end)
	}

	fn check(&self, state: &State<T>) -> error::Result<()> {
		if state.version != self.version {
			tracing::warn!(
				expected = self.version,
				found = state.version,
				"range used after tree was modified"
			);
			return Err(Error::ConcurrentModification {
				expected: self.version,
				found: state.version,
			});
		}
		Ok(())
	}

	/// Runs `f` on the item at `id` after validating the range.
	fn read<R>(&self, id: Option<NodeId>, f: impl FnOnce(&T) -> R) -> error::Result<Option<R>> {
		let state = self.tree.shared();
		self.check(&state)?;
		Ok(id.map(|id| {
			let index = resolve(&state, id);
			f(&state.nodes.node(index).item)
		}))
	}

	/// The item at the start of the range.
	pub fn first(&self) -> error::Result<Option<T>>
	where
		T: Clone,
	{
		self.read(self.start(), T::clone)
	}

	/// The item at the end of the range.
	pub fn last(&self) -> error::Result<Option<T>>
	where
		T: Clone,
	{
		self.read(self.end(), T::clone)
	}

	/// The item under the cursor, `None` before the first step or after
	/// stepping off either end.
	pub fn current(&self) -> error::Result<Option<T>>
	where
		T: Clone,
	{
		let at = match self.cursor {
			Cursor::At(id) => Some(id),
			Cursor::BeforeStart | Cursor::AfterEnd => None,
		};
		self.read(at, T::clone)
	}

	/// Advances the cursor and returns the item it lands on.
	///
	/// The first call yields the start item. After the end item the cursor
	/// stays terminal and every further call returns `Ok(None)`.
	///
	/// # Errors
	///
	/// [`Error::ConcurrentModification`] if the tree changed since the range
	/// was created.
	#[allow(clippy::should_implement_trait)]
	pub fn next(&mut self) -> error::Result<Option<T>>
	where
		T: Clone,
	{
		let tree = self.tree;
		let state = tree.shared();
		self.check(&state)?;
		let Some((start, end)) = self.bounds else {
			return Ok(None);
		};

		let next = match self.cursor {
			Cursor::BeforeStart => Some(resolve(&state, start)),
			Cursor::At(id) if id == end => None,
			Cursor::At(id) => state.nodes.next(resolve(&state, id)),
			Cursor::AfterEnd => None,
		};

		Ok(self.land(&state, next, Cursor::AfterEnd))
	}

	/// Moves the cursor back and returns the item it lands on.
	///
	/// From the terminal state after the end this yields the end item;
	/// before the start it stays terminal.
	pub fn prev(&mut self) -> error::Result<Option<T>>
	where
		T: Clone,
	{
		let tree = self.tree;
		let state = tree.shared();
		self.check(&state)?;
		let Some((start, end)) = self.bounds else {
			return Ok(None);
		};

		let previous = match self.cursor {
			Cursor::AfterEnd => Some(resolve(&state, end)),
			Cursor::At(id) if id == start => None,
			Cursor::At(id) => state.nodes.previous(resolve(&state, id)),
			Cursor::BeforeStart => None,
		};

		Ok(self.land(&state, previous, Cursor::BeforeStart))
	}

	fn land(&mut self, state: &State<T>, target: Option<usize>, terminal: Cursor) -> Option<T>
	where
		T: Clone,
	{
		match target {
			Some(index) => {
				self.cursor = Cursor::At(state.nodes.id(index));
				Some(state.nodes.node(index).item.clone())
			}
			None => {
				self.cursor = terminal;
				None
			}
		}
	}

	/// Moves the cursor back before the start.
	pub fn rewind(&mut self) {
		self.cursor = Cursor::BeforeStart;
	}

	/// All items from start to end, in order. Ignores the cursor.
	pub fn items(&self) -> error::Result<Vec<T>>
	where
		T: Clone,
	{
		let state = self.tree.shared();
		self.check(&state)?;
		let mut out = Vec::new();
		let Some((start, end)) = self.bounds else {
			return Ok(out);
		};

		let end = resolve(&state, end);
		let mut cursor = Some(resolve(&state, start));
		while let Some(index) = cursor {
			out.push(state.nodes.node(index).item.clone());
			if index == end {
				break;
			}
			cursor = state.nodes.next(index);
		}
		Ok(out)
	}

	/// Floor or ceiling of `key` restricted to this range.
	///
	/// A tree-wide answer past the end of the range is clamped to the end
	/// (for a floor query) and one before the start to the start (for a
	/// ceiling query); an answer on the wrong side of the range is `None`.
	pub fn closest_to(&self, key: &T, reverse: bool) -> error::Result<Option<T>>
	where
		T: Clone,
	{
		let cmp = &*self.tree.cmp;
		self.closest_by(|item| cmp(item, key), reverse)
	}

	/// [`closest_to`](Self::closest_to) with a custom probe.
	pub fn closest_by<F>(&self, probe: F, reverse: bool) -> error::Result<Option<T>>
	where
		F: Fn(&T) -> Ordering,
		T: Clone,
	{
		let state = self.tree.shared();
		self.check(&state)?;
		let Some((start, end)) = self.bounds else {
			return Ok(None);
		};
		let Some(found) = state.closest(&probe, reverse) else {
			return Ok(None);
		};

		let cmp = &*self.tree.cmp;
		let (start, end) = (resolve(&state, start), resolve(&state, end));
		let item = |index: usize| &state.nodes.node(index).item;

		let before_start = cmp(item(found), item(start)) == Ordering::Less;
		let after_end = cmp(item(found), item(end)) == Ordering::Greater;

		let clamped = match (reverse, before_start, after_end) {
			(_, false, false) => Some(found),
			(false, _, true) => Some(end),
			(true, true, _) => Some(start),
			_ => None,
		};
		Ok(clamped.map(|index| item(index).clone()))
	}
}

/// Resolves a bound or cursor handle. Only called after the version check,
/// which guarantees the node is still alive.
fn resolve<T>(state: &State<T>, id: NodeId) -> usize {
	match state.nodes.resolve(id) {
		Some(index) => index,
		None => unreachable!("range handle went stale without a version change"),
	}
}
