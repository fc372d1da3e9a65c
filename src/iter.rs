//! Iterators for the `Tree` data structure
use crate::error::{self, Error};
use crate::node::{Link, NodeId, Nodes};
use crate::{State, Tree};

/// In-order iterator that takes the latch per step.
///
/// Created by [`Tree::iter`]. Yields `Ok(item)` clones while the tree is
/// structurally unchanged. The first step after a structural change yields
/// `Err(ConcurrentModification)`, after which the iterator is exhausted.
pub struct Iter<'t, T> {
	tree: &'t Tree<T>,
	next: Option<NodeId>,
	version: u64,
	done: bool,
}

impl<'t, T> Iter<'t, T> {
	pub(crate) fn new(tree: &'t Tree<T>, state: &State<T>) -> Iter<'t, T> {
		Iter {
			tree,
			next: state.first.map(|index| state.nodes.id(index)),
			version: state.version,
			done: false,
		}
	}

	/// The version of the tree this iterator was started against.
	pub fn version(&self) -> u64 {
		self.version
	}
}

impl<'t, T: Clone> Iterator for Iter<'t, T> {
	type Item = error::Result<T>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.done {
			return None;
		}

		let tree = self.tree;
		let state = tree.shared();
		if state.version != self.version {
			self.done = true;
			tracing::warn!(
				expected = self.version,
				found = state.version,
				"iterator used after tree was modified"
			);
			return Some(Err(Error::ConcurrentModification {
				expected: self.version,
				found: state.version,
			}));
		}

		let Some(id) = self.next else {
			self.done = true;
			return None;
		};
		let Some(index) = state.nodes.resolve(id) else {
			unreachable!("iterator handle went stale without a version change")
		};

		self.next = state.nodes.next(index).map(|next| state.nodes.id(next));
		Some(Ok(state.nodes.node(index).item.clone()))
	}
}

impl<'t, T: Clone> std::iter::FusedIterator for Iter<'t, T> {}

/// Borrowing in-order iterator over a tree held in shared mode.
///
/// Created by [`TreeRef::iter`](crate::TreeRef::iter).
pub struct Items<'g, T> {
	nodes: &'g Nodes<T>,
	front: Link,
	back: Link,
	remaining: usize,
}

impl<'g, T> Items<'g, T> {
	pub(crate) fn new(nodes: &'g Nodes<T>, front: Link, back: Link, len: usize) -> Items<'g, T> {
		Items {
			nodes,
			front,
			back,
			remaining: len,
		}
	}
}

impl<'g, T> Iterator for Items<'g, T> {
	type Item = &'g T;

	fn next(&mut self) -> Option<&'g T> {
		if self.remaining == 0 {
			return None;
		}
		let index = self.front?;
		self.remaining -= 1;
		self.front = self.nodes.next(index);
		Some(&self.nodes.node(index).item)
	}

	fn size_hint(&self) -> (usize, Option<usize>) {
		(self.remaining, Some(self.remaining))
	}
}

impl<'g, T> DoubleEndedIterator for Items<'g, T> {
	fn next_back(&mut self) -> Option<&'g T> {
		if self.remaining == 0 {
			return None;
		}
		let index = self.back?;
		self.remaining -= 1;
		self.back = self.nodes.previous(index);
		Some(&self.nodes.node(index).item)
	}
}

impl<'g, T> ExactSizeIterator for Items<'g, T> {}

impl<'g, T> std::iter::FusedIterator for Items<'g, T> {}
