//! Node storage and the AA rebalancing primitives.
//!
//! Nodes live in an arena (`Nodes<T>`) and refer to each other by slot index.
//! Children are owned top-down through `left`/`right`; `up` is a plain
//! navigation link that is rewritten whenever a node is relinked. Rotations
//! therefore only reassign indices and never move items.
//!
//! Each slot carries a generation that is bumped when the slot is freed, so a
//! [`NodeId`] handed out to callers can be checked for staleness. Freed slots
//! are reused by later inserts and only released back to the allocator when
//! the whole arena is cleared.

use std::fmt;
use std::mem;

/// Index of a slot in the arena, `None` for an absent link.
pub(crate) type Link = Option<usize>;

/// A stable handle to a node of a [`Tree`](crate::Tree).
///
/// Handles stay valid until the node they name is physically removed. A
/// removal may also move a neighbouring item into the handle's node (when
/// the removed node had two children), so a handle identifies a position in
/// the tree, not an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
	index: usize,
	generation: u64,
}

/// A binary tree node.
pub(crate) struct Node<T> {
	pub(crate) left: Link,
	pub(crate) right: Link,
	pub(crate) up: Link,
	/// AA level. Leaves are at level 1.
	pub(crate) level: u32,
	pub(crate) item: T,
}

impl<T> Node<T> {
	pub(crate) fn leaf(item: T, up: Link) -> Node<T> {
		Node {
			left: None,
			right: None,
			up,
			level: 1,
			item,
		}
	}
}

struct Slot<T> {
	generation: u64,
	node: Option<Node<T>>,
}

/// Arena of nodes plus the root link.
pub(crate) struct Nodes<T> {
	slots: Vec<Slot<T>>,
	vacant: Vec<usize>,
	/// Generation given to newly pushed slots. Greater than the generation of
	/// every handle issued so far, so slots recreated after a clear never
	/// match an old handle.
	floor: u64,
	pub(crate) root: Link,
}

impl<T> Nodes<T> {
	pub(crate) fn with_capacity(capacity: usize) -> Nodes<T> {
		Nodes {
			slots: Vec::with_capacity(capacity),
			vacant: Vec::new(),
			floor: 0,
			root: None,
		}
	}

	// -----------------------------------------------------------------------
	// Slot management
	// -----------------------------------------------------------------------

	pub(crate) fn alloc(&mut self, node: Node<T>) -> usize {
		match self.vacant.pop() {
			Some(index) => {
				self.slots[index].node = Some(node);
				index
			}
			None => {
				self.slots.push(Slot {
					generation: self.floor,
					node: Some(node),
				});
				self.slots.len() - 1
			}
		}
	}

	/// Empties a slot and invalidates every handle to it.
	pub(crate) fn free(&mut self, index: usize) -> Node<T> {
		let slot = &mut self.slots[index];
		let node = match slot.node.take() {
			Some(node) => node,
			None => unreachable!("freeing vacant slot {index}"),
		};
		slot.generation += 1;
		self.floor = self.floor.max(slot.generation);
		self.vacant.push(index);
		node
	}

	/// Drops every node and releases the arena's memory.
	pub(crate) fn clear(&mut self) {
		for slot in &self.slots {
			let issued = slot.generation + u64::from(slot.node.is_some());
			self.floor = self.floor.max(issued);
		}
		self.slots = Vec::new();
		self.vacant = Vec::new();
		self.root = None;
	}

	/// Number of occupied slots.
	pub(crate) fn live(&self) -> usize {
		self.slots.len() - self.vacant.len()
	}

	#[inline]
	pub(crate) fn node(&self, index: usize) -> &Node<T> {
		match &self.slots[index].node {
			Some(node) => node,
			None => unreachable!("link to vacant slot {index}"),
		}
	}

	#[inline]
	pub(crate) fn node_mut(&mut self, index: usize) -> &mut Node<T> {
		match &mut self.slots[index].node {
			Some(node) => node,
			None => unreachable!("link to vacant slot {index}"),
		}
	}

	pub(crate) fn id(&self, index: usize) -> NodeId {
		NodeId {
			index,
			generation: self.slots[index].generation,
		}
	}

	/// Maps a handle back to its slot if the node it names is still alive.
	pub(crate) fn resolve(&self, id: NodeId) -> Link {
		let index = id.index;
		match self.slots.get(index) {
			Some(slot) if slot.generation == id.generation && slot.node.is_some() => Some(index),
			_ => None,
		}
	}

	pub(crate) fn swap_items(&mut self, a: usize, b: usize) {
		if a == b {
			return;
		}
		let (lo, hi) = if a < b {
			(a, b)
		} else {
			(b, a)
		};
		let (head, tail) = self.slots.split_at_mut(hi);
		match (head[lo].node.as_mut(), tail[0].node.as_mut()) {
			(Some(x), Some(y)) => mem::swap(&mut x.item, &mut y.item),
			_ => unreachable!("swapping items of vacant slots {lo} and {hi}"),
		}
	}

	// -----------------------------------------------------------------------
	// Navigation
	// -----------------------------------------------------------------------

	pub(crate) fn leftmost(&self, mut index: usize) -> usize {
		while let Some(left) = self.node(index).left {
			index = left;
		}
		index
	}

	pub(crate) fn rightmost(&self, mut index: usize) -> usize {
		while let Some(right) = self.node(index).right {
			index = right;
		}
		index
	}

	/// In-order successor, via the right subtree or the `up` chain.
	pub(crate) fn next(&self, mut index: usize) -> Link {
		if let Some(right) = self.node(index).right {
			return Some(self.leftmost(right));
		}
		while let Some(up) = self.node(index).up {
			if self.node(up).left == Some(index) {
				return Some(up);
			}
			index = up;
		}
		None
	}

	/// In-order predecessor, via the left subtree or the `up` chain.
	pub(crate) fn previous(&self, mut index: usize) -> Link {
		if let Some(left) = self.node(index).left {
			return Some(self.rightmost(left));
		}
		while let Some(up) = self.node(index).up {
			if self.node(up).right == Some(index) {
				return Some(up);
			}
			index = up;
		}
		None
	}

	#[inline]
	pub(crate) fn level_of(&self, link: Link) -> u32 {
		link.map_or(0, |index| self.node(index).level)
	}

	// -----------------------------------------------------------------------
	// Relinking
	// -----------------------------------------------------------------------

	/// Points whatever referenced `old` from `parent` (or the root) at `new`.
	pub(crate) fn replace_child(&mut self, parent: Link, old: usize, new: Link) {
		match parent {
			None => self.root = new,
			Some(parent) => {
				let parent = self.node_mut(parent);
				if parent.left == Some(old) {
					parent.left = new;
				} else {
					debug_assert_eq!(parent.right, Some(old));
					parent.right = new;
				}
			}
		}
	}

	/// Lifts the left child of `top` into its place.
	fn rotate_right(&mut self, top: usize, left: usize) {
		let up = self.node(top).up;
		let inner = self.node(left).right;

		self.node_mut(top).left = inner;
		if let Some(inner) = inner {
			self.node_mut(inner).up = Some(top);
		}

		self.node_mut(left).right = Some(top);
		self.node_mut(top).up = Some(left);
		self.node_mut(left).up = up;
		self.replace_child(up, top, Some(left));
	}

	/// Lifts the right child of `top` into its place.
	fn rotate_left(&mut self, top: usize, right: usize) {
		let up = self.node(top).up;
		let inner = self.node(right).left;

		self.node_mut(top).right = inner;
		if let Some(inner) = inner {
			self.node_mut(inner).up = Some(top);
		}

		self.node_mut(right).left = Some(top);
		self.node_mut(top).up = Some(right);
		self.node_mut(right).up = up;
		self.replace_child(up, top, Some(right));
	}

	// -----------------------------------------------------------------------
	// AA primitives
	// -----------------------------------------------------------------------

	/// Removes a left horizontal link below `index` by rotating right.
	///
	/// Returns the node now occupying `index`'s former position.
	pub(crate) fn skew(&mut self, index: usize) -> usize {
		let node = self.node(index);
		match node.left {
			Some(left) if self.node(left).level == node.level => {
				self.rotate_right(index, left);
				left
			}
			_ => index,
		}
	}

	/// Removes a double right horizontal link below `index` by rotating left
	/// and promoting the middle node.
	///
	/// Returns the node now occupying `index`'s former position.
	pub(crate) fn split(&mut self, index: usize) -> usize {
		let node = self.node(index);
		let level = node.level;
		let Some(right) = node.right else {
			return index;
		};
		let far = self.node(right).right;
		match far {
			Some(far) if self.node(far).level == level => {
				self.rotate_left(index, right);
				self.node_mut(right).level += 1;
				right
			}
			_ => index,
		}
	}

	/// Restores the invariants at `index` after a node below it was removed.
	///
	/// Clamps the level to one above the shallower child, then applies skew
	/// three times and split twice along the right spine.
	pub(crate) fn rebalance_after_removal(&mut self, index: usize) -> usize {
		let node = self.node(index);
		let (left, right) = (node.left, node.right);
		let should_be = self.level_of(left).min(self.level_of(right)) + 1;
		if should_be < node.level {
			self.node_mut(index).level = should_be;
			if let Some(right) = right {
				if should_be < self.node(right).level {
					self.node_mut(right).level = should_be;
				}
			}
		}

		let top = self.skew(index);
		if let Some(right) = self.node(top).right {
			let right = self.skew(right);
			if let Some(far) = self.node(right).right {
				self.skew(far);
			}
		}
		let top = self.split(top);
		if let Some(right) = self.node(top).right {
			self.split(right);
		}
		top
	}
}

/// A read-only view of a node, borrowed from a [`TreeRef`](crate::TreeRef).
///
/// All navigation happens under the shared lock the `TreeRef` holds, so the
/// structure cannot change while a `NodeRef` is alive.
pub struct NodeRef<'g, T> {
	nodes: &'g Nodes<T>,
	index: usize,
}

impl<'g, T> Clone for NodeRef<'g, T> {
	fn clone(&self) -> Self {
		*self
	}
}

impl<'g, T> Copy for NodeRef<'g, T> {}

impl<'g, T> NodeRef<'g, T> {
	pub(crate) fn new(nodes: &'g Nodes<T>, index: usize) -> NodeRef<'g, T> {
		NodeRef {
			nodes,
			index,
		}
	}

	fn link(&self, link: Link) -> Option<NodeRef<'g, T>> {
		link.map(|index| NodeRef::new(self.nodes, index))
	}

	/// Handle that can be used after the lock is released.
	pub fn id(&self) -> NodeId {
		self.nodes.id(self.index)
	}

	/// The stored item.
	pub fn item(&self) -> &'g T {
		&self.nodes.node(self.index).item
	}

	/// The AA level; 1 for leaves.
	pub fn level(&self) -> u32 {
		self.nodes.node(self.index).level
	}

	pub fn left(&self) -> Option<NodeRef<'g, T>> {
		self.link(self.nodes.node(self.index).left)
	}

	pub fn right(&self) -> Option<NodeRef<'g, T>> {
		self.link(self.nodes.node(self.index).right)
	}

	/// The parent node, `None` at the root.
	pub fn up(&self) -> Option<NodeRef<'g, T>> {
		self.link(self.nodes.node(self.index).up)
	}

	/// In-order successor.
	pub fn next(&self) -> Option<NodeRef<'g, T>> {
		self.link(self.nodes.next(self.index))
	}

	/// In-order predecessor.
	pub fn previous(&self) -> Option<NodeRef<'g, T>> {
		self.link(self.nodes.previous(self.index))
	}
}

impl<'g, T: fmt::Debug> fmt::Debug for NodeRef<'g, T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("NodeRef")
			.field("item", self.item())
			.field("level", &self.level())
			.finish()
	}
}
