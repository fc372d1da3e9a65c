//! Test utilities for loading sample trees from JSON fixtures
//!
//! A fixture spells out the exact shape of a tree:
//!
//! ```json
//! {
//!   "item": 2, "level": 2,
//!   "left":  { "item": 1, "level": 1 },
//!   "right": { "item": 3, "level": 1 }
//! }
//! ```
//!
//! The shape is taken as given, without rebalancing, so fixtures can also
//! describe trees that break the level rules on purpose.
use crate::node::{Link, Node};
use crate::{State, Tree};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Deserialize, Debug)]
struct TreeNode {
	item: i64,
	level: u32,
	#[serde(default)]
	left: Option<Box<TreeNode>>,
	#[serde(default)]
	right: Option<Box<TreeNode>>,
}

fn translate_node(state: &mut State<i64>, tree_node: TreeNode, up: Link) -> usize {
	let mut node = Node::leaf(tree_node.item, up);
	node.level = tree_node.level;
	let index = state.nodes.alloc(node);
	state.len += 1;

	if let Some(left) = tree_node.left {
		let left = translate_node(state, *left, Some(index));
		state.nodes.node_mut(index).left = Some(left);
	}
	if let Some(right) = tree_node.right {
		let right = translate_node(state, *right, Some(index));
		state.nodes.node_mut(index).right = Some(right);
	}
	index
}

/// Builds a tree of integers with exactly the shape described by `json`.
///
/// `null` yields an empty tree.
pub fn sample_tree_from_str(json: &str) -> Tree<i64> {
	let root: Option<TreeNode> = serde_json::from_str(json).expect("malformed fixture");
	let mut state = State::with_capacity(0);
	if let Some(root) = root {
		let root = translate_node(&mut state, root, None);
		state.nodes.root = Some(root);
	}
	state.refresh_extremes();
	Tree::from_state(Arc::new(i64::cmp), state)
}

pub fn sample_tree<P: AsRef<std::path::Path>>(path: P) -> Tree<i64> {
	let json = std::fs::read_to_string(path).expect("failed to find file");
	sample_tree_from_str(&json)
}
