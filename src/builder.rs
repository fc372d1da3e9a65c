//! Construction of trees with explicit configuration.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::error::{self, Error};
use crate::{Comparator, Tree};

/// Configures and builds a [`Tree`].
///
/// # Example
///
/// ```
/// use aatree::TreeBuilder;
///
/// let tree = TreeBuilder::new()
/// 	.comparator(|a: &i32, b: &i32| b.cmp(a))
/// 	.check_against([3, 1, 2])
/// 	.capacity(16)
/// 	.build()
/// 	.unwrap();
///
/// tree.insert(1);
/// tree.insert(2);
/// assert_eq!(tree.first(), Some(2));
/// ```
pub struct TreeBuilder<T> {
	comparator: Option<Comparator<T>>,
	samples: Vec<T>,
	capacity: usize,
}

impl<T> Default for TreeBuilder<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T> TreeBuilder<T> {
	pub fn new() -> TreeBuilder<T> {
		TreeBuilder {
			comparator: None,
			samples: Vec::new(),
			capacity: 0,
		}
	}

	/// Sets the comparator. It must be a strict total order over the items.
	pub fn comparator<F>(mut self, cmp: F) -> Self
	where
		F: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
	{
		self.comparator = Some(Arc::new(cmp));
		self
	}

	/// Sets an already shared comparator.
	pub fn shared_comparator(mut self, cmp: Comparator<T>) -> Self {
		self.comparator = Some(cmp);
		self
	}

	/// Items the comparator is checked against in [`build`](Self::build).
	///
	/// The check is cubic in the number of samples; a handful of
	/// representative items is enough to catch a comparator with its
	/// arguments swapped in one branch or a missing tie case.
	pub fn check_against<I>(mut self, samples: I) -> Self
	where
		I: IntoIterator<Item = T>,
	{
		self.samples.extend(samples);
		self
	}

	/// Pre-allocates room for `capacity` nodes.
	pub fn capacity(mut self, capacity: usize) -> Self {
		self.capacity = capacity;
		self
	}

	/// Builds the tree.
	///
	/// # Errors
	///
	/// - [`Error::MissingComparator`] if no comparator was set.
	/// - [`Error::ComparatorNotTotal`] if the comparator misbehaves on the
	///   samples.
	pub fn build(self) -> error::Result<Tree<T>> {
		let cmp = self.comparator.ok_or(Error::MissingComparator)?;
		check_total_order(&*cmp, &self.samples)?;
		tracing::debug!(capacity = self.capacity, samples = self.samples.len(), "building tree");
		Ok(Tree::from_parts(cmp, self.capacity))
	}
}

/// Checks reflexivity, antisymmetry and transitivity over `samples`.
fn check_total_order<T>(cmp: &dyn Fn(&T, &T) -> Ordering, samples: &[T]) -> error::Result<()> {
	for a in samples {
		if cmp(a, a) != Ordering::Equal {
			return Err(Error::ComparatorNotTotal("an item does not compare equal to itself"));
		}
	}

	for a in samples {
		for b in samples {
			if cmp(a, b) != cmp(b, a).reverse() {
				return Err(Error::ComparatorNotTotal("comparing in both directions disagrees"));
			}
		}
	}

	for a in samples {
		for b in samples {
			if cmp(a, b) == Ordering::Greater {
				continue;
			}
			for c in samples {
				if cmp(b, c) != Ordering::Greater && cmp(a, c) == Ordering::Greater {
					return Err(Error::ComparatorNotTotal("ordering is not transitive"));
				}
			}
		}
	}

	Ok(())
}
