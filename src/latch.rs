//! Reader/writer latch guarding a whole tree.
//!
//! A [`TreeLatch`] wraps a `parking_lot` reader/writer lock. Any number of
//! threads may hold it in shared mode at once; exclusive mode waits for all
//! shared holders to leave and keeps new ones out until it is released.
//!
//! The lock is not reentrant. Every acquisition is recorded in a small
//! per-thread table so that misuse is reported instead of deadlocking:
//!
//! - exclusive acquisition while the thread already holds the latch in any
//!   mode panics,
//! - shared acquisition while the thread holds the latch exclusively panics,
//! - shared acquisition while the thread already holds it shared is allowed
//!   and uses a recursive read, so a queued writer cannot wedge the thread
//!   against itself.
//!
//! The typical way to hit the panics is a comparator or probe closure that
//! calls back into the tree it is being run for.

use smallvec::SmallVec;
use std::cell::RefCell;
use std::fmt;

use crate::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// How the current thread holds a latch.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum Mode {
	/// Read access shared with other threads.
	Shared,
	/// Sole access for mutation.
	Exclusive,
}

impl fmt::Display for Mode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Mode::Shared => f.write_str("shared"),
			Mode::Exclusive => f.write_str("exclusive"),
		}
	}
}

crate::sync::thread_local! {
	// (latch address, mode) for every guard alive on this thread.
	static HELD: RefCell<SmallVec<[(usize, Mode); 4]>> = RefCell::new(SmallVec::new());
}

fn held_mode(id: usize) -> Option<Mode> {
	HELD.with(|held| {
		let held = held.borrow();
		// Exclusive wins if both were somehow recorded.
		let mut found = None;
		for &(latch, mode) in held.iter() {
			if latch == id {
				if mode == Mode::Exclusive {
					return Some(Mode::Exclusive);
				}
				found = Some(mode);
			}
		}
		found
	})
}

fn register(id: usize, mode: Mode) {
	HELD.with(|held| held.borrow_mut().push((id, mode)));
}

fn unregister(id: usize, mode: Mode) {
	HELD.with(|held| {
		let mut held = held.borrow_mut();
		if let Some(pos) = held.iter().rposition(|&entry| entry == (id, mode)) {
			held.remove(pos);
		}
	});
}

/// A non-reentrant reader/writer latch with misuse detection.
pub struct TreeLatch<T> {
	lock: RwLock<T>,
}

impl<T> TreeLatch<T> {
	/// Creates a new, unlocked latch around `data`.
	#[inline]
	pub fn new(data: T) -> TreeLatch<T> {
		TreeLatch {
			lock: RwLock::new(data),
		}
	}

	#[inline]
	fn id(&self) -> usize {
		self as *const TreeLatch<T> as usize
	}

	/// Returns how the current thread holds this latch, if at all.
	pub fn held_by_current_thread(&self) -> Option<Mode> {
		held_mode(self.id())
	}

	/// Locks the latch with exclusive write access, blocking the thread until
	/// it can be acquired.
	///
	/// # Panics
	///
	/// Panics if the current thread already holds this latch.
	#[inline]
	pub fn exclusive(&self) -> ExclusiveGuard<'_, T> {
		let id = self.id();
		if let Some(mode) = held_mode(id) {
			panic!("reentrant exclusive acquisition of tree latch (already held in {mode} mode)");
		}
		let guard = self.lock.write();
		register(id, Mode::Exclusive);
		ExclusiveGuard {
			id,
			guard,
		}
	}

	/// Locks the latch with shared read access, blocking the thread until it
	/// can be acquired.
	///
	/// # Panics
	///
	/// Panics if the current thread holds this latch exclusively.
	#[inline]
	pub fn shared(&self) -> SharedGuard<'_, T> {
		let id = self.id();
		let guard = match held_mode(id) {
			Some(Mode::Exclusive) => {
				panic!("shared acquisition of tree latch while holding it in exclusive mode")
			}
			Some(Mode::Shared) => self.lock.read_recursive(),
			None => self.lock.read(),
		};
		register(id, Mode::Shared);
		SharedGuard {
			id,
			guard,
		}
	}
}

impl<T: fmt::Debug> fmt::Debug for TreeLatch<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TreeLatch").finish_non_exhaustive()
	}
}

/// RAII guard for exclusive access. Releases the latch when dropped.
pub struct ExclusiveGuard<'a, T> {
	id: usize,
	guard: RwLockWriteGuard<'a, T>,
}

impl<'a, T> Drop for ExclusiveGuard<'a, T> {
	#[inline]
	fn drop(&mut self) {
		unregister(self.id, Mode::Exclusive);
	}
}

impl<'a, T> std::ops::Deref for ExclusiveGuard<'a, T> {
	type Target = T;

	#[inline]
	fn deref(&self) -> &T {
		&self.guard
	}
}

impl<'a, T> std::ops::DerefMut for ExclusiveGuard<'a, T> {
	#[inline]
	fn deref_mut(&mut self) -> &mut T {
		&mut self.guard
	}
}

/// RAII guard for shared access. Releases the latch when dropped.
pub struct SharedGuard<'a, T> {
	id: usize,
	guard: RwLockReadGuard<'a, T>,
}

impl<'a, T> Drop for SharedGuard<'a, T> {
	#[inline]
	fn drop(&mut self) {
		unregister(self.id, Mode::Shared);
	}
}

impl<'a, T> std::ops::Deref for SharedGuard<'a, T> {
	type Target = T;

	#[inline]
	fn deref(&self) -> &T {
		&self.guard
	}
}
