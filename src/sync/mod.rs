//! Synchronization primitives with loom support.
//!
//! Under normal compilation, re-exports from std/parking_lot.
//! Under `cfg(loom)`, uses loom's equivalents for deterministic testing.
//!
//! # Usage
//!
//! Instead of importing directly from `parking_lot`, import from this module:
//!
//! ```ignore
//! use crate::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
//! ```

// Allow unused items - some are only used under loom cfg
#![allow(unused)]

// ===========================================================================
// RwLock
// ===========================================================================

// Note: parking_lot::RwLock and loom::sync::RwLock have different APIs.
// parking_lot uses RAII guards without Result wrapping, while loom uses
// Result-returning methods. We need wrapper types to unify them.

#[cfg(not(loom))]
pub use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[cfg(loom)]
mod loom_rwlock {
	//! Wrapper types for loom's RwLock to match parking_lot's API.

	use loom::sync::{
		RwLock as LoomRwLock, RwLockReadGuard as LoomReadGuard, RwLockWriteGuard as LoomWriteGuard,
	};

	/// A wrapper around loom's RwLock that provides a parking_lot-compatible API.
	pub struct RwLock<T>(LoomRwLock<T>);

	impl<T> RwLock<T> {
		/// Creates a new RwLock.
		pub fn new(value: T) -> Self {
			RwLock(LoomRwLock::new(value))
		}

		/// Acquires a read lock, blocking until available.
		pub fn read(&self) -> RwLockReadGuard<'_, T> {
			RwLockReadGuard(self.0.read().unwrap())
		}

		/// Acquires a read lock even if a writer is queued.
		///
		/// loom does not model writer preference, so this is a plain read.
		pub fn read_recursive(&self) -> RwLockReadGuard<'_, T> {
			self.read()
		}

		/// Acquires a write lock, blocking until available.
		pub fn write(&self) -> RwLockWriteGuard<'_, T> {
			RwLockWriteGuard(self.0.write().unwrap())
		}
	}

	/// Wrapper around loom's read guard.
	pub struct RwLockReadGuard<'a, T>(LoomReadGuard<'a, T>);

	impl<'a, T> std::ops::Deref for RwLockReadGuard<'a, T> {
		type Target = T;
		fn deref(&self) -> &T {
			&self.0
		}
	}

	/// Wrapper around loom's write guard.
	pub struct RwLockWriteGuard<'a, T>(LoomWriteGuard<'a, T>);

	impl<'a, T> std::ops::Deref for RwLockWriteGuard<'a, T> {
		type Target = T;
		fn deref(&self) -> &T {
			&self.0
		}
	}

	impl<'a, T> std::ops::DerefMut for RwLockWriteGuard<'a, T> {
		fn deref_mut(&mut self) -> &mut T {
			&mut self.0
		}
	}
}

#[cfg(loom)]
pub use loom_rwlock::{RwLock, RwLockReadGuard, RwLockWriteGuard};

// ===========================================================================
// Thread-local storage
// ===========================================================================

// loom runs every modelled thread on the same OS thread, so std's
// thread_local would be shared between them. loom's macro keeps them apart.

#[cfg(not(loom))]
pub(crate) use std::thread_local;

#[cfg(loom)]
pub(crate) use loom::thread_local;
