//! Lock helpers.
//!
//! A lock poisoned by a caught handler panic is recovered rather than
//! propagated. Every critical section leaves either the old or the new value.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[inline]
pub fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

#[inline]
pub fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
