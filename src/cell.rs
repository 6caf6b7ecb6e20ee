//! Ownership cells for the cross-thread family and the lock acquisition
//! protocol.
//!
//! A cell is one `Arc` allocation holding the value and, for the locked
//! variants, the lock protecting it. The lock is never handed out on its
//! own: every acquisition below returns an owned guard that keeps the cell
//! alive, and access handles are the only holders of such guards.
//!
//! Locking policy is `parking_lot`'s: task-fair, so a reader arriving while
//! a writer waits queues behind that writer and neither side starves.
//! Locks are not poisoned; a panic while a handle is held releases the lock
//! as the handle unwinds.

use core::any::type_name;
use lock_api::{ArcMutexGuard, ArcRwLockReadGuard, ArcRwLockWriteGuard};
use parking_lot::{Mutex, RawMutex, RawRwLock, RwLock};
use std::sync::Arc;

/// Cell guarded by a reader/writer lock.
pub(crate) type LockedCell<T> = RwLock<T>;

/// Cell guarded by an exclusive lock for reads and writes alike.
pub(crate) type SerializedCell<T> = Mutex<T>;

pub(crate) type WriteGuard<T> = ArcRwLockWriteGuard<RawRwLock, T>;
pub(crate) type ReadGuard<T> = ArcRwLockReadGuard<RawRwLock, T>;
pub(crate) type SerializedGuard<T> = ArcMutexGuard<RawMutex, T>;

/// Cell for a value that is never mutated after construction. It has no
/// lock at all.
pub(crate) struct ImmutableCell<T> {
    pub(crate) value: T,
}

/// Holder for a value the caller asserted has no interior mutability, even
/// though its type is not `Sync`.
///
/// Used bare as the lock-free read-only cell, and inside an `RwLock` for
/// the unchecked reader/writer cell.
pub(crate) struct UncheckedCell<T> {
    pub(crate) value: T,
}

// SAFETY: `&T` may be used from several threads at once. Both constructors
// (`make_shared_immutable_unchecked`, `make_shared_unchecked`) require the
// caller to guarantee that `T` is not mutated through a shared reference.
// `&mut T` is only produced under an exclusive write lock.
unsafe impl<T: Send> Sync for UncheckedCell<T> {}

/// Reader/writer cell for a `Send` value vouched to have no interior
/// mutability.
pub(crate) type UncheckedLockedCell<T> = RwLock<UncheckedCell<T>>;

/// Exclusive guard on an unchecked reader/writer cell.
pub(crate) struct UncheckedWriteGuard<T>(pub(crate) WriteGuard<UncheckedCell<T>>);

/// Shared guard on an unchecked reader/writer cell.
pub(crate) struct UncheckedReadGuard<T>(pub(crate) ReadGuard<UncheckedCell<T>>);

pub(crate) fn new_locked<T>(value: T) -> Arc<LockedCell<T>> {
    log::trace!("new reader/writer cell for `{}`", type_name::<T>());
    Arc::new(RwLock::new(value))
}

pub(crate) fn new_serialized<T>(value: T) -> Arc<SerializedCell<T>> {
    log::trace!("new serialized cell for `{}`", type_name::<T>());
    Arc::new(Mutex::new(value))
}

pub(crate) fn new_immutable<T>(value: T) -> Arc<ImmutableCell<T>> {
    log::trace!("new immutable cell for `{}`", type_name::<T>());
    Arc::new(ImmutableCell { value })
}

pub(crate) fn new_unchecked<T>(value: T) -> Arc<UncheckedCell<T>> {
    log::trace!("new unchecked immutable cell for `{}`", type_name::<T>());
    Arc::new(UncheckedCell { value })
}

pub(crate) fn new_unchecked_locked<T>(value: T) -> Arc<UncheckedLockedCell<T>> {
    log::trace!("new unchecked reader/writer cell for `{}`", type_name::<T>());
    Arc::new(RwLock::new(UncheckedCell { value }))
}

/// Block until the cell is exclusively locked.
pub(crate) fn acquire_write<T>(cell: &Arc<LockedCell<T>>) -> WriteGuard<T> {
    if let Some(guard) = cell.try_write_arc() {
        return guard;
    }
    log::trace!("exclusive access to {:p} is contended, waiting", Arc::as_ptr(cell));
    cell.write_arc()
}

/// Block until the cell is locked for shared reading.
pub(crate) fn acquire_read<T>(cell: &Arc<LockedCell<T>>) -> ReadGuard<T> {
    if let Some(guard) = cell.try_read_arc() {
        return guard;
    }
    log::trace!("shared access to {:p} is contended, waiting", Arc::as_ptr(cell));
    cell.read_arc()
}

pub(crate) fn acquire_unchecked_write<T>(cell: &Arc<UncheckedLockedCell<T>>) -> UncheckedWriteGuard<T> {
    UncheckedWriteGuard(acquire_write(cell))
}

pub(crate) fn acquire_unchecked_read<T>(cell: &Arc<UncheckedLockedCell<T>>) -> UncheckedReadGuard<T> {
    UncheckedReadGuard(acquire_read(cell))
}

/// Block until the serialized cell is locked.
pub(crate) fn acquire_serialized<T>(cell: &Arc<SerializedCell<T>>) -> SerializedGuard<T> {
    if let Some(guard) = cell.try_lock_arc() {
        return guard;
    }
    log::trace!("serialized access to {:p} is contended, waiting", Arc::as_ptr(cell));
    cell.lock_arc()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guards_keep_the_cell_alive() {
        let cell = new_locked(String::from("held"));
        let guard = acquire_write(&cell);
        drop(cell);
        assert_eq!(&*guard, "held");
        assert_eq!(Arc::strong_count(WriteGuard::rwlock(&guard)), 1);
    }

    #[test]
    fn readers_share_writers_exclude() {
        let cell = new_locked(1);
        let r1 = acquire_read(&cell);
        let r2 = acquire_read(&cell);
        assert!(cell.try_write_arc().is_none());
        drop((r1, r2));

        let w = acquire_write(&cell);
        assert!(cell.try_read_arc().is_none());
        drop(w);
        assert!(cell.try_read_arc().is_some());
    }

    #[test]
    fn unchecked_locked_cell_shares_reads() {
        let cell = new_unchecked_locked(std::cell::Cell::new(3));
        let r1 = acquire_unchecked_read(&cell);
        let r2 = acquire_unchecked_read(&cell);
        assert_eq!(r1.0.value.get() + r2.0.value.get(), 6);
        assert!(cell.try_write_arc().is_none());
        drop((r1, r2));

        let w = acquire_unchecked_write(&cell);
        assert!(cell.try_read_arc().is_none());
        drop(w);
    }

    #[test]
    fn serialized_cell_excludes_everyone() {
        let cell = new_serialized(0u8);
        let g = acquire_serialized(&cell);
        assert!(cell.try_lock_arc().is_none());
        drop(g);
        assert!(cell.try_lock_arc().is_some());
    }
}
