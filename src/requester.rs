//! Access requesters: cloneable capabilities that mint access handles.
//!
//! A requester shares ownership of a cell but never holds a lock and never
//! touches the value. Cloning one only bumps the `Arc` count. The value is
//! reachable only through the handles it mints, and the cell is destroyed
//! when the last requester or handle referring to it goes away.
//!
//! Five flavours exist, picked once at construction:
//!
//! | factory | reads | writes | needs |
//! |---|---|---|---|
//! | [`make_shared`] | shared lock | exclusive lock | `T: Send + Sync` to cross threads |
//! | [`make_shared_unchecked`] | shared lock | exclusive lock | `T: Send`, caller-verified |
//! | [`make_shared_serialized`] | exclusive lock | exclusive lock | `T: Send` |
//! | [`make_shared_immutable`] | no lock | impossible | `T: Send + Sync` |
//! | [`make_shared_immutable_unchecked`] | no lock | impossible | `T: Send`, caller-verified |

use crate::cell::{
    self, ImmutableCell, LockedCell, SerializedCell, UncheckedCell, UncheckedLockedCell,
};
use crate::handle::{
    ImmutablePointer, ReadPointer, SerializedConstPointer, SerializedPointer,
    UncheckedImmutablePointer, UncheckedReadPointer, UncheckedWritePointer, WritePointer,
};
use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};
use std::sync::Arc;

/// Wrap `value` in a reader/writer-locked cell.
///
/// ```
/// use rc_shared::make_shared;
///
/// let shared = make_shared(vec![1, 2]);
/// let other = shared.clone();
///
/// other.pointer().push(3);
/// assert_eq!(*shared.const_pointer(), [1, 2, 3]);
/// ```
pub fn make_shared<T>(value: T) -> AccessRequester<T> {
    AccessRequester::new(value)
}

/// Wrap `value` in a reader/writer-locked cell even though `T` is not
/// `Sync`.
///
/// Reads share the lock and run concurrently, writes are exclusive, as
/// with [`make_shared`].
///
/// # Safety
///
/// The caller must guarantee that `T` has no interior mutability: no
/// method reachable through `&T` may mutate anything inside the value.
/// Shared handles on several threads read it at the same time. If the
/// value does mutate itself through `&T`, use [`make_shared_serialized`]
/// instead.
///
/// ```
/// use rc_shared::make_shared_unchecked;
/// use std::cell::Cell;
///
/// // SAFETY: `Cell::set` is never called; writes go through `get_mut`.
/// let shared = unsafe { make_shared_unchecked(Cell::new(1)) };
/// *shared.pointer().get_mut() += 1;
/// assert_eq!(shared.const_pointer().get(), 2);
/// ```
pub unsafe fn make_shared_unchecked<T>(value: T) -> UncheckedAccessRequester<T> {
    UncheckedAccessRequester {
        cell: cell::new_unchecked_locked(value),
    }
}

/// Wrap `value` in a cell whose reads and writes are both exclusive.
///
/// Use this for values that mutate themselves through a shared reference
/// (`Cell`, `RefCell` and the like); they are `Send` but not `Sync`, so a
/// shared read lock would not be enough.
pub fn make_shared_serialized<T>(value: T) -> SerializedAccessRequester<T> {
    SerializedAccessRequester::new(value)
}

/// Wrap `value` in a cell that can only ever be read, without locking.
///
/// ```
/// use rc_shared::make_shared_immutable;
///
/// let table = make_shared_immutable([2, 3, 5, 7]);
/// let reader = table.clone();
/// let handle = std::thread::spawn(move || reader.const_pointer().iter().sum::<i32>());
/// assert_eq!(handle.join().unwrap(), 17);
/// ```
pub fn make_shared_immutable<T>(value: T) -> ImmutableAccessRequester<T> {
    ImmutableAccessRequester::new(value)
}

/// Wrap `value` in a lock-free read-only cell even though `T` is not
/// `Sync`.
///
/// # Safety
///
/// The caller must guarantee that `T` has no interior mutability: no
/// method reachable through `&T` may mutate anything inside the value
/// (no `Cell`, `RefCell`, `Rc`, unsynchronized raw-pointer writes, ...).
/// Reads will happen concurrently from any number of threads without a
/// lock. Prefer [`make_shared_immutable`], which lets the compiler check
/// this through `T: Sync`.
pub unsafe fn make_shared_immutable_unchecked<T>(value: T) -> UncheckedImmutableAccessRequester<T> {
    UncheckedImmutableAccessRequester {
        cell: cell::new_unchecked(value),
    }
}

/// Requester for a value behind a reader/writer lock.
pub struct AccessRequester<T> {
    cell: Arc<LockedCell<T>>,
}

impl<T> AccessRequester<T> {
    pub fn new(value: T) -> Self {
        Self {
            cell: cell::new_locked(value),
        }
    }

    /// Build the value with `f` and wrap it. An error from `f` is returned
    /// unchanged and no cell is created.
    pub fn try_new_with<E, F>(f: F) -> Result<Self, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        Ok(Self::new(f()?))
    }

    /// Block until exclusive access is granted.
    pub fn pointer(&self) -> WritePointer<T> {
        WritePointer::new(cell::acquire_write(&self.cell))
    }

    /// Block until shared read access is granted.
    pub fn const_pointer(&self) -> ReadPointer<T> {
        ReadPointer::new(cell::acquire_read(&self.cell))
    }
}

/// Requester for a value whose reads and writes are serialized by one
/// exclusive lock.
pub struct SerializedAccessRequester<T> {
    cell: Arc<SerializedCell<T>>,
}

impl<T> SerializedAccessRequester<T> {
    pub fn new(value: T) -> Self {
        Self {
            cell: cell::new_serialized(value),
        }
    }

    /// Build the value with `f` and wrap it. An error from `f` is returned
    /// unchanged and no cell is created.
    pub fn try_new_with<E, F>(f: F) -> Result<Self, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        Ok(Self::new(f()?))
    }

    /// Block until exclusive access is granted.
    pub fn pointer(&self) -> SerializedPointer<T> {
        SerializedPointer::new(cell::acquire_serialized(&self.cell))
    }

    /// Block until exclusive access is granted, for reading only.
    pub fn const_pointer(&self) -> SerializedConstPointer<T> {
        SerializedConstPointer::new(cell::acquire_serialized(&self.cell))
    }
}

/// Requester for a value that is never mutated after construction.
///
/// There is no `pointer()`: no mutable handle can exist for this cell,
/// which is what makes lock-free reads sound.
pub struct ImmutableAccessRequester<T> {
    cell: Arc<ImmutableCell<T>>,
}

impl<T> ImmutableAccessRequester<T> {
    pub fn new(value: T) -> Self {
        Self {
            cell: cell::new_immutable(value),
        }
    }

    /// Build the value with `f` and wrap it; an error from `f` is returned
    /// as is.
    pub fn try_new_with<E, F>(f: F) -> Result<Self, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        Ok(Self::new(f()?))
    }

    /// Read access. Never blocks.
    pub fn const_pointer(&self) -> ImmutablePointer<T> {
        ImmutablePointer::new(self.cell.clone())
    }
}

/// Requester created by [`make_shared_unchecked`].
pub struct UncheckedAccessRequester<T> {
    cell: Arc<UncheckedLockedCell<T>>,
}

impl<T> UncheckedAccessRequester<T> {
    /// Block until exclusive access is granted.
    pub fn pointer(&self) -> UncheckedWritePointer<T> {
        UncheckedWritePointer::new(cell::acquire_unchecked_write(&self.cell))
    }

    /// Block until shared read access is granted.
    pub fn const_pointer(&self) -> UncheckedReadPointer<T> {
        UncheckedReadPointer::new(cell::acquire_unchecked_read(&self.cell))
    }
}

/// Requester created by [`make_shared_immutable_unchecked`].
pub struct UncheckedImmutableAccessRequester<T> {
    cell: Arc<UncheckedCell<T>>,
}

impl<T> UncheckedImmutableAccessRequester<T> {
    /// Read access. Never blocks.
    pub fn const_pointer(&self) -> UncheckedImmutablePointer<T> {
        UncheckedImmutablePointer::new(self.cell.clone())
    }
}

// Requesters are cheap to clone, compare by cell identity and never print
// or lock the value.
macro_rules! requester_common {
    ($($name:ident),* $(,)?) => {$(
        impl<T> $name<T> {
            /// True if both requesters share the same cell.
            pub fn ptr_eq(&self, other: &Self) -> bool {
                Arc::ptr_eq(&self.cell, &other.cell)
            }

            fn addr(&self) -> *const () {
                Arc::as_ptr(&self.cell).cast()
            }
        }

        impl<T> Clone for $name<T> {
            fn clone(&self) -> Self {
                Self {
                    cell: Arc::clone(&self.cell),
                }
            }
        }

        impl<T> PartialEq for $name<T> {
            fn eq(&self, other: &Self) -> bool {
                self.ptr_eq(other)
            }
        }

        impl<T> Eq for $name<T> {}

        impl<T> PartialOrd for $name<T> {
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        }

        impl<T> Ord for $name<T> {
            fn cmp(&self, other: &Self) -> Ordering {
                self.addr().cmp(&other.addr())
            }
        }

        impl<T> Hash for $name<T> {
            fn hash<H: Hasher>(&self, state: &mut H) {
                (self.addr() as usize).hash(state);
            }
        }

        impl<T> fmt::Debug for $name<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("cell", &self.addr())
                    .finish_non_exhaustive()
            }
        }
    )*};
}

requester_common!(
    AccessRequester,
    UncheckedAccessRequester,
    SerializedAccessRequester,
    ImmutableAccessRequester,
    UncheckedImmutableAccessRequester,
);
