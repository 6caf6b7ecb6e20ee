//! Scoped access handles.
//!
//! A handle is either *Locked* (it owns a grant: an owned lock guard, or
//! for immutable cells just the `Arc`) or *Released*. It becomes Released
//! exactly once, by being dropped, by [`release`], or by being the source
//! of [`take`]. `take` moves the grant without unlocking, so the lock is
//! held continuously across the transfer.
//!
//! Using a Released handle is reported as [`InvalidAccess::Released`] by
//! `try_get`, and as a panic carrying that message by `Deref`. Handles are
//! never `Clone`: a second copy of a write guard would break the
//! single-writer rule.
//!
//! [`release`]: WritePointer::release
//! [`take`]: WritePointer::take

use crate::cell::{
    ImmutableCell, ReadGuard, SerializedGuard, UncheckedCell, UncheckedReadGuard,
    UncheckedWriteGuard, WriteGuard,
};
use crate::error::InvalidAccess;
use core::any::type_name;
use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::ops::{Deref, DerefMut};
use core::ptr;
use std::sync::Arc;

/// Something that grants access to a cell's value while it is owned.
pub(crate) trait Grant {
    type Target;

    fn target(&self) -> &Self::Target;

    /// Identity of the granting cell.
    fn cell(&self) -> *const ();
}

/// A grant that allows mutation.
pub(crate) trait GrantMut: Grant {
    fn target_mut(&mut self) -> &mut Self::Target;
}

impl<T> Grant for WriteGuard<T> {
    type Target = T;

    fn target(&self) -> &T {
        &**self
    }

    fn cell(&self) -> *const () {
        Arc::as_ptr(WriteGuard::rwlock(self)).cast()
    }
}

impl<T> GrantMut for WriteGuard<T> {
    fn target_mut(&mut self) -> &mut T {
        &mut **self
    }
}

impl<T> Grant for ReadGuard<T> {
    type Target = T;

    fn target(&self) -> &T {
        &**self
    }

    fn cell(&self) -> *const () {
        Arc::as_ptr(ReadGuard::rwlock(self)).cast()
    }
}

impl<T> Grant for SerializedGuard<T> {
    type Target = T;

    fn target(&self) -> &T {
        &**self
    }

    fn cell(&self) -> *const () {
        Arc::as_ptr(SerializedGuard::mutex(self)).cast()
    }
}

impl<T> GrantMut for SerializedGuard<T> {
    fn target_mut(&mut self) -> &mut T {
        &mut **self
    }
}

impl<T> Grant for UncheckedWriteGuard<T> {
    type Target = T;

    fn target(&self) -> &T {
        &self.0.value
    }

    fn cell(&self) -> *const () {
        Arc::as_ptr(WriteGuard::rwlock(&self.0)).cast()
    }
}

impl<T> GrantMut for UncheckedWriteGuard<T> {
    fn target_mut(&mut self) -> &mut T {
        &mut self.0.value
    }
}

impl<T> Grant for UncheckedReadGuard<T> {
    type Target = T;

    fn target(&self) -> &T {
        &self.0.value
    }

    fn cell(&self) -> *const () {
        Arc::as_ptr(ReadGuard::rwlock(&self.0)).cast()
    }
}

impl<T> Grant for Arc<ImmutableCell<T>> {
    type Target = T;

    fn target(&self) -> &T {
        &self.value
    }

    fn cell(&self) -> *const () {
        Arc::as_ptr(self).cast()
    }
}

impl<T> Grant for Arc<UncheckedCell<T>> {
    type Target = T;

    fn target(&self) -> &T {
        &self.value
    }

    fn cell(&self) -> *const () {
        Arc::as_ptr(self).cast()
    }
}

/// The Locked/Released state machine shared by all handle types.
pub(crate) struct Scoped<G> {
    grant: Option<G>,
}

impl<G: Grant> Scoped<G> {
    pub(crate) fn locked(grant: G) -> Self {
        Self { grant: Some(grant) }
    }

    fn is_locked(&self) -> bool {
        self.grant.is_some()
    }

    fn get(&self, kind: &'static str) -> Result<&G::Target, InvalidAccess> {
        self.grant
            .as_ref()
            .map(Grant::target)
            .ok_or(InvalidAccess::Released(kind))
    }

    fn take(&mut self) -> Self {
        Self {
            grant: self.grant.take(),
        }
    }

    fn release(&mut self) {
        self.grant = None;
    }

    fn cell(&self) -> *const () {
        self.grant.as_ref().map_or(ptr::null(), Grant::cell)
    }
}

impl<G: GrantMut> Scoped<G> {
    fn get_mut(&mut self, kind: &'static str) -> Result<&mut G::Target, InvalidAccess> {
        self.grant
            .as_mut()
            .map(GrantMut::target_mut)
            .ok_or(InvalidAccess::Released(kind))
    }
}

macro_rules! access_handle {
    ($(#[$meta:meta])* $name:ident, $grant:ident) => {
        $(#[$meta])*
        pub struct $name<T> {
            inner: Scoped<$grant<T>>,
        }

        impl<T> $name<T> {
            pub(crate) fn new(grant: $grant<T>) -> Self {
                Self {
                    inner: Scoped::locked(grant),
                }
            }

            /// True while this handle holds its access.
            pub fn is_valid(&self) -> bool {
                self.inner.is_locked()
            }

            /// Borrow the value, or report that this handle was released.
            pub fn try_get(&self) -> Result<&T, InvalidAccess> {
                self.inner.get(type_name::<Self>())
            }

            /// Move the access into a new handle, leaving this one
            /// released. The lock is not dropped in between.
            pub fn take(&mut self) -> Self {
                Self {
                    inner: self.inner.take(),
                }
            }

            /// Give up the access now instead of at the end of scope.
            pub fn release(&mut self) {
                self.inner.release();
            }

            /// True if both handles grant access to the same cell. Two
            /// released handles are considered equal.
            pub fn ptr_eq(&self, other: &Self) -> bool {
                ptr::eq(self.inner.cell(), other.inner.cell())
            }
        }

        impl<T> Deref for $name<T> {
            type Target = T;

            /// # Panics
            ///
            /// Panics with [`InvalidAccess::Released`] if the handle was
            /// released or moved out of.
            fn deref(&self) -> &T {
                match self.try_get() {
                    Ok(value) => value,
                    Err(e) => panic!("{}", e),
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
                self.inner.cell().cmp(&other.inner.cell())
            }
        }

        impl<T> Hash for $name<T> {
            fn hash<H: Hasher>(&self, state: &mut H) {
                (self.inner.cell() as usize).hash(state);
            }
        }

        impl<T: fmt::Debug> fmt::Debug for $name<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self.try_get() {
                    Ok(value) => f.debug_tuple(stringify!($name)).field(value).finish(),
                    Err(_) => write!(f, "{}(<released>)", stringify!($name)),
                }
            }
        }
    };
}

macro_rules! access_handle_mut {
    ($name:ident) => {
        impl<T> $name<T> {
            /// Mutably borrow the value, or report that this handle was
            /// released.
            pub fn try_get_mut(&mut self) -> Result<&mut T, InvalidAccess> {
                self.inner.get_mut(type_name::<Self>())
            }
        }

        impl<T> DerefMut for $name<T> {
            /// # Panics
            ///
            /// Panics with [`InvalidAccess::Released`] if the handle was
            /// released or moved out of.
            fn deref_mut(&mut self) -> &mut T {
                match self.try_get_mut() {
                    Ok(value) => value,
                    Err(e) => panic!("{}", e),
                }
            }
        }
    };
}

type ImmutableGrant<T> = Arc<ImmutableCell<T>>;
type UncheckedGrant<T> = Arc<UncheckedCell<T>>;

access_handle! {
    /// Exclusive, mutable access to the value of an [`AccessRequester`].
    ///
    /// While it is Locked no other handle to the same cell exists.
    ///
    /// [`AccessRequester`]: crate::AccessRequester
    WritePointer, WriteGuard
}
access_handle_mut!(WritePointer);

access_handle! {
    /// Shared, read-only access to the value of an [`AccessRequester`].
    ///
    /// Any number may coexist; none coexist with a [`WritePointer`].
    ///
    /// [`AccessRequester`]: crate::AccessRequester
    ReadPointer, ReadGuard
}

access_handle! {
    /// Exclusive, mutable access to the value of a
    /// [`SerializedAccessRequester`].
    ///
    /// [`SerializedAccessRequester`]: crate::SerializedAccessRequester
    SerializedPointer, SerializedGuard
}
access_handle_mut!(SerializedPointer);

access_handle! {
    /// Read-only access to the value of a [`SerializedAccessRequester`].
    ///
    /// It still holds the exclusive lock: the value may mutate itself
    /// through a shared reference, so reads are serialized too.
    ///
    /// [`SerializedAccessRequester`]: crate::SerializedAccessRequester
    SerializedConstPointer, SerializedGuard
}

access_handle! {
    /// Exclusive, mutable access to the value of an
    /// [`UncheckedAccessRequester`].
    ///
    /// [`UncheckedAccessRequester`]: crate::UncheckedAccessRequester
    UncheckedWritePointer, UncheckedWriteGuard
}
access_handle_mut!(UncheckedWritePointer);

access_handle! {
    /// Shared, read-only access to the value of an
    /// [`UncheckedAccessRequester`]. Coexists with other readers of the
    /// same cell, never with an [`UncheckedWritePointer`].
    ///
    /// [`UncheckedAccessRequester`]: crate::UncheckedAccessRequester
    UncheckedReadPointer, UncheckedReadGuard
}

access_handle! {
    /// Lock-free, read-only access to the value of an
    /// [`ImmutableAccessRequester`].
    ///
    /// [`ImmutableAccessRequester`]: crate::ImmutableAccessRequester
    ImmutablePointer, ImmutableGrant
}

access_handle! {
    /// Lock-free, read-only access to the value of an
    /// [`UncheckedImmutableAccessRequester`].
    ///
    /// [`UncheckedImmutableAccessRequester`]: crate::UncheckedImmutableAccessRequester
    UncheckedImmutablePointer, UncheckedGrant
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{
        acquire_read, acquire_unchecked_read, acquire_unchecked_write, acquire_write,
        new_immutable, new_locked, new_unchecked_locked,
    };

    #[test]
    fn take_transfers_without_unlocking() {
        let cell = new_locked(7);
        let mut first = WritePointer::new(acquire_write(&cell));
        let second = first.take();

        assert!(!first.is_valid());
        assert!(second.is_valid());
        assert!(cell.try_read_arc().is_none(), "lock must stay held");
        assert_eq!(
            first.try_get(),
            Err(InvalidAccess::Released(type_name::<WritePointer<i32>>()))
        );
        assert_eq!(*second, 7);

        // Dropping the released source does nothing.
        drop(first);
        assert!(cell.try_read_arc().is_none());
        drop(second);
        assert!(cell.try_read_arc().is_some());
    }

    #[test]
    fn release_unlocks_early() {
        let cell = new_locked(String::new());
        let mut w = WritePointer::new(acquire_write(&cell));
        w.push_str("abc");
        w.release();
        assert!(!w.is_valid());
        assert!(w.try_get_mut().is_err());

        let r = ReadPointer::new(acquire_read(&cell));
        assert_eq!(r.as_str(), "abc");
    }

    #[test]
    fn unchecked_write_then_read() {
        let cell = new_unchecked_locked(std::cell::Cell::new(1u8));
        let mut w = UncheckedWritePointer::new(acquire_unchecked_write(&cell));
        *w.get_mut() = 9;
        assert!(cell.try_read_arc().is_none());
        w.release();

        let r1 = UncheckedReadPointer::new(acquire_unchecked_read(&cell));
        let r2 = UncheckedReadPointer::new(acquire_unchecked_read(&cell));
        assert_eq!(r1.get(), 9);
        assert_eq!(r1, r2);
    }

    #[test]
    fn released_deref_panics() {
        let cell = new_immutable(1u32);
        let mut p = ImmutablePointer::new(cell.clone());
        let _moved = p.take();
        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| *p));
        assert!(res.is_err());
    }

    #[test]
    fn identity_follows_cell() {
        let a = new_immutable('a');
        let b = new_immutable('b');
        let pa = ImmutablePointer::new(a.clone());
        let pa2 = ImmutablePointer::new(a);
        let mut pb = ImmutablePointer::new(b);
        assert_eq!(pa, pa2);
        assert_ne!(pa, pb);

        let _ = pb.take();
        let mut released = ImmutablePointer::new(new_immutable('c'));
        released.release();
        assert_eq!(pb, released);
        assert!(pb < pa);
    }

    #[test]
    fn debug_never_shows_released_value() {
        let mut p = ImmutablePointer::new(new_immutable(3));
        assert_eq!(format!("{:?}", p), "ImmutablePointer(3)");
        p.release();
        assert_eq!(format!("{:?}", p), "ImmutablePointer(<released>)");
    }
}
