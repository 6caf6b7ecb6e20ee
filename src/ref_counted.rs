//! Single-threaded, intrusively ref-counted owning pointers.
//!
//! A cell holds the value and its [`OwnerCount`] in one allocation. Every
//! pointer that refers to the cell is one registered owner and carries the
//! linear token minted for it; releasing an owner returns the token and
//! frees the cell when that owner was the last.
//!
//! Three pointer types share one owner core and differ only in what they
//! allow:
//! - [`RefCountedPtr`] may be null; dereferencing null is reported as
//!   [`InvalidAccess::Null`].
//! - [`RefCountedNotNullPtr`] always has a target but can be pointed at
//!   another one.
//! - [`RefCountedFixedPtr`] always has a target and offers no way to
//!   retarget it.
//!
//! None of them can be built from a raw pointer, and all are `!Send` and
//! `!Sync`: the count is not atomic. Use [`crate::AccessRequester`] to
//! share state across threads.

use crate::error::InvalidAccess;
use crate::tokens::{OwnerCount, OwnerToken};
use core::any::type_name;
use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;
use core::mem::ManuallyDrop;
use core::ops::Deref;
use core::ptr::{self, NonNull};

struct RefCountedCell<T> {
    count: OwnerCount,
    value: T,
}

/// One registered owner of a cell.
struct Owner<T> {
    cell: NonNull<RefCountedCell<T>>,
    token: ManuallyDrop<OwnerToken>,
    _owns: PhantomData<RefCountedCell<T>>,
    // !Send + !Sync: the count is not atomic.
    _nosend: PhantomData<*mut ()>,
}

impl<T> Owner<T> {
    fn new(value: T) -> Self {
        let (count, token) = OwnerCount::with_first_owner();
        let cell = Box::new(RefCountedCell { count, value });
        Self {
            cell: NonNull::from(Box::leak(cell)),
            token: ManuallyDrop::new(token),
            _owns: PhantomData,
            _nosend: PhantomData,
        }
    }

    #[inline]
    fn cell(&self) -> &RefCountedCell<T> {
        // SAFETY: the cell stays allocated while this owner's token is outstanding.
        unsafe { self.cell.as_ref() }
    }

    #[inline]
    fn value(&self) -> &T {
        &self.cell().value
    }

    fn value_mut(&mut self) -> Option<&mut T> {
        if !self.cell().count.is_unique() {
            return None;
        }
        // SAFETY: sole owner, borrowed mutably; no other reference into the cell exists.
        Some(unsafe { &mut (*self.cell.as_ptr()).value })
    }

    #[inline]
    fn is_unique(&self) -> bool {
        self.cell().count.is_unique()
    }

    #[inline]
    fn addr(&self) -> *const () {
        self.cell.as_ptr() as *const ()
    }
}

impl<T> Clone for Owner<T> {
    fn clone(&self) -> Self {
        let token = self.cell().count.acquire();
        Self {
            cell: self.cell,
            token: ManuallyDrop::new(token),
            _owns: PhantomData,
            _nosend: PhantomData,
        }
    }
}

impl<T> Drop for Owner<T> {
    fn drop(&mut self) {
        // SAFETY: the token is taken exactly once, here.
        let token = unsafe { ManuallyDrop::take(&mut self.token) };
        if self.cell().count.release(token) {
            // The count update is complete before the value's own Drop runs,
            // which may release owners of other cells.
            // SAFETY: this was the final owner, nothing else refers to the cell.
            drop(unsafe { Box::from_raw(self.cell.as_ptr()) });
        }
    }
}

/// Allocate `value` in a new cell and return its first owner.
///
/// The fixed pointer converts into the retargetable and nullable variants
/// with `into()`.
///
/// ```
/// use rc_shared::{make_refcounted, RefCountedPtr};
///
/// let fixed = make_refcounted(3);
/// let mut nullable: RefCountedPtr<i32> = fixed.clone().into();
/// assert_eq!(*nullable, 3);
/// nullable.clear();
/// assert!(nullable.is_null());
/// ```
pub fn make_refcounted<T>(value: T) -> RefCountedFixedPtr<T> {
    RefCountedFixedPtr::make(value)
}

/// Nullable ref-counted pointer.
pub struct RefCountedPtr<T> {
    owner: Option<Owner<T>>,
}

impl<T> RefCountedPtr<T> {
    /// Allocate a new cell holding `value`.
    pub fn make(value: T) -> Self {
        Self {
            owner: Some(Owner::new(value)),
        }
    }

    /// A pointer with no target.
    pub const fn null() -> Self {
        Self { owner: None }
    }

    pub fn is_null(&self) -> bool {
        self.owner.is_none()
    }

    /// Borrow the target, or `None` if null.
    pub fn get(&self) -> Option<&T> {
        self.owner.as_ref().map(Owner::value)
    }

    /// Borrow the target, reporting a null pointer as an error.
    pub fn try_get(&self) -> Result<&T, InvalidAccess> {
        self.get()
            .ok_or(InvalidAccess::Null(type_name::<Self>()))
    }

    /// Mutably borrow the target if this pointer is its only owner.
    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.owner.as_mut().and_then(Owner::value_mut)
    }

    /// True if no other pointer shares the target. A null pointer is
    /// considered unique.
    pub fn is_unique(&self) -> bool {
        self.owner.as_ref().map_or(true, Owner::is_unique)
    }

    /// Release the target and become null.
    pub fn clear(&mut self) {
        self.owner = None;
    }

    /// Point at the target of `src`.
    ///
    /// The current target is released before `src`'s target is acquired.
    /// Assigning a pointer to itself (or to an alias of the same cell) is a
    /// no-op.
    pub fn assign(&mut self, src: &Self) {
        if self.ptr_eq(src) {
            return;
        }
        self.owner = None;
        self.owner = src.owner.clone();
    }

    /// True if both pointers share a target, or both are null.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        ptr::eq(self.addr(), other.addr())
    }

    fn addr(&self) -> *const () {
        self.owner.as_ref().map_or(ptr::null(), Owner::addr)
    }
}

impl<T> Default for RefCountedPtr<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T> Clone for RefCountedPtr<T> {
    fn clone(&self) -> Self {
        Self {
            owner: self.owner.clone(),
        }
    }
}

impl<T> Deref for RefCountedPtr<T> {
    type Target = T;

    /// # Panics
    ///
    /// Panics with [`InvalidAccess::Null`] if the pointer is null.
    fn deref(&self) -> &T {
        match self.try_get() {
            Ok(value) => value,
            Err(e) => panic!("{}", e),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for RefCountedPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => f.debug_tuple("RefCountedPtr").field(value).finish(),
            None => f.write_str("RefCountedPtr(null)"),
        }
    }
}

/// Ref-counted pointer that always has a target.
pub struct RefCountedNotNullPtr<T> {
    owner: Owner<T>,
}

impl<T> RefCountedNotNullPtr<T> {
    pub fn make(value: T) -> Self {
        Self {
            owner: Owner::new(value),
        }
    }

    /// Mutably borrow the target if this pointer is its only owner.
    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.owner.value_mut()
    }

    pub fn is_unique(&self) -> bool {
        self.owner.is_unique()
    }

    /// Point at the target of `src`, releasing the current target once the
    /// new one is held.
    pub fn assign(&mut self, src: &Self) {
        if !self.ptr_eq(src) {
            self.owner = src.owner.clone();
        }
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        ptr::eq(self.addr(), other.addr())
    }

    fn addr(&self) -> *const () {
        self.owner.addr()
    }
}

impl<T> Clone for RefCountedNotNullPtr<T> {
    fn clone(&self) -> Self {
        Self {
            owner: self.owner.clone(),
        }
    }
}

impl<T> Deref for RefCountedNotNullPtr<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.owner.value()
    }
}

impl<T: fmt::Debug> fmt::Debug for RefCountedNotNullPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RefCountedNotNullPtr")
            .field(self.owner.value())
            .finish()
    }
}

/// Ref-counted pointer that always has a target and cannot be retargeted.
///
/// Recommended for passing shared values as parameters.
pub struct RefCountedFixedPtr<T> {
    owner: Owner<T>,
}

impl<T> RefCountedFixedPtr<T> {
    pub fn make(value: T) -> Self {
        Self {
            owner: Owner::new(value),
        }
    }

    /// Mutably borrow the target if this pointer is its only owner.
    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.owner.value_mut()
    }

    pub fn is_unique(&self) -> bool {
        self.owner.is_unique()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        ptr::eq(self.addr(), other.addr())
    }

    fn addr(&self) -> *const () {
        self.owner.addr()
    }
}

impl<T> Clone for RefCountedFixedPtr<T> {
    fn clone(&self) -> Self {
        Self {
            owner: self.owner.clone(),
        }
    }
}

impl<T> Deref for RefCountedFixedPtr<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.owner.value()
    }
}

impl<T: fmt::Debug> fmt::Debug for RefCountedFixedPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RefCountedFixedPtr")
            .field(self.owner.value())
            .finish()
    }
}

impl<T> From<RefCountedNotNullPtr<T>> for RefCountedPtr<T> {
    fn from(p: RefCountedNotNullPtr<T>) -> Self {
        Self {
            owner: Some(p.owner),
        }
    }
}

impl<T> From<RefCountedFixedPtr<T>> for RefCountedPtr<T> {
    fn from(p: RefCountedFixedPtr<T>) -> Self {
        Self {
            owner: Some(p.owner),
        }
    }
}

impl<T> From<RefCountedFixedPtr<T>> for RefCountedNotNullPtr<T> {
    fn from(p: RefCountedFixedPtr<T>) -> Self {
        Self { owner: p.owner }
    }
}

impl<T> TryFrom<RefCountedPtr<T>> for RefCountedNotNullPtr<T> {
    type Error = InvalidAccess;

    fn try_from(p: RefCountedPtr<T>) -> Result<Self, InvalidAccess> {
        match p.owner {
            Some(owner) => Ok(Self { owner }),
            None => Err(InvalidAccess::Null(type_name::<RefCountedPtr<T>>())),
        }
    }
}

impl<T> TryFrom<RefCountedPtr<T>> for RefCountedFixedPtr<T> {
    type Error = InvalidAccess;

    fn try_from(p: RefCountedPtr<T>) -> Result<Self, InvalidAccess> {
        match p.owner {
            Some(owner) => Ok(Self { owner }),
            None => Err(InvalidAccess::Null(type_name::<RefCountedPtr<T>>())),
        }
    }
}

// Pointers compare, order and hash by target identity, never by value.
macro_rules! impl_identity {
    ($($ty:ident),* $(,)?) => {$(
        impl<T> PartialEq for $ty<T> {
            fn eq(&self, other: &Self) -> bool {
                self.ptr_eq(other)
            }
        }

        impl<T> Eq for $ty<T> {}

        impl<T> PartialOrd for $ty<T> {
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        }

        impl<T> Ord for $ty<T> {
            fn cmp(&self, other: &Self) -> Ordering {
                self.addr().cmp(&other.addr())
            }
        }

        impl<T> Hash for $ty<T> {
            fn hash<H: Hasher>(&self, state: &mut H) {
                (self.addr() as usize).hash(state);
            }
        }
    )*};
}

impl_identity!(RefCountedPtr, RefCountedNotNullPtr, RefCountedFixedPtr);
