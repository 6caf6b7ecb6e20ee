//! Owner counting with linear tokens.
//!
//! Each owner of a ref-counted cell holds an [`OwnerToken`] minted by that
//! cell's [`OwnerCount`]. Tokens cannot simply be dropped (that panics);
//! releasing an owner hands its token back through [`OwnerCount::release`],
//! which is the only place the count goes down.

use core::cell::Cell;
use core::marker::PhantomData;

/// Zero-sized proof that one owner is registered with a count.
#[must_use = "owner tokens must be handed back with `OwnerCount::release`"]
pub(crate) struct OwnerToken {
    _nosend: PhantomData<*const ()>,
}

impl OwnerToken {
    fn mint() -> Self {
        Self {
            _nosend: PhantomData,
        }
    }
}

impl Drop for OwnerToken {
    fn drop(&mut self) {
        panic!("owner token dropped without being returned to its count");
    }
}

/// Non-atomic owner count stored inline next to the owned value.
pub(crate) struct OwnerCount {
    owners: Cell<usize>,
}

impl OwnerCount {
    /// A count of one, together with the token of that first owner.
    pub(crate) fn with_first_owner() -> (Self, OwnerToken) {
        let count = Self {
            owners: Cell::new(1),
        };
        (count, OwnerToken::mint())
    }

    #[inline]
    pub(crate) fn is_unique(&self) -> bool {
        self.owners.get() == 1
    }

    /// Register one more owner.
    #[inline]
    pub(crate) fn acquire(&self) -> OwnerToken {
        let n = self.owners.get().wrapping_add(1);
        if n == 0 {
            // Same policy as `Rc`.
            std::process::abort();
        }
        self.owners.set(n);
        OwnerToken::mint()
    }

    /// Hand back an owner's token. Returns true if it was the last owner.
    #[inline]
    pub(crate) fn release(&self, token: OwnerToken) -> bool {
        core::mem::forget(token);
        let before = self.owners.get();
        assert!(before > 0, "owner count underflow");
        self.owners.set(before - 1);
        before == 1
    }
}
