//! rc-shared: safe sharing of state between owners, on one thread or many.
//!
//! Internal Design:
//!
//! Summary
//! - Two families of owning handles, one per threading model:
//!   - `RefCountedPtr` and friends: single-threaded, intrusively
//!     ref-counted pointers. Construction only through `make`, null
//!     dereference reported as `InvalidAccess` instead of undefined
//!     behaviour.
//!   - `AccessRequester` and friends: cross-thread shared ownership of a
//!     cell plus a lock. Requesters mint short-lived access handles that
//!     hold the lock for exactly their own lifetime.
//!
//! Layers
//! - `tokens` (private): non-atomic `OwnerCount` and the linear
//!   `OwnerToken` each owner carries; a token must be returned to its
//!   count, never dropped. The count itself is never exposed.
//! - `ref_counted`: one private owner core (cell pointer + token) wrapped
//!   by the nullable, not-null and fixed pointer types.
//! - `cell`: `Arc`-allocated cells (reader/writer locked, serialized,
//!   immutable, plus the caller-vouched unchecked variants of the first and
//!   last) and the acquisition protocol.
//! - `handle`: the Locked/Released state machine and the handle types.
//! - `requester`: cloneable capabilities and the `make_shared*` factories.
//!
//! Constraints
//! - A handle cannot be obtained without its lock, cannot be cloned and
//!   cannot outlive its lock: handles own their guards, and the guards own
//!   the cell.
//! - The protected value is dropped exactly once, when the last requester
//!   or handle goes away.
//! - Immutable cells have no lock and no way to mint a mutable handle, so
//!   their reads never block.
//! - Ref-counted pointers are `!Send`/`!Sync` (no atomics).
//!
//! Locking policy
//! - `parking_lot` locks: task-fair, eventually fair, not poisoned. A
//!   reader queues behind a waiting writer, so taking `const_pointer()`
//!   twice on one thread while a writer waits deadlocks.
//! - Requests block indefinitely; there are no timeouts.
//!
//! Overflow semantics
//! - Owner count overflow aborts, matching `Rc`. Underflow is a bug in this
//!   crate and panics.
//!
//! Notes and non-goals
//! - No deadlock detection, lock upgrade/downgrade or condition variables.
//! - No weak pointers.
//! - Handles are `!Send` unless the `send_handles` feature is enabled: a
//!   lock is released on the thread that took it.

mod cell;
mod error;
mod handle;
mod ref_counted;
mod requester;
mod tokens;

// Public surface
pub use error::InvalidAccess;
pub use handle::{
    ImmutablePointer, ReadPointer, SerializedConstPointer, SerializedPointer,
    UncheckedImmutablePointer, UncheckedReadPointer, UncheckedWritePointer, WritePointer,
};
pub use ref_counted::{make_refcounted, RefCountedFixedPtr, RefCountedNotNullPtr, RefCountedPtr};
pub use requester::{
    make_shared, make_shared_immutable, make_shared_immutable_unchecked, make_shared_serialized,
    make_shared_unchecked, AccessRequester, ImmutableAccessRequester, SerializedAccessRequester,
    UncheckedAccessRequester, UncheckedImmutableAccessRequester,
};
