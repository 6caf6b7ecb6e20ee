use thiserror::Error;

/// Error raised when a pointer or access handle is dereferenced while it
/// does not refer to anything.
///
/// The payload names the pointer type that was misused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidAccess {
    /// A nullable ref-counted pointer was dereferenced while null.
    #[error("attempt to dereference null pointer - {0}")]
    Null(&'static str),
    /// An access handle was used after its access was released or moved
    /// out with `take`.
    #[error("attempt to use released access handle - {0}")]
    Released(&'static str),
}
