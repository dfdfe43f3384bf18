use aivis_core::StoreError;
use thiserror::Error;

/// Errors raised by the coordination primitives.
#[derive(Debug, Error)]
pub enum CoordError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A queue item could not be encoded, or a popped item could not be
    /// decoded. A popped item is already consumed when this is returned.
    #[error("Malformed queue item: {0}")]
    Payload(String),
}

impl CoordError {
    /// Whether the store itself is unreachable.
    pub const fn is_unavailable(&self) -> bool {
        match self {
            Self::Store(e) => e.is_unavailable(),
            Self::Payload(_) => false,
        }
    }
}
