use thiserror::Error;

/// Misuse of a [`Shared`](crate::Shared) handle
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessError {
    #[error("Access through an empty shared handle.")]
    Empty,

    #[error("Index {index} is out of bounds for a shared array of size {size}.")]
    OutOfBounds { index: usize, size: usize },

    #[error("Mutable access requires a unique owner, but {count} handles share the value.")]
    Shared { count: usize },
}

impl AccessError {
    #[cold]
    pub(crate) fn out_of_bounds(index: usize, size: usize) -> Self {
        AccessError::OutOfBounds { index, size }
    }

    #[cold]
    pub(crate) fn shared(count: usize) -> Self {
        AccessError::Shared { count }
    }
}
