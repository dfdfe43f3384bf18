use aivis_coord::CoordError;
use aivis_core::StoreError;
use aivis_runtime::SupervisorError;
use thiserror::Error;

/// Errors from the MCP server and its speech backend.
#[derive(Debug, Error)]
pub enum McpServerError {
    #[error("stdio transport failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Coord(#[from] CoordError),

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
}

impl McpServerError {
    /// Whether the coordination store could not be reached.
    pub const fn is_unavailable(&self) -> bool {
        match self {
            Self::Store(e) => e.is_unavailable(),
            Self::Coord(e) => e.is_unavailable(),
            Self::Supervisor(SupervisorError::Coord(e)) => e.is_unavailable(),
            Self::Io(_) | Self::Json(_) | Self::Supervisor(_) => false,
        }
    }
}
