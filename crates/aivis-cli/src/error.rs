//! CLI error type and its exit codes.

use aivis_coord::CoordError;
use aivis_core::{CoreError, PathError, SettingsError, SpeechError, StoreError};
use aivis_mcp::McpServerError;
use aivis_runtime::SupervisorError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    /// Failure with no more specific category.
    #[error("{0}")]
    General(String),

    /// Bad arguments.
    #[error("Invalid arguments: {0}")]
    Usage(String),

    /// The coordination store could not be reached.
    #[error("{0}")]
    Unavailable(String),

    /// File or stream I/O.
    #[error("IO error: {0}")]
    Io(String),

    /// Missing or unusable configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CliError {
    /// Exit code, following sysexits.h where a category fits.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::General(_) => 1,
            Self::Usage(_) => 2,        // EX_USAGE
            Self::Unavailable(_) => 69, // EX_UNAVAILABLE
            Self::Io(_) => 74,          // EX_IOERR
            Self::Config(_) => 78,      // EX_CONFIG
        }
    }
}

impl From<StoreError> for CliError {
    fn from(err: StoreError) -> Self {
        if err.is_unavailable() {
            Self::Unavailable(err.to_string())
        } else {
            Self::General(err.to_string())
        }
    }
}

impl From<CoordError> for CliError {
    fn from(err: CoordError) -> Self {
        match err {
            CoordError::Store(store) => store.into(),
            other => Self::General(other.to_string()),
        }
    }
}

impl From<SupervisorError> for CliError {
    fn from(err: SupervisorError) -> Self {
        match err {
            SupervisorError::Coord(coord) => coord.into(),
            SupervisorError::Spawn(io) => Self::Io(format!("failed to start worker: {io}")),
        }
    }
}

impl From<SpeechError> for CliError {
    fn from(err: SpeechError) -> Self {
        match err {
            SpeechError::MissingApiKey => Self::Config(err.to_string()),
            SpeechError::Io(io) => Self::Io(io.to_string()),
            other => Self::General(other.to_string()),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Store(store) => store.into(),
            CoreError::Speech(speech) => speech.into(),
            CoreError::Settings(settings) => settings.into(),
            CoreError::Path(path) => path.into(),
            CoreError::Validation(msg) => Self::Usage(msg),
            CoreError::Configuration(msg) => Self::Config(msg),
            CoreError::Internal(msg) => Self::General(msg),
        }
    }
}

impl From<SettingsError> for CliError {
    fn from(err: SettingsError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<PathError> for CliError {
    fn from(err: PathError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<McpServerError> for CliError {
    fn from(err: McpServerError) -> Self {
        match err {
            McpServerError::Io(io) => Self::Io(io.to_string()),
            McpServerError::Store(store) => store.into(),
            McpServerError::Coord(coord) => coord.into(),
            McpServerError::Supervisor(sup) => sup.into(),
            McpServerError::Json(json) => Self::General(json.to_string()),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        Self::General(format!("{err:#}"))
    }
}
