//! MCP server for aivis-mcp.
//!
//! Speaks JSON-RPC 2.0 over stdio and exposes a single tool, `aivis-speech`,
//! which queues text for the elected worker. Logging must go to stderr:
//! stdout is the protocol channel.
#![deny(unsafe_code)]

mod backend;
mod error;
pub mod protocol;
mod server;
pub mod tool;

pub use backend::{PLAYBACK_WAIT, RedisConnector, SpeechBackend, StoreConnector};
pub use error::McpServerError;
pub use server::{McpServer, SERVER_NAME};

/// Log external programs the speech path needs but cannot find.
pub fn warn_missing_dependencies() {
    let missing = aivis_runtime::system::missing_dependencies();
    if missing.is_empty() {
        tracing::debug!("All external dependencies found");
    } else {
        tracing::warn!(
            missing = %missing.join(", "),
            "Missing external dependencies; run `aivis-mcp doctor` for install hints"
        );
    }
}
