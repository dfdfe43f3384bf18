//! Command-line entry point for aivis-mcp.
//!
//! One binary plays three roles: the MCP server (no subcommand), the
//! hidden `worker`, and a handful of one-shot commands for setup and
//! troubleshooting.
#![deny(unsafe_code)]

pub mod bootstrap;
pub mod commands;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod parser;
pub mod utils;

pub use commands::Commands;
pub use error::CliError;
pub use parser::Cli;

use aivis_core::ConfigOverrides;
use aivis_runtime::WORKER_MODE_ENV;

/// The command to run; a process started with the worker marker in its
/// environment is always a worker.
pub fn effective_command(command: Option<Commands>, worker_env: Option<&str>) -> Commands {
    if worker_env == Some("1") {
        return Commands::Worker;
    }
    command.unwrap_or(Commands::Mcp)
}

/// Read the worker marker from the process environment.
pub fn worker_mode_from_env() -> Option<String> {
    std::env::var(WORKER_MODE_ENV).ok()
}

/// Run `command` to completion.
pub async fn dispatch(command: Commands, overrides: &ConfigOverrides) -> Result<(), CliError> {
    match command {
        Commands::Speak(args) => handlers::speak::execute(overrides, &args).await,
        Commands::Health => handlers::health::execute(overrides).await,
        Commands::Reset => handlers::reset::execute(overrides).await,
        Commands::Doctor => handlers::doctor::execute(overrides).await,
        Commands::Init => handlers::init::execute(),
        Commands::Paths => handlers::paths::execute(),
        Commands::Mcp => handlers::mcp::execute(overrides).await,
        Commands::Worker => handlers::worker::execute(overrides).await,
    }
}
