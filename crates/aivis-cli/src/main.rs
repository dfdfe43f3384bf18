//! aivis-mcp binary.

use std::time::Duration;

use clap::Parser;

use aivis_cli::logging::{self, LogRole};
use aivis_cli::{Cli, Commands, dispatch, effective_command, worker_mode_from_env};

fn main() {
    dotenvy::dotenv().ok();

    let mut cli = Cli::parse();
    let overrides = cli.overrides();
    let command = effective_command(cli.command.take(), worker_mode_from_env().as_deref());

    let debug = overrides.debug || std::env::var("AIVIS_DEBUG").is_ok_and(|v| v == "1");
    let role = if matches!(command, Commands::Worker) {
        LogRole::Worker
    } else {
        LogRole::Console
    };
    logging::init(role, debug);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {e}");
            std::process::exit(1);
        }
    };

    let code = match runtime.block_on(dispatch(command, &overrides)) {
        Ok(()) => 0,
        Err(e) => {
            tracing::debug!(error = %e, "Command failed");
            eprintln!("Error: {e}");
            e.exit_code()
        }
    };

    // A blocked stdin read would otherwise keep the process alive.
    runtime.shutdown_timeout(Duration::from_millis(500));
    std::process::exit(code);
}
