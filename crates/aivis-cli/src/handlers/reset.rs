//! `reset`: stop every worker and server, clear the namespace and start
//! one fresh worker.

use aivis_core::ConfigOverrides;
use aivis_runtime::process::{OwnProcess, ProcessRole, list_own_processes, terminate_pid};
use tracing::warn;

use crate::bootstrap;
use crate::error::CliError;

/// How many processes of each role were signalled.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Stopped {
    workers: usize,
    servers: usize,
}

impl Stopped {
    const fn any(self) -> bool {
        self.workers + self.servers > 0
    }
}

/// SIGTERM each process through `terminate`, counting the ones signalled.
fn stop_all<F>(processes: &[OwnProcess], mut terminate: F) -> Stopped
where
    F: FnMut(u32) -> std::io::Result<bool>,
{
    let mut stopped = Stopped::default();
    for process in processes {
        match terminate(process.pid) {
            Ok(true) => match process.role {
                ProcessRole::Worker => stopped.workers += 1,
                ProcessRole::Server => stopped.servers += 1,
            },
            Ok(false) => {}
            Err(e) => warn!(pid = process.pid, error = %e, "Failed to stop process"),
        }
    }
    stopped
}

pub async fn execute(overrides: &ConfigOverrides) -> Result<(), CliError> {
    let config = bootstrap::resolve_config(overrides);

    let stopped = stop_all(&list_own_processes(), terminate_pid);
    println!("Stopped {} worker(s)", stopped.workers);
    println!("Stopped {} MCP server(s)", stopped.servers);
    if stopped.any() {
        tokio::time::sleep(config.timings.reset_settle).await;
    }

    let coord = match bootstrap::connect(&config).await {
        Ok(coord) => coord,
        Err(e) => {
            println!("Skipped clearing Redis: {e}");
            println!("Reset complete (without Redis)");
            return Ok(());
        }
    };
    match coord.reset().await {
        Ok(deleted) => println!("Cleared {deleted} Redis key(s)"),
        Err(e) => println!("Skipped clearing Redis: {e}"),
    }

    bootstrap::worker_supervisor(&coord, overrides)?
        .spawn_worker()
        .await?;
    println!("Started a new worker");
    println!("Reset complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn process(pid: u32, role: ProcessRole) -> OwnProcess {
        OwnProcess {
            pid,
            role,
            command: String::new(),
        }
    }

    #[test]
    fn counts_only_signalled_processes() {
        let processes = [
            process(1, ProcessRole::Worker),
            process(2, ProcessRole::Worker),
            process(3, ProcessRole::Server),
            process(4, ProcessRole::Server),
        ];
        let stopped = stop_all(&processes, |pid| match pid {
            2 => Ok(false),
            4 => Err(io::Error::other("denied")),
            _ => Ok(true),
        });
        assert_eq!(
            stopped,
            Stopped {
                workers: 1,
                servers: 1
            }
        );
        assert!(stopped.any());
    }

    #[test]
    fn nothing_running() {
        assert!(!stop_all(&[], |_| Ok(true)).any());
    }
}
