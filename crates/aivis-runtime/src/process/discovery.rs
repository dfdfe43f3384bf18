//! Find other running instances of this executable.

use std::ffi::{OsStr, OsString};
use std::path::Path;

use sysinfo::System;

use crate::supervisor::{WORKER_ARG, WORKER_MODE_ENV};

/// Role of a long-lived instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessRole {
    Worker,
    /// MCP server, started by a client.
    Server,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnProcess {
    pub pid: u32,
    pub role: ProcessRole,
    pub command: String,
}

/// Short-lived subcommands; instances running these are not reported.
const ONE_SHOT_COMMANDS: &[&str] = &["speak", "health", "reset", "doctor", "init", "paths"];

/// Global flags whose value is the next argument.
const VALUE_FLAGS: &[&str] = &["--api-key", "--api-url", "--redis-url"];

/// The first argument that is neither a flag nor a flag's value.
fn subcommand<S: AsRef<str>>(args: &[S]) -> Option<&str> {
    let mut args = args.iter().map(AsRef::<str>::as_ref);
    while let Some(arg) = args.next() {
        if VALUE_FLAGS.contains(&arg) {
            args.next();
        } else if !arg.starts_with('-') {
            return Some(arg);
        }
    }
    None
}

/// Role of an instance from its arguments (without argv\[0\]).
///
/// Only the subcommand position counts, so `speak worker` is a one-shot
/// `speak`. `None` for one-shot invocations such as `health`.
pub fn classify_args<S: AsRef<str>>(args: &[S]) -> Option<ProcessRole> {
    match subcommand(args) {
        Some(WORKER_ARG) => Some(ProcessRole::Worker),
        Some(command) if ONE_SHOT_COMMANDS.contains(&command) => None,
        _ => Some(ProcessRole::Server),
    }
}

/// Whether `environ` carries the marker the supervisor sets on workers.
fn has_worker_marker(environ: &[OsString]) -> bool {
    let marker = format!("{WORKER_MODE_ENV}=1");
    environ.iter().any(|var| var.as_os_str() == OsStr::new(&marker))
}

/// Other running workers and servers of this executable. Never includes
/// the calling process.
pub fn list_own_processes() -> Vec<OwnProcess> {
    let Ok(current) = std::env::current_exe() else {
        return Vec::new();
    };
    let Some(exe_name) = current.file_name().map(OsString::from) else {
        return Vec::new();
    };
    let current = current.canonicalize().unwrap_or(current);
    let own_pid = std::process::id();

    let sys = System::new_all();
    let mut found: Vec<OwnProcess> = sys
        .processes()
        .iter()
        .filter(|(pid, _)| pid.as_u32() != own_pid)
        .filter(|(_, process)| is_same_binary(process.exe(), process.name(), &current, &exe_name))
        .filter_map(|(pid, process)| {
            let cmd: Vec<String> = process
                .cmd()
                .iter()
                .map(|part| part.to_string_lossy().into_owned())
                .collect();
            let role = if has_worker_marker(process.environ()) {
                ProcessRole::Worker
            } else {
                classify_args(cmd.get(1..).unwrap_or_default())?
            };
            Some(OwnProcess {
                pid: pid.as_u32(),
                role,
                command: cmd.join(" "),
            })
        })
        .collect();
    found.sort_by_key(|p| p.pid);
    found
}

fn is_same_binary(
    exe: Option<&Path>,
    name: &OsStr,
    current: &Path,
    exe_name: &OsStr,
) -> bool {
    if let Some(exe) = exe {
        let exe = exe.canonicalize().unwrap_or_else(|_| exe.to_path_buf());
        if exe == current {
            return true;
        }
    }
    name == exe_name
}
