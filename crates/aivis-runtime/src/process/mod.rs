//! Discovery and termination of our own processes.

mod discovery;
mod terminate;

pub use discovery::{OwnProcess, ProcessRole, classify_args, list_own_processes};
pub use terminate::{pid_exists, terminate_pid};
