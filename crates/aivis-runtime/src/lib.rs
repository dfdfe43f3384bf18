//! Process runtime and OS-level concerns for aivis-mcp.
//!
//! - [`worker`]: the elected worker's state machine, lease renewal and
//!   queue-processing loop.
//! - [`supervisor`]: producer-side presence check and detached worker spawn.
//! - [`speech`]: the cloud synthesis client, audio player discovery and the
//!   [`SpeechRenderer`](aivis_core::SpeechRenderer) implementation combining
//!   them.
//! - [`tasks`]: supervised fire-and-forget tasks with a logging drain.
//! - [`process`]: discovery and termination of our own processes.
//! - [`system`]: external dependency probing for `doctor` and `health`.
//! - [`signals`]: termination and reload signal listeners.
#![deny(unsafe_code)]

pub mod process;
pub mod signals;
pub mod speech;
pub mod supervisor;
pub mod system;
pub mod tasks;
pub mod worker;

pub use speech::{CloudSpeechPipeline, SynthesisClient};
pub use supervisor::{
    EnsureOutcome, ProcessLauncher, SupervisorError, WORKER_MODE_ENV, WorkerLauncher,
    WorkerSupervisor,
};
pub use tasks::{TaskDrain, TaskStats, TaskSupervisor};
pub use worker::{Worker, WorkerExit, WorkerState};
