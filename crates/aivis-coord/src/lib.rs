//! Coordination protocol for aivis-mcp.
//!
//! Many short-lived producer processes share one store. This crate holds the
//! primitives they coordinate with:
//!
//! - [`Lease`]: identity-tagged, expiring claim electing the single active
//!   worker. Renewal and release are ownership-checked atomic operations.
//! - [`WorkQueue`]: FIFO list of [`SpeechRequest`](aivis_core::SpeechRequest)
//!   payloads. Popping consumes; there is no redelivery.
//! - [`PlaybackMutex`]: a second lease held for one render + play cycle,
//!   acquired with a retry loop and released through [`PlaybackGuard`].
//! - [`CompletionSignal`]: per-request one-shot markers a producer can wait
//!   on, plus a processing marker that tells "still playing" apart from
//!   "lost".
//! - [`namespace`]: inspection and bulk reset of every key under the prefix.
//!
//! Everything is generic over `Arc<dyn KvStore>`, so the same code runs
//! against Redis in production and against an in-memory store in tests.
#![deny(unsafe_code)]

mod completion;
mod coordinator;
mod error;
mod lease;
pub mod namespace;
mod playback;
mod queue;

pub use completion::{CompletionOutcome, CompletionSignal};
pub use coordinator::Coordinator;
pub use error::CoordError;
pub use lease::{Lease, lease_present};
pub use namespace::NamespaceStatus;
pub use playback::{PlaybackGuard, PlaybackMutex};
pub use queue::WorkQueue;
