//! Coordination store adapters for aivis-mcp.
//!
//! - [`RedisStore`]: the production transport. Compare-and-delete and
//!   compare-and-extend run as server-side Lua scripts so ownership checks
//!   and mutations are one atomic step.
//! - [`MemoryStore`]: an in-process store with the same semantics, used by
//!   tests throughout the workspace.
//! - [`connect`]: connection establishment with bounded retry and a one-shot
//!   auto-start of a local `redis-server`.
#![deny(unsafe_code)]

mod connect;
mod memory;
mod redis_store;

pub use connect::{ConnectOptions, connect, connect_with};
pub use memory::MemoryStore;
pub use redis_store::RedisStore;
