//! Coordination store port.
//!
//! A minimal key/value + list surface. Every operation that inspects and
//! mutates lease state in one step (`set_nx`, `compare_and_delete`,
//! `compare_and_extend`) must be a single atomic operation on the store side;
//! adapters may not emulate them with a client-side read followed by a write.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by a store adapter.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached after exhausting retries.
    #[error("Store unavailable at {url}: {reason}")]
    Unavailable { url: String, reason: String },

    /// A command failed in flight (connection dropped, timeout, ...).
    #[error("Store transport error: {0}")]
    Transport(String),

    /// The store answered with something the adapter did not expect.
    #[error("Unexpected store reply: {0}")]
    Protocol(String),
}

impl StoreError {
    /// Whether the failure is about reaching the store at all.
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Transport(_))
    }
}

/// Shared key/value store used as the coordination medium.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Round-trip check.
    async fn ping(&self) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Set `key` to `value` with expiry only if it is absent.
    ///
    /// Returns `true` iff this call created the key.
    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError>;

    /// Unconditionally set `key` with expiry. Not for lease keys.
    async fn set_with_expiry(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), StoreError>;

    /// Delete keys, returning how many existed.
    async fn delete(&self, keys: &[String]) -> Result<u64, StoreError>;

    /// Delete `key` only if its value equals `expected`.
    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError>;

    /// Reset the expiry of `key` only if its value equals `expected`.
    async fn compare_and_extend(
        &self,
        key: &str,
        expected: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError>;

    /// Append to the tail of a list, returning the new length.
    async fn push_back(&self, key: &str, value: &str) -> Result<u64, StoreError>;

    /// Append to a list and (re)set the list's expiry in one step.
    async fn push_back_with_expiry(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), StoreError>;

    /// Pop from the head of a list, waiting up to `timeout` for an element.
    ///
    /// `Ok(None)` on timeout.
    async fn pop_front_blocking(
        &self,
        key: &str,
        timeout: Duration,
    ) -> Result<Option<String>, StoreError>;

    async fn list_len(&self, key: &str) -> Result<u64, StoreError>;

    /// All keys starting with `prefix`.
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}
