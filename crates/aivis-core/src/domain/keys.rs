//! Key layout inside the shared coordination store.
//!
//! Every key lives under one prefix so that a reset can enumerate and
//! delete the whole namespace without touching unrelated data.

use super::request::RequestId;

/// Prefix used when none is configured.
pub const DEFAULT_KEY_PREFIX: &str = "aivis-mcp";

/// Namespaced key builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    prefix: String,
}

impl KeySpace {
    /// Create a key space rooted at `prefix` (without trailing `:`).
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let prefix = prefix.trim_end_matches(':').to_string();
        Self { prefix }
    }

    /// The bare prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Prefix including the separator, suitable for enumeration.
    pub fn namespace(&self) -> String {
        format!("{}:", self.prefix)
    }

    /// Lease key of the elected worker.
    pub fn worker_lease(&self) -> String {
        format!("{}:worker-lock", self.prefix)
    }

    /// FIFO list of pending speech requests.
    pub fn queue(&self) -> String {
        format!("{}:queue", self.prefix)
    }

    /// Lock serializing render + playback.
    pub fn playback_lock(&self) -> String {
        format!("{}:play-lock", self.prefix)
    }

    /// One-shot completion marker for a request.
    pub fn completion(&self, id: &RequestId) -> String {
        format!("{}:done:{}", self.prefix, id)
    }

    /// Marker present while the worker is rendering a request.
    pub fn processing(&self, id: &RequestId) -> String {
        format!("{}:processing:{}", self.prefix, id)
    }
}

impl Default for KeySpace {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_PREFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_share_the_namespace() {
        let keys = KeySpace::default();
        let id = RequestId::new("r1");
        let ns = keys.namespace();

        for key in [
            keys.worker_lease(),
            keys.queue(),
            keys.playback_lock(),
            keys.completion(&id),
            keys.processing(&id),
        ] {
            assert!(key.starts_with(&ns), "{key} outside {ns}");
        }
        assert_eq!(keys.completion(&id), "aivis-mcp:done:r1");
    }

    #[test]
    fn trailing_separator_is_normalized() {
        let keys = KeySpace::new("test:");
        assert_eq!(keys.prefix(), "test");
        assert_eq!(keys.queue(), "test:queue");
    }
}
