//! Domain types shared by producers, the worker and the adapters.

mod keys;
mod request;

pub use keys::{DEFAULT_KEY_PREFIX, KeySpace};
pub use request::{MAX_STYLE_ID, MAX_WAIT_MS, RequestId, SpeechRequest};
