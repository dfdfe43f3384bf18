//! In-process [`KvStore`] with expiry and blocking pops.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use aivis_core::{KvStore, StoreError};
use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::Instant;

#[derive(Debug)]
enum Value {
    Str(String),
    List(VecDeque<String>),
}

#[derive(Debug)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// Store held entirely in memory.
///
/// Every operation runs under one mutex, which gives the same atomicity the
/// Redis scripts provide. Expiry is evaluated lazily on access.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
    pushed: Notify,
}

const WRONG_TYPE: &str = "WRONGTYPE operation against a key holding the wrong kind of value";

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_entries<T>(&self, f: impl FnOnce(&mut HashMap<String, Entry>) -> T) -> T {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        entries.retain(|_, entry| entry.is_live(now));
        f(&mut entries)
    }

    fn string_value(entries: &HashMap<String, Entry>, key: &str) -> Result<Option<String>, StoreError> {
        match entries.get(key).map(|e| &e.value) {
            None => Ok(None),
            Some(Value::Str(s)) => Ok(Some(s.clone())),
            Some(Value::List(_)) => Err(StoreError::Protocol(WRONG_TYPE.to_string())),
        }
    }

    fn try_pop(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.with_entries(|entries| {
            let Some(entry) = entries.get_mut(key) else {
                return Ok(None);
            };
            let Value::List(list) = &mut entry.value else {
                return Err(StoreError::Protocol(WRONG_TYPE.to_string()));
            };
            let item = list.pop_front();
            if list.is_empty() {
                entries.remove(key);
            }
            Ok(item)
        })
    }

    fn push(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<u64, StoreError> {
        let len = self.with_entries(|entries| {
            let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
                value: Value::List(VecDeque::new()),
                expires_at: None,
            });
            let Value::List(list) = &mut entry.value else {
                return Err(StoreError::Protocol(WRONG_TYPE.to_string()));
            };
            list.push_back(value.to_string());
            if let Some(ttl) = ttl {
                entry.expires_at = Some(Instant::now() + ttl);
            }
            Ok(list.len() as u64)
        })?;
        self.pushed.notify_waiters();
        Ok(len)
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.with_entries(|entries| Self::string_value(entries, key))
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.with_entries(|entries| entries.contains_key(key)))
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError> {
        Ok(self.with_entries(|entries| {
            if entries.contains_key(key) {
                return false;
            }
            entries.insert(
                key.to_string(),
                Entry {
                    value: Value::Str(value.to_string()),
                    expires_at: Some(Instant::now() + ttl),
                },
            );
            true
        }))
    }

    async fn set_with_expiry(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        self.with_entries(|entries| {
            entries.insert(
                key.to_string(),
                Entry {
                    value: Value::Str(value.to_string()),
                    expires_at: Some(Instant::now() + ttl),
                },
            );
        });
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<u64, StoreError> {
        Ok(self.with_entries(|entries| {
            keys.iter()
                .filter(|key| entries.remove(key.as_str()).is_some())
                .count() as u64
        }))
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        self.with_entries(|entries| {
            if Self::string_value(entries, key)?.as_deref() == Some(expected) {
                entries.remove(key);
                Ok(true)
            } else {
                Ok(false)
            }
        })
    }

    async fn compare_and_extend(
        &self,
        key: &str,
        expected: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        self.with_entries(|entries| {
            if Self::string_value(entries, key)?.as_deref() != Some(expected) {
                return Ok(false);
            }
            if let Some(entry) = entries.get_mut(key) {
                entry.expires_at = Some(Instant::now() + ttl);
            }
            Ok(true)
        })
    }

    async fn push_back(&self, key: &str, value: &str) -> Result<u64, StoreError> {
        self.push(key, value, None)
    }

    async fn push_back_with_expiry(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        self.push(key, value, Some(ttl)).map(|_| ())
    }

    async fn pop_front_blocking(
        &self,
        key: &str,
        timeout: Duration,
    ) -> Result<Option<String>, StoreError> {
        let deadline = Instant::now() + timeout;
        loop {
            // Register before checking so a push between the check and the
            // await still wakes us.
            let pushed = self.pushed.notified();
            if let Some(item) = self.try_pop(key)? {
                return Ok(Some(item));
            }
            if tokio::time::timeout_at(deadline, pushed).await.is_err() {
                return self.try_pop(key);
            }
        }
    }

    async fn list_len(&self, key: &str) -> Result<u64, StoreError> {
        self.with_entries(|entries| match entries.get(key).map(|e| &e.value) {
            None => Ok(0),
            Some(Value::List(list)) => Ok(list.len() as u64),
            Some(Value::Str(_)) => Err(StoreError::Protocol(WRONG_TYPE.to_string())),
        })
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self.with_entries(|entries| {
            let mut keys: Vec<String> = entries
                .keys()
                .filter(|key| key.starts_with(prefix))
                .cloned()
                .collect();
            keys.sort();
            keys
        }))
    }
}
