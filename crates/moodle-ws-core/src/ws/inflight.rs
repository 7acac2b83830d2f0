//! Deduplication of concurrent identical requests.
//!
//! The first caller for a key registers a shared future; later callers with
//! the same key await that same future until it settles. Entries are removed
//! on completion, and a spawned timer evicts them after `ttl` in case the
//! future never settles.

use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::utils::form;

type SharedCall<T> = Shared<BoxFuture<'static, T>>;

struct Entry<T: Clone> {
    generation: u64,
    call: SharedCall<T>,
}

/// Map of pending calls keyed by method, URL and parameters.
pub struct InFlightCache<T: Clone> {
    entries: Arc<DashMap<String, Entry<T>>>,
    next_generation: AtomicU64,
}

impl<T> InFlightCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self { entries: Arc::new(DashMap::new()), next_generation: AtomicU64::new(0) }
    }

    /// Cache key for a request. Parameters are form-serialized before hashing.
    pub fn key(method: &str, url: &str, params: Option<&Value>) -> String {
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        hasher.update(b"###");
        if let Some(params) = params {
            hasher.update(form::serialize(params).as_bytes());
        }
        let digest = hasher.finalize();
        let hex: String = digest.iter().map(|byte| format!("{byte:02x}")).collect();
        format!("{method}#{hex}")
    }

    /// Join the pending call for `key`, or start one with `make`.
    pub fn get_or_insert_with<F>(&self, key: &str, ttl: Duration, make: F) -> SharedCall<T>
    where
        F: FnOnce() -> BoxFuture<'static, T>,
    {
        if let Some(entry) = self.entries.get(key) {
            tracing::debug!(key = %key, "Joining in-flight call");
            return entry.call.clone();
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let entries = Arc::clone(&self.entries);
        let owned_key = key.to_string();
        let inner = make();
        let call = async move {
            let result = inner.await;
            entries.remove_if(&owned_key, |_, entry| entry.generation == generation);
            result
        }
        .boxed()
        .shared();

        match self.entries.entry(key.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(existing) => {
                return existing.get().call.clone();
            },
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Entry { generation, call: call.clone() });
            },
        }

        let entries = Arc::clone(&self.entries);
        let owned_key = key.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            if entries.remove_if(&owned_key, |_, entry| entry.generation == generation).is_some() {
                tracing::debug!(key = %owned_key, "Evicted stale in-flight call");
            }
        });

        call
    }

    /// Number of pending calls.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for InFlightCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
