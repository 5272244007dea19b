// Copyright (c) 2026 MCP Hub contributors
// SPDX-License-Identifier: MIT
//! # Response Cache
//!
//! TTL'd, LRU-bounded cache for adapter responses. Expired entries are
//! dropped lazily on `get` and by a periodic sweeper (60 s). Eviction order
//! is true LRU: the `lru` crate keeps recency, entry metadata keeps
//! `access_count` / `last_accessed_at` for inspection. Stats are
//! best-effort atomics, not transactional with the data they describe.
//!
//! The hub ships the in-memory L1 only; [`CacheTier`] is the seat a remote
//! L2 would fill.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// One cached response with its bookkeeping.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub value: Value,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub access_count: u64,
    pub last_accessed_at: DateTime<Utc>,
}

impl CacheEntry {
    fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct CacheStats {
    pub total_requests: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub current_size: usize,
    pub max_size: usize,
}

/// Seat for a second cache level (remote). Only L1 is implemented.
#[async_trait]
pub trait CacheTier: Send + Sync {
    async fn get(&self, key: &str) -> Option<Value>;
    async fn set(&self, key: &str, value: Value, ttl: Duration);
    async fn delete(&self, key: &str) -> bool;
    async fn clear(&self);
}

pub struct ResponseCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
    max_size: usize,
    requests: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResponseCache {
    pub fn new(max_size: usize) -> Self {
        let capacity = NonZeroUsize::new(max_size.max(1)).expect("max(1) is non-zero");
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            max_size: capacity.get(),
            requests: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// TTL-respecting lookup. An expired entry counts as a miss and is
    /// removed on the spot.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.requests.fetch_add(1, Ordering::Relaxed);
        let now = Utc::now();
        let mut entries = self.entries.lock();

        match entries.get_mut(key) {
            Some(entry) if entry.is_expired_at(now) => {
                entries.pop(key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("hub_cache_misses_total").increment(1);
                None
            }
            Some(entry) => {
                entry.access_count += 1;
                entry.last_accessed_at = now;
                self.hits.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("hub_cache_hits_total").increment(1);
                Some(entry.value.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                metrics::counter!("hub_cache_misses_total").increment(1);
                None
            }
        }
    }

    /// Store under `key` for `ttl`. A zero TTL stores nothing (entries must
    /// expire strictly after creation). At capacity, the least recently
    /// used entry is evicted.
    pub fn set(&self, key: &str, value: Value, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        let now = Utc::now();
        // A TTL too large for chrono is effectively "never expires".
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(36500));
        let expires_at = now + ttl;
        let entry = CacheEntry {
            key: key.to_string(),
            value,
            created_at: now,
            expires_at,
            access_count: 0,
            last_accessed_at: now,
        };
        let evicted = self.entries.lock().push(key.to_string(), entry);
        if let Some((evicted_key, _)) = evicted {
            if evicted_key != key {
                debug!(key = %evicted_key, "cache evicted least recently used entry");
                metrics::counter!("hub_cache_evictions_total").increment(1);
            }
        }
    }

    pub fn delete(&self, key: &str) -> bool {
        self.entries.lock().pop(key).is_some()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn stats(&self) -> CacheStats {
        let total_requests = self.requests.load(Ordering::Relaxed);
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        CacheStats {
            total_requests,
            hits,
            misses,
            hit_rate: if total_requests == 0 {
                0.0
            } else {
                hits as f64 / total_requests as f64
            },
            current_size: self.entries.lock().len(),
            max_size: self.max_size,
        }
    }

    /// Drop every expired entry; returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.entries.lock();
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, e)| e.is_expired_at(now))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            entries.pop(key);
        }
        expired.len()
    }

    /// Periodic TTL sweeper; runs until `cancel` fires.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {
                        let removed = cache.sweep();
                        if removed > 0 {
                            debug!(removed, "cache sweep removed expired entries");
                        }
                    }
                }
            }
        })
    }
}

#[async_trait]
impl CacheTier for ResponseCache {
    async fn get(&self, key: &str) -> Option<Value> {
        ResponseCache::get(self, key)
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) {
        ResponseCache::set(self, key, value, ttl)
    }

    async fn delete(&self, key: &str) -> bool {
        ResponseCache::delete(self, key)
    }

    async fn clear(&self) {
        ResponseCache::clear(self)
    }
}

// ---------------------------------------------------------------------------
// Cache keys
// ---------------------------------------------------------------------------

/// Canonical JSON: object keys sorted recursively, array order preserved.
/// Two values canonicalize to the same bytes iff the cache should treat
/// them as the same arguments.
pub fn canonical_json(value: &Value) -> String {
    fn write(value: &Value, out: &mut String) {
        match value {
            Value::Object(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                out.push('{');
                for (i, key) in keys.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    out.push_str(&Value::String((*key).clone()).to_string());
                    out.push(':');
                    write(&map[*key], out);
                }
                out.push('}');
            }
            Value::Array(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    write(item, out);
                }
                out.push(']');
            }
            leaf => out.push_str(&leaf.to_string()),
        }
    }
    let mut out = String::new();
    write(value, &mut out);
    out
}

/// `<toolId>:<first 16 hex chars of sha256(toolId || canonical(args))>`.
pub fn cache_key(tool_id: &str, args: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(tool_id.as_bytes());
    hasher.update(canonical_json(args).as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("{tool_id}:{}", &digest[..16])
}
