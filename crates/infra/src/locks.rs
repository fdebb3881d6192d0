//! Per-stream mutual exclusion.
//!
//! The event store already rejects stale appends, but two writers that load
//! the same version would still race and one would fail. Holding the stream
//! lock across load, decide and append serializes them instead, so concurrent
//! increments on one product both land.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use atelier_core::{AggregateId, TenantId};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct LockKey {
    tenant_id: TenantId,
    aggregate_id: AggregateId,
}

/// A lock was poisoned by a panicking holder.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
#[error("stream lock poisoned")]
pub struct LockPoisoned;

/// Mutex per `(tenant, aggregate)` stream, created on demand.
///
/// Different streams never contend; the outer map lock is only held long
/// enough to fetch, insert or prune a stream's mutex. An entry is dropped once
/// no caller holds or waits on it, so the map only tracks busy streams.
#[derive(Debug, Default)]
pub struct StreamLocks {
    streams: Mutex<HashMap<LockKey, Arc<Mutex<()>>>>,
}

impl StreamLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock for one stream.
    pub fn with_stream<R>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        f: impl FnOnce() -> R,
    ) -> Result<R, LockPoisoned> {
        let key = LockKey {
            tenant_id,
            aggregate_id,
        };
        let stream = {
            let mut streams = self.streams.lock().map_err(|_| LockPoisoned)?;
            streams.entry(key).or_default().clone()
        };

        let result = {
            let _guard = stream.lock().map_err(|_| LockPoisoned)?;
            f()
        };

        self.release(key, stream);
        Ok(result)
    }

    /// Forget `key` unless another caller still holds a handle to its mutex.
    fn release(&self, key: LockKey, stream: Arc<Mutex<()>>) {
        let Ok(mut streams) = self.streams.lock() else {
            return;
        };
        // Handles are only cloned under the map lock: two means the map and us.
        if Arc::strong_count(&stream) == 2 {
            streams.remove(&key);
        }
    }

    /// Number of streams currently locked or waited on.
    pub fn tracked_streams(&self) -> usize {
        self.streams.lock().map(|s| s.len()).unwrap_or(0)
    }
}
