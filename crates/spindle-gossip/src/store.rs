//! Last-writer-wins key/value store.
//!
//! [`LwwStore`] is the stock [`GossipStore`]. Payloads are JSON snapshots of
//! the committed map; merging stages every incoming entry that beats what the
//! node already holds, and only a commit makes staged entries visible.

use crate::traits::GossipStore;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use spindle_types::{NodeId, Payload};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// A value tagged with the write that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Versioned {
    /// Stored value.
    pub value: String,
    /// Lamport version of the write.
    pub version: u64,
    /// Node that performed the write.
    pub origin: NodeId,
}

impl Versioned {
    /// Returns true if `self` wins over `other`.
    ///
    /// Higher version wins; equal versions are ordered by origin.
    pub fn supersedes(&self, other: &Versioned) -> bool {
        (self.version, &self.origin) > (other.version, &other.origin)
    }
}

type Snapshot = BTreeMap<String, Versioned>;

#[derive(Debug, Default)]
struct Inner {
    committed: Snapshot,
    pending: Snapshot,
    clock: u64,
}

impl Inner {
    fn current(&self, key: &str) -> Option<&Versioned> {
        match (self.committed.get(key), self.pending.get(key)) {
            (Some(c), Some(p)) => Some(if p.supersedes(c) { p } else { c }),
            (c, p) => c.or(p),
        }
    }
}

/// Thread-safe last-writer-wins map.
#[derive(Debug)]
pub struct LwwStore {
    local: NodeId,
    inner: RwLock<Inner>,
}

impl LwwStore {
    /// Creates an empty store owned by `local`.
    pub fn new(local: NodeId) -> Self {
        Self {
            local,
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Writes a value locally, bypassing any session.
    pub fn put(&self, key: impl Into<String>, value: impl Into<String>) -> Versioned {
        let mut inner = self.inner.write();
        inner.clock = inner.clock.saturating_add(1);
        let entry = Versioned {
            value: value.into(),
            version: inner.clock,
            origin: self.local.clone(),
        };
        inner.committed.insert(key.into(), entry.clone());
        entry
    }

    /// Returns the committed value for `key`.
    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.read().committed.get(key).map(|v| v.value.clone())
    }

    /// Returns the committed entry for `key`.
    pub fn get_versioned(&self, key: &str) -> Option<Versioned> {
        self.inner.read().committed.get(key).cloned()
    }

    /// Returns a copy of the committed map.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.inner
            .read()
            .committed
            .iter()
            .map(|(k, v)| (k.clone(), v.value.clone()))
            .collect()
    }

    /// Returns the number of committed keys.
    pub fn len(&self) -> usize {
        self.inner.read().committed.len()
    }

    /// Returns true if nothing is committed.
    pub fn is_empty(&self) -> bool {
        self.inner.read().committed.is_empty()
    }

    /// Returns the number of staged entries awaiting commit or abort.
    pub fn pending_len(&self) -> usize {
        self.inner.read().pending.len()
    }

    fn encode(&self) -> Payload {
        let inner = self.inner.read();
        match serde_json::to_vec(&inner.committed) {
            Ok(bytes) => Payload::from(bytes),
            Err(e) => {
                warn!(error = %e, "failed to encode store snapshot");
                Payload::default()
            }
        }
    }
}

impl GossipStore for LwwStore {
    fn lead_payload(&self) -> Payload {
        self.encode()
    }

    fn follow_payload(&self) -> Payload {
        self.encode()
    }

    fn merge(&self, sender: &NodeId, payload: &Payload) {
        if payload.is_empty() {
            return;
        }

        let incoming: Snapshot = match serde_json::from_slice(payload.as_bytes()) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(peer = %sender, error = %e, "ignoring malformed payload");
                return;
            }
        };

        let mut inner = self.inner.write();
        let mut staged = 0usize;
        for (key, entry) in incoming {
            // The top version is reserved so local writes can always outrank it.
            if entry.version == u64::MAX {
                warn!(peer = %sender, key = %key, "ignoring entry with exhausted version");
                continue;
            }
            let wins = inner
                .current(&key)
                .map_or(true, |existing| entry.supersedes(existing));
            if wins {
                inner.pending.insert(key, entry);
                staged += 1;
            }
        }
        debug!(peer = %sender, staged, "merged peer payload");
    }

    fn commit(&self) {
        let mut inner = self.inner.write();
        let pending = std::mem::take(&mut inner.pending);
        let applied = pending.len();

        for (key, entry) in pending {
            inner.clock = inner.clock.max(entry.version);
            let wins = inner
                .committed
                .get(&key)
                .map_or(true, |existing| entry.supersedes(existing));
            if wins {
                inner.committed.insert(key, entry);
            }
        }
        debug!(applied, clock = inner.clock, "committed pending entries");
    }

    fn abort(&self) {
        let mut inner = self.inner.write();
        let dropped = inner.pending.len();
        inner.pending.clear();
        debug!(dropped, "discarded pending entries");
    }
}
