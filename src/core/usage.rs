//! Per-client usage accounting.
//!
//! Each client identifier accumulates the milliseconds of synthesized audio it
//! has received. A charge that would push the total past the quota is denied,
//! and from then on the client is denied until its entry is reset.

use dashmap::DashMap;

#[derive(Debug, Default, Clone, Copy)]
struct ClientUsage {
    consumed_ms: u64,
    denied: bool,
}

/// Process-wide table of consumed milliseconds keyed by client id.
///
/// Every update for a given client happens under that client's shard lock, so
/// concurrent sessions of the same client never overshoot the quota.
#[derive(Debug)]
pub struct UsageMeter {
    consumed: DashMap<String, ClientUsage>,
    quota_ms: u64,
}

impl UsageMeter {
    pub fn new(quota_ms: u64) -> Self {
        Self {
            consumed: DashMap::new(),
            quota_ms,
        }
    }

    pub fn quota_ms(&self) -> u64 {
        self.quota_ms
    }

    /// Milliseconds consumed by `client_id`. Creates a zero entry for unseen clients.
    pub fn get(&self, client_id: &str) -> u64 {
        self.consumed
            .entry(client_id.to_string())
            .or_default()
            .consumed_ms
    }

    /// Peek at consumption without creating an entry.
    pub fn consumed(&self, client_id: &str) -> u64 {
        self.consumed
            .get(client_id)
            .map(|usage| usage.consumed_ms)
            .unwrap_or(0)
    }

    /// Whether the client has no quota left. Never creates an entry.
    pub fn is_exhausted(&self, client_id: &str) -> bool {
        self.consumed(client_id) >= self.quota_ms
    }

    pub fn remaining_ms(&self, client_id: &str) -> u64 {
        self.quota_ms.saturating_sub(self.consumed(client_id))
    }

    /// Charge `amount_ms` against the client's quota.
    ///
    /// Returns `false` if the charge would exceed the quota. The entry is then
    /// clamped to the quota and every later call is denied until [`reset`].
    ///
    /// [`reset`]: UsageMeter::reset
    pub fn try_consume(&self, client_id: &str, amount_ms: u64) -> bool {
        let mut usage = self.consumed.entry(client_id.to_string()).or_default();

        if usage.denied {
            return false;
        }
        let total = usage.consumed_ms.saturating_add(amount_ms);
        if total > self.quota_ms {
            usage.consumed_ms = self.quota_ms;
            usage.denied = true;
            return false;
        }
        usage.consumed_ms = total;
        true
    }

    /// Forget the client's consumption.
    pub fn reset(&self, client_id: &str) {
        self.consumed.remove(client_id);
    }

    /// Number of tracked clients.
    pub fn len(&self) -> usize {
        self.consumed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.consumed.is_empty()
    }
}
