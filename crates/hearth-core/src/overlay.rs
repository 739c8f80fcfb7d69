// ── Optimistic overlay ──
//
// Predicted display values for user-initiated toggles. An entry masks the
// real state until it expires or until any real state frame for the same
// entity arrives, whichever comes first. The overlay never touches the
// registry store.

use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct OverlayEntry {
    value: String,
    expires_at: Instant,
}

/// Additive, self-expiring display overrides keyed by entity id.
#[derive(Debug, Default)]
pub struct OptimisticOverlay {
    entries: DashMap<String, OverlayEntry>,
}

impl OptimisticOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a predicted value for `ttl`.
    pub fn set(&self, entity_id: &str, value: impl Into<String>, ttl: Duration) {
        self.entries.insert(
            entity_id.to_owned(),
            OverlayEntry {
                value: value.into(),
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// The live predicted value, if any. Expired entries are dropped.
    pub fn get(&self, entity_id: &str) -> Option<String> {
        let live = self.entries.get(entity_id).and_then(|entry| {
            (entry.expires_at > Instant::now()).then(|| entry.value.clone())
        });
        if live.is_none() {
            self.entries
                .remove_if(entity_id, |_, entry| entry.expires_at <= Instant::now());
        }
        live
    }

    /// A real state frame arrived: the authoritative value wins.
    ///
    /// Returns `true` if a live prediction was dropped.
    pub fn reconcile(&self, entity_id: &str, real: Option<&str>) -> bool {
        let Some((_, entry)) = self.entries.remove(entity_id) else {
            return false;
        };
        let live = entry.expires_at > Instant::now();
        if live && real != Some(entry.value.as_str()) {
            tracing::debug!(
                entity_id,
                predicted = %entry.value,
                actual = real.unwrap_or("<removed>"),
                "Prediction overruled by real state"
            );
        }
        live
    }

    /// Overlay value if live, otherwise `real`.
    pub fn effective(&self, entity_id: &str, real: Option<&str>) -> Option<String> {
        self.get(entity_id).or_else(|| real.map(str::to_owned))
    }

    pub fn clear(&self, entity_id: &str) {
        self.entries.remove(entity_id);
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
