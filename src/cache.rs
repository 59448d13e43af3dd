//! Last-known AGV state cache (§9 design note): one `ArcSwap` snapshot per serial.
//! Writers build a whole new `Arc<AgvCacheEntry>` and `store()` it; readers `load()` a
//! consistent snapshot, never a torn record.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::protocol::vda5050::{Connection, Factsheet, State, Visualization};

#[derive(Debug, Clone, Default)]
pub struct AgvCacheEntry {
    pub last_vendor_payload: Option<Value>,
    pub last_state: Option<State>,
    pub last_visualization: Option<Visualization>,
    pub last_connection: Option<Connection>,
    pub last_factsheet: Option<Factsheet>,
    pub last_update: Option<DateTime<Utc>>,
}

/// Owned by the bridge supervisor; one slot per configured AGV serial.
#[derive(Default)]
pub struct Cache {
    entries: HashMap<String, Arc<ArcSwap<AgvCacheEntry>>>,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ensure(&mut self, serial: &str) {
        self.entries
            .entry(serial.to_string())
            .or_insert_with(|| Arc::new(ArcSwap::from_pointee(AgvCacheEntry::default())));
    }

    pub fn snapshot(&self, serial: &str) -> Option<Arc<AgvCacheEntry>> {
        self.entries.get(serial).map(|slot| slot.load_full())
    }

    /// Applies `mutate` to a clone of the current snapshot and stores the result; the
    /// whole record is replaced atomically so readers never observe a partial update.
    pub fn update(&mut self, serial: &str, mutate: impl FnOnce(&mut AgvCacheEntry)) {
        let slot = self
            .entries
            .entry(serial.to_string())
            .or_insert_with(|| Arc::new(ArcSwap::from_pointee(AgvCacheEntry::default())));
        let mut next = (**slot.load()).clone();
        mutate(&mut next);
        next.last_update = Some(Utc::now());
        slot.store(Arc::new(next));
    }

    pub fn serials(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_replaces_whole_snapshot() {
        let mut cache = Cache::new();
        cache.update("agv-1", |e| e.last_vendor_payload = Some(serde_json::json!({"x": 1})));
        let snap = cache.snapshot("agv-1").unwrap();
        assert_eq!(snap.last_vendor_payload, Some(serde_json::json!({"x": 1})));
        assert!(snap.last_update.is_some());
    }

    #[test]
    fn missing_serial_has_no_snapshot() {
        let cache = Cache::new();
        assert!(cache.snapshot("nope").is_none());
    }
}
