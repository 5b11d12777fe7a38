// Session-scoped cache of canonical (pre-cutoff) telemetry series
use crate::domain::machine::{MachineState, Tier};
use crate::domain::telemetry::TelemetrySeries;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub tier: Tier,
    pub machine_id: String,
    pub state: MachineState,
}

impl CacheKey {
    pub fn new(tier: Tier, machine_id: impl Into<String>, state: MachineState) -> Self {
        Self {
            tier,
            machine_id: machine_id.into(),
            state,
        }
    }
}

/// Cached series are shared read-only; cutoff always works on a copy.
#[derive(Debug, Default)]
pub struct TelemetryCache {
    entries: HashMap<CacheKey, Arc<TelemetrySeries>>,
}

impl TelemetryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<TelemetrySeries>> {
        self.entries.get(key).cloned()
    }

    /// Return the cached series for `key`, generating it on first access.
    /// A failed generation leaves the cache unchanged.
    pub fn get_or_try_insert_with<E>(
        &mut self,
        key: CacheKey,
        generate: impl FnOnce() -> Result<TelemetrySeries, E>,
    ) -> Result<Arc<TelemetrySeries>, E> {
        if let Some(series) = self.entries.get(&key) {
            return Ok(Arc::clone(series));
        }

        let series = Arc::new(generate()?);
        tracing::debug!(
            "Cached telemetry for {} ({}, {})",
            key.machine_id,
            key.tier,
            key.state
        );
        self.entries.insert(key, Arc::clone(&series));
        Ok(series)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
