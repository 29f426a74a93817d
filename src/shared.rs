//! Process-wide state shared across manager instances.
//!
//! Capabilities describe the machine, not a manager, so the probe result is
//! cached here and every manager sees the same record. The cumulative
//! counters live here for the same reason. Disposing a manager touches
//! neither; see [`ContextManager::dispose`](crate::ContextManager::dispose).
//!
//! Managers reach this through [`SharedState::global`] by default. Tests
//! construct their own instance and inject it so parallel test threads do
//! not see each other's probes and counters.

use std::sync::{Arc, OnceLock, RwLock};

use crate::caps::Capabilities;
use crate::metrics::ContextMetrics;

static GLOBAL: OnceLock<Arc<SharedState>> = OnceLock::new();

#[derive(Debug)]
pub struct SharedState {
    caps: RwLock<Option<Capabilities>>,
    metrics: ContextMetrics,
}

impl Default for SharedState {
    fn default() -> Self {
        SharedState::new()
    }
}

impl SharedState {
    pub fn new() -> Self {
        SharedState {
            caps: RwLock::new(None),
            metrics: ContextMetrics::default(),
        }
    }

    /// The process-wide instance every default-constructed manager shares.
    pub fn global() -> Arc<SharedState> {
        GLOBAL.get_or_init(|| Arc::new(SharedState::new())).clone()
    }

    pub fn metrics(&self) -> &ContextMetrics {
        &self.metrics
    }

    /// Cached probe result, if a probe has run.
    pub fn capabilities(&self) -> Option<Capabilities> {
        self.caps.read().ok().and_then(|guard| guard.clone())
    }

    /// Return the cached capabilities, running `probe` only on the first
    /// call. If two threads race past the empty cache, the first write wins
    /// and the loser's probe result is discarded.
    pub(crate) fn capabilities_or_probe(
        &self,
        probe: impl FnOnce() -> Capabilities,
    ) -> Capabilities {
        if let Ok(guard) = self.caps.read() {
            if let Some(cached) = guard.as_ref() {
                return cached.clone();
            }
        }
        let fresh = probe();
        if let Ok(mut guard) = self.caps.write() {
            if let Some(cached) = guard.as_ref() {
                return cached.clone();
            }
            *guard = Some(fresh.clone());
        }
        fresh
    }

    /// Drop the cached probe result so the next query re-probes. Meant for
    /// embedders that know the environment changed under them (driver
    /// update, GPU switch).
    pub fn clear_capability_cache(&self) {
        if let Ok(mut guard) = self.caps.write() {
            *guard = None;
        }
    }

    /// Clear the cache and zero the counters. Test isolation hook.
    pub fn reset_for_testing(&self) {
        self.clear_capability_cache();
        self.metrics.reset();
    }
}
