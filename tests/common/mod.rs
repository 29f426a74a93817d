//! Shared fixtures for integration tests.
//!
//! Every harness gets its own [`SharedState`] and [`FakeClock`] so parallel
//! test threads never observe each other's probes, counters, or timestamps.
//! The process-wide `SharedState::global()` is exercised only by the unit
//! tests inside the crate.

use std::sync::Arc;

use glctx::{ContextManager, FakeClock, ManagerConfig, SharedState, SimulatedProvider};

#[allow(dead_code)]
pub struct Harness {
    pub manager: ContextManager<SimulatedProvider>,
    pub shared: Arc<SharedState>,
    pub clock: Arc<FakeClock>,
}

/// Desktop-class simulated environment with the given active-context cap.
#[allow(dead_code)]
pub fn harness(max_active: usize) -> Harness {
    harness_with(SimulatedProvider::new(), max_active)
}

pub fn harness_with(provider: SimulatedProvider, max_active: usize) -> Harness {
    // First caller wins; later harnesses reuse the installed subscriber.
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let shared = Arc::new(SharedState::new());
    let clock = Arc::new(FakeClock::new());
    let manager = ContextManager::with_parts(
        provider,
        ManagerConfig {
            max_active_contexts: max_active,
        },
        shared.clone(),
        clock.clone(),
    );
    Harness {
        manager,
        shared,
        clock,
    }
}
