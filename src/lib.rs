//! `glctx` manages the lifecycle of WebGL-style rendering contexts.
//!
//! Currently this crate provides:
//! - Resource-bounded context acquisition with a FIFO overflow queue (see
//!   [`ContextManager`]).
//! - Loss and restore handling that keeps per-surface state and re-creates
//!   contexts with their original options.
//! - Capability probing memoized process-wide, plus a viability gate and
//!   quality presets derived from it (see [`Capabilities`]).
//! - Lifecycle counters cheap enough to leave on (see [`MetricsSnapshot`]).
//!
//! The environment is reached only through the [`ContextProvider`] seam;
//! [`SimulatedProvider`] implements it in memory for tests and headless
//! tooling. Creation is null-safe by contract: every acquisition path
//! reports failure as `None` rather than panicking or raising.

mod caps;
mod clock;
mod manager;
mod metrics;
mod options;
mod provider;
mod quality;
mod shared;

pub use caps::{Capabilities, GlFeatures};
pub use clock::{Clock, FakeClock, StdClock};
pub use manager::{
    ContextEvent, ContextManager, ManagerConfig, MemoryUsage, QueueStatus, QueuedContext,
};
pub use metrics::{ContextMetrics, MetricsSnapshot};
pub use options::{ContextOptions, GlApi, PowerPreference};
pub use provider::{
    ApiSupport, ContextHandle, ContextProvider, CreateError, ProbeInfo, SimulatedProvider,
    SurfaceId,
};
pub use quality::{recommended_settings, DetailLevel, FormFactor, QualitySettings, QualityTier};
pub use shared::SharedState;
