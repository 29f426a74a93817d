//! The seam between the lifecycle manager and the real graphics environment.
//!
//! The manager never talks to a concrete windowing or browser layer. It talks
//! to a [`ContextProvider`], the narrow surface it actually needs: create and
//! destroy contexts, query liveness and limits, and force loss/restore for
//! diagnostics. Embedders implement the trait over whatever their platform
//! offers; tests and headless tooling use [`SimulatedProvider`].

use std::collections::HashMap;

use thiserror::Error;

use crate::options::{ContextOptions, GlApi};

/// Identity of a rendering surface. The caller owns the surface; the manager
/// only keys its bookkeeping by this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub u64);

/// Handle to a context owned by the provider. Valid until the provider
/// destroys it; may be in a lost state while still valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextHandle(pub u64);

/// Why a single creation attempt failed.
///
/// These never escape the manager's public creation APIs, which report total
/// failure as `None`. They exist so providers can say what went wrong and so
/// the log explains which flavor failed and why.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CreateError {
    /// The environment does not offer this API flavor.
    #[error("api flavor {0:?} is unavailable")]
    ApiUnavailable(GlApi),
    /// Creation was refused because the environment would fall back to a
    /// slow path and the options forbade that.
    #[error("environment reported a major performance caveat")]
    PerformanceCaveat,
    /// The environment refused to hand out another context.
    #[error("environment context budget exhausted")]
    Exhausted,
    /// Anything else the environment reported.
    #[error("context creation failed: {0}")]
    Environment(String),
}

/// Limits and identity strings read off a live context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeInfo {
    /// Extension names the context exposes.
    pub extensions: Vec<String>,
    /// Largest supported square texture dimension, in texels.
    pub max_texture_size: u32,
    /// Number of vertex attribute slots.
    pub max_vertex_attribs: u32,
    /// Vendor string as reported by the driver.
    pub vendor: String,
    /// Renderer string as reported by the driver.
    pub renderer: String,
}

/// Which API flavors the environment answers to.
///
/// Real environments that offer the extended API also offer the base one;
/// the constructors here encode the combinations worth simulating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiSupport {
    pub webgl2: bool,
    pub webgl1: bool,
    /// The base API under its legacy experimental name only.
    pub legacy_alias: bool,
}

impl ApiSupport {
    /// Extended and base API, both names.
    pub fn full() -> Self {
        ApiSupport {
            webgl2: true,
            webgl1: true,
            legacy_alias: true,
        }
    }

    /// Base API only, both names. Models older hardware.
    pub fn base_only() -> Self {
        ApiSupport {
            webgl2: false,
            webgl1: true,
            legacy_alias: true,
        }
    }

    /// Only the legacy name answers. Models ancient environments that
    /// predate the canonical registration.
    pub fn legacy_only() -> Self {
        ApiSupport {
            webgl2: false,
            webgl1: false,
            legacy_alias: true,
        }
    }

    /// Nothing answers.
    pub fn none() -> Self {
        ApiSupport {
            webgl2: false,
            webgl1: false,
            legacy_alias: false,
        }
    }

    pub fn supports(self, api: GlApi) -> bool {
        match api {
            GlApi::WebGl2 => self.webgl2,
            GlApi::WebGl1 => self.webgl1,
            GlApi::WebGl1Legacy => self.legacy_alias,
        }
    }
}

/// What the lifecycle manager needs from the platform.
///
/// All methods are infallible except creation; a provider signals trouble by
/// returning [`CreateError`] there and `true` from `is_context_lost`
/// elsewhere. Handles passed to the other methods are ones this provider
/// returned earlier; unknown handles must be tolerated (destroy is a no-op,
/// lost reads as `true`).
pub trait ContextProvider {
    /// Ask the environment for a context of the given flavor on `surface`.
    ///
    /// Environments with canvas-like semantics return the existing context
    /// when the surface already holds one of the same flavor, even if that
    /// context is currently lost.
    fn create_context(
        &mut self,
        surface: SurfaceId,
        api: GlApi,
        options: &ContextOptions,
    ) -> Result<ContextHandle, CreateError>;

    /// Release a context and everything it owns.
    fn destroy_context(&mut self, context: ContextHandle);

    /// Ground truth for liveness. Destroyed or unknown handles read lost.
    fn is_context_lost(&self, context: ContextHandle) -> bool;

    /// Read limits and identity strings off a live context.
    fn probe_info(&self, context: ContextHandle) -> ProbeInfo;

    /// Create a throwaway surface for capability probing. The caller
    /// disposes it with [`ContextProvider::dispose_surface`].
    fn create_probe_surface(&mut self) -> SurfaceId;

    /// Dispose a probe surface created by this provider.
    fn dispose_surface(&mut self, surface: SurfaceId);

    /// Force a context into the lost state, as the platform loss extension
    /// would.
    fn force_lose(&mut self, context: ContextHandle);

    /// Undo a forced loss so the context is usable again.
    fn force_restore(&mut self, context: ContextHandle);
}

#[derive(Debug, Clone)]
struct SimContext {
    surface: SurfaceId,
    api: GlApi,
    lost: bool,
}

/// In-memory provider with scriptable failures.
///
/// Mimics canvas semantics: one context per surface, `create_context` hands
/// back the existing context for a surface that already holds one of the
/// requested flavor, and forced loss keeps the handle valid. The public
/// counters double as a debug hook for embedders instrumenting their own
/// provider implementations.
#[derive(Debug)]
pub struct SimulatedProvider {
    support: ApiSupport,
    info: ProbeInfo,
    /// Environment would only offer a software rasterizer.
    performance_caveat: bool,
    /// Next N creation attempts fail outright, regardless of flavor.
    fail_next: u32,
    contexts: HashMap<ContextHandle, SimContext>,
    by_surface: HashMap<SurfaceId, ContextHandle>,
    next_handle: u64,
    next_probe_surface: u64,
    /// Creation attempts observed, including failed ones.
    pub create_calls: u64,
    /// Contexts released via `destroy_context`.
    pub destroy_calls: u64,
    /// Probe surfaces handed out.
    pub probe_surfaces_created: u64,
    /// Probe surfaces disposed.
    pub probe_surfaces_disposed: u64,
    /// Flavor and options of the most recent successful creation.
    pub last_create: Option<(SurfaceId, GlApi, ContextOptions)>,
}

impl SimulatedProvider {
    /// Desktop-class environment: full API support, generous limits.
    pub fn new() -> Self {
        SimulatedProvider::with_support(ApiSupport::full())
    }

    pub fn with_support(support: ApiSupport) -> Self {
        SimulatedProvider {
            support,
            info: ProbeInfo {
                extensions: vec![
                    "WEBGL_lose_context".to_string(),
                    "OES_texture_float".to_string(),
                    "WEBGL_depth_texture".to_string(),
                    "EXT_texture_filter_anisotropic".to_string(),
                ],
                max_texture_size: 16384,
                max_vertex_attribs: 16,
                vendor: "glctx".to_string(),
                renderer: "glctx simulated device".to_string(),
            },
            performance_caveat: false,
            fail_next: 0,
            contexts: HashMap::new(),
            by_surface: HashMap::new(),
            next_handle: 1,
            next_probe_surface: u64::MAX,
            create_calls: 0,
            destroy_calls: 0,
            probe_surfaces_created: 0,
            probe_surfaces_disposed: 0,
            last_create: None,
        }
    }

    /// Environment with no usable API at all.
    pub fn unsupported() -> Self {
        SimulatedProvider::with_support(ApiSupport::none())
    }

    /// Override the limits and identity strings reported by the probe.
    pub fn set_probe_info(&mut self, info: ProbeInfo) {
        self.info = info;
    }

    /// Override just the reported limits.
    pub fn set_limits(&mut self, max_texture_size: u32, max_vertex_attribs: u32) {
        self.info.max_texture_size = max_texture_size;
        self.info.max_vertex_attribs = max_vertex_attribs;
    }

    /// Override the reported extension list.
    pub fn set_extensions(&mut self, extensions: Vec<String>) {
        self.info.extensions = extensions;
    }

    /// Make the environment claim it could only offer a software path.
    /// Creation with `fail_if_major_performance_caveat` then fails.
    pub fn set_performance_caveat(&mut self, caveat: bool) {
        self.performance_caveat = caveat;
    }

    /// Script the next `count` creation attempts to fail.
    pub fn fail_next_creations(&mut self, count: u32) {
        self.fail_next = count;
    }

    /// Number of contexts currently alive inside the provider.
    pub fn live_contexts(&self) -> usize {
        self.contexts.len()
    }
}

impl Default for SimulatedProvider {
    fn default() -> Self {
        SimulatedProvider::new()
    }
}

impl ContextProvider for SimulatedProvider {
    fn create_context(
        &mut self,
        surface: SurfaceId,
        api: GlApi,
        options: &ContextOptions,
    ) -> Result<ContextHandle, CreateError> {
        self.create_calls += 1;
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(CreateError::Environment("scripted failure".to_string()));
        }
        if !self.support.supports(api) {
            return Err(CreateError::ApiUnavailable(api));
        }
        if options.fail_if_major_performance_caveat && self.performance_caveat {
            return Err(CreateError::PerformanceCaveat);
        }
        if let Some(&existing) = self.by_surface.get(&surface) {
            let same_flavor = self
                .contexts
                .get(&existing)
                .map_or(false, |held| held.api == api);
            if same_flavor {
                self.last_create = Some((surface, api, *options));
                return Ok(existing);
            }
            return Err(CreateError::Environment(
                "surface already bound to a different api flavor".to_string(),
            ));
        }
        let handle = ContextHandle(self.next_handle);
        self.next_handle += 1;
        self.contexts.insert(
            handle,
            SimContext {
                surface,
                api,
                lost: false,
            },
        );
        self.by_surface.insert(surface, handle);
        self.last_create = Some((surface, api, *options));
        Ok(handle)
    }

    fn destroy_context(&mut self, context: ContextHandle) {
        if let Some(state) = self.contexts.remove(&context) {
            self.destroy_calls += 1;
            self.by_surface.remove(&state.surface);
        }
    }

    fn is_context_lost(&self, context: ContextHandle) -> bool {
        self.contexts.get(&context).map_or(true, |c| c.lost)
    }

    fn probe_info(&self, _context: ContextHandle) -> ProbeInfo {
        self.info.clone()
    }

    fn create_probe_surface(&mut self) -> SurfaceId {
        // Probe surfaces count down from the top so they never collide with
        // caller surfaces.
        let surface = SurfaceId(self.next_probe_surface);
        self.next_probe_surface -= 1;
        self.probe_surfaces_created += 1;
        surface
    }

    fn dispose_surface(&mut self, surface: SurfaceId) {
        self.probe_surfaces_disposed += 1;
        if let Some(handle) = self.by_surface.remove(&surface) {
            self.contexts.remove(&handle);
        }
    }

    fn force_lose(&mut self, context: ContextHandle) {
        if let Some(state) = self.contexts.get_mut(&context) {
            state.lost = true;
        }
    }

    fn force_restore(&mut self, context: ContextHandle) {
        if let Some(state) = self.contexts.get_mut(&context) {
            state.lost = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_destroy_round_trips() {
        let mut provider = SimulatedProvider::new();
        let handle = provider
            .create_context(SurfaceId(1), GlApi::WebGl2, &ContextOptions::default())
            .unwrap();
        assert!(!provider.is_context_lost(handle));
        assert_eq!(provider.live_contexts(), 1);

        provider.destroy_context(handle);
        assert!(provider.is_context_lost(handle));
        assert_eq!(provider.live_contexts(), 0);
        assert_eq!(provider.destroy_calls, 1);
    }

    #[test]
    fn same_surface_same_flavor_returns_existing_context() {
        let mut provider = SimulatedProvider::new();
        let first = provider
            .create_context(SurfaceId(7), GlApi::WebGl2, &ContextOptions::default())
            .unwrap();
        let second = provider
            .create_context(SurfaceId(7), GlApi::WebGl2, &ContextOptions::default())
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(provider.live_contexts(), 1);
    }

    #[test]
    fn same_surface_different_flavor_is_refused() {
        let mut provider = SimulatedProvider::new();
        provider
            .create_context(SurfaceId(7), GlApi::WebGl1, &ContextOptions::default())
            .unwrap();
        let err = provider
            .create_context(SurfaceId(7), GlApi::WebGl2, &ContextOptions::default())
            .unwrap_err();
        assert!(matches!(err, CreateError::Environment(_)));
    }

    #[test]
    fn support_matrix_gates_flavors() {
        let mut provider = SimulatedProvider::with_support(ApiSupport::base_only());
        let err = provider
            .create_context(SurfaceId(1), GlApi::WebGl2, &ContextOptions::default())
            .unwrap_err();
        assert_eq!(err, CreateError::ApiUnavailable(GlApi::WebGl2));
        provider
            .create_context(SurfaceId(1), GlApi::WebGl1, &ContextOptions::default())
            .unwrap();
    }

    #[test]
    fn caveat_only_blocks_when_options_forbid_it() {
        let mut provider = SimulatedProvider::new();
        provider.set_performance_caveat(true);

        let strict = ContextOptions {
            fail_if_major_performance_caveat: true,
            ..ContextOptions::default()
        };
        let err = provider
            .create_context(SurfaceId(1), GlApi::WebGl2, &strict)
            .unwrap_err();
        assert_eq!(err, CreateError::PerformanceCaveat);

        provider
            .create_context(SurfaceId(1), GlApi::WebGl2, &ContextOptions::default())
            .unwrap();
    }

    #[test]
    fn scripted_failures_burn_down() {
        let mut provider = SimulatedProvider::new();
        provider.fail_next_creations(2);
        for _ in 0..2 {
            assert!(provider
                .create_context(SurfaceId(1), GlApi::WebGl2, &ContextOptions::default())
                .is_err());
        }
        assert!(provider
            .create_context(SurfaceId(1), GlApi::WebGl2, &ContextOptions::default())
            .is_ok());
        assert_eq!(provider.create_calls, 3);
    }

    #[test]
    fn forced_loss_keeps_handle_valid_until_destroy() {
        let mut provider = SimulatedProvider::new();
        let handle = provider
            .create_context(SurfaceId(1), GlApi::WebGl2, &ContextOptions::default())
            .unwrap();

        provider.force_lose(handle);
        assert!(provider.is_context_lost(handle));
        assert_eq!(provider.live_contexts(), 1);

        provider.force_restore(handle);
        assert!(!provider.is_context_lost(handle));
    }

    #[test]
    fn probe_surfaces_never_collide_with_caller_surfaces() {
        let mut provider = SimulatedProvider::new();
        let a = provider.create_probe_surface();
        let b = provider.create_probe_surface();
        assert_ne!(a, b);
        assert!(a.0 > 1u64 << 32);
        provider.dispose_surface(a);
        provider.dispose_surface(b);
        assert_eq!(provider.probe_surfaces_created, 2);
        assert_eq!(provider.probe_surfaces_disposed, 2);
    }
}
