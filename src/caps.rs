//! Capability detection.
//!
//! The probe creates a short-lived context on a throwaway surface, reads its
//! limits and extension list, then tears everything down again. It is strict:
//! creation uses the fail-on-performance-caveat options, so an environment
//! that could only offer a software rasterizer reports as unsupported rather
//! than as slow hardware. A probe that cannot create any context at all
//! yields [`Capabilities::unsupported`] instead of an error.
//!
//! Probing is expensive enough (a full context create/destroy) that results
//! are memoized process-wide; see [`crate::shared::SharedState`].

use bitflags::bitflags;

use crate::options::{ContextOptions, GlApi};
use crate::provider::{ContextProvider, ProbeInfo};

bitflags! {
    /// Boolean capability bits derived from a probe.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct GlFeatures: u32 {
        /// The base API is available.
        const BASE_API = 1 << 0;
        /// The extended API is available.
        const EXTENDED_API = 1 << 1;
        /// The loss-simulation extension is exposed, so forced loss and
        /// restore work.
        const LOSE_CONTEXT = 1 << 2;
        /// Floating-point textures are renderable.
        const FLOAT_TEXTURES = 1 << 3;
        /// Depth textures can be sampled.
        const DEPTH_TEXTURES = 1 << 4;
        /// Anisotropic filtering is available.
        const ANISOTROPIC_FILTERING = 1 << 5;
    }
}

/// What one probe learned about the environment.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub features: GlFeatures,
    /// Raw extension names, for callers that gate on something this crate
    /// has no flag for.
    pub extensions: Vec<String>,
    pub max_texture_size: u32,
    pub max_vertex_attribs: u32,
    pub vendor: String,
    pub renderer: String,
}

impl Capabilities {
    /// The all-false record reported when no context can be created.
    pub fn unsupported() -> Self {
        Capabilities::default()
    }

    /// Base API available.
    pub fn webgl(&self) -> bool {
        self.features.contains(GlFeatures::BASE_API)
    }

    /// Extended API available.
    pub fn webgl2(&self) -> bool {
        self.features.contains(GlFeatures::EXTENDED_API)
    }

    pub fn has_extension(&self, name: &str) -> bool {
        self.extensions.iter().any(|e| e == name)
    }

    fn from_probe(api: GlApi, info: ProbeInfo) -> Self {
        let mut features = GlFeatures::BASE_API;
        if api.is_extended() {
            features |= GlFeatures::EXTENDED_API;
        }
        for extension in &info.extensions {
            features |= match extension.as_str() {
                "WEBGL_lose_context" => GlFeatures::LOSE_CONTEXT,
                "OES_texture_float" | "EXT_color_buffer_float" => GlFeatures::FLOAT_TEXTURES,
                "WEBGL_depth_texture" => GlFeatures::DEPTH_TEXTURES,
                "EXT_texture_filter_anisotropic" => GlFeatures::ANISOTROPIC_FILTERING,
                _ => GlFeatures::empty(),
            };
        }
        // The extended API folds depth textures and float rendering into
        // core, whether or not the driver still lists the old extensions.
        if api.is_extended() {
            features |= GlFeatures::DEPTH_TEXTURES;
        }
        Capabilities {
            features,
            extensions: info.extensions,
            max_texture_size: info.max_texture_size,
            max_vertex_attribs: info.max_vertex_attribs,
            vendor: info.vendor,
            renderer: info.renderer,
        }
    }
}

/// Run one probe against `provider`. Never fails; a dead environment yields
/// the unsupported record.
pub(crate) fn probe<P: ContextProvider>(provider: &mut P) -> Capabilities {
    let surface = provider.create_probe_surface();
    let options = ContextOptions::probe();
    let mut caps = Capabilities::unsupported();
    for api in GlApi::ACQUISITION_ORDER {
        match provider.create_context(surface, api, &options) {
            Ok(context) => {
                let info = provider.probe_info(context);
                tracing::debug!(
                    ?api,
                    max_texture_size = info.max_texture_size,
                    max_vertex_attribs = info.max_vertex_attribs,
                    renderer = %info.renderer,
                    "capability probe succeeded"
                );
                caps = Capabilities::from_probe(api, info);
                provider.destroy_context(context);
                break;
            }
            Err(err) => {
                tracing::debug!(?api, %err, "capability probe attempt failed");
            }
        }
    }
    provider.dispose_surface(surface);
    if caps.features.is_empty() {
        tracing::warn!("capability probe found no usable api; reporting unsupported");
    }
    caps
}
