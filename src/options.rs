//! Creation options and API flavor selection for rendering contexts.

/// GPU power hint forwarded to the environment at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PowerPreference {
    /// Let the environment pick.
    #[default]
    Default,
    /// Prefer the discrete/high-clock GPU where one exists.
    HighPerformance,
    /// Prefer the integrated/low-power GPU where one exists.
    LowPower,
}

/// API flavor requested from the environment.
///
/// Acquisition walks [`GlApi::ACQUISITION_ORDER`]: the extended API first,
/// then the base API, then the legacy registration name some environments
/// still answer to even when the canonical name yields nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlApi {
    /// The extended API (second-generation feature set).
    WebGl2,
    /// The base API under its canonical name.
    WebGl1,
    /// The base API under its legacy experimental name.
    WebGl1Legacy,
}

impl GlApi {
    /// Flavors in the order they are attempted: newest first, the legacy
    /// name strictly last.
    pub const ACQUISITION_ORDER: [GlApi; 3] = [GlApi::WebGl2, GlApi::WebGl1, GlApi::WebGl1Legacy];

    /// Whether this flavor carries the extended feature set.
    pub fn is_extended(self) -> bool {
        matches!(self, GlApi::WebGl2)
    }

    /// Registration string used when asking the environment for this flavor.
    pub fn registration_name(self) -> &'static str {
        match self {
            GlApi::WebGl2 => "webgl2",
            GlApi::WebGl1 => "webgl",
            GlApi::WebGl1Legacy => "experimental-webgl",
        }
    }
}

/// Options applied when a context is created.
///
/// The defaults trade memory for quality on typical hardware: antialiasing
/// and a depth buffer on, stencil and buffer preservation off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextOptions {
    /// Keep the drawing buffer contents after presentation. Off: cheaper,
    /// and readback-after-present is not part of this crate's contract.
    pub preserve_drawing_buffer: bool,
    /// Multisample the default framebuffer.
    pub antialias: bool,
    /// Allocate an alpha channel in the default framebuffer.
    pub alpha: bool,
    /// Allocate a depth buffer.
    pub depth: bool,
    /// Allocate a stencil buffer.
    pub stencil: bool,
    /// GPU selection hint.
    pub power_preference: PowerPreference,
    /// Refuse creation when the environment would fall back to a slow
    /// (software) path.
    pub fail_if_major_performance_caveat: bool,
    /// Hint that the drawing buffer may be presented with reduced latency,
    /// possibly bypassing compositing.
    pub desynchronized: bool,
}

impl Default for ContextOptions {
    fn default() -> Self {
        ContextOptions {
            preserve_drawing_buffer: false,
            antialias: true,
            alpha: true,
            depth: true,
            stencil: false,
            power_preference: PowerPreference::Default,
            fail_if_major_performance_caveat: false,
            desynchronized: false,
        }
    }
}

impl ContextOptions {
    /// Options used for the capability probe. The probe refuses software
    /// rasterizers so the reported limits describe real hardware.
    pub(crate) fn probe() -> Self {
        ContextOptions {
            fail_if_major_performance_caveat: true,
            ..ContextOptions::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_match_documented_values() {
        let options = ContextOptions::default();
        assert!(!options.preserve_drawing_buffer);
        assert!(options.antialias);
        assert!(options.alpha);
        assert!(options.depth);
        assert!(!options.stencil);
        assert_eq!(options.power_preference, PowerPreference::Default);
        assert!(!options.fail_if_major_performance_caveat);
        assert!(!options.desynchronized);
    }

    #[test]
    fn acquisition_order_ends_with_legacy_name() {
        assert_eq!(
            GlApi::ACQUISITION_ORDER,
            [GlApi::WebGl2, GlApi::WebGl1, GlApi::WebGl1Legacy]
        );
        assert!(GlApi::WebGl2.is_extended());
        assert!(!GlApi::WebGl1.is_extended());
        assert!(!GlApi::WebGl1Legacy.is_extended());
    }

    #[test]
    fn probe_options_refuse_software_paths() {
        let probe = ContextOptions::probe();
        assert!(probe.fail_if_major_performance_caveat);
        assert_eq!(probe.antialias, ContextOptions::default().antialias);
    }

    #[test]
    fn registration_names_are_distinct() {
        let names: Vec<_> = GlApi::ACQUISITION_ORDER
            .iter()
            .map(|api| api.registration_name())
            .collect();
        assert_eq!(names, ["webgl2", "webgl", "experimental-webgl"]);
    }
}
