//! Capability probing, the viability gate, and quality recommendations as
//! seen through a manager.

mod common;

use std::sync::Arc;

use common::{harness, harness_with};
use glctx::{
    ApiSupport, ContextManager, ContextOptions, FakeClock, FormFactor, ManagerConfig,
    QualityTier, SharedState, SimulatedProvider, SurfaceId,
};

#[test]
fn probe_runs_once_and_is_memoized() {
    let mut h = harness(1);
    let first = h.manager.detect_capabilities();
    assert!(first.webgl2());
    assert_eq!(h.manager.provider().create_calls, 1);
    assert_eq!(h.manager.provider().probe_surfaces_created, 1);
    assert_eq!(h.manager.provider().probe_surfaces_disposed, 1);

    let second = h.manager.detect_capabilities();
    assert_eq!(second, first);
    // No new context creation: the second call served from the cache.
    assert_eq!(h.manager.provider().create_calls, 1);
}

#[test]
fn managers_on_the_same_shared_state_share_one_probe() {
    let shared = Arc::new(SharedState::new());
    let clock = Arc::new(FakeClock::new());

    let mut first = ContextManager::with_parts(
        SimulatedProvider::new(),
        ManagerConfig::default(),
        shared.clone(),
        clock.clone(),
    );
    let caps = first.detect_capabilities();

    let mut second = ContextManager::with_parts(
        SimulatedProvider::new(),
        ManagerConfig::default(),
        shared.clone(),
        clock,
    );
    assert_eq!(second.detect_capabilities(), caps);
    assert_eq!(second.provider().create_calls, 0);
    assert_eq!(second.provider().probe_surfaces_created, 0);
}

#[test]
fn clearing_the_cache_reprobes_with_current_hardware() {
    let mut h = harness(1);
    let before = h.manager.detect_capabilities();
    assert_eq!(before.max_texture_size, 16384);

    // Driver swap under our feet.
    h.manager.provider_mut().set_limits(4096, 16);
    h.shared.clear_capability_cache();

    let after = h.manager.detect_capabilities();
    assert_eq!(after.max_texture_size, 4096);
    assert_eq!(h.manager.provider().create_calls, 2);
}

#[test]
fn viability_requires_the_base_api() {
    let mut dead = harness_with(SimulatedProvider::unsupported(), 1);
    assert!(!dead.manager.is_webgl_viable());

    let mut alive = harness_with(SimulatedProvider::with_support(ApiSupport::base_only()), 1);
    assert!(alive.manager.is_webgl_viable());
}

#[test]
fn viability_requires_minimum_limits() {
    let mut tiny_textures = SimulatedProvider::new();
    tiny_textures.set_limits(256, 16);
    let mut h = harness_with(tiny_textures, 1);
    assert!(!h.manager.is_webgl_viable());

    let mut few_attribs = SimulatedProvider::new();
    few_attribs.set_limits(2048, 4);
    let mut h = harness_with(few_attribs, 1);
    assert!(!h.manager.is_webgl_viable());

    let mut boundary = SimulatedProvider::new();
    boundary.set_limits(512, 8);
    let mut h = harness_with(boundary, 1);
    assert!(h.manager.is_webgl_viable());
}

#[test]
fn viability_flips_after_three_creation_failures() {
    let mut h = harness(1);
    assert!(h.manager.is_webgl_viable());

    // Two total failures: still under the limit.
    h.manager.provider_mut().fail_next_creations(6);
    assert!(h
        .manager
        .create_context(SurfaceId(1), &ContextOptions::default())
        .is_none());
    assert!(h
        .manager
        .create_context(SurfaceId(1), &ContextOptions::default())
        .is_none());
    assert_eq!(h.manager.metrics().creation_failures, 2);
    assert!(h.manager.is_webgl_viable());

    // Third failure crosses it.
    h.manager.provider_mut().fail_next_creations(3);
    assert!(h
        .manager
        .create_context(SurfaceId(1), &ContextOptions::default())
        .is_none());
    assert_eq!(h.manager.metrics().creation_failures, 3);
    assert!(!h.manager.is_webgl_viable());
}

#[test]
fn recommended_settings_follow_the_environment() {
    let mut high_end = harness(1);
    let settings = high_end.manager.recommended_settings(FormFactor::Desktop);
    assert_eq!(settings.tier, QualityTier::HighEndDesktop);
    assert!(settings.antialias);

    // Same hardware, handheld form factor.
    let settings = high_end.manager.recommended_settings(FormFactor::Mobile);
    assert_eq!(settings.tier, QualityTier::Mobile);
    assert_eq!(settings.target_fps, 30);

    let mut base = SimulatedProvider::with_support(ApiSupport::base_only());
    base.set_limits(4096, 16);
    let mut mid = harness_with(base, 1);
    assert_eq!(
        mid.manager.recommended_settings(FormFactor::Desktop).tier,
        QualityTier::MidRangeDesktop
    );

    let mut none = harness_with(SimulatedProvider::unsupported(), 1);
    let settings = none.manager.recommended_settings(FormFactor::Desktop);
    assert_eq!(settings.tier, QualityTier::Unsupported);
    assert_eq!(settings.max_particles, 0);
}

#[test]
fn metrics_json_reports_lifecycle_counts() {
    let mut h = harness(1);
    h.manager
        .create_context(SurfaceId(1), &ContextOptions::default());
    h.clock.advance_ms(42);
    h.manager.lose_context(SurfaceId(1));

    let json = h.manager.metrics().to_json();
    assert!(json.starts_with('{') && json.ends_with('}'));
    assert!(json.contains("\"creations_succeeded\":1"));
    assert!(json.contains("\"context_losses\":1"));
    assert!(json.contains("\"last_loss_at_ms\":42"));
}
