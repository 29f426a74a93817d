//! Context lifecycle manager.
//!
//! One manager instance owns a set of live contexts keyed by surface, a FIFO
//! queue of deferred creation requests, and per-surface loss/restore
//! observers. Creation never panics and never surfaces an error type: a
//! request that cannot be satisfied yields `None` and bumps the failure
//! counter, and the caller decides whether to degrade or retry.
//!
//! Two creation paths exist on purpose. [`ContextManager::create_context`]
//! is direct and ungated. [`ContextManager::create_context_queued`] respects
//! [`ManagerConfig::max_active_contexts`] and parks excess requests until
//! [`ContextManager::cleanup_context`] frees a slot. The self-healing
//! [`ContextManager::get_context`] uses the direct path, so a heal while at
//! capacity can push the active count past the cap; see that method's docs.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use futures_intrusive::channel::shared::{
    oneshot_channel, OneshotReceiver, OneshotSender,
};
use futures_intrusive::channel::ChannelSendError;

use crate::caps::{self, Capabilities};
use crate::clock::{Clock, StdClock};
use crate::metrics::MetricsSnapshot;
use crate::options::{ContextOptions, GlApi};
use crate::provider::{ContextHandle, ContextProvider, SurfaceId};
use crate::quality::{self, FormFactor, QualitySettings};
use crate::shared::SharedState;

/// Environment override for the active-context cap.
const MAX_ACTIVE_CONTEXTS_ENV: &str = "GLCTX_MAX_ACTIVE_CONTEXTS";

const DEFAULT_MAX_ACTIVE_CONTEXTS: usize = 1;

/// Creation failures at or past this count disqualify the environment.
const VIABILITY_FAILURE_LIMIT: u64 = 3;
/// Smallest texture dimension real content can render into.
const MIN_VIABLE_TEXTURE_SIZE: u32 = 512;
/// Fewer attribute slots than this and even basic meshes will not bind.
const MIN_VIABLE_VERTEX_ATTRIBS: u32 = 8;

/// Order-of-magnitude budget for one context: default framebuffer plus
/// driver bookkeeping. Environments expose no real number, so the memory
/// report is an estimate by construction.
const NOMINAL_CONTEXT_BYTES: u64 = 64 * 1024 * 1024;

/// Tunables for one manager instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Most contexts the queued creation path keeps alive at once.
    pub max_active_contexts: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        ManagerConfig {
            max_active_contexts: DEFAULT_MAX_ACTIVE_CONTEXTS,
        }
    }
}

impl ManagerConfig {
    /// Defaults, with `GLCTX_MAX_ACTIVE_CONTEXTS` applied when it parses as
    /// a positive integer. Anything else is logged and ignored.
    pub fn from_env() -> Self {
        let raw = std::env::var(MAX_ACTIVE_CONTEXTS_ENV).ok();
        ManagerConfig::default().with_env_override(raw.as_deref())
    }

    fn with_env_override(self, raw: Option<&str>) -> Self {
        let Some(raw) = raw else { return self };
        match raw.trim().parse::<usize>() {
            Ok(cap) if cap >= 1 => ManagerConfig {
                max_active_contexts: cap,
            },
            _ => {
                tracing::warn!(
                    env = MAX_ACTIVE_CONTEXTS_ENV,
                    value = raw,
                    "ignoring unparsable context cap override"
                );
                self
            }
        }
    }
}

/// Payload handed to loss/restore observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextEvent {
    pub surface: SurfaceId,
    /// Manager clock timestamp, in milliseconds.
    pub at_ms: u64,
    /// The replacement handle on restore; `None` on loss.
    pub context: Option<ContextHandle>,
}

/// Point-in-time view of the creation queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStatus {
    pub active: usize,
    pub queued: usize,
    pub max_active: usize,
}

/// Rough footprint report. `estimated_context_bytes` is nominal, not
/// measured; see [`ContextManager::memory_usage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryUsage {
    pub active_contexts: usize,
    pub queued_requests: usize,
    pub estimated_context_bytes: u64,
}

/// A deferred creation request returned by
/// [`ContextManager::create_context_queued`].
pub struct QueuedContext {
    receiver: OneshotReceiver<Option<ContextHandle>>,
}

impl QueuedContext {
    /// Waits until the request is serviced. Resolves to `None` when creation
    /// failed or the manager was disposed with the request still queued.
    ///
    /// There is no timeout: if no slot is ever released and the manager
    /// stays alive, this pends forever. Callers that cannot tolerate that
    /// must race it against their own deadline.
    pub async fn resolve(self) -> Option<ContextHandle> {
        self.receiver.receive().await.flatten()
    }
}

#[derive(Debug, Clone, Copy)]
struct ManagedContext {
    handle: ContextHandle,
    api: GlApi,
    /// Creation options as originally requested; restore re-creates with
    /// exactly these.
    options: ContextOptions,
    /// Manager's view of liveness. Cleared by a loss notification, set again
    /// by successful creation.
    live: bool,
}

struct QueuedRequest {
    surface: SurfaceId,
    options: ContextOptions,
    sender: OneshotSender<Option<ContextHandle>>,
}

type EventHandler = Box<dyn FnMut(&ContextEvent)>;

/// Owner of context lifecycles for one rendering embedder.
///
/// Generic over the [`ContextProvider`] seam; production embedders wrap
/// their platform layer, tests use
/// [`SimulatedProvider`](crate::SimulatedProvider).
pub struct ContextManager<P: ContextProvider> {
    provider: P,
    config: ManagerConfig,
    shared: Arc<SharedState>,
    clock: Arc<dyn Clock>,
    active: HashMap<SurfaceId, ManagedContext>,
    queue: VecDeque<QueuedRequest>,
    lost_observers: HashMap<SurfaceId, Vec<EventHandler>>,
    restored_observers: HashMap<SurfaceId, Vec<EventHandler>>,
}

impl<P: ContextProvider> ContextManager<P> {
    /// Manager on the process-wide shared state, config from the
    /// environment, wall clock.
    pub fn new(provider: P) -> Self {
        ContextManager::with_parts(
            provider,
            ManagerConfig::from_env(),
            SharedState::global(),
            Arc::new(StdClock::new()),
        )
    }

    /// Explicit config wins over the environment.
    pub fn with_config(provider: P, config: ManagerConfig) -> Self {
        ContextManager::with_parts(provider, config, SharedState::global(), Arc::new(StdClock::new()))
    }

    /// Fully injected construction. Tests pass a private [`SharedState`] and
    /// a fake clock here so nothing leaks between cases.
    pub fn with_parts(
        provider: P,
        config: ManagerConfig,
        shared: Arc<SharedState>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        ContextManager {
            provider,
            config,
            shared,
            clock,
            active: HashMap::new(),
            queue: VecDeque::new(),
            lost_observers: HashMap::new(),
            restored_observers: HashMap::new(),
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }

    pub fn config(&self) -> ManagerConfig {
        self.config
    }

    pub fn shared(&self) -> &Arc<SharedState> {
        &self.shared
    }

    /// Probe the environment, or return the process-wide cached record if a
    /// probe already ran. Never fails; a dead environment reports
    /// [`Capabilities::unsupported`].
    pub fn detect_capabilities(&mut self) -> Capabilities {
        let provider = &mut self.provider;
        self.shared.capabilities_or_probe(|| caps::probe(provider))
    }

    /// Create a context for `surface`, walking the API flavors newest-first.
    ///
    /// Direct and ungated: this path neither consults the queue nor the
    /// active-context cap. On total failure it records one creation failure
    /// and returns `None`; it never panics on environment trouble.
    pub fn create_context(
        &mut self,
        surface: SurfaceId,
        options: &ContextOptions,
    ) -> Option<ContextHandle> {
        let started_ns = self.clock.now_ns();
        self.shared.metrics().record_creation_attempt();
        for api in GlApi::ACQUISITION_ORDER {
            match self.provider.create_context(surface, api, options) {
                Ok(handle) => {
                    let elapsed_ns = self.clock.now_ns().saturating_sub(started_ns);
                    self.shared.metrics().record_creation_success(elapsed_ns);
                    tracing::debug!(?surface, ?api, ?handle, "created rendering context");
                    self.active.insert(
                        surface,
                        ManagedContext {
                            handle,
                            api,
                            options: *options,
                            live: true,
                        },
                    );
                    return Some(handle);
                }
                Err(err) => {
                    tracing::debug!(?surface, ?api, %err, "context creation attempt failed");
                }
            }
        }
        self.shared.metrics().record_creation_failure();
        tracing::warn!(?surface, "context creation failed for every api flavor");
        None
    }

    /// Create a context, or park the request until a slot frees up.
    ///
    /// Under the cap this behaves like [`ContextManager::create_context`]
    /// and the returned future resolves immediately. At the cap the request
    /// joins a FIFO queue; each [`ContextManager::cleanup_context`] services
    /// exactly one queued request.
    pub fn create_context_queued(
        &mut self,
        surface: SurfaceId,
        options: &ContextOptions,
    ) -> QueuedContext {
        let (sender, receiver) = oneshot_channel();
        if self.active.len() < self.config.max_active_contexts {
            let prior = self.active.get(&surface).map(|managed| managed.handle);
            let result = self.create_context(surface, options);
            self.deliver(surface, prior, sender, result);
        } else {
            tracing::debug!(
                ?surface,
                depth = self.queue.len() + 1,
                "context cap reached; queueing creation request"
            );
            self.queue.push_back(QueuedRequest {
                surface,
                options: *options,
                sender,
            });
        }
        QueuedContext { receiver }
    }

    /// Release `surface`'s context and service the next queued request, if
    /// any. Unknown surfaces are a no-op, so calling this twice is safe.
    pub fn cleanup_context(&mut self, surface: SurfaceId) {
        let Some(managed) = self.active.remove(&surface) else {
            return;
        };
        self.provider.destroy_context(managed.handle);
        self.lost_observers.remove(&surface);
        self.restored_observers.remove(&surface);
        tracing::debug!(?surface, handle = ?managed.handle, "released rendering context");
        self.service_queue();
    }

    /// The usable context for `surface`, re-fetching if the held one is
    /// missing or lost.
    ///
    /// The re-fetch goes through the direct creation path, not the queue. A
    /// heal for an unmanaged surface while at capacity therefore pushes the
    /// active count past the cap until something is cleaned up; the queued
    /// path alone can never do that.
    pub fn get_context(&mut self, surface: SurfaceId) -> Option<ContextHandle> {
        if let Some(managed) = self.active.get(&surface) {
            if managed.live && !self.provider.is_context_lost(managed.handle) {
                return Some(managed.handle);
            }
        }
        let options = self
            .active
            .get(&surface)
            .map(|managed| managed.options)
            .unwrap_or_default();
        tracing::debug!(?surface, "no usable context; re-fetching");
        self.create_context(surface, &options)
    }

    /// Whether the manager holds a context for `surface`, usable or not.
    pub fn has_context(&self, surface: SurfaceId) -> bool {
        self.active.contains_key(&surface)
    }

    /// Manager's view of liveness. Read-only; unlike
    /// [`ContextManager::get_context`] this never re-fetches.
    pub fn context_is_live(&self, surface: SurfaceId) -> bool {
        self.active
            .get(&surface)
            .map(|managed| managed.live)
            .unwrap_or(false)
    }

    /// Which API flavor `surface`'s context came from.
    pub fn context_api(&self, surface: SurfaceId) -> Option<GlApi> {
        self.active.get(&surface).map(|managed| managed.api)
    }

    /// Register an observer for loss events on `surface`. Observers are
    /// per-surface, fire in registration order, and are dropped by
    /// [`ContextManager::cleanup_context`] and
    /// [`ContextManager::dispose`].
    pub fn on_context_lost(
        &mut self,
        surface: SurfaceId,
        handler: impl FnMut(&ContextEvent) + 'static,
    ) {
        self.lost_observers
            .entry(surface)
            .or_default()
            .push(Box::new(handler));
    }

    /// Register an observer for restore events on `surface`.
    pub fn on_context_restored(
        &mut self,
        surface: SurfaceId,
        handler: impl FnMut(&ContextEvent) + 'static,
    ) {
        self.restored_observers
            .entry(surface)
            .or_default()
            .push(Box::new(handler));
    }

    /// Tell the manager the environment lost `surface`'s context.
    ///
    /// Marks the entry not-live but keeps it in the map with its original
    /// options, records the loss, and fires the surface's loss observers.
    /// Fires at most once per loss: repeat notifications for an
    /// already-lost context are ignored. Unmanaged surfaces are ignored.
    pub fn notify_context_lost(&mut self, surface: SurfaceId) {
        let Some(managed) = self.active.get_mut(&surface) else {
            return;
        };
        if !managed.live {
            return;
        }
        managed.live = false;
        let at_ms = self.clock.now_ms();
        self.shared.metrics().record_loss(at_ms);
        tracing::warn!(?surface, "rendering context lost");
        self.emit_lost(surface, at_ms);
    }

    /// Tell the manager the environment says `surface`'s context can come
    /// back.
    ///
    /// Records the restore, then immediately re-creates with the original
    /// creation options. Success updates the map and fires the surface's
    /// restore observers with the replacement handle. Failure fires nothing
    /// and leaves the surface without a usable context; callers discover
    /// that by polling [`ContextManager::get_context`]. Ignored for
    /// surfaces that are unmanaged or were never lost.
    pub fn notify_context_restored(&mut self, surface: SurfaceId) {
        let options = match self.active.get(&surface) {
            Some(managed) if !managed.live => managed.options,
            _ => return,
        };
        self.shared.metrics().record_restore();
        match self.create_context(surface, &options) {
            Some(handle) => {
                let at_ms = self.clock.now_ms();
                tracing::info!(?surface, ?handle, "rendering context restored");
                self.emit_restored(surface, at_ms, handle);
            }
            None => {
                tracing::warn!(?surface, "restore notified but recreation failed");
            }
        }
    }

    /// Force-lose `surface`'s context through the provider, then run the
    /// loss flow synchronously. Diagnostics hook; unmanaged surfaces are a
    /// no-op.
    pub fn lose_context(&mut self, surface: SurfaceId) {
        let Some(handle) = self.active.get(&surface).map(|managed| managed.handle) else {
            return;
        };
        self.provider.force_lose(handle);
        self.notify_context_lost(surface);
    }

    /// Undo a forced loss and run the restore flow synchronously. A no-op
    /// for surfaces that are unmanaged or were never lost.
    pub fn restore_context(&mut self, surface: SurfaceId) {
        let Some(handle) = self.active.get(&surface).map(|managed| managed.handle) else {
            return;
        };
        self.provider.force_restore(handle);
        self.notify_context_restored(surface);
    }

    /// One-shot gate: is this environment worth rendering on at all?
    ///
    /// Requires the base API, minimum limits real content needs, and fewer
    /// than three cumulative creation failures. The failure count is
    /// process-wide, so a flaky driver that burned other managers counts
    /// against this one too.
    pub fn is_webgl_viable(&mut self) -> bool {
        let caps = self.detect_capabilities();
        let failures = self.shared.metrics().creation_failures();
        caps.webgl()
            && caps.max_texture_size >= MIN_VIABLE_TEXTURE_SIZE
            && caps.max_vertex_attribs >= MIN_VIABLE_VERTEX_ATTRIBS
            && failures < VIABILITY_FAILURE_LIMIT
    }

    /// Quality preset for this environment and form factor.
    pub fn recommended_settings(&mut self, form_factor: FormFactor) -> QualitySettings {
        let caps = self.detect_capabilities();
        quality::recommended_settings(&caps, form_factor)
    }

    /// Snapshot of the process-wide lifecycle counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics().snapshot()
    }

    /// Instance footprint. Context bytes are a nominal per-context figure,
    /// not a driver measurement.
    pub fn memory_usage(&self) -> MemoryUsage {
        MemoryUsage {
            active_contexts: self.active.len(),
            queued_requests: self.queue.len(),
            estimated_context_bytes: self.active.len() as u64 * NOMINAL_CONTEXT_BYTES,
        }
    }

    pub fn queue_status(&self) -> QueueStatus {
        QueueStatus {
            active: self.active.len(),
            queued: self.queue.len(),
            max_active: self.config.max_active_contexts,
        }
    }

    /// Tear down instance state: destroy every managed context, drop all
    /// observers, and resolve every queued request to `None`.
    ///
    /// Process-wide state is deliberately untouched: the capability cache
    /// and cumulative counters describe the machine and the session, not
    /// this instance. Also runs on drop.
    pub fn dispose(&mut self) {
        let drained: Vec<(SurfaceId, ManagedContext)> = self.active.drain().collect();
        for (surface, managed) in drained {
            self.provider.destroy_context(managed.handle);
            tracing::debug!(?surface, handle = ?managed.handle, "released rendering context at dispose");
        }
        // Dropping the senders resolves the parked futures to `None`.
        self.queue.clear();
        self.lost_observers.clear();
        self.restored_observers.clear();
        tracing::debug!("context manager disposed");
    }

    /// Hand `result` to a requester. On a dropped receiver the context has
    /// no owner, so reclaim it and report `false` to let the caller service
    /// the next request. `prior` is the handle the surface held before this
    /// request was serviced: when acquisition handed back that same context
    /// (canvas-style surfaces do), it belongs to an earlier caller and must
    /// survive the reclaim.
    fn deliver(
        &mut self,
        surface: SurfaceId,
        prior: Option<ContextHandle>,
        sender: OneshotSender<Option<ContextHandle>>,
        result: Option<ContextHandle>,
    ) -> bool {
        match sender.send(result) {
            Ok(()) => true,
            Err(ChannelSendError(unclaimed)) => {
                match unclaimed {
                    Some(handle) if prior != Some(handle) => {
                        tracing::debug!(
                            ?surface,
                            ?handle,
                            "queued requester vanished; reclaiming context"
                        );
                        self.active.remove(&surface);
                        self.provider.destroy_context(handle);
                    }
                    _ => {}
                }
                false
            }
        }
    }

    /// Service at most one queued request, skipping requests whose futures
    /// were dropped while parked.
    fn service_queue(&mut self) {
        while self.active.len() < self.config.max_active_contexts {
            let Some(request) = self.queue.pop_front() else {
                return;
            };
            let QueuedRequest {
                surface,
                options,
                sender,
            } = request;
            let prior = self.active.get(&surface).map(|managed| managed.handle);
            let result = self.create_context(surface, &options);
            if self.deliver(surface, prior, sender, result) {
                return;
            }
        }
    }

    fn emit_lost(&mut self, surface: SurfaceId, at_ms: u64) {
        let event = ContextEvent {
            surface,
            at_ms,
            context: None,
        };
        if let Some(handlers) = self.lost_observers.get_mut(&surface) {
            for handler in handlers.iter_mut() {
                handler(&event);
            }
        }
    }

    fn emit_restored(&mut self, surface: SurfaceId, at_ms: u64, context: ContextHandle) {
        let event = ContextEvent {
            surface,
            at_ms,
            context: Some(context),
        };
        if let Some(handlers) = self.restored_observers.get_mut(&surface) {
            for handler in handlers.iter_mut() {
                handler(&event);
            }
        }
    }
}

impl<P: ContextProvider> Drop for ContextManager<P> {
    fn drop(&mut self) {
        self.dispose();
    }
}
