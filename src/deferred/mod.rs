//! Visibility-driven deferred resolution
//!
//! A [`DeferredTrigger`] holds back the resolution of an asset until its
//! rendering surface becomes visible. Each mounted surface moves through
//! `Idle -> Armed -> Fired -> Done`:
//!
//! - **Idle**: mounted, not yet registered with the viewport source
//! - **Armed**: registered, waiting for a visibility signal
//! - **Fired**: signal seen, surface deregistered, resolution running
//! - **Done**: resolution finished and delivered
//!
//! A surface fires at most once per mount; later signals are ignored.
//! Eager surfaces skip the viewport entirely and resolve on mount.
//!
//! ## Example
//!
//! ```rust,no_run
//! use imgcache::deferred::{DeferredTrigger, LoadMode, Rect, SurfaceId, ViewportTracker};
//! use imgcache::pipeline::{AssetResolver, RequestConstraints};
//! use std::sync::Arc;
//!
//! # async fn example(resolver: Arc<dyn AssetResolver>) {
//! let tracker = Arc::new(ViewportTracker::default());
//! let trigger = DeferredTrigger::new(resolver, tracker.clone());
//!
//! let surface = SurfaceId::new();
//! tracker.set_surface_rect(surface, Rect::new(0.0, 1800.0, 400.0, 300.0));
//! let pending = trigger.mount(
//!     surface,
//!     "img/gallery-3.png",
//!     RequestConstraints::for_width(400),
//!     LoadMode::Deferred,
//! );
//!
//! tracker.update_viewport(Rect::new(0.0, 1500.0, 1280.0, 720.0));
//! if let Some(Ok(resource)) = pending.wait().await {
//!     println!("loaded {} bytes", resource.len());
//! }
//! # }
//! ```

pub mod geometry;
pub mod viewport;

pub use geometry::{intersection_ratio, Rect};
pub use viewport::{ViewportSource, ViewportTracker, VisibilityCallback, VisibilityPolicy};

use crate::cache::Resource;
use crate::error::Result;
use crate::pipeline::{AssetResolver, RequestConstraints};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, info};
use uuid::Uuid;

/// Handle identifying one rendering surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SurfaceId(Uuid);

impl SurfaceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SurfaceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a mounted surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SurfaceState {
    Idle,
    Armed,
    Fired,
    Done,
}

impl fmt::Display for SurfaceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SurfaceState::Idle => write!(f, "idle"),
            SurfaceState::Armed => write!(f, "armed"),
            SurfaceState::Fired => write!(f, "fired"),
            SurfaceState::Done => write!(f, "done"),
        }
    }
}

/// How a surface wants its asset loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LoadMode {
    /// Wait for the surface to become visible
    #[default]
    Deferred,

    /// Resolve immediately on mount (priority assets)
    Eager,
}

/// Result of a mount, delivered once the surface has fired
pub struct PendingAsset {
    surface: SurfaceId,
    receiver: oneshot::Receiver<Result<Resource>>,
}

impl PendingAsset {
    pub fn surface(&self) -> SurfaceId {
        self.surface
    }

    /// Wait for the resolution
    ///
    /// Returns `None` if the surface was unmounted before it fired.
    pub async fn wait(self) -> Option<Result<Resource>> {
        self.receiver.await.ok()
    }
}

struct Request {
    reference: String,
    constraints: RequestConstraints,
    reply: oneshot::Sender<Result<Resource>>,
}

struct Surface {
    /// Distinguishes this registration from earlier mounts of the same id
    mount: u64,
    state: SurfaceState,
    request: Option<Request>,
}

struct TriggerInner {
    resolver: Arc<dyn AssetResolver>,
    source: Arc<dyn ViewportSource>,
    runtime: Handle,
    next_mount: AtomicU64,
    surfaces: Mutex<HashMap<SurfaceId, Surface>>,
}

/// Maps visibility signals to single-shot resolutions
#[derive(Clone)]
pub struct DeferredTrigger {
    inner: Arc<TriggerInner>,
}

impl DeferredTrigger {
    /// Create a trigger
    ///
    /// Must be called from within a tokio runtime; resolutions are spawned
    /// onto it even when visibility signals arrive from other threads.
    pub fn new(resolver: Arc<dyn AssetResolver>, source: Arc<dyn ViewportSource>) -> Self {
        Self::with_runtime(resolver, source, Handle::current())
    }

    /// Create a trigger that spawns resolutions onto `runtime`
    pub fn with_runtime(
        resolver: Arc<dyn AssetResolver>,
        source: Arc<dyn ViewportSource>,
        runtime: Handle,
    ) -> Self {
        Self {
            inner: Arc::new(TriggerInner {
                resolver,
                source,
                runtime,
                next_mount: AtomicU64::new(0),
                surfaces: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Mount `surface` for `reference`
    ///
    /// Mounting a surface that is already mounted replaces the earlier
    /// registration.
    pub fn mount(
        &self,
        surface: SurfaceId,
        reference: impl Into<String>,
        constraints: RequestConstraints,
        mode: LoadMode,
    ) -> PendingAsset {
        self.unmount(surface);

        let (reply, receiver) = oneshot::channel();
        let request = Request {
            reference: reference.into(),
            constraints,
            reply,
        };

        let mount = self.inner.next_mount.fetch_add(1, Ordering::Relaxed);
        self.inner.lock().insert(
            surface,
            Surface {
                mount,
                state: SurfaceState::Idle,
                request: Some(request),
            },
        );

        match mode {
            LoadMode::Eager => {
                debug!("Surface {} is eager, resolving on mount", surface);
                self.inner.fire(surface, mount);
            }
            LoadMode::Deferred => {
                if let Some(entry) = self.inner.lock().get_mut(&surface) {
                    entry.state = SurfaceState::Armed;
                }

                // The source may call back synchronously, so no lock is held here.
                let weak: Weak<TriggerInner> = Arc::downgrade(&self.inner);
                self.inner.source.observe(
                    surface,
                    Arc::new(move || {
                        if let Some(inner) = weak.upgrade() {
                            inner.on_visible(surface, mount);
                        }
                    }),
                );
            }
        }

        PendingAsset { surface, receiver }
    }

    /// Unmount `surface`, deregistering it if it has not fired
    ///
    /// A resolution already running is left to finish and populate the
    /// cache. Returns the state the surface was in.
    pub fn unmount(&self, surface: SurfaceId) -> Option<SurfaceState> {
        let removed = self.inner.lock().remove(&surface)?;

        if matches!(removed.state, SurfaceState::Idle | SurfaceState::Armed) {
            self.inner.source.unobserve(surface);
            debug!("Unmounted surface {} before it fired", surface);
        }
        Some(removed.state)
    }

    /// Current state of `surface`, if mounted
    pub fn state(&self, surface: SurfaceId) -> Option<SurfaceState> {
        self.inner.lock().get(&surface).map(|s| s.state)
    }

    /// Number of mounted surfaces
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TriggerInner {
    fn lock(&self) -> MutexGuard<'_, HashMap<SurfaceId, Surface>> {
        self.surfaces.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn on_visible(self: &Arc<Self>, surface: SurfaceId, mount: u64) {
        let armed = matches!(
            self.lock().get(&surface).map(|s| (s.mount, s.state)),
            Some((current, SurfaceState::Armed)) if current == mount
        );
        if armed {
            self.fire(surface, mount);
        } else {
            debug!("Ignoring visibility signal for surface {}", surface);
        }
    }

    /// Move an `Idle` or `Armed` surface to `Fired` and start its resolution
    ///
    /// Does nothing unless `mount` is still the surface's registration.
    fn fire(self: &Arc<Self>, surface: SurfaceId, mount: u64) {
        let (request, was_armed) = {
            let mut surfaces = self.lock();
            let Some(entry) = surfaces.get_mut(&surface) else {
                return;
            };
            if entry.mount != mount
                || !matches!(entry.state, SurfaceState::Idle | SurfaceState::Armed)
            {
                return;
            }
            let was_armed = entry.state == SurfaceState::Armed;
            entry.state = SurfaceState::Fired;
            (entry.request.take(), was_armed)
        };

        if was_armed {
            self.source.unobserve(surface);
        }

        let Some(request) = request else {
            return;
        };
        info!("Surface {} fired for {}", surface, request.reference);

        let inner = self.clone();
        self.runtime.spawn(async move {
            let result = inner
                .resolver
                .resolve(&request.reference, request.constraints)
                .await;

            if let Some(entry) = inner.lock().get_mut(&surface) {
                if entry.mount == mount && entry.state == SurfaceState::Fired {
                    entry.state = SurfaceState::Done;
                }
            }
            // Receiver may be gone; the resource is cached either way.
            let _ = request.reply.send(result);
        });
    }
}
