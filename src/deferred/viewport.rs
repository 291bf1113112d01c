//! Viewport signal sources

use super::geometry::{intersection_ratio, Rect};
use super::SurfaceId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Callback invoked when an observed surface becomes visible
///
/// A source may invoke it more than once; observers must tolerate that.
pub type VisibilityCallback = Arc<dyn Fn() + Send + Sync>;

/// Reports when rendering surfaces enter the viewport
pub trait ViewportSource: Send + Sync {
    /// Start watching `surface`
    fn observe(&self, surface: SurfaceId, on_visible: VisibilityCallback);

    /// Stop watching `surface`; unknown surfaces are ignored
    fn unobserve(&self, surface: SurfaceId);
}

/// When a surface counts as visible
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VisibilityPolicy {
    /// Logical pixels added to every side of the viewport
    pub root_margin: f64,

    /// Minimum share of the surface inside the expanded viewport
    pub threshold: f64,
}

impl Default for VisibilityPolicy {
    fn default() -> Self {
        Self {
            root_margin: 50.0,
            threshold: 0.01,
        }
    }
}

impl VisibilityPolicy {
    pub fn is_visible(&self, surface: &Rect, viewport: &Rect) -> bool {
        let ratio = intersection_ratio(surface, &viewport.expand(self.root_margin));
        ratio > 0.0 && ratio >= self.threshold
    }
}

/// In-process viewport source driven by layout updates
///
/// The host reports the viewport rectangle and surface rectangles; every
/// update re-evaluates the observed surfaces and invokes the callbacks of
/// those that are visible under the policy.
#[derive(Default)]
pub struct ViewportTracker {
    policy: VisibilityPolicy,
    state: Mutex<TrackerState>,
}

#[derive(Default)]
struct TrackerState {
    viewport: Option<Rect>,
    rects: HashMap<SurfaceId, Rect>,
    observers: HashMap<SurfaceId, VisibilityCallback>,
}

impl ViewportTracker {
    pub fn new(policy: VisibilityPolicy) -> Self {
        Self {
            policy,
            state: Mutex::new(TrackerState::default()),
        }
    }

    pub fn policy(&self) -> &VisibilityPolicy {
        &self.policy
    }

    /// Move or resize the viewport
    pub fn update_viewport(&self, viewport: Rect) {
        let ready = {
            let mut state = self.lock();
            state.viewport = Some(viewport);
            self.visible_observers(&state)
        };
        Self::notify(ready);
    }

    /// Record the layout rectangle of a surface
    pub fn set_surface_rect(&self, surface: SurfaceId, rect: Rect) {
        let ready = {
            let mut state = self.lock();
            state.rects.insert(surface, rect);
            self.visible_observer(&state, surface).into_iter().collect()
        };
        Self::notify(ready);
    }

    /// Forget a surface's layout
    pub fn remove_surface(&self, surface: SurfaceId) {
        let mut state = self.lock();
        state.rects.remove(&surface);
        state.observers.remove(&surface);
    }

    pub fn is_observed(&self, surface: SurfaceId) -> bool {
        self.lock().observers.contains_key(&surface)
    }

    /// Number of surfaces being watched
    pub fn observed_count(&self) -> usize {
        self.lock().observers.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn visible_observer(
        &self,
        state: &TrackerState,
        surface: SurfaceId,
    ) -> Option<VisibilityCallback> {
        let viewport = state.viewport?;
        let rect = state.rects.get(&surface)?;
        let callback = state.observers.get(&surface)?;

        self.policy
            .is_visible(rect, &viewport)
            .then(|| callback.clone())
    }

    fn visible_observers(&self, state: &TrackerState) -> Vec<VisibilityCallback> {
        state
            .observers
            .keys()
            .filter_map(|surface| self.visible_observer(state, *surface))
            .collect()
    }

    // Callbacks run without the lock held so they may call back into us.
    fn notify(ready: Vec<VisibilityCallback>) {
        if !ready.is_empty() {
            debug!("{} surface(s) became visible", ready.len());
        }
        for callback in ready {
            callback();
        }
    }
}

impl ViewportSource for ViewportTracker {
    fn observe(&self, surface: SurfaceId, on_visible: VisibilityCallback) {
        let ready = {
            let mut state = self.lock();
            state.observers.insert(surface, on_visible);
            self.visible_observer(&state, surface)
        };
        Self::notify(ready.into_iter().collect());
    }

    fn unobserve(&self, surface: SurfaceId) {
        self.lock().observers.remove(&surface);
    }
}
