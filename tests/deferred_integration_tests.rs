//! Integration tests for deferred resolution through the real pipeline
//!
//! Surfaces are laid out on a tall page and the viewport is scrolled over
//! them; each surface must fetch at most once.

mod common;

use common::CountingBackend;
use imgcache::cache::{AssetCache, CacheConfig};
use imgcache::deferred::{
    DeferredTrigger, LoadMode, Rect, SurfaceId, SurfaceState, ViewportTracker,
};
use imgcache::pipeline::{AssetPipeline, PipelineConfig, RequestConstraints};
use imgcache::responsive::{DescriptorBuilder, WidthProfile};
use std::sync::Arc;

const VIEWPORT_HEIGHT: f64 = 720.0;

fn viewport_at(scroll: f64) -> Rect {
    Rect::new(0.0, scroll, 1280.0, VIEWPORT_HEIGHT)
}

struct Page {
    backend: Arc<CountingBackend>,
    pipeline: AssetPipeline,
    tracker: Arc<ViewportTracker>,
    trigger: DeferredTrigger,
}

fn page() -> Page {
    let backend = Arc::new(
        CountingBackend::new()
            .with_source("img/hero.png", 2560, 1440)
            .with_source("img/card-1.png", 800, 600)
            .with_source("img/card-2.png", 800, 600)
            .with_source("img/footer.png", 800, 200),
    );
    let cache = Arc::new(AssetCache::new(CacheConfig::default()));
    let pipeline = AssetPipeline::new(cache, backend.clone(), PipelineConfig::default());
    let tracker = Arc::new(ViewportTracker::default());
    let trigger = DeferredTrigger::new(Arc::new(pipeline.clone()), tracker.clone());

    tracker.update_viewport(viewport_at(0.0));
    Page {
        backend,
        pipeline,
        tracker,
        trigger,
    }
}

#[tokio::test]
async fn test_scrolling_page_fetches_each_surface_once() {
    let page = page();

    let hero = SurfaceId::new();
    let card_1 = SurfaceId::new();
    let card_2 = SurfaceId::new();
    let footer = SurfaceId::new();
    page.tracker.set_surface_rect(hero, Rect::new(0.0, 0.0, 1280.0, 600.0));
    page.tracker.set_surface_rect(card_1, Rect::new(0.0, 760.0, 400.0, 300.0));
    page.tracker.set_surface_rect(card_2, Rect::new(0.0, 1400.0, 400.0, 300.0));
    page.tracker.set_surface_rect(footer, Rect::new(0.0, 4000.0, 1280.0, 200.0));

    let constraints = RequestConstraints::for_width(400);
    let hero_pending = page.trigger.mount(
        hero,
        "img/hero.png",
        RequestConstraints::for_width(1280),
        LoadMode::Eager,
    );
    let card_1_pending = page.trigger.mount(
        card_1,
        "img/card-1.png",
        constraints,
        LoadMode::Deferred,
    );
    let card_2_pending = page.trigger.mount(
        card_2,
        "img/card-2.png",
        constraints,
        LoadMode::Deferred,
    );
    let _footer_pending = page.trigger.mount(
        footer,
        "img/footer.png",
        constraints,
        LoadMode::Deferred,
    );

    let hero_resource = hero_pending.wait().await.unwrap().unwrap();
    assert_eq!((hero_resource.width, hero_resource.height), (1280, 720));

    // card-1 starts 40px below the fold, inside the 50px margin
    assert!(card_1_pending.wait().await.unwrap().is_ok());
    assert_eq!(page.trigger.state(card_2), Some(SurfaceState::Armed));

    // Scroll down far enough for card-2, then back up and down again
    page.tracker.update_viewport(viewport_at(800.0));
    assert!(card_2_pending.wait().await.unwrap().is_ok());
    page.tracker.update_viewport(viewport_at(0.0));
    page.tracker.update_viewport(viewport_at(800.0));
    tokio::task::yield_now().await;

    assert_eq!(page.backend.fetch_count(), 3);
    assert_eq!(page.trigger.state(footer), Some(SurfaceState::Armed));
    assert_eq!(page.tracker.observed_count(), 1);
    assert_eq!(page.pipeline.cache().len().await, 3);
}

#[tokio::test]
async fn test_unmounted_surface_never_fetches() {
    let page = page();
    let footer = SurfaceId::new();
    page.tracker.set_surface_rect(footer, Rect::new(0.0, 4000.0, 1280.0, 200.0));

    let pending = page.trigger.mount(
        footer,
        "img/footer.png",
        RequestConstraints::default(),
        LoadMode::Deferred,
    );
    assert_eq!(page.trigger.unmount(footer), Some(SurfaceState::Armed));

    page.tracker.update_viewport(viewport_at(3800.0));
    assert!(pending.wait().await.is_none());
    assert_eq!(page.backend.fetch_count(), 0);
    assert_eq!(page.tracker.observed_count(), 0);
}

#[tokio::test]
async fn test_descriptor_widths_share_reference_slot() {
    let page = page();
    let descriptor = DescriptorBuilder::new("img/hero.png")
        .profile(WidthProfile::Hero)
        .build();

    assert_eq!(descriptor.widths(), vec![640, 768, 1024, 1280, 1920, 2560]);

    // The default key policy keeps one slot per reference, so every width
    // after the first is served from the first variant.
    for (_, width) in &descriptor.candidates {
        page.pipeline
            .resolve("img/hero.png", RequestConstraints::for_width(*width))
            .await
            .unwrap();
    }
    assert_eq!(page.backend.fetch_count(), 1);
}
