//! Demonstrates resolving images through the cache and pipeline
//!
//! This example shows how to:
//! - Transcode a source image on a cold cache and serve it warm
//! - Defer a below-the-fold image until the viewport reaches it
//! - Build a responsive descriptor for the same reference
//!
//! Run with `RUST_LOG=imgcache=debug` to see cache and trigger activity.

use image::{Rgba, RgbaImage};
use imgcache::deferred::{DeferredTrigger, LoadMode, Rect, SurfaceId, ViewportTracker};
use imgcache::responsive::{DescriptorBuilder, WidthProfile};
use imgcache::{
    AssetCache, AssetPipeline, CacheConfig, ImageCodec, PipelineConfig, RequestConstraints,
};
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Lay out a small asset directory
    let assets = tempfile::tempdir()?;
    std::fs::create_dir_all(assets.path().join("img"))?;
    RgbaImage::from_fn(1600, 900, |x, y| Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255]))
        .save(assets.path().join("img/hero.png"))?;
    RgbaImage::from_pixel(800, 600, Rgba([20, 160, 90, 255]))
        .save(assets.path().join("img/card.png"))?;

    let config = CacheConfig::from_env()?;
    println!("Cache config: {:?}\n", config);

    let cache = Arc::new(AssetCache::new(config));
    let _sweeper = cache.start_auto_sweep();
    let backend = Arc::new(ImageCodec::from_dir(assets.path()));
    let pipeline = AssetPipeline::new(cache.clone(), backend, PipelineConfig::default());

    // 1. Cold and warm resolution
    println!("1. Resolving img/hero.png...");
    for attempt in ["cold", "warm"] {
        let started = Instant::now();
        let resource = pipeline
            .resolve("img/hero.png", RequestConstraints::for_width(640))
            .await?;
        println!(
            "   {}: {} {}x{} ({} bytes) in {:?}",
            attempt,
            resource.content_type(),
            resource.width,
            resource.height,
            resource.len(),
            started.elapsed()
        );
    }

    // 2. Deferred resolution
    println!("\n2. Deferring img/card.png until it scrolls into view...");
    let tracker = Arc::new(ViewportTracker::default());
    let trigger = DeferredTrigger::new(Arc::new(pipeline.clone()), tracker.clone());

    let surface = SurfaceId::new();
    tracker.update_viewport(Rect::new(0.0, 0.0, 1280.0, 720.0));
    tracker.set_surface_rect(surface, Rect::new(0.0, 1800.0, 400.0, 300.0));
    let pending = trigger.mount(
        surface,
        "img/card.png",
        RequestConstraints::for_width(400).with_quality(70),
        LoadMode::Deferred,
    );
    println!("   surface {} is {:?}", surface, trigger.state(surface));

    tracker.update_viewport(Rect::new(0.0, 1200.0, 1280.0, 720.0));
    if let Some(result) = pending.wait().await {
        let resource = result?;
        println!("   fired: {}x{} ({} bytes)", resource.width, resource.height, resource.len());
    }
    println!("   surface {} is {:?}", surface, trigger.state(surface));

    // 3. Responsive descriptor
    println!("\n3. Responsive descriptor for img/hero.png");
    let descriptor = DescriptorBuilder::new("img/hero.png")
        .profile(WidthProfile::Hero)
        .size("(max-width: 768px)", "100vw")
        .size("(max-width: 1280px)", "80vw")
        .fallback_size("1280px")
        .build();
    println!("   srcset: {}", descriptor.srcset());
    println!("   sizes:  {}", descriptor.sizes());

    // 4. Statistics
    println!("\n4. Cache statistics");
    println!("{}", serde_json::to_string_pretty(&cache.stats().await)?);
    println!("\n{}", cache.stats().await);

    Ok(())
}
