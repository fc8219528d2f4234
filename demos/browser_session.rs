//! Simulated browser session
//!
//! Drives the pipeline the way a web front end would: performance samples,
//! user actions, an API failure, a connectivity drop and page hide.
//! Deliveries go to `TELEMETRY_API_URL` (default `http://localhost:5005`);
//! without a collector running they fail and stay queued.
//!
//! Run with: RUST_LOG=debug cargo run --example browser_session

use session_telemetry::platform::{
    FirstInput, LargestContentfulPaint, LayoutShift, NavigationTiming, PaintTiming,
    PerformanceEntries,
};
use session_telemetry::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== Session Telemetry - Browser Session Example ===\n");

    let platform = Arc::new(StaticPlatform::new(
        "https://app.example.com/events",
        "Mozilla/5.0 (X11; Linux x86_64) demo",
    ));
    let telemetry = Telemetry::builder()
        .config(TelemetryConfig::from_env().with_request_timeout(Duration::from_secs(2)))
        .platform(platform.clone())
        .init()?;
    println!("Session: {}", telemetry.session_id());

    let source = ManualPerformanceSource::new();
    source.set_navigation_timing(NavigationTiming {
        fetch_start: 12.0,
        dom_content_loaded_event_end: 480.0,
        load_event_end: 910.0,
    });
    source.add_paint_timing(PaintTiming::new("first-paint", 210.0));

    let bridge = Arc::new(PerformanceObserverBridge::attach(
        telemetry.clone(),
        Some(Arc::new(source.clone())),
    ));
    let router = LifecycleEventRouter::new(telemetry.clone()).with_performance(bridge.clone());
    router.install_panic_hook();

    let (signals, receiver) = signal_channel();
    let routing = tokio::spawn(router.run(receiver));

    println!("1. Page load and web vitals");
    signals.send(LifecycleSignal::Load).ok();
    source.emit(PerformanceEntries::LargestContentfulPaint(vec![
        LargestContentfulPaint { start_time: 640.0 },
        LargestContentfulPaint { start_time: 1180.0 },
    ]));
    source.emit(PerformanceEntries::LayoutShift(vec![
        LayoutShift { value: 0.04, had_recent_input: false },
        LayoutShift { value: 0.2, had_recent_input: true },
    ]));

    println!("2. User activity");
    telemetry.set_user_id("user-42");
    telemetry.track_user_action("open_event", Some(Payload::new().with_field("event_id", 7)));
    source.emit(PerformanceEntries::FirstInput(vec![FirstInput {
        start_time: 1500.0,
        processing_start: 1509.0,
    }]));
    telemetry.track_api_call("/api/events/7", "GET", 143.0, 200);
    telemetry.track_api_call("/api/events/7/rsvp", "POST", 388.0, 503);

    println!("3. Connection drops, entries keep queueing");
    signals.send(LifecycleSignal::Offline).ok();
    platform.set_url("https://app.example.com/events/7");
    telemetry.log_warn("RSVP retry scheduled", None);

    println!("4. Connection returns, buffers flush");
    signals.send(LifecycleSignal::Online).ok();

    println!("5. Page hidden");
    signals.send(LifecycleSignal::VisibilityChanged { hidden: true }).ok();

    drop(signals);
    routing.await.ok();
    bridge.detach();

    let delivered_in_time = telemetry.shutdown(DEFAULT_SHUTDOWN_TIMEOUT).await;
    let stats = telemetry.stats();
    println!("\n=== Summary ===");
    println!("Recorded:  {}", stats.entries_recorded());
    println!("Delivered: {}", stats.entries_delivered());
    println!("Failures:  {}", stats.delivery_failures());
    println!("Still queued: {} logs, {} metrics", telemetry.logs().len(), telemetry.metrics().len());
    println!("Shutdown finished in time: {}", delivered_in_time);

    Ok(())
}
