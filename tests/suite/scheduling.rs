//! Page scheduling through the public runtime

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::{Value, json};
use tokio::time::sleep;
use xuad_engine::{DisplayRequest, NoopObserver, RuntimeOptions};
use xuad_types::AdType;

use crate::common::{eventually, host, host_with, start_backend};

fn strategy() -> Value {
    json!({
        "globalInterstitialEnabled": true,
        "globalBannerEnabled": true,
        "hotStartSplash": true,
        "interstitialCooldown": 1,
        "detailConfigs": [
            {"pageName": "list", "interstitialMode": "concurrent", "interstitialCount": 3},
            {"pageName": "home", "interstitialMode": "cooldown", "interstitialCount": 2},
            {"pageName": "article", "bannerAd": true, "clickAd": true}
        ]
    })
}

fn interstitials_for(requests: &[DisplayRequest], page: &str) -> usize {
    requests
        .iter()
        .filter(|r| r.ad_type == AdType::Interstitial && r.page.as_deref() == Some(page))
        .count()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_page_requests_on_cadence() {
    let server = start_backend(&strategy()).await;
    let mut options = RuntimeOptions::default();
    options.scheduler.concurrent_interval = Duration::from_millis(50);
    let host = host_with(&server, options);
    host.ads.init(&NoopObserver).await;

    host.ads.track("list");

    let display = Arc::clone(&host.display);
    eventually(|| {
        let display = Arc::clone(&display);
        async move { interstitials_for(&display.requests(), "list") == 3 }
    })
    .await;
    let state = host.ads.page_state("list").unwrap();
    assert_eq!(state.interstitial_requested_count, 3);
    assert_eq!(state.interstitial_executed_count, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cooldown_page_waits_between_shows() {
    let server = start_backend(&strategy()).await;
    let host = host(&server);
    host.ads.init(&NoopObserver).await;

    host.ads.track("home");
    sleep(Duration::from_millis(300)).await;
    assert_eq!(interstitials_for(&host.display.requests(), "home"), 1);

    let display = Arc::clone(&host.display);
    eventually(|| {
        let display = Arc::clone(&display);
        async move { interstitials_for(&display.requests(), "home") == 2 }
    })
    .await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn leaving_stops_the_cooldown_chain() {
    let server = start_backend(&strategy()).await;
    let host = host(&server);
    host.ads.init(&NoopObserver).await;

    host.ads.track("home");
    sleep(Duration::from_millis(200)).await;
    host.ads.on_page_leave("home");
    sleep(Duration::from_millis(1_500)).await;

    assert_eq!(interstitials_for(&host.display.requests(), "home"), 1);
    assert!(!host.ads.page_state("home").unwrap().is_active);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn banner_container_is_shown_for_banner_pages() {
    let server = start_backend(&strategy()).await;
    let host = host(&server);
    host.ads.init(&NoopObserver).await;
    let shown = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&shown);
    host.ads.register_banner_container("article", move |visible| {
        assert!(visible);
        seen.fetch_add(1, Ordering::SeqCst);
    });

    host.ads.track("article");
    let counter = Arc::clone(&shown);
    eventually(|| {
        let counter = Arc::clone(&counter);
        async move { counter.load(Ordering::SeqCst) == 1 }
    })
    .await;

    assert!(host.ads.is_click_ad_enabled("article"));
    assert!(!host.ads.is_click_ad_enabled("list"));
    assert_eq!(host.ads.page_state("article").unwrap().banner_executed_count, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn hot_start_splash_after_background() {
    let server = start_backend(&strategy()).await;
    let mut options = RuntimeOptions::default();
    options.hot_start_delay = Duration::from_millis(50);
    let host = host_with(&server, options);

    assert!(!host.ads.on_foreground());
    host.ads.init(&NoopObserver).await;
    host.ads.on_background();
    assert!(host.ads.on_foreground());

    let display = Arc::clone(&host.display);
    eventually(|| {
        let display = Arc::clone(&display);
        async move {
            display
                .requests()
                .iter()
                .any(|r| r.ad_type == AdType::Splash)
        }
    })
    .await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_cancels_everything() {
    let server = start_backend(&strategy()).await;
    let host = host(&server);
    host.ads.init(&NoopObserver).await;

    host.ads.track("home");
    sleep(Duration::from_millis(100)).await;
    host.ads.shutdown();
    sleep(Duration::from_millis(1_500)).await;

    assert_eq!(interstitials_for(&host.display.requests(), "home"), 1);
    assert!(host.ads.page_state("home").is_none());
}
