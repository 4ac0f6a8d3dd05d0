//! Startup pipeline against a mock backend

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::time::sleep;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use xuad_api::{INIT_PATH, RECORD_PATH, STRATEGY_CHECK_PATH};
use xuad_engine::NoopObserver;
use xuad_types::AdType;

use crate::common::{
    DEVICE_ID, bodies, eventually, host, init_payload, mount_check, mount_init, mount_record,
    start_backend,
};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn startup_publishes_session_and_sends_identity() {
    let strategy = json!({"splashCount": 1, "globalInterstitialEnabled": true});
    let server = start_backend(&strategy).await;
    let host = host(&server);

    let session = host.ads.init(&NoopObserver).await;

    assert!(session.ads_enabled());
    assert_eq!(session.device_id, DEVICE_ID);
    assert_eq!(session.snapshot.download_url, "https://example.com/app.apk");
    assert!(session.strategy.as_ref().unwrap().global_interstitial_enabled);
    assert_eq!(host.mediation.calls(), 1);
    assert!(host.ads.session().is_some());

    let init = bodies(&server, INIT_PATH).await;
    assert_eq!(
        init,
        vec![json!({
            "packageName": "com.example.e2e",
            "channelName": "googleplay",
            "version": "3.2.1"
        })]
    );

    let check = &bodies(&server, STRATEGY_CHECK_PATH).await[0];
    assert_eq!(check["deviceId"], DEVICE_ID);
    assert_eq!(check["deviceInfo"], "brand=acme model=e2e");
    assert_eq!(check["channelName"], "googleplay");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn legacy_field_names_still_configure_the_sdk() {
    let server = MockServer::start().await;
    mount_init(
        &server,
        json!({
            "adEnabled": 1,
            "adStrategy": "{}",
            "pangleAppId": "legacy-app",
            "umengKey": "legacy-key",
            "apihzId": "partner",
            "apihzKey": "secret"
        }),
    )
    .await;
    mount_check(&server, Value::Null).await;
    let host = host(&server);

    let session = host.ads.init(&NoopObserver).await;

    assert_eq!(session.snapshot.mediation_app_id, "legacy-app");
    assert_eq!(session.snapshot.analytics_key, "legacy-key");
    assert_eq!(session.snapshot.partner.id, "partner");
    assert_eq!(host.mediation.calls(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn init_without_data_runs_with_ads_off() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(INIT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 403,
            "message": "unknown package",
            "success": false,
            "data": null
        })))
        .mount(&server)
        .await;
    mount_check(&server, Value::Null).await;
    let host = host(&server);

    let session = host.ads.init(&NoopObserver).await;
    host.ads.track("home");
    sleep(Duration::from_millis(200)).await;

    assert!(!session.ads_enabled());
    assert_eq!(host.mediation.calls(), 0);
    assert!(host.display.requests().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unreachable_backend_still_completes() {
    let server = MockServer::start().await;
    let host = host(&server);
    drop(server);

    let session = host.ads.init(&NoopObserver).await;

    assert!(!session.ads_enabled());
    assert_eq!(session.device_id, DEVICE_ID);
    assert!(host.ads.session().is_some());
    assert_eq!(host.mediation.calls(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn validation_override_drives_scheduling() {
    let server = MockServer::start().await;
    mount_init(&server, init_payload(&json!({"globalInterstitialEnabled": false}))).await;
    let replacement = json!({
        "globalInterstitialEnabled": true,
        "detailConfigs": [
            {"pageName": "feed", "interstitialMode": "concurrent", "interstitialCount": 1}
        ]
    });
    mount_check(&server, json!(replacement.to_string())).await;
    mount_record(&server).await;
    let host = host(&server);

    host.ads.init(&NoopObserver).await;
    host.ads.track("feed");

    let display = Arc::clone(&host.display);
    eventually(|| {
        let display = Arc::clone(&display);
        async move { display.requests().len() == 1 }
    })
    .await;
    assert_eq!(host.display.requests()[0].slot_id, "inter-e2e");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn startup_splash_is_shown_and_recorded() {
    let strategy = json!({"splashCount": 2, "globalSplashEnabled": true});
    let server = start_backend(&strategy).await;
    let host = host(&server);

    host.ads.init(&NoopObserver).await;

    eventually(|| async { bodies(&server, RECORD_PATH).await.len() == 2 }).await;
    let requests = host.display.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests.iter().all(|r| r.ad_type == AdType::Splash));
    assert!(requests.iter().all(|r| r.slot_id == "splash-e2e"));
    for record in bodies(&server, RECORD_PATH).await {
        assert_eq!(record["adType"], "splash");
        assert_eq!(record["interactionType"], "view");
        assert_eq!(record["deviceId"], DEVICE_ID);
    }
}
