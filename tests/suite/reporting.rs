//! Interaction records and feedback as the backend sees them

use serde_json::json;
use wiremock::MockServer;
use xuad_api::{FEEDBACK_PATH, RECORD_PATH};
use xuad_engine::{FeedbackError, Interaction, NoopObserver};

use crate::common::{DEVICE_ID, bodies, eventually, host, mount_feedback, start_backend};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn interstitial_view_is_recorded_with_device_details() {
    let strategy = json!({
        "globalInterstitialEnabled": true,
        "fallbackConfig": {"pageName": "*", "interstitialMode": "concurrent", "interstitialCount": 1}
    });
    let server = start_backend(&strategy).await;
    let host = host(&server);
    host.ads.init(&NoopObserver).await;

    host.ads.track("anywhere");

    eventually(|| async { !bodies(&server, RECORD_PATH).await.is_empty() }).await;
    let records = bodies(&server, RECORD_PATH).await;
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record["deviceId"], DEVICE_ID);
    assert_eq!(record["adType"], "interstitial");
    assert_eq!(record["interactionType"], "view");
    assert_eq!(record["ecpm"], 2.5);
    assert_eq!(record["deviceInfo"], "brand=acme model=e2e");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn banner_view_and_click_are_recorded() {
    let strategy = json!({"globalBannerEnabled": true});
    let server = start_backend(&strategy).await;
    let host = host(&server);
    host.ads.init(&NoopObserver).await;

    host.ads.report_banner(Interaction::View, 1.5);
    host.ads.report_banner(Interaction::Click, 1.5);

    eventually(|| async { bodies(&server, RECORD_PATH).await.len() == 2 }).await;
    let mut interactions: Vec<String> = bodies(&server, RECORD_PATH)
        .await
        .iter()
        .inspect(|record| {
            assert_eq!(record["adType"], "banner");
            assert_eq!(record["deviceId"], DEVICE_ID);
            assert_eq!(record["ecpm"], 1.5);
        })
        .map(|record| record["interactionType"].as_str().unwrap_or_default().to_string())
        .collect();
    interactions.sort();
    assert_eq!(interactions, ["click", "view"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn feedback_carries_identity_and_returns_ticket() {
    let server = MockServer::start().await;
    mount_feedback(&server, "T-42").await;
    let host = host(&server);

    let ticket = host
        .ads
        .submit_feedback("  Too many ads ", "Splash shows twice", None)
        .await
        .unwrap();

    assert_eq!(ticket.as_deref(), Some("T-42"));
    let sent = bodies(&server, FEEDBACK_PATH).await;
    assert_eq!(
        sent,
        vec![json!({
            "packageName": "com.example.e2e",
            "channelName": "googleplay",
            "version": "3.2.1",
            "subject": "Too many ads",
            "content": "Splash shows twice"
        })]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn feedback_contact_is_sent_when_present() {
    let server = MockServer::start().await;
    mount_feedback(&server, "T-43").await;
    let host = host(&server);

    host.ads
        .submit_feedback("Bug", "Banner overlaps", Some("me@example.com"))
        .await
        .unwrap();

    let sent = bodies(&server, FEEDBACK_PATH).await;
    assert_eq!(sent[0]["contact"], "me@example.com");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn blank_feedback_never_reaches_the_backend() {
    let server = MockServer::start().await;
    mount_feedback(&server, "unused").await;
    let host = host(&server);

    let err = host.ads.submit_feedback(" ", "body", None).await.unwrap_err();
    assert!(matches!(err, FeedbackError::Invalid("subject")));
    let err = host.ads.submit_feedback("subject", "\n", None).await.unwrap_err();
    assert!(matches!(err, FeedbackError::Invalid("content")));

    assert!(bodies(&server, FEEDBACK_PATH).await.is_empty());
}
