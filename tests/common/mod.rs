//! Shared test utilities and fixtures
//!
//! A mock xuad backend plus host fakes that answer immediately.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};
use tokio::runtime::Handle;
use tokio::time::{Instant, sleep};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use xuad_api::{FEEDBACK_PATH, INIT_PATH, RECORD_PATH, STRATEGY_CHECK_PATH};
use xuad_engine::{
    AdDisplay, AdRuntime, Analytics, ApiClient, AppIdentity, Collaborators, DeviceIdCallback,
    DisplayReply, DisplayRequest, MainThreadDispatcher, Mediation, RuntimeOptions,
};
use xuad_types::SdkError;

pub const DEVICE_ID: &str = "device-e2e";

/// Successful backend envelope around `data`.
pub fn envelope(data: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "code": 200,
        "message": "ok",
        "success": true,
        "data": data
    }))
}

/// Init payload with every slot filled and ads on.
pub fn init_payload(strategy: &Value) -> Value {
    json!({
        "adEnabled": 1,
        "adStrategy": strategy.to_string(),
        "mediationAppId": "med-e2e",
        "adSplashId": "splash-e2e",
        "adInterstitialId": "inter-e2e",
        "adBannerId": "banner-e2e",
        "analyticsKey": "analytics-e2e",
        "downloadUrl": "https://example.com/app.apk"
    })
}

pub async fn mount_init(server: &MockServer, data: Value) {
    Mock::given(method("POST"))
        .and(path(INIT_PATH))
        .respond_with(envelope(data))
        .mount(server)
        .await;
}

pub async fn mount_check(server: &MockServer, data: Value) {
    Mock::given(method("POST"))
        .and(path(STRATEGY_CHECK_PATH))
        .respond_with(envelope(data))
        .mount(server)
        .await;
}

pub async fn mount_record(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(RECORD_PATH))
        .respond_with(envelope(json!(1)))
        .mount(server)
        .await;
}

pub async fn mount_feedback(server: &MockServer, ticket: &str) {
    Mock::given(method("POST"))
        .and(path(FEEDBACK_PATH))
        .respond_with(envelope(json!(ticket)))
        .mount(server)
        .await;
}

/// Backend that serves `strategy`, no validation override and accepts records.
pub async fn start_backend(strategy: &Value) -> MockServer {
    let server = MockServer::start().await;
    mount_init(&server, init_payload(strategy)).await;
    mount_check(&server, Value::Null).await;
    mount_record(&server).await;
    server
}

/// Bodies of every request the server received on `endpoint`.
pub async fn bodies(server: &MockServer, endpoint: &str) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|request| request.url.path() == endpoint)
        .filter_map(|request| serde_json::from_slice(&request.body).ok())
        .collect()
}

/// Poll `check` until it holds or a few seconds pass.
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + Duration::from_secs(5);
    while !check().await {
        assert!(Instant::now() < deadline, "condition not met in time");
        sleep(Duration::from_millis(20)).await;
    }
}

// ============================================================================
// Host fakes
// ============================================================================

/// Reports `shown` then `closed` for every request.
#[derive(Default)]
pub struct InstantDisplay {
    requests: Mutex<Vec<DisplayRequest>>,
}

impl InstantDisplay {
    pub fn requests(&self) -> Vec<DisplayRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl AdDisplay for InstantDisplay {
    fn show(&self, request: DisplayRequest, reply: DisplayReply) {
        self.requests.lock().unwrap().push(request);
        reply.shown(2.5);
        reply.closed();
    }
}

pub struct StaticAnalytics;

impl Analytics for StaticAnalytics {
    fn pre_init(&self, _key: &str, _channel: &str) -> Result<(), SdkError> {
        Ok(())
    }

    fn init(&self, _key: &str, _channel: &str) -> Result<(), SdkError> {
        Ok(())
    }

    fn resolve_device_id(&self, callback: DeviceIdCallback) {
        callback(DEVICE_ID.to_string());
    }
}

#[derive(Default)]
pub struct CountingMediation {
    calls: AtomicUsize,
}

impl CountingMediation {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Mediation for CountingMediation {
    fn initialize(&self, _app_id: &str) -> Result<(), SdkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct Host {
    pub ads: AdRuntime,
    pub display: Arc<InstantDisplay>,
    pub mediation: Arc<CountingMediation>,
}

pub fn identity() -> AppIdentity {
    AppIdentity::new("com.example.e2e", "GooglePlay", "3.2.1")
}

/// Runtime wired to `server` with fast timeouts.
pub fn host(server: &MockServer) -> Host {
    host_with(server, RuntimeOptions::default())
}

pub fn host_with(server: &MockServer, mut options: RuntimeOptions) -> Host {
    options.init.validate_timeout = Some(Duration::from_secs(2));
    options.init.device_id_timeout = Some(Duration::from_secs(1));
    let runtime = Handle::current();
    let display = Arc::new(InstantDisplay::default());
    let mediation = Arc::new(CountingMediation::default());
    let ads = AdRuntime::new(
        identity(),
        ApiClient::new(server.uri(), Duration::from_secs(2)).unwrap(),
        Arc::new(MainThreadDispatcher::start(runtime.clone()).unwrap()),
        Collaborators {
            analytics: Arc::new(StaticAnalytics),
            mediation: Arc::clone(&mediation) as Arc<dyn Mediation>,
            display: Arc::clone(&display) as Arc<dyn AdDisplay>,
        },
        options.with_device_info("brand=acme\nmodel=e2e"),
        runtime,
    );
    Host {
        ads,
        display,
        mediation,
    }
}
