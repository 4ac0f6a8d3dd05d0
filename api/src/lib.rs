//! HTTP client for the xuad backend.
//!
//! # Endpoints
//!
//! | Method | Path | Response `data` |
//! |--------|------|-----------------|
//! | [`ApiClient::app_init`] | `POST /app/init` | remote configuration object |
//! | [`ApiClient::check_strategy`] | `POST /app/ad-strategy/check` | replacement strategy string or null |
//! | [`ApiClient::record_interaction`] | `POST /app/record` | record id or null |
//! | [`ApiClient::submit_feedback`] | `POST /app/feedback` | ticket string or null |
//!
//! Every call is a single attempt. Callers are expected to log failures and
//! carry on; nothing in this crate retries.
//!
//! # Error Handling
//!
//! [`ApiError`] separates transport failures (connect, timeout), non-2xx
//! statuses, undecodable bodies and envelopes the backend flagged as rejected.

mod wire;

use std::time::Duration;

use reqwest::StatusCode;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use xuad_types::{AdType, AppIdentity, ConfigSnapshot, Interaction};

pub use wire::{
    ApiEnvelope, AppInitData, AppInitRequest, FeedbackRequest, RecordRequest, StrategyCheckRequest,
};

pub const INIT_PATH: &str = "/app/init";
pub const STRATEGY_CHECK_PATH: &str = "/app/ad-strategy/check";
pub const RECORD_PATH: &str = "/app/record";
pub const FEEDBACK_PATH: &str = "/app/feedback";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {path} failed: {source}")]
    Transport {
        path: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{path} returned HTTP {status}: {body}")]
    Status {
        path: &'static str,
        status: StatusCode,
        body: String,
    },
    #[error("could not decode {path} response: {source}")]
    Decode {
        path: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("{path} rejected the request (code {code}): {message}")]
    Rejected {
        path: &'static str,
        code: i32,
        message: String,
    },
}

/// Client builder shared by every [`ApiClient`].
///
/// Redirects are not followed; the backend answers directly.
fn base_client_builder() -> reqwest::ClientBuilder {
    use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};

    let mut default_headers = HeaderMap::new();
    default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .default_headers(default_headers)
}

/// A client whose connect, read and write phases are all bounded by `timeout`.
pub fn http_client_with_timeout(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    base_client_builder()
        .connect_timeout(timeout)
        .timeout(timeout)
        .build()
}

/// Read an error body, truncated to keep logs bounded.
pub async fn read_capped_error_body(mut response: reqwest::Response) -> String {
    let mut body = Vec::new();
    while let Ok(Some(chunk)) = response.chunk().await {
        body.extend_from_slice(&chunk);
        if body.len() > MAX_ERROR_BODY_BYTES {
            body.truncate(MAX_ERROR_BODY_BYTES);
            let text = String::from_utf8_lossy(&body);
            return format!("{text}...(truncated)");
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self::with_client(base_url, http_client_with_timeout(timeout)?))
    }

    #[must_use]
    pub fn with_client(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, http }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the remote configuration.
    ///
    /// Whatever `data` the envelope carries is used, even when `success` is
    /// false. A missing `data` yields the default (ads off) snapshot.
    pub async fn app_init(&self, identity: &AppIdentity) -> Result<ConfigSnapshot, ApiError> {
        let envelope: ApiEnvelope<AppInitData> = self
            .post(INIT_PATH, &AppInitRequest::new(identity))
            .await?;
        if !envelope.success {
            tracing::warn!(
                code = envelope.code,
                message = %envelope.message,
                has_data = envelope.data.is_some(),
                "Init flagged unsuccessful"
            );
        }
        match envelope.data {
            Some(data) => Ok(data.into()),
            None => {
                tracing::info!("Init returned no data; using defaults");
                Ok(ConfigSnapshot::default())
            }
        }
    }

    /// Ask the backend whether this device should get a different strategy.
    ///
    /// Returns the replacement strategy text, or `None` when the backend sent
    /// nothing usable. The `success` flag is advisory here: only `data` matters.
    pub async fn check_strategy(
        &self,
        identity: &AppIdentity,
        device_id: &str,
        device_info: &str,
    ) -> Result<Option<String>, ApiError> {
        let request = StrategyCheckRequest::new(identity, device_id, device_info);
        let envelope: ApiEnvelope<String> = self.post(STRATEGY_CHECK_PATH, &request).await?;
        if !envelope.success {
            tracing::debug!(
                code = envelope.code,
                message = %envelope.message,
                "Strategy check flagged unsuccessful"
            );
        }
        Ok(envelope.data.filter(|data| !data.trim().is_empty()))
    }

    pub async fn record_interaction(
        &self,
        device_id: &str,
        ecpm: f64,
        ad_type: AdType,
        interaction: Interaction,
        device_info: &str,
    ) -> Result<Option<i64>, ApiError> {
        let request = RecordRequest::new(device_id, ecpm, ad_type, interaction, device_info);
        let envelope: ApiEnvelope<i64> = self.post(RECORD_PATH, &request).await?;
        Self::accepted(RECORD_PATH, envelope)
    }

    pub async fn submit_feedback(&self, request: &FeedbackRequest) -> Result<Option<String>, ApiError> {
        let envelope: ApiEnvelope<String> = self.post(FEEDBACK_PATH, request).await?;
        Self::accepted(FEEDBACK_PATH, envelope)
    }

    fn accepted<T>(path: &'static str, envelope: ApiEnvelope<T>) -> Result<Option<T>, ApiError> {
        if envelope.success {
            Ok(envelope.data)
        } else {
            Err(ApiError::Rejected {
                path,
                code: envelope.code,
                message: envelope.message,
            })
        }
    }

    async fn post<B, T>(&self, path: &'static str, body: &B) -> Result<ApiEnvelope<T>, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}{path}", self.base_url);
        tracing::debug!(%url, "POST");

        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|source| ApiError::Transport { path, source })?;

        let status = response.status();
        if !status.is_success() {
            let body = read_capped_error_body(response).await;
            return Err(ApiError::Status { path, status, body });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|source| ApiError::Transport { path, source })?;
        serde_json::from_slice(&bytes).map_err(|source| ApiError::Decode { path, source })
    }
}
