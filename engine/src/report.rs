//! Fire-and-forget interaction records.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use xuad_api::ApiClient;
use xuad_types::{AdType, Interaction};

use crate::session::SessionSlot;

/// Posts ad views and clicks to the record endpoint without blocking the caller.
#[derive(Debug, Clone)]
pub struct InteractionReporter {
    api: ApiClient,
    sessions: SessionSlot,
    device_info: Arc<str>,
    runtime: Handle,
}

impl InteractionReporter {
    #[must_use]
    pub fn new(
        api: ApiClient,
        sessions: SessionSlot,
        device_info: impl Into<Arc<str>>,
        runtime: Handle,
    ) -> Self {
        Self {
            api,
            sessions,
            device_info: device_info.into(),
            runtime,
        }
    }

    /// Record in the background. Failures are logged and otherwise ignored.
    pub fn report(&self, ad_type: AdType, interaction: Interaction, ecpm: f64) {
        drop(self.record(ad_type, interaction, ecpm));
    }

    /// Like [`InteractionReporter::report`], returning the task so callers can
    /// wait for the attempt to finish.
    pub fn record(&self, ad_type: AdType, interaction: Interaction, ecpm: f64) -> JoinHandle<()> {
        let device_id = self
            .sessions
            .current()
            .map(|session| session.device_id.clone())
            .unwrap_or_default();
        let api = self.api.clone();
        let device_info = Arc::clone(&self.device_info);

        self.runtime.spawn(async move {
            match api
                .record_interaction(&device_id, ecpm, ad_type, interaction, &device_info)
                .await
            {
                Ok(id) => tracing::debug!(
                    ad_type = %ad_type,
                    interaction = interaction.as_str(),
                    ?id,
                    "Interaction recorded"
                ),
                Err(e) => tracing::warn!(
                    ad_type = %ad_type,
                    interaction = interaction.as_str(),
                    "Failed to record interaction: {e}"
                ),
            }
        })
    }
}
