//! Console stand-ins for the host SDKs.
//!
//! Nothing here renders a real ad. Each display request is printed, then
//! answered with `shown` and `closed` after a short pause so the scheduler's
//! cooldown chains behave as they would on a device.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use xuad_engine::{
    AdDisplay, Analytics, Collaborators, DeviceIdCallback, DisplayReply, DisplayRequest, Mediation,
};
use xuad_types::SdkError;

/// Device id reported to the backend; empty when unset.
pub const DEVICE_ID_ENV: &str = "XUAD_DEVICE_ID";

const SIMULATED_SHOW_TIME: Duration = Duration::from_millis(800);
pub const SIMULATED_ECPM: f64 = 1.0;

#[must_use]
pub fn collaborators(runtime: Handle) -> Collaborators {
    Collaborators {
        analytics: Arc::new(ConsoleAnalytics),
        mediation: Arc::new(ConsoleMediation),
        display: Arc::new(ConsoleDisplay { runtime }),
    }
}

/// Short description of the machine, sent with strategy checks and records.
#[must_use]
pub fn device_info() -> String {
    format!(
        "os={} arch={} host=console",
        env::consts::OS,
        env::consts::ARCH
    )
}

struct ConsoleAnalytics;

impl Analytics for ConsoleAnalytics {
    fn pre_init(&self, _key: &str, channel: &str) -> Result<(), SdkError> {
        tracing::info!(channel, "Analytics pre-initialized");
        Ok(())
    }

    fn init(&self, _key: &str, channel: &str) -> Result<(), SdkError> {
        tracing::info!(channel, "Analytics initialized");
        Ok(())
    }

    fn resolve_device_id(&self, callback: DeviceIdCallback) {
        callback(env::var(DEVICE_ID_ENV).unwrap_or_default());
    }
}

struct ConsoleMediation;

impl Mediation for ConsoleMediation {
    fn initialize(&self, app_id: &str) -> Result<(), SdkError> {
        tracing::info!(app_id, "Mediation SDK initialized");
        println!("[sdk] mediation initialized ({app_id})");
        Ok(())
    }
}

struct ConsoleDisplay {
    runtime: Handle,
}

impl AdDisplay for ConsoleDisplay {
    fn show(&self, request: DisplayRequest, reply: DisplayReply) {
        match &request.page {
            Some(page) => println!("[ad] {} on {page} (slot {})", request.ad_type, request.slot_id),
            None => println!("[ad] {} (slot {})", request.ad_type, request.slot_id),
        }
        drop(self.runtime.spawn(finish(request, reply)));
    }
}

async fn finish(request: DisplayRequest, reply: DisplayReply) {
    reply.shown(SIMULATED_ECPM);
    tokio::time::sleep(SIMULATED_SHOW_TIME).await;
    println!("[ad] {} closed", request.ad_type);
    reply.closed();
}
