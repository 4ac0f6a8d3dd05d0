//! Configuration loading for xuad.
//!
//! The config file lives at `~/.xuad/config.toml` unless `XUAD_CONFIG` points
//! elsewhere. Every section is optional; accessors on [`XuadConfig`] apply the
//! defaults so callers never deal with missing keys.
//!
//! ```toml
//! [app]
//! package_name = "com.example.app"
//! channel = "xiaomi"
//! version = "1.0.0"
//!
//! [api]
//! base_url = "${XUAD_BACKEND}"
//! timeout_seconds = 3
//!
//! [init]
//! validate_timeout_ms = 5000     # 0 waits forever
//! device_id_timeout_ms = 10000   # 0 waits forever
//!
//! [schedule]
//! concurrent_interval_ms = 500
//! banner_delay_ms = 100
//! hot_start_delay_ms = 300
//! splash_gap_ms = 50
//! ```

use std::{
    env, fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use thiserror::Error;
use xuad_types::AppIdentity;

/// Environment variable naming an alternate config file.
pub const CONFIG_PATH_ENV: &str = "XUAD_CONFIG";
/// Environment variable overriding `[api] base_url`.
pub const API_URL_ENV: &str = "XUAD_API_URL";

pub const DEFAULT_API_TIMEOUT_SECS: u64 = 3;
pub const DEFAULT_VALIDATE_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_DEVICE_ID_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_CONCURRENT_INTERVAL_MS: u64 = 500;
pub const DEFAULT_BANNER_DELAY_MS: u64 = 100;
pub const DEFAULT_HOT_START_DELAY_MS: u64 = 300;
pub const DEFAULT_SPLASH_GAP_MS: u64 = 50;

#[derive(Debug, Default, Deserialize)]
pub struct XuadConfig {
    pub app: Option<AppConfig>,
    pub api: Option<ApiConfig>,
    pub init: Option<InitConfig>,
    pub schedule: Option<ScheduleConfig>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn path(&self) -> &PathBuf {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

/// Host application identity reported to the backend.
#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    pub package_name: Option<String>,
    pub channel: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiConfig {
    pub base_url: Option<String>,
    pub timeout_seconds: Option<u64>,
}

/// Guards for the two startup steps that wait on something external.
#[derive(Debug, Default, Deserialize)]
pub struct InitConfig {
    pub validate_timeout_ms: Option<u64>,
    pub device_id_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ScheduleConfig {
    pub concurrent_interval_ms: Option<u64>,
    pub banner_delay_ms: Option<u64>,
    pub hot_start_delay_ms: Option<u64>,
    pub splash_gap_ms: Option<u64>,
}

/// Replace `${VAR}` references with the variable's value.
///
/// Unset variables expand to an empty string; an unclosed `${` is kept verbatim.
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(open) = rest.find("${") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return out;
        };
        let var = &after[..close];
        if !var.is_empty() {
            out.push_str(&env::var(var).unwrap_or_default());
        }
        rest = &after[close + 1..];
    }

    out.push_str(rest);
    out
}

fn non_blank(value: Option<&String>) -> Option<String> {
    let expanded = expand_env_vars(value?);
    let trimmed = expanded.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// `0` disables the guard.
fn optional_timeout(ms: Option<u64>, default_ms: u64) -> Option<Duration> {
    match ms.unwrap_or(default_ms) {
        0 => None,
        ms => Some(Duration::from_millis(ms)),
    }
}

impl XuadConfig {
    /// Load the config file from its default location.
    ///
    /// Returns `Ok(None)` when no file exists.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let Some(path) = config_path() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from(&path).map(Some)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(config),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }

    /// Identity from `[app]`, with missing values left blank.
    #[must_use]
    pub fn identity(&self) -> AppIdentity {
        let app = self.app.as_ref();
        let package = non_blank(app.and_then(|a| a.package_name.as_ref())).unwrap_or_default();
        let channel = non_blank(app.and_then(|a| a.channel.as_ref())).unwrap_or_default();
        let version = non_blank(app.and_then(|a| a.version.as_ref())).unwrap_or_default();
        AppIdentity::new(package, channel, version)
    }

    /// Backend base URL. `XUAD_API_URL` wins over the file.
    #[must_use]
    pub fn api_base_url(&self) -> Option<String> {
        if let Ok(url) = env::var(API_URL_ENV)
            && !url.trim().is_empty()
        {
            return Some(url.trim().trim_end_matches('/').to_string());
        }
        non_blank(self.api.as_ref().and_then(|api| api.base_url.as_ref()))
            .map(|url| url.trim_end_matches('/').to_string())
    }

    #[must_use]
    pub fn api_timeout(&self) -> Duration {
        let secs = self
            .api
            .as_ref()
            .and_then(|api| api.timeout_seconds)
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_API_TIMEOUT_SECS);
        Duration::from_secs(secs)
    }

    /// Upper bound on the strategy validation call; `None` waits forever.
    #[must_use]
    pub fn validate_timeout(&self) -> Option<Duration> {
        optional_timeout(
            self.init.as_ref().and_then(|init| init.validate_timeout_ms),
            DEFAULT_VALIDATE_TIMEOUT_MS,
        )
    }

    /// Upper bound on device id resolution; `None` waits forever.
    #[must_use]
    pub fn device_id_timeout(&self) -> Option<Duration> {
        optional_timeout(
            self.init.as_ref().and_then(|init| init.device_id_timeout_ms),
            DEFAULT_DEVICE_ID_TIMEOUT_MS,
        )
    }

    #[must_use]
    pub fn concurrent_interval(&self) -> Duration {
        self.schedule_ms(|s| s.concurrent_interval_ms, DEFAULT_CONCURRENT_INTERVAL_MS)
    }

    #[must_use]
    pub fn banner_delay(&self) -> Duration {
        self.schedule_ms(|s| s.banner_delay_ms, DEFAULT_BANNER_DELAY_MS)
    }

    #[must_use]
    pub fn hot_start_delay(&self) -> Duration {
        self.schedule_ms(|s| s.hot_start_delay_ms, DEFAULT_HOT_START_DELAY_MS)
    }

    #[must_use]
    pub fn splash_gap(&self) -> Duration {
        self.schedule_ms(|s| s.splash_gap_ms, DEFAULT_SPLASH_GAP_MS)
    }

    fn schedule_ms(&self, pick: fn(&ScheduleConfig) -> Option<u64>, default_ms: u64) -> Duration {
        let ms = self.schedule.as_ref().and_then(pick).unwrap_or(default_ms);
        Duration::from_millis(ms)
    }
}

pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = env::var_os(CONFIG_PATH_ENV).filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".xuad").join("config.toml"))
}
