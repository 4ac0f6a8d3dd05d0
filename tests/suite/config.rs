//! Config file to runtime options

use std::fs;
use std::time::Duration;

use tempfile::TempDir;
use xuad_config::{ConfigError, XuadConfig};
use xuad_engine::{DEFAULT_HOT_START_DELAY, RuntimeOptions};

fn write_config(contents: &str) -> (TempDir, XuadConfig) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, contents).unwrap();
    let config = XuadConfig::load_from(&path).unwrap();
    (dir, config)
}

#[test]
fn file_values_flow_into_runtime_options() {
    let (_dir, config) = write_config(
        r#"
[app]
package_name = "com.example.app"
channel = "  Xiaomi "
version = "2.0.1"

[init]
validate_timeout_ms = 1500
device_id_timeout_ms = 0

[schedule]
concurrent_interval_ms = 250
banner_delay_ms = 10
splash_gap_ms = 75
"#,
    );

    let identity = config.identity();
    assert_eq!(identity.package_name(), "com.example.app");
    assert_eq!(identity.channel(), "xiaomi");
    assert_eq!(identity.version(), "2.0.1");

    let options = RuntimeOptions::from_config(&config);
    assert_eq!(options.init.validate_timeout, Some(Duration::from_millis(1500)));
    assert_eq!(options.init.device_id_timeout, None);
    assert_eq!(options.scheduler.concurrent_interval, Duration::from_millis(250));
    assert_eq!(options.scheduler.banner_delay, Duration::from_millis(10));
    assert_eq!(options.splash_gap, Duration::from_millis(75));
    assert_eq!(options.hot_start_delay, DEFAULT_HOT_START_DELAY);
}

#[test]
fn empty_file_matches_built_in_defaults() {
    let (_dir, config) = write_config("");

    let from_file = RuntimeOptions::from_config(&config);
    let defaults = RuntimeOptions::default();
    assert_eq!(from_file.init.validate_timeout, defaults.init.validate_timeout);
    assert_eq!(from_file.init.device_id_timeout, defaults.init.device_id_timeout);
    assert_eq!(
        from_file.scheduler.concurrent_interval,
        defaults.scheduler.concurrent_interval
    );
    assert_eq!(from_file.scheduler.banner_delay, defaults.scheduler.banner_delay);
    assert_eq!(from_file.hot_start_delay, defaults.hot_start_delay);
    assert_eq!(from_file.splash_gap, defaults.splash_gap);
    assert_eq!(config.api_timeout(), Duration::from_secs(3));
}

#[test]
fn malformed_file_reports_its_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[schedule\nsplash_gap_ms = 1").unwrap();

    let err = XuadConfig::load_from(&path).unwrap_err();

    assert!(matches!(err, ConfigError::Parse { .. }));
    assert_eq!(err.path(), &path);
}

#[test]
fn missing_file_is_a_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");

    let err = XuadConfig::load_from(&path).unwrap_err();

    assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
fn device_info_is_flattened_for_the_wire() {
    let options = RuntimeOptions::default().with_device_info("brand=acme\r\nmodel=x");
    assert_eq!(options.init.device_info, "brand=acme  model=x");

    let long = "a".repeat(2_000);
    let options = RuntimeOptions::default().with_device_info(&long);
    assert_eq!(options.init.device_info.chars().count(), 1024);
}
