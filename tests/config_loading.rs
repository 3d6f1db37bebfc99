//! Integration test: Configuration utilities
//!
//! Tests the bin_common configuration loading functionality.

use std::env;
use std::io::Write;
use std::time::Duration;
use websockets_client::bin_common::{load_config_from_env, ClientConfig, ConfigError, ConfigType};

#[test]
fn test_client_config_default_and_override() {
    // Both cases share one env var, so keep them in one test
    env::remove_var("CLIENT_CONFIG_PATH");
    let config_path = load_config_from_env(ConfigType::Client);
    assert_eq!(config_path.to_str().unwrap(), "config/client.yaml");

    env::set_var("CLIENT_CONFIG_PATH", "/tmp/other-client.yaml");
    let config_path = load_config_from_env(ConfigType::Client);
    assert_eq!(config_path.to_str().unwrap(), "/tmp/other-client.yaml");
    env::remove_var("CLIENT_CONFIG_PATH");
}

#[test]
fn test_custom_config() {
    env::remove_var("CONFIG_PATH");

    let custom = ConfigType::Custom("custom/path.yaml".to_string());
    let config_path = load_config_from_env(custom);

    assert_eq!(config_path.to_str().unwrap(), "custom/path.yaml");
}

#[test]
fn test_load_client_config_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
url: wss://stream.example.com/feed
subprotocols: [chat, superchat]
headers:
  Authorization: Bearer abc
options:
  receive_text_messages_raw: true
  socket_connect_timeout_ms: 2500
  reconnect_interval_ms: 1000
"#
    )
    .unwrap();

    let config = ClientConfig::from_file(file.path()).unwrap();
    assert_eq!(config.url, "wss://stream.example.com/feed");
    assert_eq!(config.subprotocols, vec!["chat", "superchat"]);
    assert_eq!(
        config.headers.get("Authorization").map(String::as_str),
        Some("Bearer abc")
    );
    assert!(config.options.receive_text_messages_raw);
    assert!(config.options.tcp_no_delay);
    assert_eq!(config.options.socket_connect_timeout(), Duration::from_millis(2500));
    assert_eq!(config.options.reconnect_interval, Duration::from_secs(1));
}

#[test]
fn test_shipped_client_config_parses() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/client.yaml");
    let config = ClientConfig::from_file(path).unwrap();
    assert!(config.url.starts_with("ws://"));
    assert_eq!(config.options.reconnect_interval, Duration::from_secs(2));
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = ClientConfig::from_file(dir.path().join("absent.yaml"));
    assert!(matches!(result, Err(ConfigError::Io { .. })));
}

#[test]
fn test_missing_url_is_parse_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "subprotocols: [chat]").unwrap();

    let result = ClientConfig::from_file(file.path());
    assert!(matches!(result, Err(ConfigError::Parse { .. })));
}
