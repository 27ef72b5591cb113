use tl_domain::config::{ClientConfig, NodeConfig};
use tl_domain::error::Error;

#[test]
fn default_client_has_no_nodes() {
    let config = ClientConfig::default();
    assert!(config.nodes.is_empty());
    assert_eq!(config.event_capacity, 64);
    assert!(config.client_name.starts_with("tunelink/"));
}

#[test]
fn node_defaults_match_lavalink_defaults() {
    let node = NodeConfig::new("main");
    assert_eq!(node.host, "127.0.0.1");
    assert_eq!(node.port, 2333);
    assert_eq!(node.password, "youshallnotpass");
    assert!(node.resume_key.is_none());
    assert_eq!(node.reconnect.max_attempts, 0);
}

#[test]
fn full_config_parses() {
    let toml_str = r#"
user_id = 123456789012345678

[[nodes]]
identifier = "eu-1"
host = "lava-eu.example.com"
port = 443
password = "hunter2"
secure = true
resume_key = "tl-eu-1"
fallback = true

[nodes.reconnect]
initial_delay_ms = 1000
max_attempts = 5

[[nodes]]
identifier = "us-1"
host = "lava-us.example.com"
"#;
    let config = ClientConfig::from_toml_str(toml_str).unwrap();
    assert_eq!(config.user_id, 123_456_789_012_345_678);
    assert_eq!(config.nodes.len(), 2);

    let eu = &config.nodes[0];
    assert!(eu.secure);
    assert!(eu.fallback);
    assert_eq!(eu.resume_key.as_deref(), Some("tl-eu-1"));
    assert_eq!(eu.reconnect.initial_delay_ms, 1000);
    assert_eq!(eu.reconnect.max_delay_ms, 300_000);
    assert_eq!(eu.reconnect.max_attempts, 5);

    let us = &config.nodes[1];
    assert_eq!(us.port, 2333);
    assert!(!us.fallback);
}

#[test]
fn duplicate_identifiers_are_rejected() {
    let toml_str = r#"
[[nodes]]
identifier = "main"

[[nodes]]
identifier = "main"
"#;
    let err = ClientConfig::from_toml_str(toml_str).unwrap_err();
    assert!(matches!(err, Error::DuplicateIdentifier(id) if id == "main"));
}

#[test]
fn malformed_toml_is_a_config_error() {
    let err = ClientConfig::from_toml_str("nodes = 3").unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}
