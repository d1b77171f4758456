use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;
use thoth::config::{GatewayConfig, RetryConfig, ThothConfig};
use thoth::errors::ErrorKind;

#[test]
fn test_defaults_are_valid() {
    let config = ThothConfig::default();
    config.validate().unwrap();
    assert_eq!(config.gateway.channel, "mychannel");
    assert_eq!(config.query.max_page_size, 500);
    assert_eq!(config.retry.max_attempts, 3);
    assert_eq!(config.retry.backoff(), Duration::from_millis(200));
    assert_eq!(config.events.notification_name, "chaincode-updates");
}

#[test]
fn test_partial_document_keeps_defaults() {
    let config = ThothConfig::from_json_str(
        r#"{"gateway": {"channel": "orgchannel"}, "retry": {"backoff_ms": 50}}"#,
    )
    .unwrap();

    assert_eq!(config.gateway.channel, "orgchannel");
    assert_eq!(config.gateway.contract, GatewayConfig::default().contract);
    assert_eq!(config.retry.backoff_ms, 50);
    assert_eq!(config.retry.max_attempts, RetryConfig::default().max_attempts);
    assert_eq!(config.query, ThothConfig::default().query);
}

#[test]
fn test_invalid_values_are_rejected() {
    for document in [
        r#"{"gateway": {"channel": ""}}"#,
        r#"{"gateway": {"queue_capacity": 0}}"#,
        r#"{"query": {"default_page_size": 0}}"#,
        r#"{"query": {"default_page_size": 600, "max_page_size": 500}}"#,
        r#"{"retry": {"max_attempts": 0}}"#,
        r#"{"events": {"notification_name": ""}}"#,
        r#"{"gateway": "#,
    ] {
        let err = ThothConfig::from_json_str(document).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest, "accepted {}", document);
    }
}

#[test]
fn test_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, r#"{{"query": {{"default_page_size": 20, "max_page_size": 40}}}}"#).unwrap();

    let config = ThothConfig::from_file(file.path()).unwrap();
    assert_eq!(config.query.default_page_size, 20);
    assert_eq!(config.query.max_page_size, 40);
}

#[test]
fn test_missing_file_is_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let err = ThothConfig::from_file(dir.path().join("absent.json")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadRequest);
    assert!(err.message().contains("absent.json"));
}

#[test]
fn test_round_trips_through_json() {
    let mut config = ThothConfig::default();
    config.gateway.queue_capacity = 8;
    let document = serde_json::to_string(&config).unwrap();
    assert_eq!(ThothConfig::from_json_str(&document).unwrap(), config);
}
