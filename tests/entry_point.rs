//! The entry point reports startup failures instead of propagating them.

use json_validation_service::lifecycle::{run_with, Outcome};
use json_validation_service::{JsonValidationService, ServiceConfig};

#[tokio::test]
async fn port_in_use_is_reported_on_error_stream() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let address = taken.local_addr().unwrap().to_string();

    let mut config = ServiceConfig::default();
    config.listener.bind_address = address.clone();

    let mut stderr = Vec::new();
    let outcome = run_with(|| JsonValidationService::with_config(config), &mut stderr).await;

    assert_eq!(outcome, Outcome::Failed);
    let text = String::from_utf8(stderr).unwrap();
    assert!(text.starts_with("error: "), "unexpected diagnostic: {text}");
    assert!(text.contains(&address));
    assert!(text.contains("caused by: "));
}

#[tokio::test]
async fn bad_schema_directory_is_reported_on_error_stream() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("broken.json"), "{ nope").unwrap();

    let mut config = ServiceConfig::default();
    config.schemas.directory = Some(dir.path().display().to_string());

    let mut stderr = Vec::new();
    let outcome = run_with(|| JsonValidationService::with_config(config), &mut stderr).await;

    assert_eq!(outcome, Outcome::Failed);
    let text = String::from_utf8(stderr).unwrap();
    assert!(text.contains("broken.json"), "unexpected diagnostic: {text}");
}

#[tokio::test]
async fn invalid_configuration_is_reported_on_error_stream() {
    let mut config = ServiceConfig::default();
    config.listener.bind_address = "not-an-address".into();

    let mut stderr = Vec::new();
    let outcome = run_with(|| JsonValidationService::with_config(config), &mut stderr).await;

    assert_eq!(outcome, Outcome::Failed);
    let text = String::from_utf8(stderr).unwrap();
    assert!(text.contains("listener.bind_address"), "unexpected diagnostic: {text}");
}
