mod common;
use common::ENV_LOCK;

use bexio_mcp::errors::ToolErrorKind;
use bexio_mcp::services::config::BexioConfig;

const VARS: [&str; 3] = ["BEXIO_ACCESS_TOKEN", "BEXIO_API_URL", "BEXIO_TIMEOUT"];

fn snapshot() -> Vec<(&'static str, Option<String>)> {
    VARS.iter().map(|key| (*key, std::env::var(key).ok())).collect()
}

fn restore(saved: Vec<(&'static str, Option<String>)>) {
    for (key, value) in saved {
        match value {
            Some(value) => std::env::set_var(key, value),
            None => std::env::remove_var(key),
        }
    }
}

#[tokio::test]
async fn missing_token_fails_initialization() {
    let _guard = ENV_LOCK.lock().await;
    let saved = snapshot();

    for key in VARS {
        std::env::remove_var(key);
    }
    let err = BexioConfig::from_env().unwrap_err();
    assert_eq!(err.kind, ToolErrorKind::Config);
    assert!(err.message.contains("BEXIO_ACCESS_TOKEN"));

    restore(saved);
}

#[tokio::test]
async fn whitespace_only_token_fails_initialization() {
    let _guard = ENV_LOCK.lock().await;
    let saved = snapshot();

    std::env::set_var("BEXIO_ACCESS_TOKEN", "   ");
    std::env::remove_var("BEXIO_API_URL");
    std::env::remove_var("BEXIO_TIMEOUT");
    let err = BexioConfig::from_env().unwrap_err();
    assert_eq!(err.kind, ToolErrorKind::Config);

    restore(saved);
}

#[tokio::test]
async fn defaults_apply_when_only_the_token_is_set() {
    let _guard = ENV_LOCK.lock().await;
    let saved = snapshot();

    std::env::set_var("BEXIO_ACCESS_TOKEN", "tok-abc");
    std::env::remove_var("BEXIO_API_URL");
    std::env::remove_var("BEXIO_TIMEOUT");
    let config = BexioConfig::from_env().expect("config must load");
    assert_eq!(config.base_url, "https://api.bexio.com/2.0");
    assert_eq!(config.timeout.as_secs(), 120);
    assert_eq!(config.access_token, "tok-abc");

    restore(saved);
}

#[tokio::test]
async fn explicit_url_and_timeout_are_honored() {
    let _guard = ENV_LOCK.lock().await;
    let saved = snapshot();

    std::env::set_var("BEXIO_ACCESS_TOKEN", "tok-abc");
    std::env::set_var("BEXIO_API_URL", "https://bexio.example.test/3.0/");
    std::env::set_var("BEXIO_TIMEOUT", "30");
    let config = BexioConfig::from_env().expect("config must load");
    assert_eq!(config.base_url, "https://bexio.example.test/3.0");
    assert_eq!(config.timeout.as_secs(), 30);

    restore(saved);
}

#[tokio::test]
async fn non_numeric_timeout_is_a_config_error() {
    let _guard = ENV_LOCK.lock().await;
    let saved = snapshot();

    std::env::set_var("BEXIO_ACCESS_TOKEN", "tok-abc");
    std::env::remove_var("BEXIO_API_URL");
    std::env::set_var("BEXIO_TIMEOUT", "soon");
    let err = BexioConfig::from_env().unwrap_err();
    assert_eq!(err.kind, ToolErrorKind::Config);
    assert!(err.message.contains("BEXIO_TIMEOUT"));

    restore(saved);
}
