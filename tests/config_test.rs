use std::path::Path;
use std::time::Duration;

use bananaai::{BananaError, Config, GatewayBuilder, OperationClass};

#[test]
fn load_from_file_and_build_gateway() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
            [provider]
            base_url = "http://127.0.0.1:9"
            timeout_secs = 5

            [rate_limit.limits]
            assist = 3
            upload = 1
            generate = 2

            [cache]
            max_entries = 7
        "#,
    )
    .unwrap();

    let config = Config::load(Some(path.as_path())).unwrap();
    assert_eq!(config.cache.max_entries, 7);

    let gateway = GatewayBuilder::from_config(&config, "key").unwrap().build().unwrap();
    assert_eq!(gateway.cache().max_entries(), 7);
    assert_eq!(gateway.limiter().config().limit_for(OperationClass::Generate), 2);
    assert_eq!(gateway.orchestrator().config().max_attempts, 3);
    assert!(gateway.uploads().is_some());
}

#[test]
fn explicit_missing_path_is_an_error() {
    let err = Config::load_or_default(Some(Path::new("/nonexistent/bananaai.toml"))).unwrap_err();
    assert!(matches!(err, BananaError::Configuration(_)));
}

#[test]
fn malformed_file_is_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[cache\nttl_secs = ").unwrap();
    let err = Config::load_from_file(&path).unwrap_err();
    assert!(err.to_string().contains("Failed to parse"));
}

#[test]
fn builder_rejects_invalid_config() {
    let mut config = Config::default();
    config.storage.max_upload_mb = 500;
    assert!(GatewayBuilder::from_config(&config, "key").is_err());
}

#[test]
fn env_override_feeds_component_configs() {
    let mut config = Config::default();
    config
        .apply_env_from(|name| match name {
            "RATE_LIMIT_GENERATE" => Some("4".into()),
            "CACHE_TTL" => Some("120".into()),
            "FILE_CLEANUP_HOURS" => Some("2".into()),
            _ => None,
        })
        .unwrap();

    assert_eq!(config.rate_limit_config().limit_for(OperationClass::Generate), 4);
    assert_eq!(config.cache_config().ttl, Duration::from_secs(120));
    assert_eq!(config.storage.cleanup_age(), Duration::from_secs(7200));
}
