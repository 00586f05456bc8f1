use std::io::Write;
use tempfile::NamedTempFile;
use tessel_engine::config::ConfigLoader;
use tessel_engine::config::loader::ConfigError;
use tessel_engine::config::schema::{EngineConfig, LowConfidencePolicy};

#[test]
fn test_default_values() {
    let config = EngineConfig::default();
    assert_eq!(config.resolution.confidence_threshold, 0.5);
    assert_eq!(config.resolution.low_confidence, LowConfidencePolicy::Proceed);
    assert_eq!(config.retry.max_retries, 2);
    assert_eq!(config.waits.default_timeout_ms, 10000);
    assert!(!config.screenshots.on_success);
    assert!(config.security.redact_in_logs);

    let options = config.resolution.options();
    assert_eq!(options.min_match_score, 0.15);
}

#[tokio::test]
async fn test_load_from_file_keeps_unset_defaults() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
resolution:
  confidence_threshold: 0.7
  low_confidence: fail
retry:
  max_retries: 5
screenshots:
  on_success: true
  dir: /tmp/shots
security:
  sensitive_fields:
    - "pin"
"#
    )
    .unwrap();

    let config = ConfigLoader::load_from(file.path())
        .await
        .expect("Failed to load config from file");

    assert_eq!(config.resolution.confidence_threshold, 0.7);
    assert_eq!(config.resolution.min_match_score, 0.15);
    assert_eq!(config.resolution.low_confidence, LowConfidencePolicy::Fail);
    assert_eq!(config.retry.max_retries, 5);
    assert_eq!(config.retry.initial_backoff_ms, 500);
    assert_eq!(config.waits.poll_interval_ms, 250);
    assert!(config.screenshots.on_success);
    assert_eq!(
        config.screenshots.dir.as_deref(),
        Some(std::path::Path::new("/tmp/shots"))
    );
    // Lists replace the default rather than merging.
    assert_eq!(config.security.sensitive_fields, vec!["pin".to_string()]);
}

#[tokio::test]
async fn test_empty_file_is_default() {
    let file = NamedTempFile::new().unwrap();
    let config = ConfigLoader::load_from(file.path()).await.unwrap();
    assert_eq!(config.retry.max_retries, 2);
}

#[tokio::test]
async fn test_load_from_nonexistent_file() {
    let result =
        ConfigLoader::load_from(std::path::Path::new("/nonexistent/path/tessel.yaml")).await;
    assert!(matches!(result, Err(ConfigError::Io(_))));
}

#[tokio::test]
async fn test_load_first_skips_missing_candidates() {
    let dir = tempfile::tempdir().unwrap();
    let present = dir.path().join("tessel.yaml");
    std::fs::write(&present, "retry:\n  max_retries: 7\n").unwrap();
    let candidates = vec![dir.path().join("missing.yaml"), present];

    let config = ConfigLoader::load_first(&candidates).await.unwrap();
    assert_eq!(config.retry.max_retries, 7);

    let config = ConfigLoader::load_first(&[]).await.unwrap();
    assert_eq!(config.retry.max_retries, 2);
}

#[test]
fn test_search_path_starts_in_working_directory() {
    let paths = ConfigLoader::search_path();
    assert_eq!(paths[0], std::path::PathBuf::from("tessel.yaml"));
}

#[test]
fn test_out_of_range_settings_are_rejected() {
    for yaml in [
        "resolution:\n  confidence_threshold: 1.5\n",
        "resolution:\n  min_match_score: -0.1\n",
        "resolution:\n  confidence_threshold: 0.1\n  min_match_score: 0.3\n",
        "waits:\n  poll_interval_ms: 0\n",
        "retry:\n  backoff_multiplier: 0.5\n",
        "retry:\n  initial_backoff_ms: 9000\n",
    ] {
        let result = ConfigLoader::parse(yaml);
        assert!(matches!(result, Err(ConfigError::Invalid(_))), "{yaml}");
    }
    assert!(ConfigLoader::parse("resolution:\n  confidence_threshold: 1.0\n").is_ok());
}

#[tokio::test]
async fn test_invalid_values_fail_the_load() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "waits:\n  poll_interval_ms: 0").unwrap();
    let err = ConfigLoader::load_from(file.path()).await.unwrap_err();
    assert!(err.to_string().contains("poll_interval_ms"));
}

#[tokio::test]
async fn test_invalid_yaml() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "retry: [not, a, map").unwrap();
    let result = ConfigLoader::load_from(file.path()).await;
    assert!(matches!(result, Err(ConfigError::Parse(_))));
}
