use std::collections::HashMap;

use clap::Parser;
use tempfile::TempDir;

use html_audit::{Cli, ConfigError, ConfigManager, EnvProvider};

struct MapEnv(HashMap<&'static str, &'static str>);

impl EnvProvider for MapEnv {
    fn get(&self, key: &str) -> Option<String> {
        self.0.get(key).map(|v| v.to_string())
    }
}

fn cli(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("html-audit").chain(args.iter().copied())).unwrap()
}

#[tokio::test]
async fn test_toml_file_is_loaded() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("audit.toml");
    std::fs::write(
        &path,
        r#"
[audit]
threads = 2
refresh_keyword = "reload"

[network]
use_validator = false

[files]
extensions = ["html", "htm"]
exclude_patterns = []
"#,
    )
    .unwrap();

    let config = ConfigManager::load_from_file(&path).await.unwrap();

    assert_eq!(config.audit.threads, Some(2));
    assert_eq!(config.audit.refresh_keyword, "reload");
    assert_eq!(config.audit.worker_timeout_seconds, 120);
    assert!(!config.network.use_validator);
    assert!(config.network.check_remote_links);
    assert_eq!(config.files.extensions, vec!["html", "htm"]);
    assert!(config.files.exclude_patterns.is_empty());
}

#[tokio::test]
async fn test_json_file_is_loaded() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("audit.json");
    std::fs::write(&path, r#"{ "network": { "timeout_seconds": 5 } }"#).unwrap();

    let config = ConfigManager::load_from_file(&path).await.unwrap();

    assert_eq!(config.network.timeout_seconds, 5);
    assert_eq!(config.network.retry_attempts, 3);
}

#[tokio::test]
async fn test_unsupported_file_format() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("audit.yaml");
    std::fs::write(&path, "audit: {}").unwrap();

    let result = ConfigManager::load_from_file(&path).await;
    assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
}

#[tokio::test]
async fn test_precedence_file_then_env_then_cli() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("audit.toml");
    std::fs::write(
        &path,
        "[audit]\nthreads = 2\n\n[network]\ntimeout_seconds = 10\nretry_attempts = 1\n",
    )
    .unwrap();

    let env = MapEnv(HashMap::from([
        ("HTML_AUDIT_THREADS", "6"),
        ("HTML_AUDIT_TIMEOUT", "20"),
    ]));
    let cli = cli(&["-c", path.to_str().unwrap(), "-t", "8"]);

    let config = ConfigManager::load_config_with(&cli, &env).await.unwrap();

    assert_eq!(config.audit.threads, Some(8));
    assert_eq!(config.network.timeout_seconds, 20);
    assert_eq!(config.network.retry_attempts, 1);
}

#[tokio::test]
async fn test_offline_from_environment() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("audit.toml");
    std::fs::write(&path, "").unwrap();

    let env = MapEnv(HashMap::from([("HTML_AUDIT_OFFLINE", "true")]));
    let config = ConfigManager::load_config_with(&cli(&["-c", path.to_str().unwrap()]), &env)
        .await
        .unwrap();

    assert!(!config.network.check_remote_links);
    assert!(!config.network.use_validator);
}

#[tokio::test]
async fn test_invalid_environment_value() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("audit.toml");
    std::fs::write(&path, "").unwrap();

    let env = MapEnv(HashMap::from([("HTML_AUDIT_THREADS", "many")]));
    let result = ConfigManager::load_config_with(&cli(&["-c", path.to_str().unwrap()]), &env).await;

    assert!(matches!(result, Err(ConfigError::Environment(_))));
}

#[tokio::test]
async fn test_final_config_is_validated() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("audit.toml");
    std::fs::write(&path, "[files]\nexclude_patterns = [\"(\"]\n").unwrap();

    let env = MapEnv(HashMap::new());
    let result = ConfigManager::load_config_with(&cli(&["-c", path.to_str().unwrap()]), &env).await;

    assert!(matches!(result, Err(ConfigError::Validation(_))));
}
