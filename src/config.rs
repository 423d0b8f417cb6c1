use crate::cli::Cli;
use crate::engine::AuditConfig;
use crate::http_client::{DEFAULT_VALIDATOR_URL, HttpClientConfig};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Trait for abstracting environment variable access
pub trait EnvProvider {
    fn get(&self, key: &str) -> Option<String>;
}

/// System environment variable provider for production use
pub struct SystemEnvProvider;

impl EnvProvider for SystemEnvProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable error: {0}")]
    Environment(String),

    #[error("Unsupported configuration file format: {0}")]
    UnsupportedFormat(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub audit: AuditSettings,
    pub network: NetworkConfig,
    pub output: OutputConfig,
    pub files: FileConfig,
}

/// Audit pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuditSettings {
    /// Number of concurrent document audits
    pub threads: Option<usize>,
    /// Upper bound on a single document's audit in seconds
    pub worker_timeout_seconds: u64,
    /// Search keyword that drops validated documents before the round
    pub refresh_keyword: String,
    /// Show progress indicators
    pub show_progress: bool,
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    /// HTTP request timeout in seconds
    pub timeout_seconds: u64,
    /// Number of retry attempts for failed requests
    pub retry_attempts: u32,
    /// Retry delay in milliseconds
    pub retry_delay_ms: u64,
    /// Conformance checker endpoint
    pub validator_url: String,
    /// Probe `http`/`www` links
    pub check_remote_links: bool,
    /// Send pages to the conformance checker
    pub use_validator: bool,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// Verbose output
    pub verbose: bool,
    /// Quiet mode (summary only)
    pub quiet: bool,
    /// ANSI colors
    pub color: bool,
}

/// File discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FileConfig {
    /// File extensions to process
    pub extensions: Vec<String>,
    /// Exclude patterns (regex syntax, matched against the root-relative path)
    pub exclude_patterns: Vec<String>,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            threads: None,
            worker_timeout_seconds: 120,
            refresh_keyword: "refresh".to_string(),
            show_progress: false,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            retry_attempts: 3,
            retry_delay_ms: 500,
            validator_url: DEFAULT_VALIDATOR_URL.to_string(),
            check_remote_links: true,
            use_validator: true,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            quiet: false,
            color: atty::is(atty::Stream::Stdout),
        }
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["html".to_string()],
            exclude_patterns: vec!["template".to_string()],
        }
    }
}

/// Configuration manager for loading and merging configurations
pub struct ConfigManager;

impl ConfigManager {
    /// Load configuration with precedence: file -> environment -> CLI
    pub async fn load_config(cli: &Cli) -> Result<Config> {
        Self::load_config_with(cli, &SystemEnvProvider).await
    }

    /// Load configuration with a custom environment provider
    pub async fn load_config_with(cli: &Cli, env: &impl EnvProvider) -> Result<Config> {
        // Start with default configuration
        let mut config = Config::default();

        // Load from configuration file if specified
        if let Some(config_path) = &cli.config {
            let file_config = Self::load_from_file(config_path).await?;
            config = Self::merge_configs(config, file_config);
        } else if let Some(found_config) = Self::find_config_file().await? {
            config = Self::merge_configs(config, found_config);
        }

        // Apply environment variable overrides
        config = Self::apply_environment_overrides_with(env, config)?;

        // Apply CLI argument overrides (highest precedence)
        config = Self::merge_with_cli(config, cli);

        // Validate the final configuration
        Self::validate_config(&config)?;

        Ok(config)
    }

    /// Load configuration from a file (TOML or JSON)
    pub async fn load_from_file(path: &Path) -> Result<Config> {
        let content = tokio::fs::read_to_string(path).await?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(toml::from_str(&content)?),
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => {
                // Try to parse as TOML first, then JSON
                if let Ok(config) = toml::from_str::<Config>(&content) {
                    Ok(config)
                } else {
                    Ok(serde_json::from_str(&content)?)
                }
            }
        }
    }

    /// Find configuration file in standard locations
    pub async fn find_config_file() -> Result<Option<Config>> {
        let config_names = [
            "html-audit.toml",
            "html-audit.json",
            ".html-audit.toml",
            ".html-audit.json",
        ];

        // Check current directory first
        for name in &config_names {
            let path = PathBuf::from(name);
            if path.exists() {
                return Ok(Some(Self::load_from_file(&path).await?));
            }
        }

        // Check user config directory
        if let Some(config_dir) = dirs::config_dir() {
            let app_config_dir = config_dir.join("html-audit");
            for name in &config_names {
                let path = app_config_dir.join(name);
                if path.exists() {
                    return Ok(Some(Self::load_from_file(&path).await?));
                }
            }
        }

        Ok(None)
    }

    /// Apply environment variable overrides using the system environment
    pub fn apply_environment_overrides(config: Config) -> Result<Config> {
        Self::apply_environment_overrides_with(&SystemEnvProvider, config)
    }

    /// Apply environment variable overrides with a custom environment provider
    pub fn apply_environment_overrides_with(
        env: &impl EnvProvider,
        mut config: Config,
    ) -> Result<Config> {
        fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Environment(format!("Invalid {} value: {}", key, value)))
        }

        // Audit settings
        if let Some(threads) = env.get("HTML_AUDIT_THREADS") {
            config.audit.threads = Some(parse_var("HTML_AUDIT_THREADS", &threads)?);
        }

        if let Some(keyword) = env.get("HTML_AUDIT_REFRESH_KEYWORD") {
            config.audit.refresh_keyword = keyword.trim().to_lowercase();
        }

        // Network settings
        if let Some(timeout) = env.get("HTML_AUDIT_TIMEOUT") {
            config.network.timeout_seconds = parse_var("HTML_AUDIT_TIMEOUT", &timeout)?;
        }

        if let Some(retry_attempts) = env.get("HTML_AUDIT_RETRY_ATTEMPTS") {
            config.network.retry_attempts =
                parse_var("HTML_AUDIT_RETRY_ATTEMPTS", &retry_attempts)?;
        }

        if let Some(url) = env.get("HTML_AUDIT_VALIDATOR_URL") {
            config.network.validator_url = url;
        }

        if let Some(offline) = env.get("HTML_AUDIT_OFFLINE") {
            let offline: bool = parse_var("HTML_AUDIT_OFFLINE", &offline)?;
            if offline {
                config.network.check_remote_links = false;
                config.network.use_validator = false;
            }
        }

        // Output settings
        if let Some(verbose) = env.get("HTML_AUDIT_VERBOSE") {
            config.output.verbose = parse_var("HTML_AUDIT_VERBOSE", &verbose)?;
        }

        if let Some(quiet) = env.get("HTML_AUDIT_QUIET") {
            config.output.quiet = parse_var("HTML_AUDIT_QUIET", &quiet)?;
        }

        // File settings
        if let Some(extensions) = env.get("HTML_AUDIT_EXTENSIONS") {
            config.files.extensions = split_list(&extensions);
        }

        Ok(config)
    }

    /// Merge CLI arguments with configuration (CLI takes precedence)
    pub fn merge_with_cli(mut config: Config, cli: &Cli) -> Config {
        // Audit settings
        if cli.threads.is_some() {
            config.audit.threads = cli.threads;
        }
        if let Some(keyword) = &cli.refresh_keyword {
            config.audit.refresh_keyword = keyword.trim().to_lowercase();
        }
        if cli.progress {
            config.audit.show_progress = true;
        }

        // Network settings
        if let Some(timeout) = cli.timeout {
            config.network.timeout_seconds = timeout;
        }
        if let Some(retry_attempts) = cli.retry_attempts {
            config.network.retry_attempts = retry_attempts;
        }
        if let Some(url) = &cli.validator_url {
            config.network.validator_url = url.clone();
        }
        if cli.offline {
            config.network.check_remote_links = false;
            config.network.use_validator = false;
        }

        // Output settings
        if cli.verbose {
            config.output.verbose = true;
            config.output.quiet = false;
        }
        if cli.quiet {
            config.output.quiet = true;
            config.output.verbose = false;
        }
        if cli.no_color {
            config.output.color = false;
        }

        // File settings
        if let Some(extensions) = &cli.extensions {
            config.files.extensions = split_list(extensions);
        }
        if !cli.exclude_patterns.is_empty() {
            config.files.exclude_patterns = cli.exclude_patterns.clone();
        }

        config
    }

    /// Merge two configurations (second takes precedence for non-None values)
    pub fn merge_configs(mut base: Config, override_config: Config) -> Config {
        // Audit settings
        if override_config.audit.threads.is_some() {
            base.audit.threads = override_config.audit.threads;
        }
        base.audit.worker_timeout_seconds = override_config.audit.worker_timeout_seconds;
        base.audit.refresh_keyword = override_config.audit.refresh_keyword;
        base.audit.show_progress = override_config.audit.show_progress;

        // Network settings
        base.network = override_config.network;

        // Output settings
        base.output.verbose = override_config.output.verbose;
        base.output.quiet = override_config.output.quiet;
        base.output.color = base.output.color && override_config.output.color;

        // File settings
        if !override_config.files.extensions.is_empty() {
            base.files.extensions = override_config.files.extensions;
        }
        base.files.exclude_patterns = override_config.files.exclude_patterns;

        base
    }

    /// Validate configuration values
    pub fn validate_config(config: &Config) -> Result<()> {
        // Validate threads
        if let Some(threads) = config.audit.threads {
            if threads == 0 {
                return Err(ConfigError::Validation(
                    "Number of threads must be greater than 0".to_string(),
                ));
            }
            if threads > 1000 {
                return Err(ConfigError::Validation(
                    "Number of threads cannot exceed 1000".to_string(),
                ));
            }
        }

        if config.audit.worker_timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "Worker timeout must be greater than 0".to_string(),
            ));
        }

        if config.audit.refresh_keyword.trim().is_empty()
            || config.audit.refresh_keyword.contains(char::is_whitespace)
        {
            return Err(ConfigError::Validation(
                "Refresh keyword must be a single non-empty word".to_string(),
            ));
        }

        // Validate network settings
        if config.network.timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "Timeout must be greater than 0".to_string(),
            ));
        }

        if config.network.retry_attempts > 10 {
            return Err(ConfigError::Validation(
                "Retry attempts cannot exceed 10".to_string(),
            ));
        }

        if config.network.use_validator && !config.network.validator_url.starts_with("http") {
            return Err(ConfigError::Validation(format!(
                "Validator URL must be http(s): {}",
                config.network.validator_url
            )));
        }

        // Validate output settings
        if config.output.verbose && config.output.quiet {
            return Err(ConfigError::Validation(
                "Cannot enable both verbose and quiet modes".to_string(),
            ));
        }

        // Validate file settings
        if config.files.extensions.is_empty() {
            return Err(ConfigError::Validation(
                "At least one file extension must be specified".to_string(),
            ));
        }

        // Validate that extensions don't contain invalid characters
        for ext in &config.files.extensions {
            if ext.contains('/') || ext.contains('\\') || ext.contains('.') {
                return Err(ConfigError::Validation(format!(
                    "Invalid file extension: {}",
                    ext
                )));
            }
        }

        for pattern in &config.files.exclude_patterns {
            Regex::new(pattern).map_err(|e| {
                ConfigError::Validation(format!("Invalid exclude pattern '{}': {}", pattern, e))
            })?;
        }

        Ok(())
    }

    /// Get the effective thread count
    pub fn get_thread_count(config: &Config) -> usize {
        config.audit.threads.unwrap_or_else(num_cpus::get)
    }

    /// Convert configuration to Duration for network timeout
    pub fn get_timeout_duration(config: &Config) -> Duration {
        Duration::from_secs(config.network.timeout_seconds)
    }

    /// Convert configuration to Duration for retry delay
    pub fn get_retry_delay_duration(config: &Config) -> Duration {
        Duration::from_millis(config.network.retry_delay_ms)
    }

    /// Settings for the HTTP collaborators
    pub fn http_client_config(config: &Config) -> HttpClientConfig {
        HttpClientConfig {
            timeout_seconds: config.network.timeout_seconds,
            retry_attempts: config.network.retry_attempts,
            retry_delay_ms: config.network.retry_delay_ms,
            validator_url: config.network.validator_url.clone(),
            ..HttpClientConfig::default()
        }
    }

    /// Settings for the audit engine
    pub fn audit_config(config: &Config) -> AuditConfig {
        AuditConfig {
            max_concurrent_audits: Self::get_thread_count(config),
            audit_timeout: Duration::from_secs(config.audit.worker_timeout_seconds),
        }
    }
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
