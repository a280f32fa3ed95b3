use anyhow::{anyhow, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// Remote text service settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Parsing, merging and enrichment toggles
    #[serde(default)]
    pub processing: ProcessingConfig,

    /// Rate-limit retry settings
    #[serde(default)]
    pub retry: RetryConfig,

    /// Directory the show-notes document is written to
    #[serde(default = "default_output_directory")]
    pub output_directory: PathBuf,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// OpenAI-compatible chat completion service configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ApiConfig {
    /// API key for the service
    #[serde(default = "String::new")]
    pub api_key: String,

    /// Base URL, the `/chat/completions` path is appended to it
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model name (e.g., "moonshot-v1-8k")
    #[serde(default = "default_model")]
    pub model: String,

    /// System prompt sent with every request
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Temperature parameter for text generation (0.0 to 1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            model: default_model(),
            system_prompt: default_system_prompt(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ApiConfig {
    /// Whether an API key has been provided
    pub fn has_credentials(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// HTTP request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// What to do when enriching a single segment fails
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Use a fallback for the failed segment and keep going
    #[default]
    Degrade,
    /// Use fallbacks for the failed segment and every segment after it
    AbortStage,
}

/// Pipeline settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ProcessingConfig {
    /// Minimum number of characters collected before a segment is closed
    #[serde(default = "default_target_length")]
    pub target_length: usize,

    /// Generate a title per segment
    #[serde(default = "default_true")]
    pub enable_titles: bool,

    /// Proofread the text of each segment
    #[serde(default = "default_true")]
    pub enable_proofread: bool,

    /// Per-segment failure handling
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            target_length: default_target_length(),
            enable_titles: true,
            enable_proofread: true,
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl ProcessingConfig {
    /// Whether any stage needs the remote service
    pub fn needs_remote(&self) -> bool {
        self.enable_titles || self.enable_proofread
    }
}

/// Rate-limit retry configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RetryConfig {
    /// Attempts per call before giving up; `null` retries forever
    #[serde(default = "default_max_attempts")]
    pub max_attempts: Option<u32>,

    /// Fixed wait between rate-limited attempts, in milliseconds
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_output_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_base_url() -> String {
    "https://api.moonshot.cn/v1".to_string()
}

fn default_model() -> String {
    "moonshot-v1-8k".to_string()
}

fn default_system_prompt() -> String {
    "You are a helpful assistant that edits spoken-word transcripts.".to_string()
}

fn default_temperature() -> f32 {
    0.6
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_target_length() -> usize {
    500
}

fn default_max_attempts() -> Option<u32> {
    Some(3)
}

fn default_backoff_ms() -> u64 {
    1200
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        if self.processing.target_length == 0 {
            return Err(anyhow!("Target length must be greater than zero"));
        }

        url::Url::parse(&self.api.base_url)
            .with_context(|| format!("Invalid base URL: {}", self.api.base_url))?;

        if self.api.model.trim().is_empty() {
            return Err(anyhow!("Model name must not be empty"));
        }

        if !(0.0..=2.0).contains(&self.api.temperature) {
            return Err(anyhow!("Temperature must be between 0.0 and 2.0, got {}", self.api.temperature));
        }

        if self.api.timeout_secs == 0 {
            return Err(anyhow!("Request timeout must be greater than zero"));
        }

        if self.retry.max_attempts == Some(0) {
            return Err(anyhow!("Retry budget must allow at least one attempt"));
        }

        // A missing key is not fatal here: enrichment stages degrade on their own
        if self.processing.needs_remote() && !self.api.has_credentials() {
            warn!("No API key configured, titles and proofreading will fall back to defaults");
        }

        Ok(())
    }

    /// Load a configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open config file: {}", path.display()))?;

        let reader = BufReader::new(file);
        let config: Config = serde_json::from_reader(reader)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load a configuration file, writing a default one when it does not exist
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Self::load(path);
        }

        warn!("Config file not found at '{}', creating default config.", path.display());
        let config = Config::default();
        config.save(path)?;
        Ok(config)
    }

    /// Save the configuration as pretty-printed JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let config_json = serde_json::to_string_pretty(self)
            .context("Failed to serialize config to JSON")?;

        std::fs::write(path, config_json)
            .with_context(|| format!("Failed to write config to file: {}", path.display()))?;

        Ok(())
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            api: ApiConfig::default(),
            processing: ProcessingConfig::default(),
            retry: RetryConfig::default(),
            output_directory: default_output_directory(),
            log_level: LogLevel::default(),
        }
    }
}
