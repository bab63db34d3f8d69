//! Configuration management for chatbatch
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.
//! Credentials are normally supplied through the environment and are never
//! written back out or printed.

use crate::error::{ChatbatchError, Result};
use crate::providers::gigachat::{GigachatModel, GigachatScope};
use crate::providers::mistral::MistralModel;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Providers the session factory knows how to build
pub const VALID_PROVIDERS: [&str; 2] = ["gigachat", "mistral"];

/// Main configuration structure for chatbatch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Provider configuration (GigaChat, Mistral)
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Settings shared by every session
    #[serde(default)]
    pub session: SessionConfig,
    /// Batch driver settings
    #[serde(default)]
    pub batch: BatchConfig,
}

/// Provider configuration
///
/// Specifies which provider to use and the settings of each.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Type of provider to use
    #[serde(rename = "type", default = "default_provider_type")]
    pub provider_type: String,

    /// GigaChat configuration
    #[serde(default)]
    pub gigachat: GigachatConfig,

    /// Mistral configuration
    #[serde(default)]
    pub mistral: MistralConfig,
}

fn default_provider_type() -> String {
    "gigachat".to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider_type: default_provider_type(),
            gigachat: GigachatConfig::default(),
            mistral: MistralConfig::default(),
        }
    }
}

/// GigaChat provider configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct GigachatConfig {
    /// Model to use
    #[serde(default)]
    pub model: GigachatModel,

    /// API scope the credential was issued for
    #[serde(default)]
    pub scope: GigachatScope,

    /// OAuth token endpoint
    #[serde(default = "default_gigachat_auth_url")]
    pub auth_url: String,

    /// Base URL for `/chat/completions`
    #[serde(default = "default_gigachat_api_base")]
    pub api_base: String,

    /// Verify the provider's TLS certificates
    #[serde(default = "default_verify_tls")]
    pub verify_tls: bool,

    /// Extra PEM root certificate to trust
    #[serde(default)]
    pub ca_cert_path: Option<PathBuf>,

    /// Pre-encoded Basic authorization key
    #[serde(default, skip_serializing)]
    pub credentials: Option<String>,

    /// Client id, combined with `client_secret` when `credentials` is unset
    #[serde(default, skip_serializing)]
    pub client_id: Option<String>,

    /// Client secret, combined with `client_id` when `credentials` is unset
    #[serde(default, skip_serializing)]
    pub client_secret: Option<String>,
}

fn default_gigachat_auth_url() -> String {
    "https://ngw.devices.sberbank.ru:9443/api/v2/oauth".to_string()
}

fn default_gigachat_api_base() -> String {
    "https://gigachat.devices.sberbank.ru/api/v1".to_string()
}

fn default_verify_tls() -> bool {
    true
}

impl Default for GigachatConfig {
    fn default() -> Self {
        Self {
            model: GigachatModel::default(),
            scope: GigachatScope::default(),
            auth_url: default_gigachat_auth_url(),
            api_base: default_gigachat_api_base(),
            verify_tls: default_verify_tls(),
            ca_cert_path: None,
            credentials: None,
            client_id: None,
            client_secret: None,
        }
    }
}

impl std::fmt::Debug for GigachatConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GigachatConfig")
            .field("model", &self.model)
            .field("scope", &self.scope)
            .field("auth_url", &self.auth_url)
            .field("api_base", &self.api_base)
            .field("verify_tls", &self.verify_tls)
            .field("ca_cert_path", &self.ca_cert_path)
            .field("credentials", &self.credentials.as_ref().map(|_| "[REDACTED]"))
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl GigachatConfig {
    /// Resolve the secret sent as `Authorization: Basic <secret>`
    ///
    /// Uses `credentials` verbatim when set, otherwise base64-encodes
    /// `client_id:client_secret`.
    ///
    /// # Errors
    ///
    /// Returns `MissingCredentials` when neither form is configured
    ///
    /// # Examples
    ///
    /// ```
    /// use chatbatch::config::GigachatConfig;
    ///
    /// let config = GigachatConfig {
    ///     client_id: Some("id".to_string()),
    ///     client_secret: Some("secret".to_string()),
    ///     ..Default::default()
    /// };
    /// assert_eq!(config.authorization_key().unwrap(), "aWQ6c2VjcmV0");
    /// ```
    pub fn authorization_key(&self) -> Result<String> {
        if let Some(credentials) = self.credentials.as_deref().filter(|c| !c.is_empty()) {
            return Ok(credentials.to_string());
        }

        match (self.client_id.as_deref(), self.client_secret.as_deref()) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => {
                Ok(BASE64.encode(format!("{}:{}", id, secret)))
            }
            _ => Err(ChatbatchError::MissingCredentials(
                "gigachat (set GIGACHAT_API_TOKEN or GIGACHAT_API_CLIENT_ID and GIGACHAT_API_CLIENT_SECRET)"
                    .to_string(),
            )
            .into()),
        }
    }
}

/// Mistral provider configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct MistralConfig {
    /// Model to use
    #[serde(default)]
    pub model: MistralModel,

    /// Base URL for `/chat/completions`
    #[serde(default = "default_mistral_api_base")]
    pub api_base: String,

    /// Verify the provider's TLS certificates
    #[serde(default = "default_verify_tls")]
    pub verify_tls: bool,

    /// Retry behaviour on HTTP 429
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Long-lived API key
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
}

fn default_mistral_api_base() -> String {
    "https://api.mistral.ai/v1".to_string()
}

impl Default for MistralConfig {
    fn default() -> Self {
        Self {
            model: MistralModel::default(),
            api_base: default_mistral_api_base(),
            verify_tls: default_verify_tls(),
            rate_limit: RateLimitConfig::default(),
            api_key: None,
        }
    }
}

impl std::fmt::Debug for MistralConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MistralConfig")
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .field("verify_tls", &self.verify_tls)
            .field("rate_limit", &self.rate_limit)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl MistralConfig {
    /// The configured API key
    ///
    /// # Errors
    ///
    /// Returns `MissingCredentials` when no key is set
    pub fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                ChatbatchError::MissingCredentials("mistral (set MISTRAL_API_KEY)".to_string())
                    .into()
            })
    }
}

/// Bounded retry on rate limiting
///
/// The delay before retry `n` (starting at 0) is
/// `backoff_ms * multiplier^n`; a multiplier of 1.0 gives a fixed backoff.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RateLimitConfig {
    /// Total requests per `ask`, first attempt included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry, in milliseconds
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    /// Growth factor applied to each subsequent delay
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_backoff_ms() -> u64 {
    3000
}

fn default_multiplier() -> f64 {
    1.0
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
            multiplier: default_multiplier(),
        }
    }
}

impl RateLimitConfig {
    /// Delay before retry number `retry` (0-based)
    ///
    /// # Examples
    ///
    /// ```
    /// use chatbatch::config::RateLimitConfig;
    /// use std::time::Duration;
    ///
    /// let policy = RateLimitConfig { max_attempts: 4, backoff_ms: 100, multiplier: 2.0 };
    /// assert_eq!(policy.delay_for(0), Duration::from_millis(100));
    /// assert_eq!(policy.delay_for(2), Duration::from_millis(400));
    /// ```
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = self.multiplier.powi(retry as i32);
        Duration::from_millis((self.backoff_ms as f64 * factor).round() as u64)
    }
}

/// Settings shared by every session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Instruction text seeded as the first message
    #[serde(default)]
    pub system_prompt: Option<String>,

    /// Per-request timeout, also used as the token-expiry lookahead
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_timeout() -> u64 {
    60
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            system_prompt: None,
            timeout_seconds: default_timeout(),
        }
    }
}

impl SessionConfig {
    /// Request timeout as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Batch driver settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Input row field holding the text to send
    #[serde(default = "default_input_field")]
    pub input_field: String,

    /// Input row field copied to the output row
    #[serde(default = "default_id_field")]
    pub id_field: String,

    /// Output row field receiving the answer
    #[serde(default = "default_output_field")]
    pub output_field: String,

    /// Written in place of an answer when the exchange fails
    #[serde(default)]
    pub failure_placeholder: String,
}

fn default_input_field() -> String {
    "student_solution".to_string()
}

fn default_id_field() -> String {
    "solution_id".to_string()
}

fn default_output_field() -> String {
    "author_comment".to_string()
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            input_field: default_input_field(),
            id_field: default_id_field(),
            output_field: default_output_field(),
            failure_placeholder: String::new(),
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Returns
    ///
    /// Returns the loaded and merged configuration
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default_config()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn default_config() -> Self {
        Self {
            provider: ProviderConfig::default(),
            session: SessionConfig::default(),
            batch: BatchConfig::default(),
        }
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ChatbatchError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| ChatbatchError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        // Credentials
        if let Ok(token) = std::env::var("GIGACHAT_API_TOKEN") {
            self.provider.gigachat.credentials = Some(token);
        }

        if let Ok(client_id) = std::env::var("GIGACHAT_API_CLIENT_ID") {
            self.provider.gigachat.client_id = Some(client_id);
        }

        if let Ok(client_secret) = std::env::var("GIGACHAT_API_CLIENT_SECRET") {
            self.provider.gigachat.client_secret = Some(client_secret);
        }

        if let Ok(api_key) = std::env::var("MISTRAL_API_KEY") {
            self.provider.mistral.api_key = Some(api_key);
        }

        // Provider overrides
        if let Ok(provider_type) = std::env::var("CHATBATCH_PROVIDER") {
            self.provider.provider_type = provider_type;
        }

        if let Ok(model) = std::env::var("CHATBATCH_GIGACHAT_MODEL") {
            match model.parse() {
                Ok(value) => self.provider.gigachat.model = value,
                Err(_) => tracing::warn!("Invalid CHATBATCH_GIGACHAT_MODEL: {}", model),
            }
        }

        if let Ok(model) = std::env::var("CHATBATCH_MISTRAL_MODEL") {
            match model.parse() {
                Ok(value) => self.provider.mistral.model = value,
                Err(_) => tracing::warn!("Invalid CHATBATCH_MISTRAL_MODEL: {}", model),
            }
        }

        if let Ok(verify) = std::env::var("CHATBATCH_VERIFY_TLS") {
            match verify.parse::<bool>() {
                Ok(v) => {
                    self.provider.gigachat.verify_tls = v;
                    self.provider.mistral.verify_tls = v;
                    tracing::debug!(verify_tls = v, "Env override: CHATBATCH_VERIFY_TLS");
                }
                Err(_) => tracing::warn!("Invalid CHATBATCH_VERIFY_TLS: {}", verify),
            }
        }

        // Session overrides
        if let Ok(timeout) = std::env::var("CHATBATCH_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.session.timeout_seconds = value;
            } else {
                tracing::warn!("Invalid CHATBATCH_TIMEOUT_SECONDS: {}", timeout);
            }
        }

        if let Ok(prompt) = std::env::var("CHATBATCH_SYSTEM_PROMPT") {
            self.session.system_prompt = Some(prompt);
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if cli.verbose {
            tracing::debug!("Verbose mode enabled");
        }

        if let Some(timeout) = cli.timeout {
            self.session.timeout_seconds = timeout;
        }
    }

    /// Validate the configuration
    ///
    /// Ensures all configuration values are within acceptable ranges
    /// and that required fields are properly set. Credentials are checked
    /// later, when a session is built.
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if self.provider.provider_type.is_empty() {
            return Err(ChatbatchError::Config("Provider type cannot be empty".to_string()).into());
        }

        if !VALID_PROVIDERS.contains(&self.provider.provider_type.as_str()) {
            return Err(ChatbatchError::Config(format!(
                "Invalid provider type: {}. Must be one of: {}",
                self.provider.provider_type,
                VALID_PROVIDERS.join(", ")
            ))
            .into());
        }

        if self.session.timeout_seconds == 0 {
            return Err(ChatbatchError::Config(
                "session.timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        for (name, value) in [
            ("provider.gigachat.auth_url", &self.provider.gigachat.auth_url),
            ("provider.gigachat.api_base", &self.provider.gigachat.api_base),
            ("provider.mistral.api_base", &self.provider.mistral.api_base),
        ] {
            url::Url::parse(value).map_err(|e| {
                ChatbatchError::Config(format!("{} is not a valid URL ({}): {}", name, value, e))
            })?;
        }

        let rate_limit = &self.provider.mistral.rate_limit;
        if rate_limit.max_attempts == 0 {
            return Err(ChatbatchError::Config(
                "rate_limit.max_attempts must be greater than 0".to_string(),
            )
            .into());
        }

        if !rate_limit.multiplier.is_finite() || rate_limit.multiplier < 1.0 {
            return Err(ChatbatchError::Config(
                "rate_limit.multiplier must be a finite number >= 1.0".to_string(),
            )
            .into());
        }

        for (name, value) in [
            ("batch.input_field", &self.batch.input_field),
            ("batch.id_field", &self.batch.id_field),
            ("batch.output_field", &self.batch.output_field),
        ] {
            if value.trim().is_empty() {
                return Err(ChatbatchError::Config(format!("{} cannot be empty", name)).into());
            }
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}
