//! Application configuration management.
//!
//! Configuration is loaded from an optional YAML file with environment variable overrides. The
//! configuration file path defaults to `sortd.yaml` but can be specified via `-f` flag or the
//! `SORTD_CONFIG` environment variable. A missing file is not an error: every field has a default
//! except the Gemini API key.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **Defaults** - see the `Default` implementations below
//! 2. **YAML config file** - default: `sortd.yaml`
//! 3. **Environment variables** - variables prefixed with `SORTD_` override YAML values
//! 4. **GEMINI_API_KEY** - special case: overrides `gemini.api_key` if set
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `SORTD_GEMINI__MODEL=gemini-1.5-flash` sets the `gemini.model` field.
//!
//! A `.env` file in the working directory is read by the binary before any of this happens, so
//! `GEMINI_API_KEY` can live there during development.
//!
//! ## Environment Variable Examples
//!
//! ```bash
//! # The credential (required)
//! GEMINI_API_KEY=...
//!
//! # Override server port
//! SORTD_PORT=8080
//!
//! # Bound the outbound call more tightly
//! SORTD_GEMINI__REQUEST_TIMEOUT=20s
//!
//! # Canonicalise labels before returning them
//! SORTD_CLASSIFY__LABEL_POLICY=normalize
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf, time::Duration};
use url::Url;

use crate::classifier::LabelPolicy;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "SORTD_CONFIG", default_value = "sortd.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// Loaded once at startup and never mutated afterwards; handlers see it through
/// [`crate::AppState`].
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Enable OpenTelemetry OTLP export for distributed tracing
    pub enable_otel_export: bool,
    /// Remote classification provider settings
    pub gemini: GeminiConfig,
    /// Upload limits and label handling for `/classify`
    pub classify: ClassifyConfig,
    /// Where uploads are staged while the remote call runs
    pub scratch: ScratchConfig,
    /// CORS settings applied to every route
    pub cors: CorsConfig,
}

/// Settings for the Gemini API client.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeminiConfig {
    /// API key sent in the `x-goog-api-key` header. Required.
    pub api_key: Option<String>,
    /// Base URL of the Generative Language API
    pub base_url: Url,
    /// Model used for `generateContent`
    pub model: String,
    /// Deadline for the whole classification (upload + generation)
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Delete the uploaded file from the provider once the answer is in
    pub delete_uploaded_files: bool,
}

// Hand-written so the key never ends up in logs via `{:?}`.
impl fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url.as_str())
            .field("model", &self.model)
            .field("request_timeout", &self.request_timeout)
            .field("delete_uploaded_files", &self.delete_uploaded_files)
            .finish()
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: Url::parse("https://generativelanguage.googleapis.com").expect("static URL is valid"),
            model: "gemini-1.5-pro-002".to_string(),
            request_timeout: Duration::from_secs(60),
            delete_uploaded_files: false,
        }
    }
}

impl GeminiConfig {
    /// The configured API key, if it is present and not blank.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().map(str::trim).filter(|key| !key.is_empty())
    }
}

/// `/classify` request handling.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClassifyConfig {
    /// Largest accepted request body, in bytes
    pub max_upload_bytes: usize,
    /// What to do with the model's answer before returning it
    pub label_policy: LabelPolicy,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: 10 * 1024 * 1024,
            label_policy: LabelPolicy::default(),
        }
    }
}

/// Scratch storage for uploads in flight.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScratchConfig {
    /// Directory for scratch files, created on startup if missing
    pub dir: PathBuf,
}

impl Default for ScratchConfig {
    fn default() -> Self {
        Self {
            dir: std::env::temp_dir().join("sortd"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    pub allowed_origins: Vec<CorsOrigin>,
    /// Preflight cache duration in seconds
    pub max_age: Option<u64>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![CorsOrigin::Wildcard],
            max_age: None,
        }
    }
}

/// CORS origin specification.
///
/// Can be either a wildcard (`*`) to allow all origins, or a specific URL.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CorsOrigin {
    /// Allow all origins (`*`)
    #[serde(deserialize_with = "parse_wildcard", serialize_with = "serialize_wildcard")]
    Wildcard,
    /// Specific origin URL (e.g., `https://app.example.com`)
    #[serde(deserialize_with = "parse_url")]
    Url(Url),
}

fn parse_wildcard<'de, D>(deserializer: D) -> Result<(), D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    if s == "*" {
        Ok(())
    } else {
        Err(serde::de::Error::custom("Expected '*'"))
    }
}

fn serialize_wildcard<S>(serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str("*")
}

fn parse_url<'de, D>(deserializer: D) -> Result<Url, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Url::parse(&s).map_err(serde::de::Error::custom)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            enable_otel_export: false,
            gemini: GeminiConfig::default(),
            classify: ClassifyConfig::default(),
            scratch: ScratchConfig::default(),
            cors: CorsConfig::default(),
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(figment::Error::from)?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), String> {
        if self.gemini.api_key().is_none() {
            return Err("Config validation: GEMINI_API_KEY is not set. \
                 Set it in the environment, in a .env file, or as gemini.api_key in the config file."
                .to_string());
        }

        if self.gemini.request_timeout.is_zero() {
            return Err("Config validation: gemini.request_timeout must be greater than zero".to_string());
        }

        if self.gemini.model.trim().is_empty() {
            return Err("Config validation: gemini.model cannot be empty".to_string());
        }

        if self.classify.max_upload_bytes == 0 {
            return Err("Config validation: classify.max_upload_bytes must be greater than zero".to_string());
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // SORTD_CONFIG names the file itself, it is not a config key
            .merge(Env::prefixed("SORTD_").ignore(&["config"]).split("__"))
            .merge(Env::raw().only(&["GEMINI_API_KEY"]).map(|_| "gemini.api_key".into()))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Log how the `.env` file was handled. The file is optional, so a failure is informational.
pub fn log_dotenv_outcome(outcome: &Result<PathBuf, dotenv::Error>) {
    match outcome {
        Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env file"),
        Err(e) => tracing::info!("No .env file loaded: {e}"),
    }
}
