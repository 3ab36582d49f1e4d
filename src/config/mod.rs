//! Configuration module for the tutor relay server
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use tutor_relay::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::PathBuf;

use crate::core::realtime::{RealtimeConfig, TurnDetectionConfig};

mod env;
mod merge;
mod validation;
mod yaml;

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_MODEL: &str = "gpt-4o-realtime-preview";
pub const DEFAULT_VOICE: &str = "shimmer";
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-1";
pub const DEFAULT_MAX_AUDIO_LENGTH_SECONDS: u64 = 30;
pub const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000,http://127.0.0.1:3000";

/// System prompt given to the upstream assistant.
pub const DEFAULT_INSTRUCTIONS: &str = "You are a friendly and encouraging English tutor. \
Speak naturally with varying intonation, pace, and emotional expression, just like a real \
human conversation. Use pauses, emphasis, and conversational tone. Be warm and supportive. \
Keep responses brief and helpful. Don't sound robotic or monotonous. IMPORTANT: If you're \
unsure about what the user said, ask them to repeat or clarify. Don't guess; ask for \
clarification when something seems unclear or ambiguous.";

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// `SameSite` attribute of the client identity cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CookieSameSite {
    #[default]
    Lax,
    Strict,
    None,
}

impl CookieSameSite {
    pub fn parse(value: &str) -> Result<Self, String> {
        match value.trim().to_ascii_lowercase().as_str() {
            "lax" => Ok(Self::Lax),
            "strict" => Ok(Self::Strict),
            "none" => Ok(Self::None),
            other => Err(format!("Invalid cookie SameSite value: {other}")),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lax => "Lax",
            Self::Strict => "Strict",
            Self::None => "None",
        }
    }
}

impl fmt::Display for CookieSameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Server configuration
///
/// Contains:
/// - Listener settings (host, port, optional TLS)
/// - Upstream credentials and endpoint
/// - Session defaults (model, voice, instructions, transcription)
/// - The per-client audio quota
/// - Security settings (CORS, identity cookie, rate limiting)
#[derive(Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,
    pub tls: Option<TlsConfig>,

    // Upstream settings
    pub openai_api_key: Option<String>,
    pub realtime_url: String,

    // Session defaults
    pub default_model: String,
    pub default_voice: String,
    pub instructions: String,
    pub transcription_model: String,
    /// Audio format for both directions: "pcm16", "g711_ulaw" or "g711_alaw"
    pub audio_format: String,

    // Usage
    /// Synthesized audio each client may receive, in seconds
    /// Default: 30
    pub max_audio_length_seconds: u64,

    // Security configuration
    /// CORS allowed origins (comma-separated list or "*" for all)
    pub cors_allowed_origins: Option<String>,
    pub cookie_secure: bool,
    pub cookie_same_site: CookieSameSite,
    /// Maximum requests per second per IP address
    /// Default: 60
    pub rate_limit_requests_per_second: u32,
    /// Default: 10
    pub rate_limit_burst_size: u32,
}

/// Zeroize the upstream API key when the configuration is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.openai_api_key {
            key.zeroize();
        }
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tls", &self.tls)
            .field(
                "openai_api_key",
                &self.openai_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("realtime_url", &self.realtime_url)
            .field("default_model", &self.default_model)
            .field("default_voice", &self.default_voice)
            .field("transcription_model", &self.transcription_model)
            .field("audio_format", &self.audio_format)
            .field("max_audio_length_seconds", &self.max_audio_length_seconds)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("cookie_secure", &self.cookie_secure)
            .field("cookie_same_site", &self.cookie_same_site)
            .finish_non_exhaustive()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables (and defaults).
    ///
    /// The `.env` file, if any, is loaded in `main` before this is called.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = merge::merge_config(None)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if the YAML file cannot be read or is malformed, if an
    /// environment variable has an invalid format, or if validation fails.
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Get the server address as "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Per-client quota in milliseconds.
    pub fn quota_ms(&self) -> u64 {
        self.max_audio_length_seconds.saturating_mul(1000)
    }

    /// Upstream configuration shared by every session.
    ///
    /// A missing API key yields an empty key, so session creation fails with
    /// a connect error instead of the server refusing to start.
    pub fn realtime_config(&self) -> RealtimeConfig {
        RealtimeConfig {
            api_key: self.openai_api_key.clone().unwrap_or_default(),
            url: self.realtime_url.clone(),
            instructions: self.instructions.clone(),
            transcription_model: self.transcription_model.clone(),
            output_audio_format: self.audio_format.clone(),
            turn_detection: TurnDetectionConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use std::fs;
    use tempfile::TempDir;

    const ENV_VARS: &[&str] = &[
        "HOST",
        "PORT",
        "TLS_CERT_PATH",
        "TLS_KEY_PATH",
        "OPENAI_API_KEY",
        "OPENAI_REALTIME_URL",
        "REALTIME_MODEL",
        "REALTIME_VOICE",
        "REALTIME_INSTRUCTIONS",
        "REALTIME_TRANSCRIPTION_MODEL",
        "REALTIME_AUDIO_FORMAT",
        "MAX_AUDIO_LENGTH_SECONDS",
        "CORS_ALLOWED_ORIGINS",
        "COOKIE_SECURE",
        "COOKIE_SAMESITE",
        "RATE_LIMIT_RPS",
        "RATE_LIMIT_BURST",
    ];

    // Helper to clean up environment variables
    fn cleanup_env_vars() {
        unsafe {
            for name in ENV_VARS {
                env::remove_var(name);
            }
        }
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        cleanup_env_vars();

        let config = ServerConfig::from_env().unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8000);
        assert!(config.tls.is_none());
        assert!(config.openai_api_key.is_none());
        assert_eq!(config.realtime_url, "wss://api.openai.com/v1/realtime");
        assert_eq!(config.default_model, "gpt-4o-realtime-preview");
        assert_eq!(config.default_voice, "shimmer");
        assert_eq!(config.transcription_model, "whisper-1");
        assert_eq!(config.max_audio_length_seconds, 30);
        assert_eq!(config.quota_ms(), 30_000);
        assert_eq!(
            config.cors_allowed_origins.as_deref(),
            Some("http://localhost:3000,http://127.0.0.1:3000")
        );
        assert!(!config.cookie_secure);
        assert_eq!(config.cookie_same_site, CookieSameSite::Lax);
        assert_eq!(config.address(), "0.0.0.0:8000");
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        cleanup_env_vars();
        unsafe {
            env::set_var("PORT", "9001");
            env::set_var("OPENAI_API_KEY", "sk-env");
            env::set_var("MAX_AUDIO_LENGTH_SECONDS", "90");
            env::set_var("COOKIE_SECURE", "true");
            env::set_var("COOKIE_SAMESITE", "none");
            env::set_var("REALTIME_VOICE", "coral");
        }

        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.port, 9001);
        assert_eq!(config.openai_api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.quota_ms(), 90_000);
        assert!(config.cookie_secure);
        assert_eq!(config.cookie_same_site, CookieSameSite::None);
        assert_eq!(config.default_voice, "coral");

        let realtime = config.realtime_config();
        assert_eq!(realtime.api_key, "sk-env");
        assert_eq!(realtime.output_audio_format, "pcm16");

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_invalid_port() {
        cleanup_env_vars();
        unsafe {
            env::set_var("PORT", "not-a-port");
        }

        let result = ServerConfig::from_env();
        assert!(result.unwrap_err().to_string().contains("PORT"));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_half_tls_rejected() {
        cleanup_env_vars();
        unsafe {
            env::set_var("TLS_CERT_PATH", "/tmp/cert.pem");
        }

        assert!(ServerConfig::from_env().is_err());

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_yaml_overrides_env() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let yaml_content = r#"
server:
  host: "127.0.0.1"
  port: 8080

openai:
  api_key: "sk-yaml"

usage:
  max_audio_length_seconds: 45

security:
  cookie_same_site: "strict"
"#;

        fs::write(&config_path, yaml_content).unwrap();

        unsafe {
            env::set_var("HOST", "0.0.0.0");
            env::set_var("OPENAI_API_KEY", "sk-env");
            env::set_var("REALTIME_VOICE", "echo");
        }

        let config = ServerConfig::from_file(&config_path).unwrap();

        // YAML overrides ENV
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.openai_api_key.as_deref(), Some("sk-yaml"));
        assert_eq!(config.port, 8080);
        assert_eq!(config.quota_ms(), 45_000);
        assert_eq!(config.cookie_same_site, CookieSameSite::Strict);
        // ENV value survives where YAML is silent
        assert_eq!(config.default_voice, "echo");

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_missing_file() {
        cleanup_env_vars();

        let config_path = PathBuf::from("/nonexistent/config.yaml");
        let result = ServerConfig::from_file(&config_path);

        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to read config file")
        );
    }

    #[test]
    #[serial]
    fn test_from_file_rejects_non_websocket_url() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(
            &config_path,
            "openai:\n  realtime_url: \"https://api.openai.com/v1/realtime\"\n",
        )
        .unwrap();

        let result = ServerConfig::from_file(&config_path);
        assert!(result.unwrap_err().to_string().contains("ws://"));
    }

    #[test]
    fn test_cookie_same_site_parse() {
        assert_eq!(CookieSameSite::parse("LAX").unwrap(), CookieSameSite::Lax);
        assert_eq!(CookieSameSite::parse("none").unwrap().as_str(), "None");
        assert!(CookieSameSite::parse("sometimes").is_err());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let mut config = test_config();
        config.openai_api_key = Some("sk-secret".to_string());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("<redacted>"));
    }

    fn test_config() -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            tls: None,
            openai_api_key: None,
            realtime_url: "wss://api.openai.com/v1/realtime".to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            default_voice: DEFAULT_VOICE.to_string(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            transcription_model: DEFAULT_TRANSCRIPTION_MODEL.to_string(),
            audio_format: "pcm16".to_string(),
            max_audio_length_seconds: DEFAULT_MAX_AUDIO_LENGTH_SECONDS,
            cors_allowed_origins: None,
            cookie_secure: false,
            cookie_same_site: CookieSameSite::Lax,
            rate_limit_requests_per_second: 60,
            rate_limit_burst_size: 10,
        }
    }
}
