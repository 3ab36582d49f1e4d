//! Environment variable loading.

use std::env;
use std::path::PathBuf;

use super::{
    CookieSameSite, DEFAULT_CORS_ORIGINS, DEFAULT_INSTRUCTIONS, DEFAULT_MAX_AUDIO_LENGTH_SECONDS,
    DEFAULT_MODEL, DEFAULT_PORT, DEFAULT_TRANSCRIPTION_MODEL, DEFAULT_VOICE, ServerConfig,
    TlsConfig,
};
use crate::core::realtime::openai::OPENAI_REALTIME_URL;

fn var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Result<Option<T>, String>
where
    T::Err: std::fmt::Display,
{
    match var(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| format!("Invalid value for {name}: {e}")),
        None => Ok(None),
    }
}

fn parse_bool(name: &str) -> Result<Option<bool>, String> {
    match var(name) {
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            other => Err(format!("Invalid value for {name}: {other}")),
        },
        None => Ok(None),
    }
}

/// Build a configuration from environment variables, using defaults for
/// anything unset.
pub(super) fn load_from_env() -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let tls = match (var("TLS_CERT_PATH"), var("TLS_KEY_PATH")) {
        (Some(cert), Some(key)) => Some(TlsConfig {
            cert_path: PathBuf::from(cert),
            key_path: PathBuf::from(key),
        }),
        (None, None) => None,
        _ => return Err("TLS_CERT_PATH and TLS_KEY_PATH must be set together".into()),
    };

    let cookie_same_site = match var("COOKIE_SAMESITE") {
        Some(raw) => CookieSameSite::parse(&raw)?,
        None => CookieSameSite::default(),
    };

    Ok(ServerConfig {
        host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
        port: parse_var("PORT")?.unwrap_or(DEFAULT_PORT),
        tls,
        openai_api_key: var("OPENAI_API_KEY"),
        realtime_url: var("OPENAI_REALTIME_URL").unwrap_or_else(|| OPENAI_REALTIME_URL.to_string()),
        default_model: var("REALTIME_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        default_voice: var("REALTIME_VOICE").unwrap_or_else(|| DEFAULT_VOICE.to_string()),
        instructions: var("REALTIME_INSTRUCTIONS")
            .unwrap_or_else(|| DEFAULT_INSTRUCTIONS.to_string()),
        transcription_model: var("REALTIME_TRANSCRIPTION_MODEL")
            .unwrap_or_else(|| DEFAULT_TRANSCRIPTION_MODEL.to_string()),
        audio_format: var("REALTIME_AUDIO_FORMAT").unwrap_or_else(|| "pcm16".to_string()),
        max_audio_length_seconds: parse_var("MAX_AUDIO_LENGTH_SECONDS")?
            .unwrap_or(DEFAULT_MAX_AUDIO_LENGTH_SECONDS),
        cors_allowed_origins: Some(
            var("CORS_ALLOWED_ORIGINS").unwrap_or_else(|| DEFAULT_CORS_ORIGINS.to_string()),
        ),
        cookie_secure: parse_bool("COOKIE_SECURE")?.unwrap_or(false),
        cookie_same_site,
        rate_limit_requests_per_second: parse_var("RATE_LIMIT_RPS")?.unwrap_or(60),
        rate_limit_burst_size: parse_var("RATE_LIMIT_BURST")?.unwrap_or(10),
    })
}
