//! Configuration validation.

use super::{ServerConfig, TlsConfig};

pub(super) fn validate_tls(tls: &Option<TlsConfig>) -> Result<(), String> {
    let Some(tls) = tls else {
        return Ok(());
    };
    if !tls.cert_path.exists() {
        return Err(format!(
            "TLS certificate not found: {}",
            tls.cert_path.display()
        ));
    }
    if !tls.key_path.exists() {
        return Err(format!("TLS key not found: {}", tls.key_path.display()));
    }
    Ok(())
}

pub(super) fn validate_realtime_url(url: &str) -> Result<(), String> {
    let parsed = url::Url::parse(url).map_err(|e| format!("Invalid realtime URL {url}: {e}"))?;
    match parsed.scheme() {
        "ws" | "wss" => Ok(()),
        other => Err(format!(
            "Realtime URL must use ws:// or wss://, got {other}://"
        )),
    }
}

pub(super) fn validate_rate_limits(config: &ServerConfig) -> Result<(), String> {
    if config.rate_limit_requests_per_second == 0 {
        return Err("Rate limit requests per second must be greater than 0".to_string());
    }
    if config.rate_limit_burst_size == 0 {
        return Err("Rate limit burst size must be greater than 0".to_string());
    }
    Ok(())
}

pub(super) fn validate(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    validate_tls(&config.tls)?;
    validate_realtime_url(&config.realtime_url)?;
    validate_rate_limits(config)?;
    Ok(())
}
