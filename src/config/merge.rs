//! Merging YAML overrides onto the environment-derived configuration.

use std::path::PathBuf;

use super::yaml::YamlConfig;
use super::{CookieSameSite, ServerConfig, TlsConfig, env};

/// Load the environment configuration and apply any values set in `yaml`.
pub(super) fn merge_config(
    yaml: Option<YamlConfig>,
) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let mut config = env::load_from_env()?;
    let Some(yaml) = yaml else {
        return Ok(config);
    };

    if let Some(server) = yaml.server {
        if let Some(host) = server.host {
            config.host = host;
        }
        if let Some(port) = server.port {
            config.port = port;
        }
        if let Some(tls) = server.tls {
            match (tls.cert_path, tls.key_path) {
                (Some(cert), Some(key)) => {
                    config.tls = Some(TlsConfig {
                        cert_path: PathBuf::from(cert),
                        key_path: PathBuf::from(key),
                    });
                }
                (None, None) => {}
                _ => return Err("server.tls requires both cert_path and key_path".into()),
            }
        }
    }

    if let Some(openai) = yaml.openai {
        if let Some(key) = openai.api_key {
            config.openai_api_key = Some(key);
        }
        if let Some(url) = openai.realtime_url {
            config.realtime_url = url;
        }
    }

    if let Some(realtime) = yaml.realtime {
        if let Some(model) = realtime.model {
            config.default_model = model;
        }
        if let Some(voice) = realtime.voice {
            config.default_voice = voice;
        }
        if let Some(instructions) = realtime.instructions {
            config.instructions = instructions;
        }
        if let Some(model) = realtime.transcription_model {
            config.transcription_model = model;
        }
        if let Some(format) = realtime.audio_format {
            config.audio_format = format;
        }
    }

    if let Some(usage) = yaml.usage {
        if let Some(seconds) = usage.max_audio_length_seconds {
            config.max_audio_length_seconds = seconds;
        }
    }

    if let Some(security) = yaml.security {
        if let Some(origins) = security.cors_allowed_origins {
            config.cors_allowed_origins = Some(origins);
        }
        if let Some(secure) = security.cookie_secure {
            config.cookie_secure = secure;
        }
        if let Some(same_site) = security.cookie_same_site {
            config.cookie_same_site = CookieSameSite::parse(&same_site)?;
        }
        if let Some(rps) = security.rate_limit_requests_per_second {
            config.rate_limit_requests_per_second = rps;
        }
        if let Some(burst) = security.rate_limit_burst_size {
            config.rate_limit_burst_size = burst;
        }
    }

    Ok(config)
}
