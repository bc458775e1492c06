use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use crate::detection::config::{
    DEFAULT_CLOSURE_THRESHOLD, DEFAULT_DWELL_MS, DEFAULT_POLL_INTERVAL_MS,
};
use crate::detection::{DetectionConfig, FacePolicy};

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub enable_file_logs: bool,
    pub log_dir: String,
    pub cors_origin: String,
    pub detection: DetectionConfig,
    pub limits: LimitsConfig,
    pub replay_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LimitsConfig {
    pub max_sse_connections: usize,
    pub event_buffer: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_sse_connections: 32,
            event_buffer: 256,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let limits_default = LimitsConfig::default();
        Self {
            host: env_or_parse("HOST", IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))),
            port: env_or_parse("PORT", 3000_u16),
            log_level: env_or("RUST_LOG", "info"),
            enable_file_logs: env_or_bool("ENABLE_FILE_LOGS", false),
            log_dir: env_or("LOG_DIR", "./logs"),
            cors_origin: env_or("CORS_ORIGIN", "http://localhost:5173"),
            detection: DetectionConfig {
                closure_threshold: env_or_parse(
                    "DETECTION_CLOSURE_THRESHOLD",
                    DEFAULT_CLOSURE_THRESHOLD,
                ),
                dwell_ms: env_or_parse("DETECTION_DWELL_MS", DEFAULT_DWELL_MS),
                poll_interval_ms: env_or_parse(
                    "DETECTION_POLL_INTERVAL_MS",
                    DEFAULT_POLL_INTERVAL_MS,
                ),
                face_policy: env_or_parse("MULTI_FACE_POLICY", FacePolicy::default()),
            }
            .sanitized(),
            limits: LimitsConfig {
                max_sse_connections: env_or_parse(
                    "MAX_SSE_CONNECTIONS",
                    limits_default.max_sse_connections,
                ),
                event_buffer: env_or_parse("SESSION_EVENT_BUFFER", limits_default.event_buffer),
            },
            replay_path: env::var("REPLAY_PATH")
                .ok()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty()),
        }
    }
}

pub fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

pub fn env_or_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    match env::var(key) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(
                    key,
                    value = %raw,
                    "Failed to parse env var, using default"
                );
                default
            }
        },
        Err(_) => default,
    }
}

pub fn env_or_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}
