use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use std::fmt;

use crate::constants::{DEFAULT_TIMEZONE, DEFAULT_WINDOW_SIZE};
use crate::summary::{parse_timezone, WindowSize};

#[derive(Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub log_format: String,
    pub enable_file_logs: bool,
    pub log_dir: String,
    pub sled_path: String,
    pub jwt_secret: String,
    pub jwt_expires_in_hours: u64,
    pub cors_origin: String,
    pub trust_proxy: bool,
    pub rate_limit: RateLimitConfig,
    pub summary: SummaryDefaults,
}

#[derive(Debug, Clone)]
/// Token-bucket budgets per route class, each `max` requests per
/// `window_secs`. A budget of 0 turns limiting off for that class.
pub struct RateLimitConfig {
    pub window_secs: u64,
    pub auth_max: u32,
    pub ingest_max: u32,
    pub summary_max: u32,
    pub read_max: u32,
}

/// Values applied when an ingestion or summary request omits a parameter.
/// Handlers pass these explicitly into the summary pipeline.
#[derive(Debug, Clone)]
pub struct SummaryDefaults {
    pub timezone_name: String,
    pub window_size: WindowSize,
}

impl Default for SummaryDefaults {
    fn default() -> Self {
        Self {
            timezone_name: DEFAULT_TIMEZONE.to_string(),
            window_size: WindowSize::DEFAULT,
        }
    }
}

impl SummaryDefaults {
    /// Unknown zones and out-of-range windows fall back to the built-in
    /// defaults so a bad deployment setting never reaches clients as a 400.
    fn from_env() -> Self {
        let fallback = Self::default();

        let timezone_name = env_or("DEFAULT_TIMEZONE", DEFAULT_TIMEZONE);
        let timezone_name = match parse_timezone(timezone_name.trim()) {
            Ok(_) => timezone_name.trim().to_string(),
            Err(_) => {
                tracing::warn!(
                    key = "DEFAULT_TIMEZONE",
                    value = %timezone_name,
                    "Unknown IANA zone, using default"
                );
                fallback.timezone_name
            }
        };

        let raw_window = env_or_parse("DEFAULT_WINDOW_SIZE", i64::from(DEFAULT_WINDOW_SIZE));
        let window_size = WindowSize::new(raw_window).unwrap_or_else(|_| {
            tracing::warn!(
                key = "DEFAULT_WINDOW_SIZE",
                value = raw_window,
                "Window size out of range, using default"
            );
            fallback.window_size
        });

        Self {
            timezone_name,
            window_size,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("log_level", &self.log_level)
            .field("log_format", &self.log_format)
            .field("enable_file_logs", &self.enable_file_logs)
            .field("log_dir", &self.log_dir)
            .field("sled_path", &self.sled_path)
            .field("jwt_secret", &"***REDACTED***")
            .field("jwt_expires_in_hours", &self.jwt_expires_in_hours)
            .field("cors_origin", &self.cors_origin)
            .field("trust_proxy", &self.trust_proxy)
            .field("rate_limit", &self.rate_limit)
            .field("summary", &self.summary)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            host: env_or_parse("HOST", IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))),
            port: env_or_parse("PORT", 3000_u16),
            log_level: env_or("RUST_LOG", "info"),
            log_format: env_or("LOG_FORMAT", "text"),
            enable_file_logs: env_or_bool("ENABLE_FILE_LOGS", false),
            log_dir: env_or("LOG_DIR", "./logs"),
            sled_path: env_or("SLED_PATH", "./data/study-summary.sled"),
            jwt_secret: env_or(
                "JWT_SECRET",
                "change_me_to_random_64_chars_change_me_to_random_64_chars",
            ),
            jwt_expires_in_hours: env_or_parse("JWT_EXPIRES_IN_HOURS", 24_u64),
            cors_origin: env_or("CORS_ORIGIN", "http://localhost:5173"),
            trust_proxy: env_or_bool("TRUST_PROXY", false),
            rate_limit: RateLimitConfig {
                window_secs: env_or_parse("RATE_LIMIT_WINDOW_SECS", 60_u64),
                auth_max: env_or_parse("RATE_LIMIT_AUTH_MAX", 10_u32),
                ingest_max: env_or_parse("RATE_LIMIT_INGEST_MAX", 600_u32),
                summary_max: env_or_parse("RATE_LIMIT_SUMMARY_MAX", 30_u32),
                read_max: env_or_parse("RATE_LIMIT_MAX", 300_u32),
            },
            summary: SummaryDefaults::from_env(),
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
        Ok(raw) => match raw.parse::<T>() {
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
