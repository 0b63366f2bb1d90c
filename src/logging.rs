use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

use crate::config::Config;

const LOG_FILE_PREFIX: &str = "study-summary";
const MAX_LOG_FILES: usize = 30;

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub log_level: String,
    pub json_stdout: bool,
    pub enable_file_logs: bool,
    pub log_dir: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_stdout: false,
            enable_file_logs: false,
            log_dir: "./logs".to_string(),
        }
    }
}

impl From<&Config> for LogConfig {
    fn from(config: &Config) -> Self {
        Self {
            log_level: config.log_level.clone(),
            json_stdout: config.log_format.eq_ignore_ascii_case("json"),
            enable_file_logs: config.enable_file_logs,
            log_dir: config.log_dir.clone(),
        }
    }
}

/// `RUST_LOG` wins over the configured level so operators can raise
/// verbosity for a single module without touching the config.
fn build_env_filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
}

pub fn init_tracing(config: &LogConfig) {
    let stdout_layer = if config.json_stdout {
        fmt::layer().with_target(true).json().boxed()
    } else {
        fmt::layer().with_target(true).with_thread_ids(false).boxed()
    };

    let registry = Registry::default()
        .with(build_env_filter(config))
        .with(stdout_layer);

    let result = if config.enable_file_logs {
        let file_appender = match RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix(LOG_FILE_PREFIX)
            .filename_suffix("log")
            .max_log_files(MAX_LOG_FILES)
            .build(&config.log_dir)
        {
            Ok(appender) => appender,
            Err(e) => panic!("Failed to create rolling file appender in {}: {e}", config.log_dir),
        };
        let file_layer = fmt::layer()
            .with_writer(file_appender)
            .with_ansi(false)
            .json();
        registry.with(file_layer).try_init()
    } else {
        registry.try_init()
    };

    // try_init 在全局 subscriber 已设置时返回错误，属于正常情况（如测试环境）
    if let Err(e) = result {
        let msg = e.to_string();
        if !msg.contains("already been set") {
            panic!("Failed to initialize tracing: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        let cfg = LogConfig::default();
        init_tracing(&cfg);
        init_tracing(&cfg);
    }

    #[test]
    fn json_format_is_case_insensitive() {
        let mut config = Config::from_env();
        config.log_format = "JSON".to_string();
        assert!(LogConfig::from(&config).json_stdout);

        config.log_format = "text".to_string();
        assert!(!LogConfig::from(&config).json_stdout);
    }
}
