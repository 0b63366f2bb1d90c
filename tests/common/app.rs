use std::sync::Arc;

use axum::Router;
use tempfile::TempDir;
use tokio::sync::broadcast;

use study_summary::config::{Config, RateLimitConfig, SummaryDefaults};
use study_summary::routes::build_router;
use study_summary::state::AppState;
use study_summary::store::Store;

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub config: Config,
    _temp_dir: TempDir,
}

fn test_config(sled_path: String, rate_limit: RateLimitConfig) -> Config {
    // Built directly rather than via env vars, which race between test threads.
    Config {
        host: std::net::IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
        port: 3000,
        log_level: "info".to_string(),
        log_format: "text".to_string(),
        enable_file_logs: false,
        log_dir: "./logs".to_string(),
        sled_path,
        jwt_secret: format!("integration-test-jwt-secret-{}", uuid::Uuid::new_v4()),
        jwt_expires_in_hours: 24,
        cors_origin: "http://localhost:5173".to_string(),
        trust_proxy: false,
        rate_limit,
        summary: SummaryDefaults::default(),
    }
}

/// Same budget for every route class.
pub fn uniform_limits(max: u32) -> RateLimitConfig {
    RateLimitConfig {
        window_secs: 60,
        auth_max: max,
        ingest_max: max,
        summary_max: max,
        read_max: max,
    }
}

pub async fn spawn_with(rate_limit: RateLimitConfig, summary: SummaryDefaults) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let sled_path = temp_dir.path().join("study-summary-test.sled");

    let mut config = test_config(sled_path.to_string_lossy().to_string(), rate_limit);
    config.summary = summary;

    let store = Arc::new(Store::open(&config.sled_path).expect("open store"));
    store.run_migrations().expect("run migrations");

    let (shutdown_tx, _) = broadcast::channel::<()>(8);
    let state = AppState::new(store, &config, shutdown_tx);
    let app = build_router(state.clone());

    TestApp {
        app,
        state,
        config,
        _temp_dir: temp_dir,
    }
}

pub async fn spawn_test_server() -> TestApp {
    spawn_with(uniform_limits(1_000), SummaryDefaults::default()).await
}

pub async fn spawn_test_server_with_limits(rate_limit: RateLimitConfig) -> TestApp {
    spawn_with(rate_limit, SummaryDefaults::default()).await
}
