//! Per-client token buckets, one per route class.
//!
//! Each class gets its own budget from [`RateLimitConfig`], so a client
//! hammering the summary endpoint does not eat into its ingestion budget.
//! Buckets refill continuously at `max / window` tokens per second.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, OriginalUri, Request, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tokio::sync::{broadcast, Mutex};

use crate::config::RateLimitConfig;
use crate::response::ErrorBody;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteClass {
    Auth,
    Ingest,
    Summary,
    Read,
}

impl RouteClass {
    /// Accepts both the full `/api/...` path and the path as seen inside the
    /// nested `/api` router.
    pub fn classify(method: &Method, path: &str) -> Self {
        let path = path.strip_prefix("/api").unwrap_or(path);
        if path.starts_with("/auth") {
            Self::Auth
        } else if path.starts_with("/users/") && path.trim_end_matches('/').ends_with("/summary") {
            Self::Summary
        } else if *method == Method::POST && path.trim_end_matches('/') == "/events" {
            Self::Ingest
        } else {
            Self::Read
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Ingest => "ingest",
            Self::Summary => "summary",
            Self::Read => "read",
        }
    }
}

impl RateLimitConfig {
    /// Bucket capacity for `class`; 0 means the class is not limited.
    pub fn budget(&self, class: RouteClass) -> u32 {
        match class {
            RouteClass::Auth => self.auth_max,
            RouteClass::Ingest => self.ingest_max,
            RouteClass::Summary => self.summary_max,
            RouteClass::Read => self.read_max,
        }
    }
}

#[derive(Debug, Clone)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    fn full(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_refill: now,
        }
    }

    fn refill(&mut self, capacity: f64, window_secs: f64, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * capacity / window_secs).min(capacity);
        self.last_refill = now;
    }

    /// Whole seconds until the bucket holds `target` tokens.
    fn secs_until(&self, target: f64, capacity: f64, window_secs: f64) -> u64 {
        ((target - self.tokens).max(0.0) * window_secs / capacity).ceil() as u64
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub class: RouteClass,
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Seconds until the bucket is full again.
    pub reset_after: u64,
    /// Seconds until the next token; only set when the request was refused.
    pub retry_after: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    buckets: Arc<Mutex<HashMap<(IpAddr, RouteClass), Bucket>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    fn window(&self) -> Duration {
        Duration::from_secs(self.config.window_secs.max(1))
    }

    /// `None` when the class has no budget configured.
    pub async fn check(&self, ip: IpAddr, class: RouteClass) -> Option<Decision> {
        self.check_at(ip, class, Instant::now()).await
    }

    async fn check_at(&self, ip: IpAddr, class: RouteClass, now: Instant) -> Option<Decision> {
        let limit = self.config.budget(class);
        if limit == 0 {
            return None;
        }
        let capacity = f64::from(limit);
        let window_secs = self.window().as_secs_f64();

        let mut buckets = self.buckets.lock().await;
        let bucket = buckets
            .entry((ip, class))
            .or_insert_with(|| Bucket::full(capacity, now));
        bucket.refill(capacity, window_secs, now);

        let allowed = bucket.tokens >= 1.0;
        if allowed {
            bucket.tokens -= 1.0;
        }

        let retry_after = (!allowed).then(|| bucket.secs_until(1.0, capacity, window_secs));
        Some(Decision {
            class,
            allowed,
            limit,
            remaining: bucket.tokens.floor() as u32,
            reset_after: bucket.secs_until(capacity, capacity, window_secs),
            retry_after,
        })
    }

    /// Drops buckets that have been idle for a whole window; they would be
    /// full again anyway.
    pub async fn sweep(&self) -> usize {
        self.sweep_at(Instant::now()).await
    }

    async fn sweep_at(&self, now: Instant) -> usize {
        let window = self.window();
        let mut buckets = self.buckets.lock().await;
        let before = buckets.len();
        buckets.retain(|_, bucket| now.saturating_duration_since(bucket.last_refill) < window);
        before - buckets.len()
    }

    #[cfg(test)]
    async fn tracked(&self) -> usize {
        self.buckets.lock().await.len()
    }
}

pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let path = req
        .extensions()
        .get::<OriginalUri>()
        .map(|uri| uri.path().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let class = RouteClass::classify(req.method(), &path);
    let connect_addr = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    let ip = client_ip(req.headers(), connect_addr, state.config().trust_proxy);

    let Some(decision) = state.rate_limit().check(ip, class).await else {
        return next.run(req).await;
    };

    if !decision.allowed {
        tracing::warn!(ip = %ip, class = class.as_str(), "Rate limit exceeded");
        let mut response = (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ErrorBody::new("RATE_LIMITED", "Too many requests")),
        )
            .into_response();
        apply_headers(response.headers_mut(), &decision, state.rate_limit().config());
        return response;
    }

    let mut response = next.run(req).await;
    apply_headers(response.headers_mut(), &decision, state.rate_limit().config());
    response
}

fn apply_headers(headers: &mut HeaderMap, decision: &Decision, config: &RateLimitConfig) {
    headers.insert("ratelimit-limit", HeaderValue::from(decision.limit));
    headers.insert("ratelimit-remaining", HeaderValue::from(decision.remaining));
    headers.insert("ratelimit-reset", HeaderValue::from(decision.reset_after));
    let policy = format!("{};w={}", decision.limit, config.window_secs.max(1));
    if let Ok(v) = HeaderValue::from_str(&policy) {
        headers.insert("ratelimit-policy", v);
    }
    if let Some(retry) = decision.retry_after {
        headers.insert("retry-after", HeaderValue::from(retry.max(1)));
    }
}

/// Forwarding headers are only honoured behind a trusted proxy; otherwise
/// the socket peer is used.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> IpAddr {
    if trust_proxy {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|first| first.trim().parse().ok());
        let real = headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok());
        if let Some(ip) = forwarded.or(real) {
            return ip;
        }
    }

    peer.map(|addr| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

pub async fn rate_limit_sweep_loop(limiter: RateLimiter, mut shutdown_rx: broadcast::Receiver<()>) {
    let period = limiter.window().max(Duration::from_secs(60));
    let mut interval = tokio::time::interval(period);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let removed = limiter.sweep().await;
                if removed > 0 {
                    tracing::debug!(removed, "Swept idle rate limit buckets");
                }
            }
            _ = shutdown_rx.recv() => break,
        }
    }
}
