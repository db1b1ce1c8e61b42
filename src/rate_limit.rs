use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use tokio::sync::RwLock;
use tracing::warn;

use crate::{config::RateLimitConfig, error::AppError};

#[derive(Debug)]
struct RequestWindow {
    timestamps: Vec<Instant>,
}

impl RequestWindow {
    fn new() -> Self {
        Self {
            timestamps: Vec::new(),
        }
    }

    fn cleanup_old_requests(&mut self, window: Duration) {
        let now = Instant::now();
        self.timestamps
            .retain(|ts| now.saturating_duration_since(*ts) < window);
    }
}

/// Sliding-window request counter keyed by client.
pub struct RateLimiter {
    windows: RwLock<HashMap<String, RequestWindow>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            windows: RwLock::new(HashMap::new()),
            max_requests,
            window,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, Duration::from_secs(config.window_secs))
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Records the attempt and returns whether it is within the limit.
    pub async fn check(&self, key: &str) -> bool {
        let mut windows = self.windows.write().await;
        let window = windows
            .entry(key.to_string())
            .or_insert_with(RequestWindow::new);
        window.cleanup_old_requests(self.window);

        if window.timestamps.len() < self.max_requests {
            window.timestamps.push(Instant::now());
            true
        } else {
            false
        }
    }

    /// Drops clients with no requests inside the window.
    pub async fn cleanup(&self) {
        let mut windows = self.windows.write().await;
        windows.retain(|_, window| {
            window.cleanup_old_requests(self.window);
            !window.timestamps.is_empty()
        });
    }

    #[cfg(test)]
    async fn tracked_clients(&self) -> usize {
        self.windows.read().await.len()
    }
}

fn client_key(req: &Request) -> String {
    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }
    req.headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn limit_requests(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let key = client_key(&req);
    if !limiter.check(&key).await {
        warn!(client = %key, path = %req.uri().path(), "rate limit exceeded");
        return Err(AppError::RateLimited);
    }
    Ok(next.run(req).await)
}

/// Periodically prunes idle clients until the process exits.
pub fn spawn_cleanup(limiter: Arc<RateLimiter>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(limiter.window().max(Duration::from_secs(1)));
        loop {
            ticker.tick().await;
            limiter.cleanup().await;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use tokio::time::sleep;

    #[tokio::test]
    async fn allows_up_to_limit_then_recovers() {
        let limiter = RateLimiter::new(3, Duration::from_millis(300));

        for _ in 0..3 {
            assert!(limiter.check("10.0.0.1").await);
        }
        assert!(!limiter.check("10.0.0.1").await);
        // other clients are unaffected
        assert!(limiter.check("10.0.0.2").await);

        sleep(Duration::from_millis(400)).await;
        assert!(limiter.check("10.0.0.1").await);
    }

    #[tokio::test]
    async fn cleanup_drops_idle_clients() {
        let limiter = RateLimiter::new(5, Duration::from_millis(100));
        limiter.check("a").await;
        limiter.check("b").await;
        assert_eq!(limiter.tracked_clients().await, 2);

        sleep(Duration::from_millis(150)).await;
        limiter.cleanup().await;
        assert_eq!(limiter.tracked_clients().await, 0);
    }

    #[test]
    fn client_key_prefers_forwarded_header_without_connect_info() {
        let req = Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_key(&req), "203.0.113.7");

        let req = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_key(&req), "unknown");
    }
}
