use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use dashmap::DashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::models::ApiResponse;

pub const TIER_PUBLIC: &str = "public";
pub const TIER_BOOKING: &str = "booking";
pub const TIER_STAFF: &str = "staff";

#[derive(Debug, Clone, Copy)]
struct TierConfig {
    max_requests: u32,
    window: Duration,
}

type IpHits = DashMap<IpAddr, Vec<Instant>>;

/// In-memory per-IP sliding-window rate limiter. Each named tier keeps
/// its own window config and hit map; keys are client IPs, values the
/// request timestamps still inside the window.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    tiers: Arc<DashMap<&'static str, (TierConfig, IpHits)>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            tiers: Arc::new(DashMap::new()),
        }
    }

    pub fn add_tier(&self, name: &'static str, max_requests: u32, window: Duration) {
        let config = TierConfig {
            max_requests,
            window,
        };
        self.tiers.insert(name, (config, DashMap::new()));
    }

    /// Returns `Ok(())` when the request is allowed,
    /// `Err(retry_after_secs)` when the tier's window is exhausted.
    /// Checking an unregistered tier is a configuration bug.
    pub fn check(&self, tier: &'static str, ip: IpAddr) -> Result<(), u64> {
        let tier_entry = self.tiers.get(tier).expect("unknown rate limit tier");
        let (config, hits) = tier_entry.value();
        let now = Instant::now();
        let window_start = now - config.window;

        let mut entry = hits.entry(ip).or_default();
        entry.retain(|t| *t > window_start);

        if entry.len() >= config.max_requests as usize {
            // Oldest hit leaving the window frees the next request
            let retry_after = (entry[0] + config.window)
                .saturating_duration_since(now)
                .as_secs()
                .max(1);
            return Err(retry_after);
        }

        entry.push(now);
        Ok(())
    }

    /// Drop IPs whose newest hit is older than twice the tier window.
    /// Run from a periodic background task.
    pub fn cleanup(&self) {
        let now = Instant::now();
        for tier_entry in self.tiers.iter() {
            let (config, hits) = tier_entry.value();
            let cutoff = config.window * 2;
            hits.retain(|_ip, timestamps| {
                timestamps.retain(|t| now.duration_since(*t) < cutoff);
                !timestamps.is_empty()
            });
        }
    }
}

/// Client IP: first entry of X-Forwarded-For when running behind a
/// reverse proxy, otherwise the socket peer address.
pub fn extract_client_ip(req: &Request) -> IpAddr {
    if let Some(forwarded) = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            if let Ok(ip) = first.trim().parse::<IpAddr>() {
                return ip;
            }
        }
    }
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

fn too_many_requests(retry_after: u64) -> Response {
    let body = ApiResponse::<()>::error(format!(
        "Too many requests. Try again in {} seconds",
        retry_after
    ));
    (
        StatusCode::TOO_MANY_REQUESTS,
        [("Retry-After", retry_after.to_string())],
        Json(body),
    )
        .into_response()
}

// ── Middleware, one per tier ──

pub async fn rate_limit_public(
    State(limiter): State<RateLimiter>,
    req: Request,
    next: Next,
) -> Result<Response, Response> {
    let ip = extract_client_ip(&req);
    limiter.check(TIER_PUBLIC, ip).map_err(too_many_requests)?;
    Ok(next.run(req).await)
}

pub async fn rate_limit_booking(
    State(limiter): State<RateLimiter>,
    req: Request,
    next: Next,
) -> Result<Response, Response> {
    let ip = extract_client_ip(&req);
    limiter.check(TIER_BOOKING, ip).map_err(too_many_requests)?;
    Ok(next.run(req).await)
}

pub async fn rate_limit_staff(
    State(limiter): State<RateLimiter>,
    req: Request,
    next: Next,
) -> Result<Response, Response> {
    let ip = extract_client_ip(&req);
    limiter.check(TIER_STAFF, ip).map_err(too_many_requests)?;
    Ok(next.run(req).await)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn limiter_with(max_requests: u32, window: Duration) -> RateLimiter {
        let limiter = RateLimiter::new();
        limiter.add_tier("test", max_requests, window);
        limiter
    }

    fn test_ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    #[test]
    fn test_allows_requests_under_limit() {
        let limiter = limiter_with(3, Duration::from_secs(60));
        let ip = test_ip(1);
        assert!(limiter.check("test", ip).is_ok());
        assert!(limiter.check("test", ip).is_ok());
        assert!(limiter.check("test", ip).is_ok());
    }

    #[test]
    fn test_rejects_over_limit() {
        let limiter = limiter_with(2, Duration::from_secs(60));
        let ip = test_ip(1);
        assert!(limiter.check("test", ip).is_ok());
        assert!(limiter.check("test", ip).is_ok());
        assert!(limiter.check("test", ip).is_err());
    }

    #[test]
    fn test_retry_after_within_window() {
        let limiter = limiter_with(1, Duration::from_secs(60));
        let ip = test_ip(1);
        limiter.check("test", ip).unwrap();
        let retry_after = limiter.check("test", ip).unwrap_err();
        assert!((1..=60).contains(&retry_after));
    }

    #[test]
    fn test_ips_tracked_independently() {
        let limiter = limiter_with(1, Duration::from_secs(60));
        assert!(limiter.check("test", test_ip(1)).is_ok());
        assert!(limiter.check("test", test_ip(1)).is_err());
        assert!(limiter.check("test", test_ip(2)).is_ok());
    }

    #[test]
    fn test_tiers_tracked_independently() {
        let limiter = RateLimiter::new();
        limiter.add_tier("tier_a", 1, Duration::from_secs(60));
        limiter.add_tier("tier_b", 1, Duration::from_secs(60));
        let ip = test_ip(1);
        assert!(limiter.check("tier_a", ip).is_ok());
        assert!(limiter.check("tier_a", ip).is_err());
        assert!(limiter.check("tier_b", ip).is_ok());
    }

    #[test]
    fn test_window_expiry_allows_again() {
        let limiter = limiter_with(1, Duration::from_millis(100));
        let ip = test_ip(1);
        assert!(limiter.check("test", ip).is_ok());
        assert!(limiter.check("test", ip).is_err());

        sleep(Duration::from_millis(150));

        assert!(limiter.check("test", ip).is_ok());
    }

    #[test]
    fn test_cleanup_removes_stale_entries() {
        let limiter = limiter_with(10, Duration::from_millis(50));
        let ip = test_ip(1);
        limiter.check("test", ip).unwrap();

        sleep(Duration::from_millis(120));

        limiter.cleanup();
        assert!(limiter.check("test", ip).is_ok());
    }

    #[test]
    fn test_cleanup_preserves_active_entries() {
        let limiter = limiter_with(2, Duration::from_secs(60));
        let ip = test_ip(1);
        limiter.check("test", ip).unwrap();

        limiter.cleanup();

        limiter.check("test", ip).unwrap();
        assert!(limiter.check("test", ip).is_err());
    }
}
