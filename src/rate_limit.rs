//! Per client IP rate limiting for the auth endpoints
//!
//! Fixed one minute windows: the counter of an address starts with its first request and
//! expires a minute later.

use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;
use std::time::Duration;

use axum::Extension;
use axum::extract::Request;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;
use moka::future::Cache;

use crate::api::Error;
use crate::client_ip::ClientIp;

/// Length of a window
const WINDOW: Duration = Duration::from_secs(60);

/// Upper bound of tracked addresses
const MAX_TRACKED_ADDRESSES: u64 = 100_000;

/// Counts requests per client IP
#[derive(Clone)]
pub struct RateLimiter {
    /// Requests in the current window, per address
    hits: Cache<IpAddr, Arc<AtomicU32>>,

    /// Allowed requests per window, `0` disables the limit
    limit: u32,
}

impl RateLimiter {
    /// Create a limiter allowing `limit` requests per minute per address
    pub fn new(limit: u32) -> Self {
        Self {
            hits: Cache::builder()
                .max_capacity(MAX_TRACKED_ADDRESSES)
                .time_to_live(WINDOW)
                .build(),
            limit,
        }
    }

    /// Count a request, returns `false` when the address is over the limit
    pub async fn hit(&self, ip_address: IpAddr) -> bool {
        if self.limit == 0 {
            return true;
        }

        let counter = self
            .hits
            .get_with(ip_address, async { Arc::new(AtomicU32::new(0)) })
            .await;

        counter.fetch_add(1, Ordering::Relaxed) < self.limit
    }
}

/// Middleware rejecting requests over the limit with `429 Too Many Requests`
///
/// Requests without a known client IP are not limited
pub async fn limit(
    Extension(limiter): Extension<RateLimiter>,
    client_ip: Option<ClientIp>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(ClientIp(ip_address)) = client_ip {
        if !limiter.hit(ip_address).await {
            tracing::warn!("Rate limit exceeded for {ip_address}");

            return Error::too_many_requests("Too many requests, please try again later")
                .into_response();
        }
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    #[tokio::test]
    async fn test_limit_per_address() {
        let limiter = RateLimiter::new(2);
        let one = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        let two = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));

        assert!(limiter.hit(one).await);
        assert!(limiter.hit(one).await);
        assert!(!limiter.hit(one).await);

        assert!(limiter.hit(two).await);
    }

    #[tokio::test]
    async fn test_zero_disables_the_limit() {
        let limiter = RateLimiter::new(0);
        let ip_address = IpAddr::V4(Ipv4Addr::LOCALHOST);

        for _ in 0..100 {
            assert!(limiter.hit(ip_address).await);
        }
    }
}
