/*
 * This file is part of the Alfred Dashboard Gateway.
 *
 * Copyright (C) 2025 Kovács Dávid <kapcsolat@kovacsdavid.dev>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published
 * by the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use crate::common::extractors::client_ip::ip_from_parts;
use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

/// How many trailing characters of the bearer token participate in the
/// bucket key of authenticated endpoints. Keeps the key stable across
/// token refreshes of unrelated callers while still splitting buckets
/// between users behind one proxy address.
const BEARER_KEY_SUFFIX_LEN: usize = 16;

/// Per-endpoint quota. Buckets are scoped by `(scope, caller key)`.
#[derive(Clone, Copy, Debug)]
pub struct RateQuota {
    pub scope: &'static str,
    pub max_requests: u32,
    pub window: Duration,
}

impl RateQuota {
    pub fn new(scope: &'static str, max_requests: u32, window_secs: u64) -> Self {
        Self {
            scope,
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }
}

#[derive(Debug)]
struct Bucket {
    count: u32,
    window_start: Instant,
}

#[derive(Debug, Clone, Copy)]
pub struct RateDecision {
    pub allowed: bool,
    pub retry_after_secs: u64,
}

/// Process-local fixed-window request counter. In a multi-process
/// deployment every worker carries its own buckets, which yields
/// per-worker quotas.
pub struct RateLimiter {
    buckets: DashMap<String, Bucket>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            buckets: DashMap::new(),
        }
    }

    pub fn check(&self, quota: &RateQuota, key: &str) -> RateDecision {
        let now = Instant::now();
        let mut bucket = self
            .buckets
            .entry(format!("{}:{}", quota.scope, key))
            .or_insert_with(|| Bucket {
                count: 0,
                window_start: now,
            });

        if now.duration_since(bucket.window_start) >= quota.window {
            bucket.window_start = now;
            bucket.count = 0;
        }

        if bucket.count >= quota.max_requests {
            let reset_at = bucket.window_start + quota.window;
            let remaining_ms = reset_at.saturating_duration_since(now).as_millis() as u64;
            return RateDecision {
                allowed: false,
                retry_after_secs: remaining_ms.div_ceil(1000).max(1),
            };
        }

        bucket.count += 1;
        RateDecision {
            allowed: true,
            retry_after_secs: 0,
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub struct RateLimit {
    pub limiter: Arc<RateLimiter>,
    pub quota: RateQuota,
}

impl RateLimit {
    pub fn new(limiter: Arc<RateLimiter>, quota: RateQuota) -> Self {
        Self { limiter, quota }
    }
}

fn bearer_key_suffix(headers: &HeaderMap) -> Option<String> {
    let token = headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")?
        .trim();
    if token.is_empty() {
        return None;
    }
    let tail: String = token
        .chars()
        .rev()
        .take(BEARER_KEY_SUFFIX_LEN)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    Some(tail)
}

fn bucket_key(req: &Request) -> String {
    let ip = ip_from_parts(req.headers(), req.extensions());
    match bearer_key_suffix(req.headers()) {
        Some(suffix) => format!("{ip}:{suffix}"),
        None => ip,
    }
}

pub async fn enforce_rate_limit(
    State(rate): State<RateLimit>,
    req: Request,
    next: Next,
) -> Response {
    let key = bucket_key(&req);
    let decision = rate.limiter.check(&rate.quota, &key);

    if !decision.allowed {
        warn!(
            scope = rate.quota.scope,
            key = %key,
            "Rate limit exceeded"
        );
        let mut response = (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "error": "Limite de requisições excedido. Tente novamente em instantes.",
                "retryAfterSeconds": decision.retry_after_secs,
            })),
        )
            .into_response();
        response.headers_mut().insert(
            header::RETRY_AFTER,
            HeaderValue::from(decision.retry_after_secs),
        );
        return response;
    }

    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn quota(max: u32) -> RateQuota {
        RateQuota::new("test_endpoint", max, 60)
    }

    #[test]
    fn allows_up_to_max_then_rejects() {
        let limiter = RateLimiter::new();
        let quota = quota(5);

        for _ in 0..5 {
            assert!(limiter.check(&quota, "203.0.113.9").allowed);
        }

        let rejected = limiter.check(&quota, "203.0.113.9");
        assert!(!rejected.allowed);
        assert!(rejected.retry_after_secs >= 1 && rejected.retry_after_secs <= 60);
    }

    #[test]
    fn keys_are_isolated_per_caller_and_scope() {
        let limiter = RateLimiter::new();
        let quota_a = quota(1);
        let quota_b = RateQuota::new("other_endpoint", 1, 60);

        assert!(limiter.check(&quota_a, "203.0.113.9").allowed);
        assert!(!limiter.check(&quota_a, "203.0.113.9").allowed);
        assert!(limiter.check(&quota_a, "198.51.100.7").allowed);
        assert!(limiter.check(&quota_b, "203.0.113.9").allowed);
    }

    #[test]
    fn window_expiry_resets_counter_to_one() {
        let limiter = RateLimiter::new();
        let quota = quota(2);

        assert!(limiter.check(&quota, "203.0.113.9").allowed);
        assert!(limiter.check(&quota, "203.0.113.9").allowed);
        assert!(!limiter.check(&quota, "203.0.113.9").allowed);

        // Rewind the bucket past the window instead of sleeping.
        {
            let mut bucket = limiter
                .buckets
                .get_mut("test_endpoint:203.0.113.9")
                .unwrap();
            bucket.window_start = Instant::now() - Duration::from_secs(61);
        }

        assert!(limiter.check(&quota, "203.0.113.9").allowed);
        assert!(limiter.check(&quota, "203.0.113.9").allowed);
        assert!(!limiter.check(&quota, "203.0.113.9").allowed);
    }

    #[test]
    fn bearer_suffix_splits_buckets_behind_one_address() {
        let mut headers_a = HeaderMap::new();
        headers_a.insert(
            header::AUTHORIZATION,
            "Bearer aaaaaaaaaaaaaaaaaaaaaaaa".parse().unwrap(),
        );
        let mut headers_b = HeaderMap::new();
        headers_b.insert(
            header::AUTHORIZATION,
            "Bearer bbbbbbbbbbbbbbbbbbbbbbbb".parse().unwrap(),
        );

        let suffix_a = bearer_key_suffix(&headers_a).unwrap();
        let suffix_b = bearer_key_suffix(&headers_b).unwrap();
        assert_eq!(suffix_a.len(), 16);
        assert_ne!(suffix_a, suffix_b);
        assert_eq!(bearer_key_suffix(&HeaderMap::new()), None);
    }
}
