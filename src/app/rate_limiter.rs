use anyhow::Result;
use redis::AsyncCommands;

use crate::config::rate_limits::{unix_now, IpRateLimit};
use crate::infra::cache::RedisCache;

pub struct RateLimitInfo {
    pub limited: bool,
    pub limit: u32,
    pub remaining: u32,
}

#[derive(Clone)]
pub struct RateLimiter {
    cache: RedisCache,
}

impl RateLimiter {
    pub fn new(cache: RedisCache) -> Self {
        Self { cache }
    }

    /// Counts this request against the caller's fixed window and reports
    /// whether the window is now over its ceiling.
    pub async fn check_ip(&self, ip: &str, limit: &IpRateLimit) -> Result<RateLimitInfo> {
        let key = limit.key_for(ip, unix_now());
        let mut conn = self.cache.connection().await?;

        let count: u32 = conn.incr(&key, 1).await?;

        // Set expiration on first increment
        if count == 1 {
            let _: () = conn.expire(&key, limit.window_seconds as i64).await?;
        }

        if count > limit.max_requests {
            tracing::debug!(
                ip = ip,
                count = count,
                limit = limit.max_requests,
                "IP rate limit exceeded"
            );
            return Ok(RateLimitInfo {
                limited: true,
                limit: limit.max_requests,
                remaining: 0,
            });
        }

        Ok(RateLimitInfo {
            limited: false,
            limit: limit.max_requests,
            remaining: limit.max_requests - count,
        })
    }
}
