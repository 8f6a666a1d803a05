use std::time::{SystemTime, UNIX_EPOCH};

/// Blanket per-IP request ceiling applied to every API route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpRateLimit {
    pub max_requests: u32,
    pub window_seconds: u64,
}

impl Default for IpRateLimit {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window_seconds: 15 * 60,
        }
    }
}

impl IpRateLimit {
    /// Redis key for the fixed window containing `now_secs`.
    pub fn key_for(&self, ip: &str, now_secs: u64) -> String {
        format!(
            "ratelimit:ip:{}:{}",
            ip,
            window_index(now_secs, self.window_seconds)
        )
    }
}

pub fn window_index(now_secs: u64, window_seconds: u64) -> u64 {
    now_secs / window_seconds
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_hundred_per_quarter_hour() {
        let limit = IpRateLimit::default();
        assert_eq!(limit.max_requests, 100);
        assert_eq!(limit.window_seconds, 900);
    }

    #[test]
    fn same_window_shares_a_key() {
        let limit = IpRateLimit::default();
        assert_eq!(limit.key_for("10.0.0.1", 900), limit.key_for("10.0.0.1", 1799));
        assert_ne!(limit.key_for("10.0.0.1", 1799), limit.key_for("10.0.0.1", 1800));
    }

    #[test]
    fn key_includes_ip() {
        let limit = IpRateLimit::default();
        assert_eq!(limit.key_for("127.0.0.1", 0), "ratelimit:ip:127.0.0.1:0");
    }
}
