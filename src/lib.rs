pub mod app;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;
pub mod jobs;

use crate::config::rate_limits::IpRateLimit;
use crate::config::{AppConfig, AppEnv};
use crate::infra::{cache::RedisCache, db::Db};

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub cache: RedisCache,
    pub paseto_key: [u8; 32],
    pub token_ttl_hours: u64,
    pub signup_credits: i64,
    pub rate_limit: IpRateLimit,
    pub request_body_limit_bytes: usize,
    pub expose_error_details: bool,
}

impl AppState {
    pub fn new(config: &AppConfig, db: Db, cache: RedisCache) -> Self {
        Self {
            db,
            cache,
            paseto_key: config.paseto_key,
            token_ttl_hours: config.token_ttl_hours,
            signup_credits: config.signup_credits,
            rate_limit: config.rate_limit,
            request_body_limit_bytes: config.request_body_limit_bytes,
            expose_error_details: config.app_env == AppEnv::Development,
        }
    }
}
