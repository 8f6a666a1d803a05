pub mod rate_limits;

use anyhow::{anyhow, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::config::rate_limits::IpRateLimit;

const MAX_TOKEN_TTL_HOURS: u64 = 24 * 366;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub http_addr: String,
    pub app_mode: String,
    pub app_env: AppEnv,
    pub database_url: String,
    pub redis_url: String,
    pub db_max_connections: u32,
    pub db_connect_timeout_seconds: u64,
    pub db_idle_timeout_seconds: u64,
    pub db_max_lifetime_seconds: u64,
    pub paseto_key: [u8; 32],
    pub token_ttl_hours: u64,
    pub signup_credits: i64,
    pub rate_limit: IpRateLimit,
    pub request_body_limit_bytes: usize,
    pub seed_password: String,
}

/// Deployment environment; `Development` exposes internal error detail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl FromStr for AppEnv {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "development" | "dev" => Ok(AppEnv::Development),
            "production" | "prod" => Ok(AppEnv::Production),
            other => Err(anyhow!("unknown environment: {}", other)),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let http_addr = env_or("HTTP_ADDR", "0.0.0.0:8080");
        http_addr
            .parse::<SocketAddr>()
            .map_err(|err| anyhow!("invalid HTTP_ADDR: {}", err))?;

        let signup_credits: i64 = env_or_parse("SIGNUP_CREDITS", "100")?;
        if signup_credits < 0 {
            return Err(anyhow!("invalid SIGNUP_CREDITS: must not be negative"));
        }

        let rate_limit = IpRateLimit {
            max_requests: env_or_parse("RATE_LIMIT_MAX_REQUESTS", "100")?,
            window_seconds: env_or_parse("RATE_LIMIT_WINDOW_SECONDS", "900")?,
        };
        if rate_limit.window_seconds == 0 {
            return Err(anyhow!("invalid RATE_LIMIT_WINDOW_SECONDS: must be positive"));
        }

        Ok(Self {
            http_addr,
            app_mode: env_or("APP_MODE", "api"),
            app_env: env_or_parse("APP_ENV", "production")?,
            database_url: env_or_err("DATABASE_URL")?,
            redis_url: env_or("REDIS_URL", "redis://127.0.0.1/"),
            db_max_connections: env_or_parse("DB_MAX_CONNECTIONS", "25")?,
            db_connect_timeout_seconds: env_or_parse("DB_CONNECT_TIMEOUT_SECONDS", "5")?,
            db_idle_timeout_seconds: env_or_parse("DB_IDLE_TIMEOUT_SECONDS", "300")?,
            db_max_lifetime_seconds: env_or_parse("DB_MAX_LIFETIME_SECONDS", "1800")?,
            paseto_key: env_key_32("PASETO_KEY")?,
            token_ttl_hours: token_ttl_hours(&env_or("TOKEN_TTL_HOURS", "72"))?,
            signup_credits,
            rate_limit,
            request_body_limit_bytes: env_or_parse("REQUEST_BODY_LIMIT_BYTES", "10240")?,
            seed_password: env_or("SEED_PASSWORD", "changeme123"),
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn env_or_err(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| anyhow!("{} must be set", key))
}

fn env_or_parse<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_or(key, default)
        .parse()
        .map_err(|err| anyhow!("invalid {}: {}", key, err))
}

/// One hour up to one year.
fn token_ttl_hours(value: &str) -> Result<u64> {
    let hours: u64 = value
        .parse()
        .map_err(|err| anyhow!("invalid TOKEN_TTL_HOURS: {}", err))?;
    if !(1..=MAX_TOKEN_TTL_HOURS).contains(&hours) {
        return Err(anyhow!(
            "invalid TOKEN_TTL_HOURS: must be between 1 and {}",
            MAX_TOKEN_TTL_HOURS
        ));
    }
    Ok(hours)
}

fn env_key_32(key: &str) -> Result<[u8; 32]> {
    decode_key_32(key, &env_or_err(key)?)
}

fn decode_key_32(key: &str, value: &str) -> Result<[u8; 32]> {
    let bytes = STANDARD
        .decode(value.trim())
        .map_err(|err| anyhow!("invalid {}: {}", key, err))?;
    <[u8; 32]>::try_from(bytes.as_slice())
        .map_err(|_| anyhow!("invalid {}: expected 32 bytes", key))
}
