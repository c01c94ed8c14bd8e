use std::env;
use std::time::Duration;

use guestbook_database::cache::DEFAULT_PAGE_CACHE_TTL;
use guestbook_database::model::rate_limit::{
    ActionClass, DEFAULT_READ_RATE_LIMIT_MAX_HITS, DEFAULT_READ_RATE_LIMIT_WINDOW,
    DEFAULT_WRITE_RATE_LIMIT_MAX_HITS, DEFAULT_WRITE_RATE_LIMIT_WINDOW, RateLimitPolicy,
};
use guestbook_utils::parse::{parse_duration, parse_flag};

/// Process configuration read from the environment (and `.env`).
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub redis_enabled: bool,
    pub redis_url: Option<String>,
    pub key_prefix: String,
    pub cache_enabled: bool,
    pub page_cache_ttl: Duration,
    pub write_rate_limit: RateLimitPolicy,
    pub read_rate_limit: RateLimitPolicy,
    pub trust_proxy_headers: bool,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            host: env_string("GUESTBOOK_HOST").unwrap_or_else(|| "0.0.0.0".to_owned()),
            port: env_u64("GUESTBOOK_PORT", 3000)
                .try_into()
                .unwrap_or(3000),
            redis_enabled: env_bool("REDIS_ENABLED", false),
            redis_url: env_string("REDIS_URL"),
            key_prefix: env_string("REDIS_KEY_PREFIX").unwrap_or_else(|| "guestbook:prod".to_owned()),
            cache_enabled: env_bool("CACHE_ENABLED", true),
            page_cache_ttl: env_duration("CACHE_PAGE_TTL", DEFAULT_PAGE_CACHE_TTL),
            write_rate_limit: RateLimitPolicy {
                action: ActionClass::GuestbookWrite,
                max_hits: env_u64("WRITE_RATELIMIT_MAX_HITS", DEFAULT_WRITE_RATE_LIMIT_MAX_HITS),
                window: env_duration("WRITE_RATELIMIT_WINDOW", DEFAULT_WRITE_RATE_LIMIT_WINDOW),
            },
            read_rate_limit: RateLimitPolicy {
                action: ActionClass::GuestbookRead,
                max_hits: env_u64("READ_RATELIMIT_MAX_HITS", DEFAULT_READ_RATE_LIMIT_MAX_HITS),
                window: env_duration("READ_RATELIMIT_WINDOW", DEFAULT_READ_RATE_LIMIT_WINDOW),
            },
            trust_proxy_headers: env_bool("TRUST_PROXY_HEADERS", false),
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .and_then(|value| parse_flag(&value))
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    match env::var(key) {
        Ok(value) => value.trim().parse::<u64>().unwrap_or(default),
        Err(_) => default,
    }
}

fn env_duration(key: &str, default: Duration) -> Duration {
    env::var(key)
        .ok()
        .and_then(|value| parse_duration(&value))
        .unwrap_or(default)
}
