use std::{env, time::Duration};

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub max_connections: u32,
    pub payment_timeout: Duration,
    pub currency: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parse_or(env::var("APP_PORT").ok(), 3000);
        let max_connections = parse_or(env::var("DATABASE_MAX_CONNECTIONS").ok(), 10);
        let payment_timeout_ms = parse_or(env::var("PAYMENT_TIMEOUT_MS").ok(), 5_000);
        let currency = env::var("STORE_CURRENCY").unwrap_or_else(|_| "USD".to_string());
        Ok(Self {
            database_url,
            host,
            port,
            jwt_secret,
            max_connections,
            payment_timeout: Duration::from_millis(payment_timeout_ms),
            currency,
        })
    }
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, default: T) -> T {
    raw.and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_numbers_fall_back_to_default() {
        assert_eq!(parse_or::<u16>(Some("8080".into()), 3000), 8080);
        assert_eq!(parse_or::<u16>(Some("eighty".into()), 3000), 3000);
        assert_eq!(parse_or::<u64>(None, 5_000), 5_000);
        assert_eq!(parse_or::<u32>(Some(" 25 ".into()), 10), 25);
    }
}
