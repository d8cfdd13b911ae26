use rust_decimal::Decimal;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::auth::JwtConfig;
use crate::core::ServerError;

/// Server configuration
///
/// # Environment variables
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | WORK_DIR | ./data | databases, proofs, logs |
/// | HTTP_PORT | 3000 | HTTP port |
/// | ENVIRONMENT | development | development / staging / production |
/// | LOG_LEVEL | info | tracing filter |
/// | LOG_JSON | false | JSON log lines |
/// | JWT_SECRET | (generated in debug builds) | HMAC secret, at least 32 chars |
/// | JWT_EXPIRATION_MINUTES | 1440 | token lifetime |
/// | JWT_ISSUER / JWT_AUDIENCE | dispatch-server / dispatch-clients | claim checks |
/// | STRIPE_SECRET_KEY | unset | checkout sessions disabled when unset |
/// | STRIPE_WEBHOOK_SECRET | unset | webhook rejects everything when unset |
/// | FRONTEND_URL | http://localhost:5173 | checkout redirect base |
/// | CHECKOUT_CURRENCY | usd | checkout currency |
/// | CHECKOUT_EXCHANGE_RATE | 0.016943 | local price × rate = checkout price |
/// | PAYMENT_TIMEOUT_MS | 10000 | payment provider timeout |
/// | MAX_PROOF_SIZE | 5242880 | proof upload limit (bytes) |
/// | WS_PING_INTERVAL_SECS | 30 | WebSocket keepalive |
/// | WS_IDLE_TIMEOUT_SECS | 120 | idle WebSocket cutoff |
/// | SHUTDOWN_TIMEOUT_MS | 10000 | graceful shutdown budget |
///
/// # Example
///
/// ```ignore
/// WORK_DIR=/srv/dispatch HTTP_PORT=8080 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub work_dir: String,
    pub http_port: u16,
    /// development | staging | production
    pub environment: String,
    pub log_level: String,
    pub log_json: bool,
    pub jwt: JwtConfig,

    // === Payment ===
    pub stripe_secret_key: Option<String>,
    pub stripe_webhook_secret: Option<String>,
    pub frontend_url: String,
    pub checkout_currency: String,
    pub checkout_exchange_rate: Decimal,
    pub payment_timeout_ms: u64,

    // === Proofs / sessions ===
    pub max_proof_size: usize,
    pub ws_ping_interval_secs: u64,
    pub ws_idle_timeout_secs: u64,
    pub shutdown_timeout_ms: u64,
}

/// Parse an env var, falling back to `default` when unset or malformed
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Non-empty env var
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Load configuration from the environment
    pub fn from_env() -> Result<Self, ServerError> {
        let jwt = JwtConfig::from_env().map_err(|e| ServerError::Config(e.to_string()))?;

        Ok(Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "./data".into()),
            http_port: env_or("HTTP_PORT", 3000),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_json: env_or("LOG_JSON", false),
            jwt,

            stripe_secret_key: env_opt("STRIPE_SECRET_KEY"),
            stripe_webhook_secret: env_opt("STRIPE_WEBHOOK_SECRET"),
            frontend_url: std::env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".into()),
            checkout_currency: std::env::var("CHECKOUT_CURRENCY").unwrap_or_else(|_| "usd".into()),
            checkout_exchange_rate: env_or("CHECKOUT_EXCHANGE_RATE", Decimal::new(16943, 6)),
            payment_timeout_ms: env_or("PAYMENT_TIMEOUT_MS", 10_000),

            max_proof_size: env_or("MAX_PROOF_SIZE", 5 * 1024 * 1024),
            ws_ping_interval_secs: env_or("WS_PING_INTERVAL_SECS", 30),
            ws_idle_timeout_secs: env_or("WS_IDLE_TIMEOUT_SECS", 120),
            shutdown_timeout_ms: env_or("SHUTDOWN_TIMEOUT_MS", 10_000),
        })
    }

    /// Environment config with a custom work dir and port
    ///
    /// Used by tests
    pub fn with_overrides(work_dir: impl Into<String>, http_port: u16) -> Result<Self, ServerError> {
        let mut config = Self::from_env()?;
        config.work_dir = work_dir.into();
        config.http_port = http_port;
        Ok(config)
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    pub fn work_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir)
    }

    pub fn orders_db_path(&self) -> PathBuf {
        self.work_path().join("orders.redb")
    }

    pub fn riders_db_path(&self) -> PathBuf {
        self.work_path().join("riders.redb")
    }

    pub fn proofs_dir(&self) -> PathBuf {
        self.work_path().join("uploads").join("proofs")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.work_path().join("logs")
    }

    pub fn payment_timeout(&self) -> Duration {
        Duration::from_millis(self.payment_timeout_ms)
    }

    pub fn ws_ping_interval(&self) -> Duration {
        Duration::from_secs(self.ws_ping_interval_secs.max(1))
    }

    pub fn ws_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.ws_idle_timeout_secs.max(1))
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_or_falls_back_on_garbage() {
        assert_eq!(env_or("DISPATCH_TEST_UNSET_PORT", 3000u16), 3000);
    }

    #[test]
    fn test_overrides_and_paths() {
        let config = Config::with_overrides("/tmp/dispatch-test", 4000).unwrap();
        assert_eq!(config.http_port, 4000);
        assert_eq!(
            config.orders_db_path(),
            PathBuf::from("/tmp/dispatch-test/orders.redb")
        );
        assert_eq!(
            config.proofs_dir(),
            PathBuf::from("/tmp/dispatch-test/uploads/proofs")
        );
        assert!(config.ws_ping_interval() >= Duration::from_secs(1));
    }
}
