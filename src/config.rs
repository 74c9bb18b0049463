use std::env;
use std::time::Duration;

use log::*;
use regex::Regex;
use thiserror::Error;

use crate::secret::Secret;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_GATEWAY_API_URL: &str = "https://api.razorpay.com";
const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_CURRENCY: &str = "INR";
/// Provider floor: 100 paise, i.e. ₹1.
const DEFAULT_MIN_AMOUNT: i64 = 100;
const DEFAULT_COD_ADVANCE_PERCENT: u32 = 20;

const KEY_ID_PATTERN: &str = r"^rzp_(live|test)_[A-Za-z0-9_]+$";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub key_id: String,
    pub key_secret: Secret<String>,
    pub api_url: String,
    pub timeout: Duration,
}

impl GatewayConfig {
    pub fn new(key_id: &str, key_secret: &str) -> Result<Self, ConfigError> {
        let config = Self {
            key_id: key_id.trim().to_string(),
            key_secret: Secret::new(key_secret.trim().to_string()),
            api_url: DEFAULT_GATEWAY_API_URL.to_string(),
            timeout: DEFAULT_GATEWAY_TIMEOUT,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_api_url(mut self, api_url: &str) -> Self {
        self.api_url = api_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.key_id.is_empty() {
            return Err(ConfigError::Missing("GATEWAY_KEY_ID"));
        }
        let re = Regex::new(KEY_ID_PATTERN).map_err(|e| ConfigError::Invalid {
            name: "GATEWAY_KEY_ID",
            reason: e.to_string(),
        })?;
        if !re.is_match(&self.key_id) {
            return Err(ConfigError::Invalid {
                name: "GATEWAY_KEY_ID",
                reason: "expected rzp_live_… or rzp_test_…".to_string(),
            });
        }
        if self.key_secret.reveal().is_empty() {
            return Err(ConfigError::Missing("GATEWAY_KEY_SECRET"));
        }
        Ok(())
    }
}

/// Business rules that vary per deployment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentPolicy {
    /// The single currency the store trades in.
    pub currency: String,
    /// Smallest amount, in minor units, the provider will accept.
    pub min_amount: i64,
    /// Share of a cash-on-delivery order collected online up front.
    pub cod_advance_percent: u32,
}

impl Default for PaymentPolicy {
    fn default() -> Self {
        Self {
            currency: DEFAULT_CURRENCY.to_string(),
            min_amount: DEFAULT_MIN_AMOUNT,
            cod_advance_percent: DEFAULT_COD_ADVANCE_PERCENT,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub gateway: GatewayConfig,
    pub policy: PaymentPolicy,
}

impl AppConfig {
    /// Reads configuration from the environment. Missing or malformed gateway
    /// credentials are fatal.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;
        let host = env::var("HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
        let port = parse_var("PORT", DEFAULT_PORT)?;

        let key_id = env::var("GATEWAY_KEY_ID").map_err(|_| ConfigError::Missing("GATEWAY_KEY_ID"))?;
        let key_secret = env::var("GATEWAY_KEY_SECRET").map_err(|_| ConfigError::Missing("GATEWAY_KEY_SECRET"))?;
        let mut gateway = GatewayConfig::new(&key_id, &key_secret)?
            .with_timeout(Duration::from_secs(parse_var("GATEWAY_TIMEOUT_SECS", DEFAULT_GATEWAY_TIMEOUT.as_secs())?));
        if let Ok(url) = env::var("GATEWAY_API_URL") {
            gateway = gateway.with_api_url(&url);
        }

        let policy = PaymentPolicy {
            currency: env::var("STORE_CURRENCY")
                .map(|c| c.trim().to_ascii_uppercase())
                .unwrap_or_else(|_| DEFAULT_CURRENCY.to_string()),
            min_amount: parse_var("GATEWAY_MIN_AMOUNT", DEFAULT_MIN_AMOUNT)?,
            cod_advance_percent: parse_var("COD_ADVANCE_PERCENT", DEFAULT_COD_ADVANCE_PERCENT)?,
        };
        validate_policy(&policy)?;

        info!(
            "🪛️ Gateway {} ({}), currency {}, COD advance {}%",
            gateway.api_url, gateway.key_id, policy.currency, policy.cod_advance_percent
        );

        Ok(Self { host, port, database_url, gateway, policy })
    }
}

pub fn validate_policy(policy: &PaymentPolicy) -> Result<(), ConfigError> {
    if policy.currency.len() != 3 || !policy.currency.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(ConfigError::Invalid {
            name: "STORE_CURRENCY",
            reason: format!("'{}' is not an ISO 4217 code", policy.currency),
        });
    }
    if policy.min_amount <= 0 {
        return Err(ConfigError::Invalid { name: "GATEWAY_MIN_AMOUNT", reason: "must be positive".to_string() });
    }
    if !(1..=100).contains(&policy.cod_advance_percent) {
        return Err(ConfigError::Invalid {
            name: "COD_ADVANCE_PERCENT",
            reason: "must be between 1 and 100".to_string(),
        });
    }
    Ok(())
}

fn parse_var<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid { name, reason: e.to_string() }),
        Err(_) => Ok(default),
    }
}
