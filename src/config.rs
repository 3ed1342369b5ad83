//! Application configuration module
//! Handles environment variable loading, configuration validation, and application settings

use std::env;
use std::fmt;
use std::time::Duration;

use crate::ledger::LedgerPolicy;
use crate::logging::mask_secret;
use crate::payments::envelope::validate_secret;
use crate::payments::fields::MerchantCredentials;

pub const DEFAULT_GATEWAY_BASE_URL: &str = "https://payments.bankalfalah.com";

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub alfalah: AlfalahConfig,
    pub ledger: LedgerConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log format options
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Plain,
}

/// Bank Alfalah merchant and endpoint settings
#[derive(Clone, Default)]
pub struct AlfalahConfig {
    pub base_url: String,
    /// Target of the direct `HS_*` page-redirect form
    pub payment_url: String,
    pub channel_id: String,
    pub merchant_id: String,
    pub store_id: String,
    pub merchant_hash: String,
    pub merchant_username: String,
    pub merchant_password: String,
    pub currency: String,
    /// Envelope key secret (first 16 bytes used)
    pub key1: String,
    /// Envelope IV secret (first 16 bytes used)
    pub key2: String,
    pub return_url: String,
    pub listener_url: String,
    pub frontend_url: String,
    pub request_timeout: u64, // seconds
}

/// Transaction ledger lifecycle
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub ttl_secs: u64,
    pub max_entries: usize,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenv::dotenv().ok();

        Ok(AppConfig {
            server: ServerConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
            alfalah: AlfalahConfig::from_env()?,
            ledger: LedgerConfig::from_env()?,
        })
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.logging.validate()?;
        self.alfalah.validate()?;
        self.ledger.validate()?;

        Ok(())
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = env::var("SERVER_PORT")
            .or_else(|_| env::var("PORT"))
            .unwrap_or_else(|_| "5000".to_string());

        Ok(ServerConfig {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: port
                .parse()
                .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".to_string()))?,
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "*".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidValue(
                "SERVER_PORT cannot be 0".to_string(),
            ));
        }

        if self.host.is_empty() {
            return Err(ConfigError::InvalidValue(
                "SERVER_HOST cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    pub fn allows_any_origin(&self) -> bool {
        self.cors_allowed_origins.is_empty() || self.cors_allowed_origins.iter().any(|o| o == "*")
    }
}

impl LoggingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "plain".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Plain,
            },
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR"];
        if !valid_levels.contains(&self.level.to_uppercase().as_str()) {
            return Err(ConfigError::InvalidValue("LOG_LEVEL".to_string()));
        }

        Ok(())
    }
}

impl AlfalahConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = env::var("ALFA_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_GATEWAY_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let var = |name: &str| env::var(name).unwrap_or_default();

        Ok(AlfalahConfig {
            payment_url: env::var("ALFA_PAYMENT_URL")
                .unwrap_or_else(|_| format!("{}/SSO/SSO/SSO", base_url)),
            channel_id: env::var("ALFA_CHANNEL_ID").unwrap_or_else(|_| "1001".to_string()),
            merchant_id: var("ALFA_MERCHANT_ID"),
            store_id: var("ALFA_STORE_ID"),
            merchant_hash: var("ALFA_MERCHANT_HASH"),
            merchant_username: var("ALFA_MERCHANT_USERNAME"),
            merchant_password: var("ALFA_MERCHANT_PASSWORD"),
            currency: env::var("ALFA_CURRENCY").unwrap_or_else(|_| "PKR".to_string()),
            key1: var("ALFA_KEY1"),
            key2: var("ALFA_KEY2"),
            return_url: var("ALFA_RETURN_URL"),
            listener_url: var("ALFA_LISTENER_URL"),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string())
                .trim_end_matches('/')
                .to_string(),
            request_timeout: env::var("ALFA_REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("ALFA_REQUEST_TIMEOUT_SECS".to_string()))?,
            base_url,
        })
    }

    /// Structural problems only. Missing merchant settings are reported by
    /// [`AlfalahConfig::misconfigurations`] and do not stop the server.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("ALFA_BASE_URL", &self.base_url),
            ("ALFA_PAYMENT_URL", &self.payment_url),
            ("FRONTEND_URL", &self.frontend_url),
        ] {
            if url::Url::parse(value).is_err()
                || !(value.starts_with("http://") || value.starts_with("https://"))
            {
                return Err(ConfigError::InvalidValue(format!(
                    "{} must be a valid http(s) URL",
                    name
                )));
            }
        }

        if self.request_timeout == 0 {
            return Err(ConfigError::InvalidValue(
                "ALFA_REQUEST_TIMEOUT_SECS".to_string(),
            ));
        }

        Ok(())
    }

    /// Critical but non-fatal problems: missing settings and envelope secrets
    /// shorter than 16 bytes.
    pub fn misconfigurations(&self) -> Vec<String> {
        let mut problems: Vec<String> = [
            ("ALFA_CHANNEL_ID", &self.channel_id),
            ("ALFA_CURRENCY", &self.currency),
            ("ALFA_KEY1", &self.key1),
            ("ALFA_KEY2", &self.key2),
            ("ALFA_MERCHANT_ID", &self.merchant_id),
            ("ALFA_STORE_ID", &self.store_id),
            ("ALFA_RETURN_URL", &self.return_url),
            ("ALFA_LISTENER_URL", &self.listener_url),
        ]
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| format!("missing environment variable {}", name))
        .collect();

        let secrets = [
            ("ALFA_KEY1", "key1", &self.key1),
            ("ALFA_KEY2", "key2", &self.key2),
        ];
        for (var, name, secret) in secrets {
            if secret.is_empty() {
                continue;
            }
            if let Err(e) = validate_secret(name, secret) {
                problems.push(format!("{}: {}", var, e));
            }
        }

        problems
    }

    pub fn key_is_valid(secret: &str) -> bool {
        validate_secret("key", secret).is_ok()
    }

    pub fn credentials(&self) -> MerchantCredentials {
        MerchantCredentials {
            channel_id: self.channel_id.clone(),
            merchant_id: self.merchant_id.clone(),
            store_id: self.store_id.clone(),
            merchant_hash: self.merchant_hash.clone(),
            merchant_username: self.merchant_username.clone(),
            merchant_password: self.merchant_password.clone(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

impl fmt::Debug for AlfalahConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlfalahConfig")
            .field("base_url", &self.base_url)
            .field("payment_url", &self.payment_url)
            .field("channel_id", &self.channel_id)
            .field("merchant_id", &self.merchant_id)
            .field("store_id", &self.store_id)
            .field("merchant_hash", &mask_secret(&self.merchant_hash))
            .field("merchant_username", &self.merchant_username)
            .field("merchant_password", &mask_secret(&self.merchant_password))
            .field("currency", &self.currency)
            .field("key1", &format_args!("{} bytes", self.key1.len()))
            .field("key2", &format_args!("{} bytes", self.key2.len()))
            .field("return_url", &self.return_url)
            .field("listener_url", &self.listener_url)
            .field("frontend_url", &self.frontend_url)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl LedgerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = LedgerConfig {
            ttl_secs: env::var("LEDGER_TTL_SECS")
                .unwrap_or_else(|_| "86400".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("LEDGER_TTL_SECS".to_string()))?,
            max_entries: env::var("LEDGER_MAX_ENTRIES")
                .unwrap_or_else(|_| "10000".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("LEDGER_MAX_ENTRIES".to_string()))?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ttl().map(|_| ())
    }

    fn ttl(&self) -> Result<Option<chrono::Duration>, ConfigError> {
        if self.ttl_secs == 0 {
            return Ok(None);
        }
        i64::try_from(self.ttl_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .map(Some)
            .ok_or_else(|| ConfigError::InvalidValue("LEDGER_TTL_SECS".to_string()))
    }

    /// Zero disables the corresponding bound.
    pub fn policy(&self) -> Result<LedgerPolicy, ConfigError> {
        Ok(LedgerPolicy {
            ttl: self.ttl()?,
            max_entries: (self.max_entries > 0).then_some(self.max_entries),
        })
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for configuration: {0}")]
    InvalidValue(String),
}
