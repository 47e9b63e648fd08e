//! Service configuration, read from the environment.
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::payment::vnpay::{VnPayConfig, DEFAULT_PAY_URL};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has invalid value {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            _ => Err(()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct MailConfig {
    pub from: String,
    pub subject_prefix: String,
    pub relay_subject: String,
    pub timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub storage: StorageBackend,
    /// Required for the postgres backend.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub nats_url: Option<String>,
    pub nats_subject_prefix: String,
    pub vnpay: VnPayConfig,
    pub mail: MailConfig,
    pub request_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &'static str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));
        let or = |key: &'static str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let storage_raw = or("STORAGE", "postgres");
        let storage: StorageBackend = storage_raw
            .parse()
            .map_err(|_| ConfigError::Invalid { key: "STORAGE", value: storage_raw.clone() })?;
        let database_url = get("DATABASE_URL");
        if storage == StorageBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        Ok(Self {
            port: number(&get, "PORT", 8083)?,
            storage,
            database_url,
            database_max_connections: number(&get, "DATABASE_MAX_CONNECTIONS", 10)?,
            nats_url: get("NATS_URL"),
            nats_subject_prefix: or("NATS_SUBJECT_PREFIX", "pharmacy"),
            vnpay: VnPayConfig {
                tmn_code: required("VNPAY_TMN_CODE")?,
                hash_secret: required("VNPAY_HASH_SECRET")?,
                pay_url: or("VNPAY_URL", DEFAULT_PAY_URL),
                return_url: required("VNPAY_RETURN_URL")?,
                expire_minutes: number(&get, "VNPAY_EXPIRE_MINUTES", 15)?,
            },
            mail: MailConfig {
                from: or("MAIL_FROM", "no-reply@pharmacy.local"),
                subject_prefix: or("MAIL_SUBJECT", "Xác nhận đơn hàng"),
                relay_subject: or("MAIL_RELAY_SUBJECT", "mail.outbound"),
                timeout: Duration::from_millis(number(&get, "NOTIFICATION_TIMEOUT_MS", 5_000)?),
            },
            request_timeout: Duration::from_secs(number(&get, "REQUEST_TIMEOUT_SECS", 30)?),
        })
    }
}

fn number<T: FromStr>(get: &impl Fn(&'static str) -> Option<String>, key: &'static str, default: T) -> Result<T, ConfigError> {
    match get(key) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid { key, value }),
    }
}
