//! Typed configuration from environment variables.
//!
//! Loaded once at startup. The database URL is wrapped in
//! `secrecy::SecretString` so it never reaches a log line. CLI flags
//! override the run knobs after loading.

use crate::error::{Error, Result};
use secrecy::SecretString;

/// Default number of batches in flight.
pub const DEFAULT_CONCURRENCY: usize = 10;
/// Default records per batch.
pub const DEFAULT_BATCH_SIZE: usize = 25;
/// Default name of the field the backfill populates.
pub const DEFAULT_IDENTIFIER_FIELD: &str = "VectorId";

#[derive(Debug)]
pub struct Config {
    pub database_url: Option<SecretString>,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
    pub run: RunConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let defaults = RunConfig::default();
        let run = RunConfig {
            concurrency: parsed_var("IDFILL_CONCURRENCY")?.unwrap_or(defaults.concurrency),
            batch_size: parsed_var("IDFILL_BATCH_SIZE")?.unwrap_or(defaults.batch_size),
            identifier_field: std::env::var("IDFILL_FIELD").unwrap_or(defaults.identifier_field),
        };
        run.validate()?;

        Ok(Self {
            database_url: std::env::var("DATABASE_URL").ok().map(SecretString::from),
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            run,
        })
    }

    /// The database URL, or a config error naming the missing variable.
    pub fn require_database_url(&self) -> Result<&SecretString> {
        self.database_url.as_ref().ok_or_else(|| {
            Error::Config("required environment variable DATABASE_URL is not set".to_string())
        })
    }
}

/// Knobs for one backfill run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Maximum batches processed at the same time. At least 1.
    pub concurrency: usize,
    /// Records per batch. At least 1.
    pub batch_size: usize,
    /// Field written on each record.
    pub identifier_field: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            batch_size: DEFAULT_BATCH_SIZE,
            identifier_field: DEFAULT_IDENTIFIER_FIELD.to_string(),
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::Config("concurrency must be at least 1".to_string()));
        }
        if self.batch_size == 0 {
            return Err(Error::Config("batch size must be at least 1".to_string()));
        }
        if self.identifier_field.trim().is_empty() {
            return Err(Error::Config("identifier field must not be empty".to_string()));
        }
        Ok(())
    }
}

fn parsed_var<T>(name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("{name}={raw:?} is not valid: {e}"))),
        Err(_) => Ok(None),
    }
}
