use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;

// Service configuration sourced from environment variables, with an optional
// YAML override file pointed at by ROOMBOOK_CONFIG.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_addr: SocketAddr,
    pub metrics_bind: SocketAddr,
    pub storage: StorageConfig,
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone)]
pub enum StorageConfig {
    Memory,
    Postgres(PostgresConfig),
}

#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub enabled: bool,
    /// Seconds between reminder scans.
    pub reminder_interval_secs: u64,
    /// How far ahead the reminder scan looks, in minutes.
    pub reminder_lead_minutes: i64,
    /// Seconds between start-notice scans.
    pub start_interval_secs: u64,
    /// How far back the start-notice scan looks, in seconds.
    pub start_lookback_secs: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            reminder_interval_secs: 300,
            reminder_lead_minutes: 15,
            start_interval_secs: 60,
            start_lookback_secs: 60,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ServiceConfigOverride {
    bind_addr: Option<String>,
    metrics_bind: Option<String>,
    storage: Option<String>,
    postgres_url: Option<String>,
    scheduler_enabled: Option<bool>,
}

fn env_u64(name: &str, default: u64) -> Result<u64> {
    match std::env::var(name) {
        Ok(value) => value.parse().with_context(|| format!("parse {name}")),
        Err(_) => Ok(default),
    }
}

fn env_i64(name: &str, default: i64) -> Result<i64> {
    match std::env::var(name) {
        Ok(value) => value.parse().with_context(|| format!("parse {name}")),
        Err(_) => Ok(default),
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        let bind_addr = std::env::var("ROOMBOOK_BIND")
            .unwrap_or_else(|_| "0.0.0.0:7789".to_string())
            .parse()
            .with_context(|| "parse ROOMBOOK_BIND")?;
        let metrics_bind = std::env::var("ROOMBOOK_METRICS_BIND")
            .unwrap_or_else(|_| "0.0.0.0:9107".to_string())
            .parse()
            .with_context(|| "parse ROOMBOOK_METRICS_BIND")?;
        let storage = Self::storage_from_env()?;
        let scheduler = SchedulerConfig {
            enabled: std::env::var("ROOMBOOK_SCHEDULER_ENABLED")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
            reminder_interval_secs: env_u64("ROOMBOOK_REMINDER_INTERVAL_SECS", 300)?,
            reminder_lead_minutes: env_i64("ROOMBOOK_REMINDER_LEAD_MINUTES", 15)?,
            start_interval_secs: env_u64("ROOMBOOK_START_INTERVAL_SECS", 60)?,
            start_lookback_secs: env_i64("ROOMBOOK_START_LOOKBACK_SECS", 60)?,
        };
        Ok(Self {
            bind_addr,
            metrics_bind,
            storage,
            scheduler,
        })
    }

    fn storage_from_env() -> Result<StorageConfig> {
        let backend =
            std::env::var("ROOMBOOK_STORAGE").unwrap_or_else(|_| "memory".to_string());
        match backend.as_str() {
            "memory" => Ok(StorageConfig::Memory),
            "postgres" => {
                let url = std::env::var("ROOMBOOK_POSTGRES_URL")
                    .with_context(|| "ROOMBOOK_POSTGRES_URL required for postgres storage")?;
                Ok(StorageConfig::Postgres(PostgresConfig {
                    url,
                    max_connections: env_u64("ROOMBOOK_POSTGRES_MAX_CONNECTIONS", 10)? as u32,
                    acquire_timeout_ms: env_u64("ROOMBOOK_POSTGRES_ACQUIRE_TIMEOUT_MS", 5_000)?,
                }))
            }
            other => anyhow::bail!("unknown ROOMBOOK_STORAGE backend: {other}"),
        }
    }

    pub fn from_env_or_yaml() -> Result<Self> {
        let mut config = Self::from_env()?;
        if let Ok(path) = std::env::var("ROOMBOOK_CONFIG") {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("read ROOMBOOK_CONFIG: {path}"))?;
            let override_cfg: ServiceConfigOverride =
                serde_yaml::from_str(&contents).with_context(|| "parse config yaml")?;
            if let Some(value) = override_cfg.bind_addr {
                config.bind_addr = value.parse().with_context(|| "parse bind_addr")?;
            }
            if let Some(value) = override_cfg.metrics_bind {
                config.metrics_bind = value.parse().with_context(|| "parse metrics_bind")?;
            }
            if let Some(value) = override_cfg.scheduler_enabled {
                config.scheduler.enabled = value;
            }
            match (override_cfg.storage.as_deref(), override_cfg.postgres_url) {
                (Some("memory"), _) => config.storage = StorageConfig::Memory,
                (Some("postgres"), Some(url)) => {
                    config.storage = StorageConfig::Postgres(PostgresConfig {
                        url,
                        max_connections: 10,
                        acquire_timeout_ms: 5_000,
                    });
                }
                (Some("postgres"), None) => {
                    anyhow::bail!("postgres storage override requires postgres_url")
                }
                (Some(other), _) => anyhow::bail!("unknown storage backend: {other}"),
                (None, _) => {}
            }
        }
        Ok(config)
    }
}
