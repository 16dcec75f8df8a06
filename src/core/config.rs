use std::env;
use std::time::Duration;

use super::error::{MonitorError, MonitorResult};

#[derive(Debug, Clone)]
pub struct Config {
    pub monitoring: MonitoringConfig,
    pub catalog: CatalogConfig,
    pub broker: BrokerConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone)]
pub struct MonitoringConfig {
    pub poll_interval_ms: u64,
    pub max_batch_size: usize,
    pub notifications_enabled: bool,
    pub janitor_interval_secs: u64,
    pub collaborator_timeout_ms: u64,
    pub journal_capacity: usize,
}

#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub database_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerKind {
    Local,
    Redis,
}

impl std::str::FromStr for BrokerKind {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(BrokerKind::Local),
            "redis" => Ok(BrokerKind::Redis),
            other => Err(MonitorError::Config(format!("unknown broker kind '{}'", other))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub kind: BrokerKind,
    pub redis_url: String,
    pub queue_name: String,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub http_port: u16,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            monitoring: MonitoringConfig {
                poll_interval_ms: 30_000,
                max_batch_size: 100,
                notifications_enabled: true,
                janitor_interval_secs: 300,
                collaborator_timeout_ms: 10_000,
                journal_capacity: 500,
            },
            catalog: CatalogConfig {
                database_url: "sqlite://data/catalog.db".to_string(),
            },
            broker: BrokerConfig {
                kind: BrokerKind::Local,
                redis_url: "redis://localhost:6379".to_string(),
                queue_name: "price-changes".to_string(),
            },
            server: ServerConfig {
                http_port: 8080,
                log_level: "info".to_string(),
            },
        }
    }
}

impl MonitoringConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn janitor_interval(&self) -> Duration {
        Duration::from_secs(self.janitor_interval_secs)
    }

    pub fn collaborator_timeout(&self) -> Duration {
        Duration::from_millis(self.collaborator_timeout_ms)
    }
}

fn parsed_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> MonitorResult<Self> {
        dotenv::dotenv().ok();

        let defaults = Config::default();

        let broker_kind = match env::var("BROKER_KIND") {
            Ok(raw) => raw.parse()?,
            Err(_) => defaults.broker.kind,
        };

        let config = Config {
            monitoring: MonitoringConfig {
                poll_interval_ms: parsed_or(
                    "PRICE_MONITOR_POLL_INTERVAL_MS",
                    defaults.monitoring.poll_interval_ms,
                ),
                max_batch_size: parsed_or(
                    "PRICE_MONITOR_MAX_BATCH_SIZE",
                    defaults.monitoring.max_batch_size,
                ),
                notifications_enabled: parsed_or(
                    "PRICE_MONITOR_ENABLED",
                    defaults.monitoring.notifications_enabled,
                ),
                janitor_interval_secs: parsed_or(
                    "PRICE_MONITOR_JANITOR_INTERVAL_SECS",
                    defaults.monitoring.janitor_interval_secs,
                ),
                collaborator_timeout_ms: parsed_or(
                    "PRICE_MONITOR_COLLABORATOR_TIMEOUT_MS",
                    defaults.monitoring.collaborator_timeout_ms,
                ),
                journal_capacity: parsed_or(
                    "PRICE_MONITOR_JOURNAL_CAPACITY",
                    defaults.monitoring.journal_capacity,
                ),
            },
            catalog: CatalogConfig {
                database_url: env::var("CATALOG_DATABASE_URL")
                    .unwrap_or(defaults.catalog.database_url),
            },
            broker: BrokerConfig {
                kind: broker_kind,
                redis_url: env::var("REDIS_URL").unwrap_or(defaults.broker.redis_url),
                queue_name: env::var("PRICE_MONITOR_QUEUE_NAME")
                    .unwrap_or(defaults.broker.queue_name),
            },
            server: ServerConfig {
                http_port: parsed_or("HTTP_PORT", defaults.server.http_port),
                log_level: env::var("LOG_LEVEL").unwrap_or(defaults.server.log_level),
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> MonitorResult<()> {
        if self.monitoring.max_batch_size == 0 {
            return Err(MonitorError::Config("max batch size must be positive".into()));
        }
        if self.monitoring.poll_interval_ms == 0 {
            return Err(MonitorError::Config("poll interval must be positive".into()));
        }
        if self.monitoring.janitor_interval_secs == 0 {
            return Err(MonitorError::Config("janitor interval must be positive".into()));
        }
        if self.broker.queue_name.trim().is_empty() {
            return Err(MonitorError::Config("queue name must not be empty".into()));
        }
        Ok(())
    }
}
