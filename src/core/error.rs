use thiserror::Error;

pub type MonitorResult<T> = std::result::Result<T, MonitorError>;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("catalog query failed: {0}")]
    Catalog(String),

    #[error("broker publish failed: {0}")]
    Broker(String),

    #[error("{operation} timed out after {after_ms}ms")]
    Timeout { operation: &'static str, after_ms: u64 },

    #[error("item {item_id} is malformed: {reason}")]
    InvalidItem { item_id: i64, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}
