use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::errors::{Result, ThothError};

/// Settings of the invocation gateway.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct GatewayConfig {
    /// Ledger channel every call targets.
    pub channel: String,
    /// Contract deployed on the channel.
    pub contract: String,
    /// Capacity of the request queue of each caller identity.
    pub queue_capacity: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            channel: "mychannel".to_string(),
            contract: "orchestrator".to_string(),
            queue_capacity: 1024,
        }
    }
}

/// Settings of the query translator.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct QueryConfig {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_page_size: 100,
            max_page_size: 500,
        }
    }
}

/// Settings of the outer timeout-retry policy.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    /// Base backoff, multiplied by the attempt number.
    pub backoff_ms: u64,
}

impl RetryConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 200,
        }
    }
}

/// Settings of the event aggregator.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct EventConfig {
    /// Name of the single ledger notification emitted per request.
    pub notification_name: String,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            notification_name: "chaincode-updates".to_string(),
        }
    }
}

/// Process configuration.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ThothConfig {
    pub gateway: GatewayConfig,
    pub query: QueryConfig,
    pub retry: RetryConfig,
    pub events: EventConfig,
}

impl ThothConfig {
    /// Parses and validates a JSON configuration document. Missing sections
    /// and fields take their default values.
    pub fn from_json_str(document: &str) -> Result<Self> {
        let config: ThothConfig = serde_json::from_str(document)
            .map_err(|e| ThothError::BadRequest(format!("invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let document = std::fs::read_to_string(path).map_err(|e| {
            ThothError::BadRequest(format!(
                "cannot read configuration {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json_str(&document)
    }

    /// Checks the invariants serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.gateway.channel.is_empty() || self.gateway.contract.is_empty() {
            return Err(ThothError::BadRequest(
                "gateway channel and contract must not be empty".to_string(),
            ));
        }
        if self.gateway.queue_capacity == 0 {
            return Err(ThothError::BadRequest(
                "gateway queue capacity must be positive".to_string(),
            ));
        }
        if self.query.default_page_size == 0 || self.query.max_page_size == 0 {
            return Err(ThothError::BadRequest(
                "page sizes must be positive".to_string(),
            ));
        }
        if self.query.default_page_size > self.query.max_page_size {
            return Err(ThothError::BadRequest(format!(
                "default page size {} exceeds the maximum {}",
                self.query.default_page_size, self.query.max_page_size
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(ThothError::BadRequest(
                "retry policy needs at least one attempt".to_string(),
            ));
        }
        if self.events.notification_name.is_empty() {
            return Err(ThothError::BadRequest(
                "notification name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
