//! Configuration module for arbiter.

use crate::error::{ArbiterError, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

/// Main configuration for an arbiter node.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArbiterConfig {
    /// Node configuration.
    pub node: NodeConfig,
    /// HTTP gateway configuration.
    pub gateway: GatewayConfig,
    /// Observability configuration.
    pub observability: ObservabilityConfig,
}

impl ArbiterConfig {
    /// Load configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ArbiterError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Self = serde_json::from_str(&content)
            .map_err(|e| ArbiterError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.node.name.is_empty() {
            return Err(ArbiterError::InvalidConfig {
                field: "node.name".to_string(),
                reason: "Node name must not be empty".to_string(),
            });
        }

        if self.gateway.enabled
            && self.observability.metrics_enabled
            && self.gateway.bind_addr == self.observability.metrics_addr
        {
            return Err(ArbiterError::InvalidConfig {
                field: "gateway.bind_addr".to_string(),
                reason: "Gateway and metrics servers cannot share an address".to_string(),
            });
        }

        Ok(())
    }

    /// Create a minimal development configuration.
    pub fn development() -> Self {
        Self {
            node: NodeConfig {
                name: "dev-node".to_string(),
            },
            gateway: GatewayConfig {
                enabled: true,
                bind_addr: "127.0.0.1:8080".parse().expect("valid socket address"),
            },
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Node-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Human-readable node name; used as the owner of seeded models.
    pub name: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: "arbiter-node".to_string(),
        }
    }
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Whether to serve the REST gateway.
    pub enabled: bool,
    /// Address the gateway listens on.
    pub bind_addr: SocketAddr,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_addr: "0.0.0.0:8080".parse().expect("valid socket address"),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level filter (overridden by `RUST_LOG`).
    pub log_level: String,
    /// Emit JSON-formatted logs.
    pub json_logs: bool,
    /// Whether to serve Prometheus metrics.
    pub metrics_enabled: bool,
    /// Address the metrics server listens on.
    pub metrics_addr: SocketAddr,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: true,
            metrics_addr: "127.0.0.1:9100".parse().expect("valid socket address"),
        }
    }
}
