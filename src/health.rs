//! Health check module
//! Reports whether the gateway settings are usable and the ledger answers

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::config::AlfalahConfig;
use crate::ledger::TransactionLedger;

const PRESENT: &str = "✓";
const ABSENT: &str = "✗";

/// Health status response
#[derive(Debug, Serialize, Clone)]
pub struct HealthStatus {
    pub status: HealthState,
    pub checks: HashMap<String, ComponentHealth>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Overall health state
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Individual component health status
#[derive(Debug, Serialize, Clone)]
pub struct ComponentHealth {
    pub status: ComponentState,
    pub response_time_ms: Option<u128>,
    pub details: Option<String>,
}

/// Component state
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub enum ComponentState {
    Up,
    Down,
    Warning,
}

impl HealthStatus {
    pub fn new() -> Self {
        Self {
            status: HealthState::Healthy,
            checks: HashMap::new(),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self.status, HealthState::Healthy)
    }
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentHealth {
    pub fn up(response_time_ms: Option<u128>) -> Self {
        Self {
            status: ComponentState::Up,
            response_time_ms,
            details: None,
        }
    }

    pub fn down(details: Option<String>) -> Self {
        Self {
            status: ComponentState::Down,
            response_time_ms: None,
            details,
        }
    }

    pub fn warning(response_time_ms: Option<u128>, details: Option<String>) -> Self {
        Self {
            status: ComponentState::Warning,
            response_time_ms,
            details,
        }
    }
}

/// Presence marks for each gateway setting, as shown by the probe endpoint.
/// Secrets are only marked present when they are long enough to use.
pub fn config_presence(config: &AlfalahConfig) -> BTreeMap<&'static str, &'static str> {
    let mark = |present: bool| if present { PRESENT } else { ABSENT };
    let set = |value: &str| mark(!value.trim().is_empty());

    BTreeMap::from([
        ("channelId", set(&config.channel_id)),
        ("merchantId", set(&config.merchant_id)),
        ("key1", mark(AlfalahConfig::key_is_valid(&config.key1))),
        ("key2", mark(AlfalahConfig::key_is_valid(&config.key2))),
        ("returnUrl", set(&config.return_url)),
        ("listenerUrl", set(&config.listener_url)),
        ("frontendUrl", set(&config.frontend_url)),
        ("paymentUrl", set(&config.payment_url)),
    ])
}

/// Health checker for the application
#[derive(Clone)]
pub struct HealthChecker {
    config: AlfalahConfig,
    ledger: Arc<dyn TransactionLedger>,
}

impl HealthChecker {
    pub fn new(config: AlfalahConfig, ledger: Arc<dyn TransactionLedger>) -> Self {
        Self { config, ledger }
    }

    /// Missing gateway settings degrade the service; an unresponsive ledger
    /// makes it unhealthy.
    pub async fn check_health(&self) -> HealthStatus {
        let mut health_status = HealthStatus::new();

        let problems = self.config.misconfigurations();
        if problems.is_empty() {
            health_status
                .checks
                .insert("gateway_config".to_string(), ComponentHealth::up(None));
        } else {
            warn!(problems = ?problems, "Gateway configuration incomplete");
            health_status.status = HealthState::Degraded;
            health_status.checks.insert(
                "gateway_config".to_string(),
                ComponentHealth::warning(None, Some(problems.join("; "))),
            );
        }

        let start = Instant::now();
        match timeout(Duration::from_secs(2), self.ledger.len()).await {
            Ok(Ok(entries)) => {
                let response_time = start.elapsed().as_millis();
                let mut component = ComponentHealth::up(Some(response_time));
                component.details = Some(format!("{} entries", entries));
                health_status.checks.insert("ledger".to_string(), component);
                info!("Ledger health check: OK ({}ms)", response_time);
            }
            Ok(Err(e)) => {
                health_status.status = HealthState::Unhealthy;
                health_status.checks.insert(
                    "ledger".to_string(),
                    ComponentHealth::down(Some(e.to_string())),
                );
                error!("Ledger health check failed: {}", e);
            }
            Err(_) => {
                health_status.status = HealthState::Unhealthy;
                health_status.checks.insert(
                    "ledger".to_string(),
                    ComponentHealth::down(Some("Timeout".to_string())),
                );
                error!("Ledger health check timed out");
            }
        }

        health_status
    }
}
