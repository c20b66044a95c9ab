//! Configuration for the wallet resolver

use serde::{Deserialize, Serialize};

/// Environment variable overriding where durable state lives
pub const DATA_DIR_ENV: &str = "WALLET_RESOLVER_DATA_DIR";

/// Simulated confirmation pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Delay between pipeline stages (milliseconds)
    pub step_delay_ms: u64,
    /// Probability that a send fails at the confirmation stage (0.0 - 1.0)
    pub failure_probability: f64,
    /// Flat mock gas fee charged per send (ETH)
    pub network_fee: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            step_delay_ms: 1_500,
            failure_probability: 0.4, // documented demo failure rate
            network_fee: 0.0005,
        }
    }
}

/// Session timeout settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Inactivity window before the expiry warning (seconds)
    pub idle_timeout_secs: u64,
    /// Warning countdown before forced logout (seconds)
    pub warning_countdown_secs: u64,
    /// Watchdog evaluation interval (milliseconds)
    pub watchdog_interval_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 600,
            warning_countdown_secs: 120,
            watchdog_interval_ms: 1_000,
        }
    }
}

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Confirmation pipeline settings
    pub simulator: SimulatorConfig,
    /// Idle timeout settings
    pub session: SessionConfig,
    /// Path to the durable key-value snapshot file
    pub state_file: Option<String>,
}
