//! Engine configuration.
//!
//! Defaults suit testnet use; [`EngineConfig::from_env`] overrides them from
//! `HTLC_*` environment variables. The network is carried per config value
//! and threaded into every assembled transaction.

use htlc_core::address::Network;
use htlc_core::constants::TX_VERSION;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default cap on coins consumed by one fund transaction.
pub const DEFAULT_MAX_FUND_INPUTS: usize = 16;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}: {reason}")]
    InvalidValue { var: &'static str, reason: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Network stamped on assembled transactions and used for locators.
    pub network: Network,
    /// Upper bound on coins selected for a UTXO fund transaction.
    pub max_fund_inputs: usize,
    /// Transaction format version.
    pub tx_version: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            network: Network::Testnet,
            max_fund_inputs: DEFAULT_MAX_FUND_INPUTS,
            tx_version: TX_VERSION,
        }
    }
}

impl EngineConfig {
    pub fn for_network(network: Network) -> Self {
        Self {
            network,
            ..Self::default()
        }
    }

    /// Load overrides from `HTLC_NETWORK`, `HTLC_MAX_FUND_INPUTS` and `HTLC_TX_VERSION`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = lookup("HTLC_NETWORK") {
            config.network = raw.trim().parse().map_err(|e| ConfigError::InvalidValue {
                var: "HTLC_NETWORK",
                reason: format!("{e}"),
            })?;
        }

        if let Some(raw) = lookup("HTLC_MAX_FUND_INPUTS") {
            let n: usize = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                var: "HTLC_MAX_FUND_INPUTS",
                reason: format!("not an integer: {raw}"),
            })?;
            if n == 0 {
                return Err(ConfigError::InvalidValue {
                    var: "HTLC_MAX_FUND_INPUTS",
                    reason: "must be at least 1".into(),
                });
            }
            config.max_fund_inputs = n;
        }

        if let Some(raw) = lookup("HTLC_TX_VERSION") {
            config.tx_version = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                var: "HTLC_TX_VERSION",
                reason: format!("not an integer: {raw}"),
            })?;
        }

        Ok(config)
    }
}
