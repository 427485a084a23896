//! Network identity and execution mode selection.

use alloy_core::primitives::Address;
use serde::{Deserialize, Serialize};

/// The network name designating the local development chain.
pub const LOCAL_NETWORK: &str = "localhost";

/// What a run is allowed to do on the target network.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// Core units only.
    ProductionLike,
    /// Core units, auxiliary helper units and the bootstrap sequence.
    LocalDevelopment,
}

impl Mode {
    /// Classify a network identity.
    ///
    /// Only the exact [`LOCAL_NETWORK`] name is local; every other identity,
    /// including ones that merely look local, is treated as production-like.
    pub fn classify(network: &str) -> Self {
        if network == LOCAL_NETWORK {
            Self::LocalDevelopment
        } else {
            Self::ProductionLike
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Self::LocalDevelopment)
    }
}

/// Per-run network context. Computed once, read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkContext {
    /// The active network identity.
    pub network: String,
    /// The account that signs deployments and bootstrap calls.
    pub deployer: Address,
    /// The mode selected for `network`.
    pub mode: Mode,
}

impl NetworkContext {
    pub fn new(network: impl Into<String>, deployer: Address) -> Self {
        let network = network.into();
        let mode = Mode::classify(&network);
        Self {
            network,
            deployer,
            mode,
        }
    }

    pub fn is_local_development(&self) -> bool {
        self.mode.is_local()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_localhost() {
        assert_eq!(Mode::classify("localhost"), Mode::LocalDevelopment);
    }

    #[test]
    fn test_classify_other_networks() {
        for network in [
            "sepolia",
            "mainnet",
            "hardhat",
            "Localhost",
            "localhost ",
            "127.0.0.1",
            "",
        ] {
            assert_eq!(
                Mode::classify(network),
                Mode::ProductionLike,
                "{network:?} must not be classified as local"
            );
        }
    }

    #[test]
    fn test_context_derives_mode() {
        let ctx = NetworkContext::new("localhost", Address::ZERO);
        assert!(ctx.is_local_development());

        let ctx = NetworkContext::new("sepolia", Address::ZERO);
        assert!(!ctx.is_local_development());
        assert_eq!(ctx.mode.to_string(), "production-like");
    }
}
