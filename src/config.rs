//! Wallet manager configuration
//!
//! Loaded from JSON. Every field is optional; an empty object yields a
//! manager on `juno-1` using the built-in chain table.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::chain_info::RegistryChainInfoResolver;
use crate::error::WalletManagerError;
use crate::types::ChainInfoOverrides;

pub const DEFAULT_CHAIN_ID: &str = "juno-1";

fn default_chain_id() -> String {
    DEFAULT_CHAIN_ID.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletManagerConfig {
    /// Chain the primary connection is bound to
    #[serde(default = "default_chain_id")]
    pub default_chain_id: String,
    #[serde(default)]
    pub chain_info_overrides: ChainInfoOverrides,
    /// Wallet to auto-connect on startup
    #[serde(default)]
    pub preferred_wallet: Option<String>,
    /// Chain registry mirror; resolve through the registry when set
    #[serde(default)]
    pub registry_url: Option<String>,
    /// Chain ID -> registry directory name
    #[serde(default)]
    pub chain_names: HashMap<String, String>,
}

impl Default for WalletManagerConfig {
    fn default() -> Self {
        Self {
            default_chain_id: default_chain_id(),
            chain_info_overrides: ChainInfoOverrides::new(),
            preferred_wallet: None,
            registry_url: None,
            chain_names: HashMap::new(),
        }
    }
}

impl WalletManagerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, WalletManagerError> {
        let config: Self = serde_json::from_str(json)?;
        if config.default_chain_id.is_empty() {
            return Err(WalletManagerError::Config(
                "defaultChainId must not be empty".to_string(),
            ));
        }
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, WalletManagerError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            WalletManagerError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }

    /// Registry resolver for this configuration, if a registry is configured
    pub fn registry_resolver(&self) -> Option<RegistryChainInfoResolver> {
        let url = self.registry_url.as_deref()?;
        let resolver = self
            .chain_names
            .iter()
            .fold(RegistryChainInfoResolver::new().with_base_url(url), |r, (id, name)| {
                r.with_chain_name(id, name)
            });
        Some(resolver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = WalletManagerConfig::from_json_str("{}").unwrap();
        assert_eq!(config, WalletManagerConfig::default());
        assert_eq!(config.default_chain_id, "juno-1");
        assert!(config.registry_resolver().is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let config = WalletManagerConfig::from_json_str(
            r#"{
                "defaultChainId": "osmosis-1",
                "preferredWallet": "local",
                "registryUrl": "https://registry.example/",
                "chainNames": { "cosmoshub-4": "cosmoshub" },
                "chainInfoOverrides": {
                    "osmosis-1": { "rpc": "https://rpc.osmo.example" }
                }
            }"#,
        )
        .unwrap();

        assert_eq!(config.default_chain_id, "osmosis-1");
        assert_eq!(config.preferred_wallet.as_deref(), Some("local"));
        assert_eq!(
            config.chain_info_overrides["osmosis-1"].rpc.as_deref(),
            Some("https://rpc.osmo.example")
        );
        assert!(config.registry_resolver().is_some());
    }

    #[test]
    fn test_invalid_config() {
        let err = WalletManagerConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, WalletManagerError::Config(_)));

        let err = WalletManagerConfig::from_json_str(r#"{"defaultChainId": ""}"#).unwrap_err();
        assert!(matches!(err, WalletManagerError::Config(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = WalletManagerConfig::from_file("/nonexistent/wallet-manager.json").unwrap_err();
        assert!(matches!(err, WalletManagerError::Config(msg) if msg.contains("Failed to read")));
    }
}
