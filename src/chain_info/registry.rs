//! Chain Registry Resolver
//!
//! Fetches chain metadata from a cosmos chain-registry mirror
//! (`<base>/<chain_name>/chain.json`) and memoises it per chain ID.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{apply_overrides, ChainInfoResolver};
use crate::error::WalletManagerError;
use crate::types::{ChainInfo, ChainInfoOverrides, Currency, FeeCurrency, GasPriceStep};

pub const CHAIN_REGISTRY_URL: &str =
    "https://raw.githubusercontent.com/cosmos/chain-registry/master";

/// Resolver that reads the cosmos chain registry over HTTP
pub struct RegistryChainInfoResolver {
    client: reqwest::Client,
    base_url: String,
    /// chain ID -> registry directory name
    chain_names: HashMap<String, String>,
    /// Fetched metadata, before overrides
    cache: RwLock<HashMap<String, ChainInfo>>,
}

impl RegistryChainInfoResolver {
    /// Create a resolver against the public chain registry
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: CHAIN_REGISTRY_URL.to_string(),
            chain_names: HashMap::new(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Use a different registry mirror
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Map a chain ID to its registry directory when the default guess is wrong
    pub fn with_chain_name(mut self, chain_id: &str, chain_name: &str) -> Self {
        self.chain_names
            .insert(chain_id.to_string(), chain_name.to_string());
        self
    }

    /// Registry directory for a chain ID
    ///
    /// Falls back to the chain ID without its revision suffix:
    /// "juno-1" -> "juno", "cosmoshub-4" -> "cosmoshub".
    fn chain_name(&self, chain_id: &str) -> String {
        if let Some(name) = self.chain_names.get(chain_id) {
            return name.clone();
        }

        match chain_id.rsplit_once('-') {
            Some((name, revision))
                if !name.is_empty() && revision.chars().all(|c| c.is_ascii_digit()) =>
            {
                name.to_string()
            }
            _ => chain_id.to_string(),
        }
    }

    fn chain_url(&self, chain_id: &str) -> String {
        format!("{}/{}/chain.json", self.base_url, self.chain_name(chain_id))
    }

    async fn fetch(&self, chain_id: &str) -> Result<ChainInfo, WalletManagerError> {
        if let Some(info) = self.cache.read().await.get(chain_id) {
            return Ok(info.clone());
        }

        let url = self.chain_url(chain_id);
        debug!("Fetching chain registry entry {}", url);

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| WalletManagerError::resolution(chain_id, e.to_string()))?;
        let body = resp
            .text()
            .await
            .map_err(|e| WalletManagerError::resolution(chain_id, e.to_string()))?;

        let info = parse_registry_chain(chain_id, &body)?;
        info!("Loaded chain {} from registry", chain_id);

        self.cache
            .write()
            .await
            .insert(chain_id.to_string(), info.clone());
        Ok(info)
    }
}

impl Default for RegistryChainInfoResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChainInfoResolver for RegistryChainInfoResolver {
    async fn resolve(
        &self,
        chain_id: &str,
        overrides: &ChainInfoOverrides,
    ) -> Result<ChainInfo, WalletManagerError> {
        match self.fetch(chain_id).await {
            Ok(info) => apply_overrides(chain_id, Some(info), overrides),
            // A complete override can stand in for a missing registry entry
            Err(e) if overrides.contains_key(chain_id) => {
                debug!("Registry lookup for {} failed, using override: {}", chain_id, e);
                apply_overrides(chain_id, None, overrides).map_err(|override_err| {
                    match (e, override_err) {
                        (
                            WalletManagerError::ChainResolution { chain_id, reason },
                            WalletManagerError::ChainResolution {
                                reason: override_reason,
                                ..
                            },
                        ) => WalletManagerError::ChainResolution {
                            chain_id,
                            reason: format!("{} (override alone: {})", reason, override_reason),
                        },
                        (e, _) => e,
                    }
                })
            }
            Err(e) => Err(e),
        }
    }
}

// =========================================================================
// Registry JSON
// =========================================================================

#[derive(Debug, Deserialize)]
struct RegistryChain {
    chain_id: String,
    #[serde(default)]
    pretty_name: Option<String>,
    chain_name: String,
    bech32_prefix: String,
    #[serde(default = "default_slip44")]
    slip44: u32,
    #[serde(default)]
    fees: RegistryFees,
    #[serde(default)]
    staking: RegistryStaking,
    #[serde(default)]
    apis: RegistryApis,
    #[serde(default)]
    codebase: RegistryCodebase,
}

fn default_slip44() -> u32 {
    118
}

#[derive(Debug, Default, Deserialize)]
struct RegistryFees {
    #[serde(default)]
    fee_tokens: Vec<RegistryFeeToken>,
}

#[derive(Debug, Deserialize)]
struct RegistryFeeToken {
    denom: String,
    low_gas_price: Option<Decimal>,
    average_gas_price: Option<Decimal>,
    high_gas_price: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize)]
struct RegistryStaking {
    #[serde(default)]
    staking_tokens: Vec<RegistryDenom>,
}

#[derive(Debug, Deserialize)]
struct RegistryDenom {
    denom: String,
}

#[derive(Debug, Default, Deserialize)]
struct RegistryApis {
    #[serde(default)]
    rpc: Vec<RegistryEndpoint>,
    #[serde(default)]
    rest: Vec<RegistryEndpoint>,
}

#[derive(Debug, Deserialize)]
struct RegistryEndpoint {
    address: String,
}

#[derive(Debug, Default, Deserialize)]
struct RegistryCodebase {
    #[serde(default)]
    cosmwasm_enabled: bool,
}

/// Registry JSON does not carry display denoms or decimals; assume the
/// micro-denom convention ("uatom" -> "ATOM", 6 decimals).
fn currency_for(denom: &str) -> Currency {
    let display = denom
        .strip_prefix('u')
        .filter(|rest| !rest.is_empty())
        .unwrap_or(denom);

    Currency {
        coin_denom: display.to_uppercase(),
        coin_minimal_denom: denom.to_string(),
        coin_decimals: 6,
    }
}

/// Convert a registry `chain.json` document into chain info
pub fn parse_registry_chain(chain_id: &str, body: &str) -> Result<ChainInfo, WalletManagerError> {
    let chain: RegistryChain = serde_json::from_str(body)
        .map_err(|e| WalletManagerError::resolution(chain_id, format!("invalid registry entry: {}", e)))?;

    if chain.chain_id != chain_id {
        return Err(WalletManagerError::resolution(
            chain_id,
            format!("registry entry is for {}", chain.chain_id),
        ));
    }

    let endpoint = |list: &[RegistryEndpoint], kind: &str| {
        list.first()
            .map(|e| e.address.clone())
            .ok_or_else(|| WalletManagerError::resolution(chain_id, format!("no {} endpoints", kind)))
    };

    let fee_currencies: Vec<FeeCurrency> = chain
        .fees
        .fee_tokens
        .iter()
        .map(|token| FeeCurrency {
            currency: currency_for(&token.denom),
            gas_price_step: match (token.low_gas_price, token.average_gas_price, token.high_gas_price) {
                (Some(low), Some(average), Some(high)) => Some(GasPriceStep { low, average, high }),
                _ => None,
            },
        })
        .collect();

    let stake_currency = chain
        .staking
        .staking_tokens
        .first()
        .map(|t| currency_for(&t.denom))
        .or_else(|| fee_currencies.first().map(|f| f.currency.clone()))
        .ok_or_else(|| WalletManagerError::resolution(chain_id, "no staking or fee tokens"))?;

    let mut features = vec!["ibc-transfer".to_string()];
    if chain.codebase.cosmwasm_enabled {
        features.push("cosmwasm".to_string());
    }

    Ok(ChainInfo {
        chain_id: chain.chain_id,
        chain_name: chain.pretty_name.unwrap_or(chain.chain_name),
        rpc: endpoint(&chain.apis.rpc, "rpc")?,
        rest: endpoint(&chain.apis.rest, "rest")?,
        bech32_prefix: chain.bech32_prefix,
        coin_type: chain.slip44,
        stake_currency,
        fee_currencies,
        features,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const JUNO_CHAIN_JSON: &str = r#"{
        "chain_name": "juno",
        "chain_id": "juno-1",
        "pretty_name": "Juno",
        "bech32_prefix": "juno",
        "slip44": 118,
        "fees": {
            "fee_tokens": [{
                "denom": "ujuno",
                "fixed_min_gas_price": 0.075,
                "low_gas_price": 0.075,
                "average_gas_price": 0.1,
                "high_gas_price": 0.25
            }]
        },
        "staking": { "staking_tokens": [{ "denom": "ujuno" }] },
        "codebase": { "cosmwasm_enabled": true },
        "apis": {
            "rpc": [{ "address": "https://rpc-juno.itastakers.com", "provider": "itastakers" }],
            "rest": [{ "address": "https://lcd-juno.itastakers.com", "provider": "itastakers" }]
        }
    }"#;

    #[test]
    fn test_parse_registry_chain() {
        let info = parse_registry_chain("juno-1", JUNO_CHAIN_JSON).unwrap();

        assert_eq!(info.chain_name, "Juno");
        assert_eq!(info.rpc, "https://rpc-juno.itastakers.com");
        assert_eq!(info.stake_currency.coin_denom, "JUNO");
        assert!(info.supports("cosmwasm"));
        assert_eq!(info.default_gas_price().unwrap().to_string(), "0.1ujuno");
    }

    #[test]
    fn test_parse_rejects_mismatched_chain_id() {
        let err = parse_registry_chain("juno-2", JUNO_CHAIN_JSON).unwrap_err();
        assert!(err.to_string().contains("registry entry is for juno-1"));
    }

    #[test]
    fn test_parse_requires_endpoints() {
        let body = r#"{"chain_name":"x","chain_id":"x-1","bech32_prefix":"x",
            "staking":{"staking_tokens":[{"denom":"ux"}]}}"#;
        let err = parse_registry_chain("x-1", body).unwrap_err();
        assert!(err.to_string().contains("no rpc endpoints"));
    }

    #[test]
    fn test_chain_name_guess() {
        let resolver = RegistryChainInfoResolver::new().with_chain_name("phoenix-1", "terra2");

        assert_eq!(resolver.chain_name("juno-1"), "juno");
        assert_eq!(resolver.chain_name("cosmoshub-4"), "cosmoshub");
        assert_eq!(resolver.chain_name("phoenix-1"), "terra2");
        assert_eq!(resolver.chain_name("dydx-mainnet-1"), "dydx-mainnet");
        assert_eq!(resolver.chain_name("localnet"), "localnet");
    }

    #[test]
    fn test_chain_url() {
        let resolver = RegistryChainInfoResolver::new().with_base_url("http://localhost:8080/");
        assert_eq!(
            resolver.chain_url("osmosis-1"),
            "http://localhost:8080/osmosis/chain.json"
        );
    }

    #[test]
    fn test_currency_for() {
        assert_eq!(currency_for("uosmo").coin_denom, "OSMO");
        assert_eq!(currency_for("inj").coin_denom, "INJ");
        assert_eq!(currency_for("u").coin_denom, "U");
    }

    #[tokio::test]
    async fn test_unreachable_registry_falls_back_to_override() {
        use crate::types::PartialChainInfo;

        let resolver = RegistryChainInfoResolver::new().with_base_url("http://127.0.0.1:9");
        let mut overrides = ChainInfoOverrides::new();
        overrides.insert(
            "local-1".to_string(),
            PartialChainInfo {
                rpc: Some("http://127.0.0.1:26657".to_string()),
                rest: Some("http://127.0.0.1:1317".to_string()),
                bech32_prefix: Some("wasm".to_string()),
                stake_currency: Some(currency_for("ustake")),
                ..Default::default()
            },
        );

        let info = resolver.resolve("local-1", &overrides).await.unwrap();
        assert_eq!(info.bech32_prefix, "wasm");

        let err = resolver
            .resolve("other-1", &ChainInfoOverrides::new())
            .await
            .unwrap_err();
        assert!(matches!(err, WalletManagerError::ChainResolution { .. }));
    }

    #[tokio::test]
    async fn test_partial_override_keeps_registry_error() {
        use crate::types::PartialChainInfo;

        let resolver = RegistryChainInfoResolver::new().with_base_url("http://127.0.0.1:9");
        let mut overrides = ChainInfoOverrides::new();
        overrides.insert(
            "juno-1".to_string(),
            PartialChainInfo {
                rpc: Some("https://rpc.juno.example".to_string()),
                ..Default::default()
            },
        );

        let err = resolver.resolve("juno-1", &overrides).await.unwrap_err();
        let WalletManagerError::ChainResolution { chain_id, reason } = err else {
            panic!("unexpected error: {:?}", err);
        };
        assert_eq!(chain_id, "juno-1");
        // The network failure names the registry URL it tried
        assert!(reason.contains("127.0.0.1:9"), "{}", reason);
        assert!(reason.contains("override alone"), "{}", reason);
    }
}
