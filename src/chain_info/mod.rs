//! Chain metadata resolution
//!
//! Resolvers turn a chain ID plus the application's override table into
//! validated [`ChainInfo`]. Overrides take precedence over whatever the
//! resolver knows; an override alone is enough for chains the resolver has
//! never heard of, as long as it is complete.

pub mod registry;

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::error::WalletManagerError;
use crate::types::{ChainInfo, ChainInfoOverrides, Currency, FeeCurrency, GasPriceStep};

pub use registry::RegistryChainInfoResolver;

/// Resolves chain metadata for a chain ID
#[async_trait]
pub trait ChainInfoResolver: Send + Sync {
    async fn resolve(
        &self,
        chain_id: &str,
        overrides: &ChainInfoOverrides,
    ) -> Result<ChainInfo, WalletManagerError>;
}

/// Merge `base` with the override for `chain_id` and validate the result
pub fn apply_overrides(
    chain_id: &str,
    base: Option<ChainInfo>,
    overrides: &ChainInfoOverrides,
) -> Result<ChainInfo, WalletManagerError> {
    let info = match (base, overrides.get(chain_id)) {
        (Some(base), Some(patch)) => patch.apply_to(base),
        (Some(base), None) => base,
        (None, Some(patch)) => patch.clone().into_chain_info(chain_id)?,
        (None, None) => {
            return Err(WalletManagerError::resolution(
                chain_id,
                "chain ID does not exist among known chains or overrides",
            ))
        }
    };

    validate(&info)?;
    Ok(info)
}

/// Check that chain info is usable for building signing clients
pub fn validate(info: &ChainInfo) -> Result<(), WalletManagerError> {
    let fail = |reason: String| Err(WalletManagerError::resolution(&info.chain_id, reason));

    if info.chain_id.trim().is_empty() {
        return fail("chain ID is empty".to_string());
    }
    for (field, url) in [("rpc", &info.rpc), ("rest", &info.rest)] {
        if let Err(e) = reqwest::Url::parse(url) {
            return fail(format!("invalid {} endpoint {:?}: {}", field, url, e));
        }
    }
    if info.bech32_prefix.is_empty()
        || !info.bech32_prefix.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
    {
        return fail(format!("invalid bech32 prefix {:?}", info.bech32_prefix));
    }
    if info.fee_currencies.is_empty() {
        return fail("no fee currencies".to_string());
    }
    if let Some(step) = info
        .fee_currencies
        .iter()
        .filter_map(|f| f.gas_price_step.as_ref())
        .find(|s| !(s.low <= s.average && s.average <= s.high))
    {
        return fail(format!(
            "gas price step out of order: {} / {} / {}",
            step.low, step.average, step.high
        ));
    }

    Ok(())
}

/// Resolver backed by an in-memory table of known chains
#[derive(Debug, Clone, Default)]
pub struct StaticChainInfoResolver {
    chains: HashMap<String, ChainInfo>,
}

impl StaticChainInfoResolver {
    /// Create an empty resolver; only overrides will resolve
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a resolver preloaded with well-known mainnets
    pub fn with_known_chains() -> Self {
        known_chains()
            .into_iter()
            .fold(Self::new(), |resolver, info| resolver.with_chain(info))
    }

    /// Add or replace a chain
    pub fn with_chain(mut self, info: ChainInfo) -> Self {
        self.chains.insert(info.chain_id.clone(), info);
        self
    }

    /// Known chain IDs, sorted
    pub fn chain_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.chains.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

#[async_trait]
impl ChainInfoResolver for StaticChainInfoResolver {
    async fn resolve(
        &self,
        chain_id: &str,
        overrides: &ChainInfoOverrides,
    ) -> Result<ChainInfo, WalletManagerError> {
        apply_overrides(chain_id, self.chains.get(chain_id).cloned(), overrides)
    }
}

#[allow(clippy::too_many_arguments)]
fn cosmos_chain(
    chain_id: &str,
    chain_name: &str,
    rpc: &str,
    rest: &str,
    prefix: &str,
    symbol: &str,
    denom: &str,
    gas: (i64, i64, i64),
    features: &[&str],
) -> ChainInfo {
    let currency = Currency {
        coin_denom: symbol.to_string(),
        coin_minimal_denom: denom.to_string(),
        coin_decimals: 6,
    };

    // Gas prices are given in ten-thousandths
    let (low, average, high) = gas;

    ChainInfo {
        chain_id: chain_id.to_string(),
        chain_name: chain_name.to_string(),
        rpc: rpc.to_string(),
        rest: rest.to_string(),
        bech32_prefix: prefix.to_string(),
        coin_type: 118,
        stake_currency: currency.clone(),
        fee_currencies: vec![FeeCurrency {
            currency,
            gas_price_step: Some(GasPriceStep {
                low: Decimal::new(low, 4),
                average: Decimal::new(average, 4),
                high: Decimal::new(high, 4),
            }),
        }],
        features: features.iter().map(|f| f.to_string()).collect(),
    }
}

/// Chains resolvable without any overrides
pub fn known_chains() -> Vec<ChainInfo> {
    vec![
        cosmos_chain(
            "cosmoshub-4",
            "Cosmos Hub",
            "https://cosmos-rpc.polkachu.com",
            "https://cosmos-api.polkachu.com",
            "cosmos",
            "ATOM",
            "uatom",
            (100, 250, 300),
            &["ibc-transfer", "ibc-go"],
        ),
        cosmos_chain(
            "juno-1",
            "Juno",
            "https://juno-rpc.polkachu.com",
            "https://juno-api.polkachu.com",
            "juno",
            "JUNO",
            "ujuno",
            (750, 1000, 2500),
            &["cosmwasm", "ibc-transfer", "ibc-go"],
        ),
        cosmos_chain(
            "osmosis-1",
            "Osmosis",
            "https://osmosis-rpc.polkachu.com",
            "https://osmosis-api.polkachu.com",
            "osmo",
            "OSMO",
            "uosmo",
            (25, 250, 400),
            &["cosmwasm", "ibc-transfer", "ibc-go"],
        ),
        cosmos_chain(
            "stargaze-1",
            "Stargaze",
            "https://stargaze-rpc.polkachu.com",
            "https://stargaze-api.polkachu.com",
            "stars",
            "STARS",
            "ustars",
            (10000, 11000, 12000),
            &["cosmwasm", "ibc-transfer", "ibc-go"],
        ),
    ]
}
