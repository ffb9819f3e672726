//! Common types for the wallet manager
//!
//! Chain metadata, client construction options, and the connection values
//! handed out to consumers.

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::WalletManagerError;
use crate::wallet::{WalletClient, WalletProvider};

/// Status of a wallet connection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    ReadyForConnection,
    AttemptingAutoConnect,
    Connecting,
    Connected,
    Error,
    Resetting,
}

impl ConnectionStatus {
    /// Whether a connection attempt is underway
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            ConnectionStatus::AttemptingAutoConnect
                | ConnectionStatus::Connecting
                | ConnectionStatus::Resetting
        )
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionStatus::Disconnected => write!(f, "disconnected"),
            ConnectionStatus::ReadyForConnection => write!(f, "ready for connection"),
            ConnectionStatus::AttemptingAutoConnect => write!(f, "attempting auto-connect"),
            ConnectionStatus::Connecting => write!(f, "connecting"),
            ConnectionStatus::Connected => write!(f, "connected"),
            ConnectionStatus::Error => write!(f, "errored"),
            ConnectionStatus::Resetting => write!(f, "resetting"),
        }
    }
}

// =========================================================================
// Chain metadata
// =========================================================================

/// A currency known to a chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Currency {
    /// Display denom (e.g., "JUNO")
    pub coin_denom: String,
    /// On-chain denom (e.g., "ujuno")
    pub coin_minimal_denom: String,
    /// Decimal places between the two denoms
    pub coin_decimals: u8,
}

/// Gas price tiers for a fee currency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasPriceStep {
    pub low: Decimal,
    pub average: Decimal,
    pub high: Decimal,
}

/// A currency accepted for fees
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeCurrency {
    #[serde(flatten)]
    pub currency: Currency,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price_step: Option<GasPriceStep>,
}

/// Validated chain metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainInfo {
    pub chain_id: String,
    pub chain_name: String,
    /// Tendermint RPC endpoint
    pub rpc: String,
    /// LCD/REST endpoint
    pub rest: String,
    /// Bech32 account address prefix
    pub bech32_prefix: String,
    /// BIP44 coin type
    pub coin_type: u32,
    pub stake_currency: Currency,
    pub fee_currencies: Vec<FeeCurrency>,
    #[serde(default)]
    pub features: Vec<String>,
}

impl ChainInfo {
    /// Average gas price of the first fee currency, if the chain publishes one
    pub fn default_gas_price(&self) -> Option<GasPrice> {
        let fee = self.fee_currencies.first()?;
        let step = fee.gas_price_step.as_ref()?;
        Some(GasPrice {
            amount: step.average,
            denom: fee.currency.coin_minimal_denom.clone(),
        })
    }

    pub fn supports(&self, feature: &str) -> bool {
        self.features.iter().any(|f| f == feature)
    }
}

/// Partial chain metadata used to override or supply chain info
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PartialChainInfo {
    pub chain_name: Option<String>,
    pub rpc: Option<String>,
    pub rest: Option<String>,
    pub bech32_prefix: Option<String>,
    pub coin_type: Option<u32>,
    pub stake_currency: Option<Currency>,
    pub fee_currencies: Option<Vec<FeeCurrency>>,
    pub features: Option<Vec<String>>,
}

impl PartialChainInfo {
    /// Overlay the fields set here on top of `base`
    pub fn apply_to(&self, mut base: ChainInfo) -> ChainInfo {
        if let Some(name) = &self.chain_name {
            base.chain_name = name.clone();
        }
        if let Some(rpc) = &self.rpc {
            base.rpc = rpc.clone();
        }
        if let Some(rest) = &self.rest {
            base.rest = rest.clone();
        }
        if let Some(prefix) = &self.bech32_prefix {
            base.bech32_prefix = prefix.clone();
        }
        if let Some(coin_type) = self.coin_type {
            base.coin_type = coin_type;
        }
        if let Some(stake) = &self.stake_currency {
            base.stake_currency = stake.clone();
        }
        if let Some(fees) = &self.fee_currencies {
            base.fee_currencies = fees.clone();
        }
        if let Some(features) = &self.features {
            base.features = features.clone();
        }
        base
    }

    /// Build full chain info from this override alone
    ///
    /// Used when no base metadata exists for the chain. Fee currencies default
    /// to the staking currency and the coin type defaults to 118.
    pub fn into_chain_info(self, chain_id: &str) -> Result<ChainInfo, WalletManagerError> {
        let missing = |field: &str| {
            WalletManagerError::resolution(
                chain_id,
                format!("chain is unknown and its override is missing `{}`", field),
            )
        };

        let stake_currency = self.stake_currency.ok_or_else(|| missing("stakeCurrency"))?;
        let fee_currencies = self.fee_currencies.unwrap_or_else(|| {
            vec![FeeCurrency {
                currency: stake_currency.clone(),
                gas_price_step: None,
            }]
        });

        Ok(ChainInfo {
            chain_id: chain_id.to_string(),
            chain_name: self.chain_name.unwrap_or_else(|| chain_id.to_string()),
            rpc: self.rpc.ok_or_else(|| missing("rpc"))?,
            rest: self.rest.ok_or_else(|| missing("rest"))?,
            bech32_prefix: self.bech32_prefix.ok_or_else(|| missing("bech32Prefix"))?,
            coin_type: self.coin_type.unwrap_or(118),
            stake_currency,
            fee_currencies,
            features: self.features.unwrap_or_default(),
        })
    }
}

/// Application-owned chain metadata overrides, keyed by chain ID
pub type ChainInfoOverrides = HashMap<String, PartialChainInfo>;

// =========================================================================
// Client construction options
// =========================================================================

/// A gas price such as `0.025ujuno`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasPrice {
    pub amount: Decimal,
    pub denom: String,
}

impl FromStr for GasPrice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (amount, denom) = split_amount(s);

        if amount.is_empty() {
            return Err(format!("Gas price has no amount: {}", s));
        }
        if !denom.starts_with(|c: char| c.is_ascii_alphabetic()) {
            return Err(format!("Gas price has no denom: {}", s));
        }

        let parsed = if amount.contains(['e', 'E']) {
            Decimal::from_scientific(amount)
        } else {
            Decimal::from_str(amount)
        };
        let amount =
            parsed.map_err(|e| format!("Invalid gas price amount {}: {}", amount, e))?;
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(format!("Gas price must not be negative: {}", s));
        }

        Ok(GasPrice {
            amount,
            denom: denom.to_string(),
        })
    }
}

/// Split "<amount><denom>" where the amount may use an exponent ("1e-3ujuno")
fn split_amount(s: &str) -> (&str, &str) {
    let bytes = s.as_bytes();
    let mut end = bytes
        .iter()
        .position(|b| !(b.is_ascii_digit() || matches!(b, b'.' | b'-' | b'+')))
        .unwrap_or(bytes.len());

    // An exponent marker only counts when digits follow it
    if end > 0 && matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'-' | b'+')) {
            exp += 1;
        }
        let digits = bytes[exp.min(bytes.len())..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count();
        if digits > 0 {
            end = exp + digits;
        }
    }

    s.split_at(end)
}

impl std::fmt::Display for GasPrice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

/// Construction options for a CosmWasm-capable signing client
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningCosmWasmClientOptions {
    pub gas_price: Option<GasPrice>,
    pub broadcast_timeout_ms: Option<u64>,
    pub broadcast_poll_interval_ms: Option<u64>,
}

/// Construction options for a Stargate signing client
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningStargateClientOptions {
    pub gas_price: Option<GasPrice>,
    pub broadcast_timeout_ms: Option<u64>,
    pub broadcast_poll_interval_ms: Option<u64>,
}

/// Produces per-chain client options, asynchronously
pub type ClientOptionsProvider<T> =
    Arc<dyn Fn(ChainInfo) -> BoxFuture<'static, Option<T>> + Send + Sync>;

/// Wrap an async closure as a [`ClientOptionsProvider`]
pub fn options_provider<T, F, Fut>(f: F) -> ClientOptionsProvider<T>
where
    F: Fn(ChainInfo) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Option<T>> + Send + 'static,
{
    Arc::new(move |chain_info| Box::pin(f(chain_info)))
}

// =========================================================================
// Connections
// =========================================================================

/// Key material a wallet client reports for one chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletKey {
    /// Human-readable account name
    pub name: String,
    /// Compressed secp256k1 public key
    pub pub_key: Vec<u8>,
    /// Bech32 address on the chain
    pub bech32_address: String,
}

/// A public key in raw and hex form
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublicKey {
    pub data: Vec<u8>,
    pub hex: String,
}

impl PublicKey {
    pub fn new(data: Vec<u8>) -> Self {
        let hex = hex::encode(&data);
        Self { data, hex }
    }
}

/// Signing client bound to one chain, signer, and option set
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SigningClient<O> {
    pub chain_id: String,
    pub rpc_endpoint: String,
    pub signer_address: String,
    pub gas_price: Option<GasPrice>,
    pub options: Option<O>,
}

pub type SigningCosmWasmClient = SigningClient<SigningCosmWasmClientOptions>;
pub type SigningStargateClient = SigningClient<SigningStargateClientOptions>;

/// A successful binding of a wallet to one chain
pub struct ConnectedWalletInfo {
    pub wallet: Arc<dyn WalletProvider>,
    pub wallet_client: Arc<dyn WalletClient>,
    pub chain_info: ChainInfo,
    /// Account name reported by the wallet
    pub name: String,
    pub address: String,
    pub public_key: PublicKey,
    pub signing_cosmwasm_client: SigningCosmWasmClient,
    pub signing_stargate_client: SigningStargateClient,
    pub connected_at: DateTime<Utc>,
}

impl ConnectedWalletInfo {
    pub fn chain_id(&self) -> &str {
        &self.chain_info.chain_id
    }
}

impl std::fmt::Debug for ConnectedWalletInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectedWalletInfo")
            .field("wallet", &self.wallet.id())
            .field("chain_id", &self.chain_info.chain_id)
            .field("name", &self.name)
            .field("address", &self.address)
            .finish()
    }
}

/// What a consumer sees for one (optional) chain
#[derive(Debug, Clone)]
pub struct WalletConnection {
    pub status: ConnectionStatus,
    pub connected: bool,
    pub error: Option<WalletManagerError>,
    pub wallet: Option<Arc<ConnectedWalletInfo>>,
}

impl WalletConnection {
    pub fn address(&self) -> Option<&str> {
        self.wallet.as_deref().map(|w| w.address.as_str())
    }

    pub fn chain_info(&self) -> Option<&ChainInfo> {
        self.wallet.as_deref().map(|w| &w.chain_info)
    }

    pub fn signing_cosmwasm_client(&self) -> Option<&SigningCosmWasmClient> {
        self.wallet.as_deref().map(|w| &w.signing_cosmwasm_client)
    }

    pub fn signing_stargate_client(&self) -> Option<&SigningStargateClient> {
        self.wallet.as_deref().map(|w| &w.signing_stargate_client)
    }
}

impl PartialEq for WalletConnection {
    fn eq(&self, other: &Self) -> bool {
        let same_wallet = match (&self.wallet, &other.wallet) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        self.status == other.status
            && self.connected == other.connected
            && self.error == other.error
            && same_wallet
    }
}
