//! Test fixtures shared by unit tests

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

use crate::chain_info::StaticChainInfoResolver;
use crate::coordinator::ConnectionCoordinator;
use crate::error::WalletManagerError;
use crate::factory::{ConnectedWalletFactory, SigningClientFactory};
use crate::types::{
    ChainInfo, ConnectedWalletInfo, Currency, FeeCurrency, GasPriceStep,
    SigningCosmWasmClientOptions, SigningStargateClientOptions, WalletKey,
};
use crate::wallet::{LocalKeyWallet, WalletClient, WalletError, WalletProvider};

// Test private key (DO NOT USE IN PRODUCTION)
pub const TEST_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// Chain info for a fictional chain; the bech32 prefix is the chain ID
/// without dashes
pub fn test_chain(chain_id: &str) -> ChainInfo {
    let currency = Currency {
        coin_denom: "STAKE".to_string(),
        coin_minimal_denom: "ustake".to_string(),
        coin_decimals: 6,
    };

    ChainInfo {
        chain_id: chain_id.to_string(),
        chain_name: chain_id.to_string(),
        rpc: format!("https://rpc.{}.example", chain_id),
        rest: format!("https://lcd.{}.example", chain_id),
        bech32_prefix: chain_id.replace('-', ""),
        coin_type: 118,
        stake_currency: currency.clone(),
        fee_currencies: vec![FeeCurrency {
            currency,
            gas_price_step: Some(GasPriceStep {
                low: Decimal::new(1, 2),
                average: Decimal::new(25, 3),
                high: Decimal::new(4, 2),
            }),
        }],
        features: vec!["cosmwasm".to_string()],
    }
}

/// Resolver knowing `home-1`, `chain-a`, and `chain-b`
pub fn test_resolver() -> StaticChainInfoResolver {
    StaticChainInfoResolver::new()
        .with_chain(test_chain("home-1"))
        .with_chain(test_chain("chain-a"))
        .with_chain(test_chain("chain-b"))
}

pub fn local_wallet() -> Arc<dyn WalletProvider> {
    Arc::new(LocalKeyWallet::from_private_key(TEST_KEY).unwrap())
}

/// Coordinator on `home-1` with the local wallet and a recording factory
pub fn coordinator() -> (ConnectionCoordinator, Arc<RecordingFactory>) {
    coordinator_with(|c| c)
}

pub fn coordinator_with(
    customize: impl FnOnce(ConnectionCoordinator) -> ConnectionCoordinator,
) -> (ConnectionCoordinator, Arc<RecordingFactory>) {
    let factory = Arc::new(RecordingFactory::new());
    let coordinator = ConnectionCoordinator::new("home-1", Arc::new(test_resolver()), factory.clone())
        .with_wallet(local_wallet());
    (customize(coordinator), factory)
}

/// Factory that counts calls, can be held open, and can fail chosen chains
pub struct RecordingFactory {
    calls: watch::Sender<usize>,
    open: watch::Sender<bool>,
    failing: Mutex<HashSet<String>>,
    panicking: Mutex<HashSet<String>>,
}

impl RecordingFactory {
    pub fn new() -> Self {
        Self {
            calls: watch::channel(0).0,
            open: watch::channel(true).0,
            failing: Mutex::new(HashSet::new()),
            panicking: Mutex::new(HashSet::new()),
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.borrow()
    }

    /// Block derivations until [`release`](Self::release)
    pub fn hold(&self) {
        self.open.send_replace(false);
    }

    pub fn release(&self) {
        self.open.send_replace(true);
    }

    pub async fn wait_for_calls(&self, n: usize) {
        let mut rx = self.calls.subscribe();
        rx.wait_for(|calls| *calls >= n).await.unwrap();
    }

    pub fn fail_chain(&self, chain_id: &str) {
        self.failing.lock().unwrap().insert(chain_id.to_string());
    }

    pub fn panic_on_chain(&self, chain_id: &str) {
        self.panicking.lock().unwrap().insert(chain_id.to_string());
    }

    pub fn clear_failures(&self) {
        self.failing.lock().unwrap().clear();
        self.panicking.lock().unwrap().clear();
    }
}

#[async_trait]
impl ConnectedWalletFactory for RecordingFactory {
    async fn derive(
        &self,
        wallet: Arc<dyn WalletProvider>,
        wallet_client: Arc<dyn WalletClient>,
        chain_info: ChainInfo,
        cosmwasm_options: Option<SigningCosmWasmClientOptions>,
        stargate_options: Option<SigningStargateClientOptions>,
    ) -> Result<ConnectedWalletInfo, WalletManagerError> {
        self.calls.send_modify(|calls| *calls += 1);

        let mut open = self.open.subscribe();
        open.wait_for(|open| *open).await.unwrap();

        let panics = self.panicking.lock().unwrap().contains(&chain_info.chain_id);
        let fails = self.failing.lock().unwrap().contains(&chain_info.chain_id);

        if panics {
            panic!("factory exploded for {}", chain_info.chain_id);
        }
        if fails {
            return Err(WalletManagerError::derivation(
                &chain_info.chain_id,
                "unsupported chain",
            ));
        }

        SigningClientFactory
            .derive(
                wallet,
                wallet_client,
                chain_info,
                cosmwasm_options,
                stargate_options,
            )
            .await
    }
}

/// Wallet whose client refuses every request
pub struct RejectingWallet;

#[async_trait]
impl WalletProvider for RejectingWallet {
    fn id(&self) -> &str {
        "rejecting"
    }

    fn name(&self) -> &str {
        "Rejecting"
    }

    async fn get_client(&self) -> Result<Arc<dyn WalletClient>, WalletError> {
        Ok(Arc::new(RejectingClient))
    }
}

pub struct RejectingClient;

#[async_trait]
impl WalletClient for RejectingClient {
    async fn enable(&self, _chain_ids: &[String]) -> Result<(), WalletError> {
        Err(WalletError::Rejected("user declined".to_string()))
    }

    async fn get_key(&self, chain_id: &str) -> Result<WalletKey, WalletError> {
        Err(WalletError::ChainNotEnabled(chain_id.to_string()))
    }

    async fn get_accounts(&self, chain_id: &str) -> Result<Vec<String>, WalletError> {
        Err(WalletError::ChainNotEnabled(chain_id.to_string()))
    }
}

/// Wallet that is registered but not installed
pub struct UnavailableWallet;

#[async_trait]
impl WalletProvider for UnavailableWallet {
    fn id(&self) -> &str {
        "unavailable"
    }

    fn name(&self) -> &str {
        "Unavailable"
    }

    async fn get_client(&self) -> Result<Arc<dyn WalletClient>, WalletError> {
        Err(WalletError::Internal("extension not installed".to_string()))
    }
}
