//! Connection Coordinator
//!
//! Owns the primary wallet connection, the connection status state machine,
//! and the per-chain cache of derived connections. State is published through
//! a `tokio::sync::watch` channel so views can react to every change.
//!
//! Primary state machine:
//!
//! ```text
//! Disconnected -> ReadyForConnection          (initialize)
//! Disconnected | ReadyForConnection | Error -> Connecting -> Connected | Error
//! Disconnected | ReadyForConnection -> AttemptingAutoConnect -> Connected | Error
//! Connected -> Connecting -> Connected | Error                  (reconnect)
//! any -> Disconnected                                           (disconnect)
//! any -> Resetting -> Disconnected                              (reset)
//! ```

use futures_util::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::chain_info::ChainInfoResolver;
use crate::config::WalletManagerConfig;
use crate::derivation::Derivation;
use crate::error::WalletManagerError;
use crate::factory::ConnectedWalletFactory;
use crate::types::{
    ChainInfoOverrides, ClientOptionsProvider, ConnectedWalletInfo, ConnectionStatus,
    SigningCosmWasmClientOptions, SigningStargateClientOptions,
};
use crate::wallet::WalletProvider;

/// Snapshot of coordinator state
#[derive(Debug, Clone, Default)]
pub struct CoordinatorState {
    pub status: ConnectionStatus,
    /// Last primary connection error
    pub error: Option<WalletManagerError>,
    /// Primary connection, bound to the default chain
    pub connected_wallet: Option<Arc<ConnectedWalletInfo>>,
    /// Derived connections keyed by chain ID
    pub connected_wallets: HashMap<String, Arc<ConnectedWalletInfo>>,
    pub chain_info_overrides: Arc<ChainInfoOverrides>,
    /// Bumped whenever the override table is replaced
    pub overrides_version: u64,
    /// Bumped whenever the primary wallet session is replaced or torn down
    pub session: u64,
}

impl CoordinatorState {
    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected && self.connected_wallet.is_some()
    }

    /// Drop the primary connection and everything derived from it
    fn tear_down(&mut self) {
        self.connected_wallet = None;
        self.connected_wallets.clear();
        self.session += 1;
    }
}

/// Coordinates the primary wallet connection and derived chain connections
pub struct ConnectionCoordinator {
    default_chain_id: String,
    wallets: Vec<Arc<dyn WalletProvider>>,
    resolver: Arc<dyn ChainInfoResolver>,
    factory: Arc<dyn ConnectedWalletFactory>,
    cosmwasm_options: Option<ClientOptionsProvider<SigningCosmWasmClientOptions>>,
    stargate_options: Option<ClientOptionsProvider<SigningStargateClientOptions>>,
    state: watch::Sender<CoordinatorState>,
    /// Identifies the latest primary connection attempt
    attempt: AtomicU64,
}

impl ConnectionCoordinator {
    /// Create a coordinator for `default_chain_id`
    pub fn new(
        default_chain_id: &str,
        resolver: Arc<dyn ChainInfoResolver>,
        factory: Arc<dyn ConnectedWalletFactory>,
    ) -> Self {
        let (state, _) = watch::channel(CoordinatorState::default());

        Self {
            default_chain_id: default_chain_id.to_string(),
            wallets: Vec::new(),
            resolver,
            factory,
            cosmwasm_options: None,
            stargate_options: None,
            state,
            attempt: AtomicU64::new(0),
        }
    }

    /// Create a coordinator from configuration
    pub fn from_config(
        config: &WalletManagerConfig,
        resolver: Arc<dyn ChainInfoResolver>,
        factory: Arc<dyn ConnectedWalletFactory>,
    ) -> Self {
        Self::new(&config.default_chain_id, resolver, factory)
            .with_chain_info_overrides(config.chain_info_overrides.clone())
    }

    /// Register a wallet the user can choose
    pub fn with_wallet(mut self, wallet: Arc<dyn WalletProvider>) -> Self {
        self.wallets.push(wallet);
        self
    }

    pub fn with_chain_info_overrides(self, overrides: ChainInfoOverrides) -> Self {
        self.state
            .send_modify(|s| s.chain_info_overrides = Arc::new(overrides));
        self
    }

    pub fn with_cosmwasm_options(
        mut self,
        provider: ClientOptionsProvider<SigningCosmWasmClientOptions>,
    ) -> Self {
        self.cosmwasm_options = Some(provider);
        self
    }

    pub fn with_stargate_options(
        mut self,
        provider: ClientOptionsProvider<SigningStargateClientOptions>,
    ) -> Self {
        self.stargate_options = Some(provider);
        self
    }

    // =========================================================================
    // Read-only exposure
    // =========================================================================

    pub fn default_chain_id(&self) -> &str {
        &self.default_chain_id
    }

    /// Registered wallets
    pub fn wallets(&self) -> &[Arc<dyn WalletProvider>] {
        &self.wallets
    }

    /// Full state snapshot
    pub fn state(&self) -> CoordinatorState {
        self.state.borrow().clone()
    }

    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&CoordinatorState) -> R) -> R {
        f(&self.state.borrow())
    }

    /// Receive a notification on every state change
    pub fn subscribe(&self) -> watch::Receiver<CoordinatorState> {
        self.state.subscribe()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.with_state(|s| s.status)
    }

    pub fn error(&self) -> Option<WalletManagerError> {
        self.with_state(|s| s.error.clone())
    }

    pub fn connected_wallet(&self) -> Option<Arc<ConnectedWalletInfo>> {
        self.with_state(|s| s.connected_wallet.clone())
    }

    /// Cached connection for `chain_id`
    pub fn connected_wallet_for(&self, chain_id: &str) -> Option<Arc<ConnectedWalletInfo>> {
        self.with_state(|s| s.connected_wallets.get(chain_id).cloned())
    }

    pub fn connected_wallets(&self) -> HashMap<String, Arc<ConnectedWalletInfo>> {
        self.with_state(|s| s.connected_wallets.clone())
    }

    pub fn chain_info_overrides(&self) -> Arc<ChainInfoOverrides> {
        self.with_state(|s| s.chain_info_overrides.clone())
    }

    pub fn cosmwasm_options_provider(
        &self,
    ) -> Option<&ClientOptionsProvider<SigningCosmWasmClientOptions>> {
        self.cosmwasm_options.as_ref()
    }

    pub fn stargate_options_provider(
        &self,
    ) -> Option<&ClientOptionsProvider<SigningStargateClientOptions>> {
        self.stargate_options.as_ref()
    }

    /// Derivation pipeline using the current overrides and option providers
    pub fn derivation(&self) -> Derivation {
        Derivation {
            resolver: self.resolver.clone(),
            factory: self.factory.clone(),
            overrides: self.chain_info_overrides(),
            cosmwasm_options: self.cosmwasm_options.clone(),
            stargate_options: self.stargate_options.clone(),
        }
    }

    // =========================================================================
    // Primary lifecycle
    // =========================================================================

    /// Mark the coordinator ready once at least one wallet is registered
    pub fn initialize(&self) -> ConnectionStatus {
        let ready = !self.wallets.is_empty();
        self.state.send_if_modified(|s| {
            if ready && s.status == ConnectionStatus::Disconnected {
                s.status = ConnectionStatus::ReadyForConnection;
                true
            } else {
                false
            }
        });
        self.status()
    }

    /// Connect to the wallet identified by `wallet_id`
    pub async fn connect(
        &self,
        wallet_id: &str,
    ) -> Result<Arc<ConnectedWalletInfo>, WalletManagerError> {
        let wallet = self.find_wallet(wallet_id)?;
        self.handshake(
            wallet,
            ConnectionStatus::Connecting,
            &[
                ConnectionStatus::Disconnected,
                ConnectionStatus::ReadyForConnection,
                ConnectionStatus::Error,
            ],
            "connect",
        )
        .await
    }

    /// Connect to a remembered wallet choice without user interaction
    pub async fn auto_connect(
        &self,
        wallet_id: &str,
    ) -> Result<Arc<ConnectedWalletInfo>, WalletManagerError> {
        let wallet = self.find_wallet(wallet_id)?;
        self.handshake(
            wallet,
            ConnectionStatus::AttemptingAutoConnect,
            &[
                ConnectionStatus::Disconnected,
                ConnectionStatus::ReadyForConnection,
            ],
            "auto-connect",
        )
        .await
    }

    /// Re-run the handshake with the connected wallet, e.g. after the user
    /// switched accounts inside it
    pub async fn reconnect(&self) -> Result<Arc<ConnectedWalletInfo>, WalletManagerError> {
        let wallet = self
            .with_state(|s| s.connected_wallet.as_ref().map(|w| w.wallet.clone()))
            .ok_or(WalletManagerError::NotConnected)?;
        self.handshake(
            wallet,
            ConnectionStatus::Connecting,
            &[ConnectionStatus::Connected],
            "reconnect",
        )
        .await
    }

    /// Tear down the primary connection and clear the cache
    pub fn disconnect(&self) {
        self.state.send_modify(|s| {
            self.attempt.fetch_add(1, Ordering::SeqCst);
            s.tear_down();
            s.status = ConnectionStatus::Disconnected;
            s.error = None;
        });
        info!("Wallet disconnected");
    }

    /// Handle unrecoverable provider loss
    pub fn reset(&self) {
        warn!("Resetting wallet connection");
        self.state.send_modify(|s| {
            self.attempt.fetch_add(1, Ordering::SeqCst);
            s.tear_down();
            s.status = ConnectionStatus::Resetting;
        });
        self.state.send_modify(|s| {
            s.status = ConnectionStatus::Disconnected;
            s.error = None;
        });
    }

    /// Replace the chain info override table
    pub fn set_chain_info_overrides(&self, overrides: ChainInfoOverrides) {
        self.state.send_modify(|s| {
            s.chain_info_overrides = Arc::new(overrides);
            s.overrides_version += 1;
        });
    }

    // =========================================================================
    // Cache
    // =========================================================================

    /// Insert or replace the cached connection for `chain_id`
    pub fn add_connected_wallet(&self, chain_id: &str, info: Arc<ConnectedWalletInfo>) {
        debug!("Caching connection for {}", chain_id);
        self.state.send_modify(|s| {
            s.connected_wallets.insert(chain_id.to_string(), info);
        });
    }

    /// Cache `info` only if the primary session `session` is still live
    ///
    /// Returns whether the entry was written.
    pub fn add_connected_wallet_in_session(
        &self,
        session: u64,
        chain_id: &str,
        info: Arc<ConnectedWalletInfo>,
    ) -> bool {
        self.state.send_if_modified(|s| {
            if s.session != session || !s.is_connected() {
                return false;
            }
            s.connected_wallets.insert(chain_id.to_string(), info);
            true
        })
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn find_wallet(&self, wallet_id: &str) -> Result<Arc<dyn WalletProvider>, WalletManagerError> {
        self.wallets
            .iter()
            .find(|w| w.id() == wallet_id)
            .cloned()
            .ok_or_else(|| WalletManagerError::UnknownWallet(wallet_id.to_string()))
    }

    async fn handshake(
        &self,
        wallet: Arc<dyn WalletProvider>,
        pending: ConnectionStatus,
        allowed_from: &[ConnectionStatus],
        action: &'static str,
    ) -> Result<Arc<ConnectedWalletInfo>, WalletManagerError> {
        let mut rejected = None;
        let mut attempt = 0;
        self.state.send_if_modified(|s| {
            if !allowed_from.contains(&s.status) {
                rejected = Some(s.status);
                return false;
            }
            attempt = self.attempt.fetch_add(1, Ordering::SeqCst) + 1;
            s.tear_down();
            s.status = pending;
            s.error = None;
            true
        });
        if let Some(status) = rejected {
            return Err(WalletManagerError::InvalidState { status, action });
        }

        info!("Connecting to {} on {} ({})", wallet.id(), self.default_chain_id, action);

        let derivation = self.derivation();
        let handshake = async {
            let client = wallet
                .get_client()
                .await
                .map_err(WalletManagerError::from)?;
            derivation
                .run(wallet.clone(), client, &self.default_chain_id)
                .await
                .map(Arc::new)
        };
        // A panicking wallet or factory must not strand the status in `pending`
        let result = AssertUnwindSafe(handshake)
            .catch_unwind()
            .await
            .unwrap_or_else(|_| {
                Err(WalletManagerError::derivation(
                    &self.default_chain_id,
                    "wallet handshake panicked",
                ))
            });

        let mut superseded = false;
        self.state.send_if_modified(|s| {
            if self.attempt.load(Ordering::SeqCst) != attempt {
                superseded = true;
                return false;
            }
            match &result {
                Ok(info) => {
                    s.status = ConnectionStatus::Connected;
                    s.error = None;
                    s.connected_wallet = Some(info.clone());
                }
                Err(e) => {
                    s.status = ConnectionStatus::Error;
                    s.error = Some(e.clone());
                    s.connected_wallet = None;
                }
            }
            true
        });

        if superseded {
            debug!("Discarding superseded {} attempt for {}", action, wallet.id());
            return Err(WalletManagerError::Superseded);
        }

        match &result {
            Ok(info) => info!("Connected {} as {}", wallet.id(), info.address),
            Err(e) => warn!("Failed to {} {}: {}", action, wallet.id(), e),
        }

        result
    }
}

/// Dependency slot through which views and connectors find the coordinator
#[derive(Clone, Default)]
pub struct WalletManagerContext {
    coordinator: Option<Arc<ConnectionCoordinator>>,
}

impl WalletManagerContext {
    /// Context providing `coordinator`
    pub fn new(coordinator: Arc<ConnectionCoordinator>) -> Self {
        Self {
            coordinator: Some(coordinator),
        }
    }

    /// Context with no coordinator
    pub fn empty() -> Self {
        Self::default()
    }

    /// The provided coordinator, or [`WalletManagerError::ContextMissing`]
    pub fn wallet_manager(&self) -> Result<Arc<ConnectionCoordinator>, WalletManagerError> {
        self.coordinator
            .clone()
            .ok_or(WalletManagerError::ContextMissing)
    }
}
