//! Chain Connection View
//!
//! A consumer-scoped projection of coordinator state onto one chain. When the
//! primary wallet is connected and the chain has no cached connection yet,
//! the view derives one in the background and stores it in the coordinator's
//! cache so every other consumer of that chain picks it up instantly.
//!
//! Without a chain ID the view passes primary state through unchanged.

use futures_util::FutureExt;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::coordinator::{ConnectionCoordinator, CoordinatorState, WalletManagerContext};
use crate::error::WalletManagerError;
use crate::types::{ConnectionStatus, WalletConnection};

/// View-local derivation state for the current chain ID
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChainLocalState {
    /// A derivation started by this view is in flight
    pub connecting: bool,
    /// Last derivation failure for the current chain ID
    pub error: Option<WalletManagerError>,
    /// Inputs the failed derivation ran with
    failed_with: Option<DerivationInputs>,
}

/// Coordinator inputs a derivation depends on besides the chain ID
///
/// A failed derivation is only retried once one of these changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DerivationInputs {
    session: u64,
    overrides_version: u64,
}

/// Per-chain view of the coordinator
pub struct ChainConnectionView {
    coordinator: Arc<ConnectionCoordinator>,
    chain_id: Option<String>,
    /// Bumped when the chain ID changes; completions from older
    /// generations no longer touch local state
    generation: Arc<AtomicU64>,
    /// Chains with a derivation from this view still running, across
    /// chain ID changes
    pending: Arc<Mutex<HashSet<String>>>,
    local: Arc<watch::Sender<ChainLocalState>>,
    coordinator_rx: watch::Receiver<CoordinatorState>,
    local_rx: watch::Receiver<ChainLocalState>,
}

impl ChainConnectionView {
    pub fn new(coordinator: Arc<ConnectionCoordinator>, chain_id: Option<String>) -> Self {
        let (local, local_rx) = watch::channel(ChainLocalState::default());
        let coordinator_rx = coordinator.subscribe();

        Self {
            coordinator,
            chain_id,
            generation: Arc::new(AtomicU64::new(0)),
            pending: Arc::new(Mutex::new(HashSet::new())),
            local: Arc::new(local),
            coordinator_rx,
            local_rx,
        }
    }

    /// View of the primary connection
    pub fn primary(coordinator: Arc<ConnectionCoordinator>) -> Self {
        Self::new(coordinator, None)
    }

    /// View scoped to `chain_id`
    pub fn for_chain(coordinator: Arc<ConnectionCoordinator>, chain_id: &str) -> Self {
        Self::new(coordinator, Some(chain_id.to_string()))
    }

    /// Build a view from a context, failing fast if no coordinator is provided
    pub fn from_context(
        ctx: &WalletManagerContext,
        chain_id: Option<&str>,
    ) -> Result<Self, WalletManagerError> {
        let coordinator = ctx.wallet_manager()?;
        Ok(Self::new(coordinator, chain_id.map(str::to_string)))
    }

    pub fn chain_id(&self) -> Option<&str> {
        self.chain_id.as_deref()
    }

    /// Point the view at another chain
    ///
    /// Local in-flight and error state start fresh; a derivation still
    /// running for the old chain finishes into the shared cache only.
    pub fn set_chain_id(&mut self, chain_id: Option<String>) {
        if self.chain_id == chain_id {
            return;
        }

        self.generation.fetch_add(1, Ordering::SeqCst);
        self.local.send_replace(ChainLocalState::default());
        self.chain_id = chain_id;
        self.sync();
    }

    /// Local derivation state
    pub fn local_state(&self) -> ChainLocalState {
        self.local.borrow().clone()
    }

    /// Current projection, without side effects
    pub fn current(&self) -> WalletConnection {
        let local = self.local.borrow().clone();
        self.coordinator
            .with_state(|state| project(self.chain_id.as_deref(), state, &local))
    }

    /// Start a derivation if the view is eligible and none is in flight
    ///
    /// A failed derivation is not retried until the primary session or the
    /// override table changes, or [`retry`](Self::retry) is called. Must be
    /// called from within a Tokio runtime. Returns whether a derivation was
    /// started.
    pub fn sync(&self) -> bool {
        let Some(chain_id) = self.chain_id.clone() else {
            return false;
        };

        let eligible = self.coordinator.with_state(|state| {
            if !should_connect(Some(chain_id.as_str()), state)
                || state.connected_wallets.contains_key(&chain_id)
            {
                return None;
            }
            let inputs = DerivationInputs {
                session: state.session,
                overrides_version: state.overrides_version,
            };
            state.connected_wallet.clone().map(|primary| (primary, inputs))
        });
        let Some((primary, inputs)) = eligible else {
            return false;
        };
        if self.is_pending(&chain_id) {
            return false;
        }

        let started = self.local.send_if_modified(|local| {
            if local.connecting || (local.error.is_some() && local.failed_with == Some(inputs)) {
                return false;
            }
            local.connecting = true;
            local.error = None;
            local.failed_with = None;
            true
        });
        if !started {
            return false;
        }
        if let Ok(mut pending) = self.pending.lock() {
            pending.insert(chain_id.clone());
        }

        info!("Connecting wallet to chain {}", chain_id);

        let derivation = self.coordinator.derivation();
        let coordinator = self.coordinator.clone();
        let local = self.local.clone();
        let generation = self.generation.clone();
        let pending = self.pending.clone();
        let generation_at_start = generation.load(Ordering::SeqCst);

        tokio::spawn(async move {
            let outcome = AssertUnwindSafe(derivation.derive_from(&primary, &chain_id))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| {
                    Err(WalletManagerError::derivation(&chain_id, "derivation task panicked"))
                });

            let error = match outcome {
                Ok(info) => {
                    let info = Arc::new(info);
                    if !coordinator.add_connected_wallet_in_session(inputs.session, &chain_id, info) {
                        debug!("Dropping connection for {} from a closed session", chain_id);
                    }
                    None
                }
                Err(e) => {
                    warn!("Failed to connect wallet to chain {}: {}", chain_id, e);
                    Some(e)
                }
            };

            if let Ok(mut pending) = pending.lock() {
                pending.remove(&chain_id);
            }

            if generation.load(Ordering::SeqCst) == generation_at_start {
                local.send_modify(|local| {
                    local.connecting = false;
                    local.failed_with = error.as_ref().map(|_| inputs);
                    local.error = error;
                });
            } else {
                // Wake the view so it can re-evaluate the chain it points at now
                local.send_modify(|_| {});
            }
        });

        true
    }

    fn is_pending(&self, chain_id: &str) -> bool {
        self.pending
            .lock()
            .map(|pending| pending.contains(chain_id))
            .unwrap_or(false)
    }

    /// Forget the last failure and try again
    pub fn retry(&self) -> bool {
        self.local.send_if_modified(|local| {
            if local.connecting || local.error.is_none() {
                return false;
            }
            local.failed_with = None;
            true
        });
        self.sync()
    }

    /// Wait until coordinator or local state changes
    pub async fn changed(&mut self) {
        tokio::select! {
            _ = self.coordinator_rx.changed() => {}
            _ = self.local_rx.changed() => {}
        }
    }

    /// Drive the view until `predicate` accepts its projection
    pub async fn wait_for(
        &mut self,
        predicate: impl Fn(&WalletConnection) -> bool,
    ) -> WalletConnection {
        loop {
            self.sync();
            let current = self.current();
            if predicate(&current) {
                return current;
            }
            self.changed().await;
        }
    }

    /// Drive the view until its status is no longer pending
    pub async fn settled(&mut self) -> WalletConnection {
        self.wait_for(|c| !c.status.is_pending()).await
    }
}

/// Whether a view for `chain_id` should derive a chain connection
fn should_connect(chain_id: Option<&str>, state: &CoordinatorState) -> bool {
    chain_id.is_some() && state.is_connected()
}

/// Project coordinator state plus view-local state onto one chain
pub fn project(
    chain_id: Option<&str>,
    state: &CoordinatorState,
    local: &ChainLocalState,
) -> WalletConnection {
    let (status, error, wallet) = match chain_id.filter(|_| should_connect(chain_id, state)) {
        Some(chain_id) => {
            let wallet = state.connected_wallets.get(chain_id).cloned();
            // No error yet while not connecting covers the gap between the
            // in-flight flag clearing and the cache entry appearing
            let status = if wallet.is_some() {
                ConnectionStatus::Connected
            } else if local.connecting || local.error.is_none() {
                ConnectionStatus::Connecting
            } else {
                ConnectionStatus::ReadyForConnection
            };
            (status, local.error.clone(), wallet)
        }
        None => (
            state.status,
            state.error.clone(),
            state.connected_wallet.clone(),
        ),
    };

    WalletConnection {
        status,
        connected: status == ConnectionStatus::Connected,
        error,
        wallet,
    }
}
