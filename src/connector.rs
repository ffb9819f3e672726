//! Explicit Chain Connector
//!
//! One-shot, on-demand derivation of a chain connection from the primary
//! wallet. The result goes straight back to the caller; callers that want it
//! cached pass it to [`ConnectionCoordinator::add_connected_wallet`].

use std::sync::Arc;
use tracing::debug;

use crate::coordinator::{ConnectionCoordinator, WalletManagerContext};
use crate::error::WalletManagerError;
use crate::types::ConnectedWalletInfo;

/// Connects the primary wallet to arbitrary chains on demand
#[derive(Clone)]
pub struct ChainConnector {
    coordinator: Arc<ConnectionCoordinator>,
}

impl ChainConnector {
    pub fn new(coordinator: Arc<ConnectionCoordinator>) -> Self {
        Self { coordinator }
    }

    /// Build a connector from a context, failing fast if no coordinator is provided
    pub fn from_context(ctx: &WalletManagerContext) -> Result<Self, WalletManagerError> {
        Ok(Self::new(ctx.wallet_manager()?))
    }

    /// Derive a connection for `chain_id` using the primary wallet as of now
    pub async fn connect_to_chain(
        &self,
        chain_id: &str,
    ) -> Result<ConnectedWalletInfo, WalletManagerError> {
        let primary = self
            .coordinator
            .with_state(|s| s.is_connected().then(|| s.connected_wallet.clone()).flatten())
            .ok_or(WalletManagerError::NotConnected)?;

        debug!("Explicitly connecting {} to {}", primary.wallet.id(), chain_id);
        self.coordinator
            .derivation()
            .derive_from(&primary, chain_id)
            .await
    }
}
