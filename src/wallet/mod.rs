//! Wallet provider interfaces
//!
//! A [`WalletProvider`] represents an installed wallet (browser extension,
//! hardware bridge, local key). Its [`WalletClient`] performs the handshake
//! and hands out per-chain keys. The coordinator only talks to these traits.

pub mod local;

use async_trait::async_trait;
use std::sync::Arc;

use crate::types::{ChainInfo, WalletKey};

/// Common wallet error type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalletError {
    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Unknown chain: {0}")]
    UnknownChain(String),

    #[error("Chain not enabled: {0}")]
    ChainNotEnabled(String),

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// An installed wallet the user can pick
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Stable identifier used as the wallet choice (e.g., "keplr")
    fn id(&self) -> &str;

    /// Display name
    fn name(&self) -> &str;

    /// Open a client session with the wallet
    async fn get_client(&self) -> Result<Arc<dyn WalletClient>, WalletError>;
}

/// A live session with a wallet
#[async_trait]
pub trait WalletClient: Send + Sync {
    /// Register chain metadata with the wallet before enabling it
    async fn suggest_chain(&self, _chain_info: &ChainInfo) -> Result<(), WalletError> {
        Ok(())
    }

    /// Ask the wallet for permission to use the given chains
    async fn enable(&self, chain_ids: &[String]) -> Result<(), WalletError>;

    /// Key details for an enabled chain
    async fn get_key(&self, chain_id: &str) -> Result<WalletKey, WalletError>;

    /// Addresses the offline signer exposes for an enabled chain
    async fn get_accounts(&self, chain_id: &str) -> Result<Vec<String>, WalletError>;
}

// Re-export wallet types
pub use local::LocalKeyWallet;
