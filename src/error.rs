//! Wallet Manager Error Types
//!
//! One error type for every layer of the coordinator. Errors are `Clone` so
//! they can be published inside state snapshots.

use crate::types::ConnectionStatus;
use crate::wallet::WalletError;

/// Errors produced by the connection coordinator and its collaborators
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalletManagerError {
    /// A chain connection was requested before the primary connection exists
    #[error("Wallet must first be connected to the default chain.")]
    NotConnected,

    /// The requested action is not valid from the current status
    #[error("Cannot {action} while {status}")]
    InvalidState {
        status: ConnectionStatus,
        action: &'static str,
    },

    /// A primary connection attempt was overtaken by a disconnect or a newer attempt
    #[error("Connection attempt superseded")]
    Superseded,

    /// Chain metadata could not be resolved or validated
    #[error("Failed to resolve chain {chain_id}: {reason}")]
    ChainResolution { chain_id: String, reason: String },

    /// The wallet factory could not build a chain connection
    #[error("Failed to connect wallet to chain {chain_id}: {reason}")]
    Derivation { chain_id: String, reason: String },

    /// A view or connector was used without a coordinator in its context
    #[error("You forgot to provide a wallet manager.")]
    ContextMissing,

    /// No registered wallet provider matches the requested choice
    #[error("Unknown wallet: {0}")]
    UnknownWallet(String),

    /// The wallet provider failed during the handshake
    #[error("Wallet provider error: {0}")]
    Provider(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl WalletManagerError {
    pub(crate) fn resolution(chain_id: &str, reason: impl Into<String>) -> Self {
        WalletManagerError::ChainResolution {
            chain_id: chain_id.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn derivation(chain_id: &str, reason: impl Into<String>) -> Self {
        WalletManagerError::Derivation {
            chain_id: chain_id.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the error stems from calling an operation in the wrong state
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            WalletManagerError::NotConnected
                | WalletManagerError::InvalidState { .. }
                | WalletManagerError::UnknownWallet(_)
        )
    }
}

impl From<WalletError> for WalletManagerError {
    fn from(err: WalletError) -> Self {
        WalletManagerError::Provider(err.to_string())
    }
}

impl From<serde_json::Error> for WalletManagerError {
    fn from(err: serde_json::Error) -> Self {
        WalletManagerError::Config(err.to_string())
    }
}
