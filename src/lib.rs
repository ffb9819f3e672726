//! cosmos-wallet-manager - Multi-chain wallet connection coordinator
//!
//! Tracks one primary wallet connection plus a per-chain cache of derived
//! signing connections, and exposes a consistent connection-status state
//! machine to consumers.
//!
//! - [`ConnectionCoordinator`] owns the primary connection and the cache.
//! - [`ChainConnectionView`] projects coordinator state onto one chain and
//!   derives the chain connection the first time it is needed.
//! - [`ChainConnector`] derives a chain connection on demand.

pub mod chain_info;
pub mod config;
pub mod connector;
pub mod coordinator;
pub mod derivation;
pub mod error;
pub mod factory;
pub mod types;
pub mod view;
pub mod wallet;

#[cfg(test)]
pub(crate) mod testing;

pub use chain_info::{ChainInfoResolver, RegistryChainInfoResolver, StaticChainInfoResolver};
pub use config::WalletManagerConfig;
pub use connector::ChainConnector;
pub use coordinator::{ConnectionCoordinator, CoordinatorState, WalletManagerContext};
pub use error::WalletManagerError;
pub use factory::{ConnectedWalletFactory, SigningClientFactory};
pub use types::*;
pub use view::ChainConnectionView;
pub use wallet::{LocalKeyWallet, WalletClient, WalletError, WalletProvider};
