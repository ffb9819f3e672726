//! Connected Wallet Factory
//!
//! Turns a wallet session plus chain metadata into a [`ConnectedWalletInfo`]:
//! registers and enables the chain with the wallet, reads the account, and
//! binds signing clients to the chain's RPC endpoint.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

use crate::error::WalletManagerError;
use crate::types::{
    ChainInfo, ConnectedWalletInfo, PublicKey, SigningClient, SigningCosmWasmClientOptions,
    SigningStargateClientOptions,
};
use crate::wallet::{WalletClient, WalletProvider};

/// Builds chain-scoped connections from a wallet session
#[async_trait]
pub trait ConnectedWalletFactory: Send + Sync {
    async fn derive(
        &self,
        wallet: Arc<dyn WalletProvider>,
        wallet_client: Arc<dyn WalletClient>,
        chain_info: ChainInfo,
        cosmwasm_options: Option<SigningCosmWasmClientOptions>,
        stargate_options: Option<SigningStargateClientOptions>,
    ) -> Result<ConnectedWalletInfo, WalletManagerError>;
}

/// Default factory
#[derive(Debug, Clone, Copy, Default)]
pub struct SigningClientFactory;

impl SigningClientFactory {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ConnectedWalletFactory for SigningClientFactory {
    async fn derive(
        &self,
        wallet: Arc<dyn WalletProvider>,
        wallet_client: Arc<dyn WalletClient>,
        chain_info: ChainInfo,
        cosmwasm_options: Option<SigningCosmWasmClientOptions>,
        stargate_options: Option<SigningStargateClientOptions>,
    ) -> Result<ConnectedWalletInfo, WalletManagerError> {
        let chain_id = chain_info.chain_id.clone();
        let fail = |e: crate::wallet::WalletError| WalletManagerError::derivation(&chain_id, e.to_string());

        wallet_client.suggest_chain(&chain_info).await.map_err(fail)?;
        wallet_client
            .enable(std::slice::from_ref(&chain_id))
            .await
            .map_err(fail)?;

        let key = wallet_client.get_key(&chain_id).await.map_err(fail)?;
        let address = wallet_client
            .get_accounts(&chain_id)
            .await
            .map_err(fail)?
            .into_iter()
            .next()
            .ok_or_else(|| {
                WalletManagerError::derivation(&chain_id, "Failed to retrieve wallet address.")
            })?;

        if key.bech32_address != address {
            return Err(WalletManagerError::derivation(
                &chain_id,
                format!(
                    "wallet key address {} does not match account {}",
                    key.bech32_address, address
                ),
            ));
        }

        if !address.starts_with(&format!("{}1", chain_info.bech32_prefix)) {
            return Err(WalletManagerError::derivation(
                &chain_id,
                format!(
                    "wallet returned address {} without the {} prefix",
                    address, chain_info.bech32_prefix
                ),
            ));
        }

        // Explicit option gas prices win over the chain's published average
        let fallback_gas = chain_info.default_gas_price();
        let signing_cosmwasm_client = SigningClient {
            chain_id: chain_id.clone(),
            rpc_endpoint: chain_info.rpc.clone(),
            signer_address: address.clone(),
            gas_price: cosmwasm_options
                .as_ref()
                .and_then(|o| o.gas_price.clone())
                .or_else(|| fallback_gas.clone()),
            options: cosmwasm_options,
        };
        let signing_stargate_client = SigningClient {
            chain_id: chain_id.clone(),
            rpc_endpoint: chain_info.rpc.clone(),
            signer_address: address.clone(),
            gas_price: stargate_options
                .as_ref()
                .and_then(|o| o.gas_price.clone())
                .or(fallback_gas),
            options: stargate_options,
        };

        debug!("Derived {} connection for {} on {}", wallet.id(), address, chain_id);

        Ok(ConnectedWalletInfo {
            wallet,
            wallet_client,
            chain_info,
            name: key.name,
            address,
            public_key: PublicKey::new(key.pub_key),
            signing_cosmwasm_client,
            signing_stargate_client,
            connected_at: Utc::now(),
        })
    }
}
