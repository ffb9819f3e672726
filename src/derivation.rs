//! Chain connection derivation
//!
//! The shared pipeline behind the primary handshake, per-chain views, and
//! the explicit connector. Stages run strictly in order:
//! resolve chain info -> CosmWasm options -> Stargate options -> factory.

use std::sync::Arc;
use tracing::debug;

use crate::chain_info::ChainInfoResolver;
use crate::error::WalletManagerError;
use crate::factory::ConnectedWalletFactory;
use crate::types::{
    ChainInfoOverrides, ClientOptionsProvider, ConnectedWalletInfo, SigningCosmWasmClientOptions,
    SigningStargateClientOptions,
};
use crate::wallet::{WalletClient, WalletProvider};

/// Everything a derivation needs, detached from the coordinator
///
/// Cheap to clone; captured by background tasks so they never borrow the
/// coordinator across await points.
#[derive(Clone)]
pub struct Derivation {
    pub resolver: Arc<dyn ChainInfoResolver>,
    pub factory: Arc<dyn ConnectedWalletFactory>,
    pub overrides: Arc<ChainInfoOverrides>,
    pub cosmwasm_options: Option<ClientOptionsProvider<SigningCosmWasmClientOptions>>,
    pub stargate_options: Option<ClientOptionsProvider<SigningStargateClientOptions>>,
}

impl Derivation {
    /// Bind a wallet session to `chain_id`
    pub async fn run(
        &self,
        wallet: Arc<dyn WalletProvider>,
        wallet_client: Arc<dyn WalletClient>,
        chain_id: &str,
    ) -> Result<ConnectedWalletInfo, WalletManagerError> {
        debug!("Resolving chain info for {}", chain_id);
        let chain_info = self.resolver.resolve(chain_id, &self.overrides).await?;

        let cosmwasm_options = match &self.cosmwasm_options {
            Some(provider) => provider(chain_info.clone()).await,
            None => None,
        };
        let stargate_options = match &self.stargate_options {
            Some(provider) => provider(chain_info.clone()).await,
            None => None,
        };

        self.factory
            .derive(
                wallet,
                wallet_client,
                chain_info,
                cosmwasm_options,
                stargate_options,
            )
            .await
    }

    /// Derive a connection for `chain_id` reusing the primary wallet session
    pub async fn derive_from(
        &self,
        primary: &ConnectedWalletInfo,
        chain_id: &str,
    ) -> Result<ConnectedWalletInfo, WalletManagerError> {
        self.run(primary.wallet.clone(), primary.wallet_client.clone(), chain_id)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{local_wallet, test_resolver, RecordingFactory};
    use crate::types::{options_provider, GasPrice};
    use std::sync::Mutex;

    fn derivation(factory: Arc<RecordingFactory>) -> Derivation {
        Derivation {
            resolver: Arc::new(test_resolver()),
            factory,
            overrides: Arc::new(ChainInfoOverrides::new()),
            cosmwasm_options: None,
            stargate_options: None,
        }
    }

    #[tokio::test]
    async fn test_run_without_option_providers() {
        let factory = Arc::new(RecordingFactory::new());
        let wallet = local_wallet();
        let client = wallet.get_client().await.unwrap();

        let info = derivation(factory.clone())
            .run(wallet, client, "chain-a")
            .await
            .unwrap();

        assert_eq!(info.chain_id(), "chain-a");
        assert_eq!(factory.calls(), 1);
        assert!(info.signing_cosmwasm_client.options.is_none());
    }

    #[tokio::test]
    async fn test_option_providers_called_in_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let factory = Arc::new(RecordingFactory::new());
        let mut derivation = derivation(factory);

        let seen = order.clone();
        derivation.cosmwasm_options = Some(options_provider(move |chain: crate::types::ChainInfo| {
            let seen = seen.clone();
            async move {
                seen.lock().unwrap().push(format!("cosmwasm:{}", chain.chain_id));
                Some(SigningCosmWasmClientOptions {
                    gas_price: Some("1ustake".parse::<GasPrice>().unwrap()),
                    ..Default::default()
                })
            }
        }));
        let seen = order.clone();
        derivation.stargate_options = Some(options_provider(move |chain: crate::types::ChainInfo| {
            let seen = seen.clone();
            async move {
                seen.lock().unwrap().push(format!("stargate:{}", chain.chain_id));
                None
            }
        }));

        let wallet = local_wallet();
        let client = wallet.get_client().await.unwrap();
        let info = derivation.run(wallet, client, "chain-b").await.unwrap();

        assert_eq!(
            *order.lock().unwrap(),
            vec!["cosmwasm:chain-b".to_string(), "stargate:chain-b".to_string()]
        );
        assert_eq!(
            info.signing_cosmwasm_client.gas_price.unwrap().to_string(),
            "1ustake"
        );
        assert!(info.signing_stargate_client.options.is_none());
    }

    #[tokio::test]
    async fn test_resolution_failure_skips_factory() {
        let factory = Arc::new(RecordingFactory::new());
        let wallet = local_wallet();
        let client = wallet.get_client().await.unwrap();

        let err = derivation(factory.clone())
            .run(wallet, client, "missing-1")
            .await
            .unwrap_err();

        assert!(matches!(err, WalletManagerError::ChainResolution { .. }));
        assert_eq!(factory.calls(), 0);
    }
}
