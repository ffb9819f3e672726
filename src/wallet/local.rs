//! Local Key Wallet
//!
//! A wallet provider backed by an in-process secp256k1 key. Useful for
//! development, scripting, and tests where no wallet extension is present.
//! Note: addresses are derived as the first 20 bytes of SHA256(pubkey), not
//! the RIPEMD160 hash used by production Cosmos wallets.

use async_trait::async_trait;
use bech32::ToBase32;
use k256::ecdsa::SigningKey;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{WalletClient, WalletError, WalletProvider};
use crate::types::{ChainInfo, WalletKey};

pub const LOCAL_WALLET_ID: &str = "local";

/// Wallet provider holding a raw private key
pub struct LocalKeyWallet {
    /// Public key bytes (33 bytes compressed)
    public_key: Vec<u8>,
    /// Account name reported to the application
    account_name: String,
}

impl LocalKeyWallet {
    /// Create a new wallet from a private key (hex encoded)
    pub fn from_private_key(private_key: &str) -> Result<Self, WalletError> {
        let key = private_key.strip_prefix("0x").unwrap_or(private_key);

        let private_key_bytes = hex::decode(key)
            .map_err(|e| WalletError::InvalidPrivateKey(format!("Invalid hex: {}", e)))?;

        if private_key_bytes.len() != 32 {
            return Err(WalletError::InvalidPrivateKey(
                "Private key must be 32 bytes".to_string(),
            ));
        }

        let signing_key = SigningKey::from_slice(&private_key_bytes)
            .map_err(|e| WalletError::InvalidPrivateKey(format!("{}", e)))?;
        let public_key = signing_key
            .verifying_key()
            .to_encoded_point(true)
            .as_bytes()
            .to_vec();

        Ok(Self {
            public_key,
            account_name: "local".to_string(),
        })
    }

    /// Set the account name
    pub fn with_account_name(mut self, name: &str) -> Self {
        self.account_name = name.to_string();
        self
    }

    /// Get the public key bytes
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }
}

impl std::fmt::Debug for LocalKeyWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalKeyWallet")
            .field("account_name", &self.account_name)
            .field("public_key", &hex::encode(&self.public_key))
            .finish()
    }
}

#[async_trait]
impl WalletProvider for LocalKeyWallet {
    fn id(&self) -> &str {
        LOCAL_WALLET_ID
    }

    fn name(&self) -> &str {
        "Local Key"
    }

    async fn get_client(&self) -> Result<Arc<dyn WalletClient>, WalletError> {
        Ok(Arc::new(LocalKeyClient {
            public_key: self.public_key.clone(),
            account_name: self.account_name.clone(),
            prefixes: RwLock::new(HashMap::new()),
            enabled: RwLock::new(HashSet::new()),
        }))
    }
}

/// Session with a [`LocalKeyWallet`]
///
/// Chains must be suggested before they can be enabled, and enabled before
/// keys can be read, same as an extension wallet.
pub struct LocalKeyClient {
    public_key: Vec<u8>,
    account_name: String,
    /// chain ID -> bech32 prefix
    prefixes: RwLock<HashMap<String, String>>,
    enabled: RwLock<HashSet<String>>,
}

impl LocalKeyClient {
    async fn enabled_prefix(&self, chain_id: &str) -> Result<String, WalletError> {
        if !self.enabled.read().await.contains(chain_id) {
            return Err(WalletError::ChainNotEnabled(chain_id.to_string()));
        }

        self.prefixes
            .read()
            .await
            .get(chain_id)
            .cloned()
            .ok_or_else(|| WalletError::UnknownChain(chain_id.to_string()))
    }
}

#[async_trait]
impl WalletClient for LocalKeyClient {
    async fn suggest_chain(&self, chain_info: &ChainInfo) -> Result<(), WalletError> {
        self.prefixes
            .write()
            .await
            .insert(chain_info.chain_id.clone(), chain_info.bech32_prefix.clone());
        Ok(())
    }

    async fn enable(&self, chain_ids: &[String]) -> Result<(), WalletError> {
        let prefixes = self.prefixes.read().await;
        if let Some(unknown) = chain_ids.iter().find(|id| !prefixes.contains_key(*id)) {
            return Err(WalletError::UnknownChain(unknown.clone()));
        }

        self.enabled.write().await.extend(chain_ids.iter().cloned());
        Ok(())
    }

    async fn get_key(&self, chain_id: &str) -> Result<WalletKey, WalletError> {
        let prefix = self.enabled_prefix(chain_id).await?;
        Ok(WalletKey {
            name: self.account_name.clone(),
            pub_key: self.public_key.clone(),
            bech32_address: bech32_address(&self.public_key, &prefix)?,
        })
    }

    async fn get_accounts(&self, chain_id: &str) -> Result<Vec<String>, WalletError> {
        let prefix = self.enabled_prefix(chain_id).await?;
        Ok(vec![bech32_address(&self.public_key, &prefix)?])
    }
}

/// Encode a public key as a bech32 account address
pub fn bech32_address(public_key: &[u8], prefix: &str) -> Result<String, WalletError> {
    // Hash the public key with SHA256
    let sha_hash = Sha256::digest(public_key);

    // Take first 20 bytes
    let address_bytes = &sha_hash[..20];

    bech32::encode(prefix, address_bytes.to_base32(), bech32::Variant::Bech32)
        .map_err(|e| WalletError::InvalidAddress(format!("Bech32 encoding failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_chain;

    // Test private key (DO NOT USE IN PRODUCTION)
    const TEST_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_wallet_creation() {
        let wallet = LocalKeyWallet::from_private_key(TEST_KEY).unwrap();
        assert_eq!(wallet.public_key().len(), 33);

        let prefixed = LocalKeyWallet::from_private_key(&format!("0x{}", TEST_KEY)).unwrap();
        assert_eq!(prefixed.public_key(), wallet.public_key());
    }

    #[test]
    fn test_invalid_private_key() {
        assert!(matches!(
            LocalKeyWallet::from_private_key("abcd"),
            Err(WalletError::InvalidPrivateKey(_))
        ));
        assert!(matches!(
            LocalKeyWallet::from_private_key("zz"),
            Err(WalletError::InvalidPrivateKey(_))
        ));
    }

    #[test]
    fn test_address_uses_chain_prefix() {
        let wallet = LocalKeyWallet::from_private_key(TEST_KEY).unwrap();
        let juno = bech32_address(wallet.public_key(), "juno").unwrap();
        let osmo = bech32_address(wallet.public_key(), "osmo").unwrap();

        assert!(juno.starts_with("juno1"));
        assert!(osmo.starts_with("osmo1"));
        assert_ne!(juno, osmo);
    }

    #[tokio::test]
    async fn test_enable_requires_suggested_chain() {
        let wallet = LocalKeyWallet::from_private_key(TEST_KEY).unwrap();
        let client = wallet.get_client().await.unwrap();

        let err = client.enable(&["chain-a".to_string()]).await.unwrap_err();
        assert_eq!(err, WalletError::UnknownChain("chain-a".to_string()));
    }

    #[tokio::test]
    async fn test_key_requires_enabled_chain() {
        let wallet = LocalKeyWallet::from_private_key(TEST_KEY)
            .unwrap()
            .with_account_name("alice");
        let client = wallet.get_client().await.unwrap();
        let chain = test_chain("chain-a");

        client.suggest_chain(&chain).await.unwrap();
        assert_eq!(
            client.get_key("chain-a").await.unwrap_err(),
            WalletError::ChainNotEnabled("chain-a".to_string())
        );

        client.enable(&["chain-a".to_string()]).await.unwrap();
        let key = client.get_key("chain-a").await.unwrap();
        assert_eq!(key.name, "alice");
        assert!(key.bech32_address.starts_with(&chain.bech32_prefix));
        assert_eq!(
            client.get_accounts("chain-a").await.unwrap(),
            vec![key.bech32_address]
        );
    }

    #[tokio::test]
    async fn test_each_client_is_a_fresh_session() {
        let wallet = LocalKeyWallet::from_private_key(TEST_KEY).unwrap();
        let first = wallet.get_client().await.unwrap();
        first.suggest_chain(&test_chain("chain-a")).await.unwrap();
        first.enable(&["chain-a".to_string()]).await.unwrap();

        let second = wallet.get_client().await.unwrap();
        assert!(second.get_key("chain-a").await.is_err());
    }
}
