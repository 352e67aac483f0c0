//! Signing identity for reward submissions.
//!
//! One [`Signer`] per configured contract family, created at startup and
//! alive for the process. It owns the private key (never logged), the
//! derived address, the per-sender nonce serializer, and the submission
//! lock that keeps at most one transaction of this signer in the
//! build-and-send window at a time.

use alloy::network::EthereumWallet;
use alloy::primitives::{Address, B256, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use anyhow::{Context, Result};
use tokio::sync::{Mutex, MutexGuard};
use tracing::info;

use crate::nonce::NonceSerializer;
use crate::provider::ProviderManager;

/// A private-key-holding identity that submits transactions.
pub struct Signer {
    provider: ProviderManager,
    wallet: EthereumWallet,
    /// Derived 20-byte signer address.
    address: Address,
    nonce: NonceSerializer,
    submit_lock: Mutex<()>,
}

impl Signer {
    /// Create a signer from a hex private key (0x prefix optional).
    pub fn new(private_key: &str, provider: ProviderManager) -> Result<Self> {
        let key_str = private_key.trim_start_matches("0x");
        let key: PrivateKeySigner = key_str.parse().context("Invalid signer private key")?;
        let address = key.address();
        let wallet = EthereumWallet::from(key);
        let nonce = NonceSerializer::new(provider.clone(), address);

        info!(address = %address, chain_id = provider.chain_id(), "Signer initialized");

        Ok(Self {
            provider,
            wallet,
            address,
            nonce,
            submit_lock: Mutex::new(()),
        })
    }

    /// Override the nonce cache TTL.
    pub fn with_nonce_ttl(mut self, ttl: std::time::Duration) -> Self {
        self.nonce = NonceSerializer::new(self.provider.clone(), self.address).with_ttl(ttl);
        self
    }

    /// The signer's address.
    pub fn address(&self) -> Address {
        self.address
    }

    /// The signer's nonce serializer.
    pub fn nonce(&self) -> &NonceSerializer {
        &self.nonce
    }

    /// Acquire the per-signer submission lock. Held from nonce handoff
    /// through `eth_sendRawTransaction`; receipt waiting happens outside
    /// it so the next submission can build while the previous one mines.
    pub async fn submit_guard(&self) -> MutexGuard<'_, ()> {
        self.submit_lock.lock().await
    }

    /// Sign the request with the signer's key and broadcast it.
    ///
    /// The request must be fully populated (nonce, gas, fees, chain id);
    /// signing itself is deterministic and local.
    pub async fn send_transaction(&self, tx: TransactionRequest) -> Result<B256> {
        let provider = ProviderBuilder::new()
            .wallet(self.wallet.clone())
            .on_http(self.provider.rpc_url().parse()?);

        let pending = provider.send_transaction(tx).await?;
        Ok(*pending.tx_hash())
    }

    /// Native balance of the signer (gas funding check).
    pub async fn native_balance(&self) -> Result<U256> {
        self.provider.native_balance(self.address).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signer_address_derivation() {
        // Well-known anvil test key (DO NOT USE IN PRODUCTION).
        let private_key = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
        let provider = ProviderManager::offline("http://localhost:8545", 314159);
        let signer = Signer::new(private_key, provider).unwrap();

        assert_eq!(
            format!("{:?}", signer.address()).to_lowercase(),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
    }

    #[test]
    fn test_signer_accepts_unprefixed_key() {
        let private_key = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
        let provider = ProviderManager::offline("http://localhost:8545", 314159);
        assert!(Signer::new(private_key, provider).is_ok());
    }

    #[test]
    fn test_signer_rejects_garbage_key() {
        let provider = ProviderManager::offline("http://localhost:8545", 314159);
        assert!(Signer::new("0xnot-a-key", provider).is_err());
    }
}
