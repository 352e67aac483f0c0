//! Provider management for JSON-RPC access.
//! Uses Alloy providers for type-safe RPC interactions.
//!
//! One [`ProviderManager`] is shared per process; it carries the endpoint
//! URL and chain id and builds providers on demand. Rate limiting is the
//! caller's concern: everything here is a single RPC round-trip.

use alloy::eips::BlockNumberOrTag;
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::{Block, Transaction, TransactionReceipt, TransactionRequest};
use anyhow::{Context, Result};
use tracing::{debug, info, warn};

/// Shared access point for all chain reads and lookups.
#[derive(Clone)]
pub struct ProviderManager {
    /// HTTP RPC endpoint URL.
    rpc_url: String,
    /// Chain id the orchestrator is configured for.
    chain_id: u64,
}

impl ProviderManager {
    /// Create a new provider manager and verify the connection.
    ///
    /// Logs a warning if the remote chain id differs from the configured
    /// one; the startup deployment check treats that as fatal.
    pub async fn new(rpc_url: &str, chain_id: u64) -> Result<Self> {
        let provider = ProviderBuilder::new().on_http(rpc_url.parse()?);
        let remote_chain_id = provider
            .get_chain_id()
            .await
            .context("Failed to query chain id")?;

        if remote_chain_id != chain_id {
            warn!(
                configured = chain_id,
                remote = remote_chain_id,
                "Chain id mismatch between configuration and RPC endpoint"
            );
        }

        let block = provider.get_block_number().await?;
        info!(rpc = rpc_url, chain_id, block, "Provider connection verified");

        Ok(Self {
            rpc_url: rpc_url.to_string(),
            chain_id,
        })
    }

    /// Create a manager without probing the endpoint. Providers are built
    /// lazily, so this is enough for read paths that may never fire (and
    /// for tests against unreachable endpoints).
    pub fn offline(rpc_url: &str, chain_id: u64) -> Self {
        Self {
            rpc_url: rpc_url.to_string(),
            chain_id,
        }
    }

    /// Get the RPC URL.
    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    /// Get the configured chain id.
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn provider(&self) -> Result<impl Provider> {
        Ok(ProviderBuilder::new().on_http(self.rpc_url.parse()?))
    }

    /// Get the current block number.
    pub async fn block_number(&self) -> Result<u64> {
        let block = self.provider()?.get_block_number().await?;
        Ok(block)
    }

    /// Get the latest block (header only), used for fee detection.
    pub async fn latest_block(&self) -> Result<Block> {
        self.provider()?
            .get_block_by_number(BlockNumberOrTag::Latest)
            .await?
            .context("RPC returned no latest block")
    }

    /// Get the node's suggested legacy gas price in wei.
    pub async fn gas_price(&self) -> Result<u128> {
        let price = self.provider()?.get_gas_price().await?;
        Ok(price)
    }

    /// Get the mined transaction count for an address (the next nonce as
    /// far as mined state is concerned).
    pub async fn transaction_count(&self, address: Address) -> Result<u64> {
        let count = self.provider()?.get_transaction_count(address).await?;
        Ok(count)
    }

    /// Get the native token balance of an address.
    pub async fn native_balance(&self, address: Address) -> Result<U256> {
        let balance = self.provider()?.get_balance(address).await?;
        Ok(balance)
    }

    /// Ask the node to estimate gas for a call.
    pub async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<u64> {
        let estimate = self.provider()?.estimate_gas(tx.clone()).await?;
        Ok(estimate)
    }

    /// Execute a read-only call (`eth_call`) with the given request.
    pub async fn call(&self, tx: &TransactionRequest) -> Result<Bytes> {
        let output = self.provider()?.call(tx.clone()).await?;
        Ok(output)
    }

    /// Look up a transaction by hash. `None` means the node has never
    /// seen it.
    pub async fn transaction_by_hash(&self, hash: B256) -> Result<Option<Transaction>> {
        let tx = self.provider()?.get_transaction_by_hash(hash).await?;
        Ok(tx)
    }

    /// Look up a transaction receipt. `None` means not yet mined.
    pub async fn transaction_receipt(&self, hash: B256) -> Result<Option<TransactionReceipt>> {
        let receipt = self.provider()?.get_transaction_receipt(hash).await?;
        Ok(receipt)
    }

    /// Get the deployed bytecode at an address (deployment check).
    pub async fn get_code(&self, address: Address) -> Result<Bytes> {
        let code = self.provider()?.get_code_at(address).await?;
        Ok(code)
    }

    /// Post-mortem trace of a failed transaction via
    /// `debug_traceTransaction`. Degrades silently: most public endpoints
    /// do not expose the debug namespace.
    pub async fn debug_trace_transaction(&self, hash: B256) -> Option<serde_json::Value> {
        let provider = self.provider().ok()?;
        let params = (hash, serde_json::json!({ "tracer": "callTracer" }));
        match provider
            .raw_request::<_, serde_json::Value>("debug_traceTransaction".into(), params)
            .await
        {
            Ok(trace) => Some(trace),
            Err(e) => {
                debug!(tx_hash = %hash, error = %e, "debug_traceTransaction unavailable");
                None
            }
        }
    }

    /// Check if the provider is healthy.
    pub async fn health_check(&self) -> Result<bool> {
        let block = self.block_number().await?;
        debug!(block, "Provider health check passed");
        Ok(block > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires network
    async fn test_provider_creation() {
        let provider = ProviderManager::new("https://api.calibration.node.glif.io/rpc/v1", 314159)
            .await
            .unwrap();

        assert_eq!(provider.chain_id(), 314159);
        assert!(provider.health_check().await.unwrap());
    }
}
