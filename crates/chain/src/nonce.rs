//! Per-signer nonce serialization.
//!
//! `eth_getTransactionCount` only reflects mined transactions, so burst
//! submissions must run off an optimistic local counter. The serializer
//! hands out strictly increasing nonces under a mutex, refreshes from the
//! chain when the cache goes stale, and recovers from "nonce too low"
//! errors by adopting the chain's expected value when the node names it.

use std::time::{Duration, Instant};

use alloy::primitives::Address;
use anyhow::{Context, Result};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::extract_expected_nonce;
use crate::provider::ProviderManager;

/// How long a cached nonce is trusted before refetching from the chain.
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5);

struct NonceState {
    current: Option<u64>,
    last_refresh: Option<Instant>,
}

/// Hands out strictly monotonic nonces for one signer address.
pub struct NonceSerializer {
    provider: ProviderManager,
    address: Address,
    state: Mutex<NonceState>,
    ttl: Duration,
}

impl NonceSerializer {
    pub fn new(provider: ProviderManager, address: Address) -> Self {
        Self {
            provider,
            address,
            state: Mutex::new(NonceState {
                current: None,
                last_refresh: None,
            }),
            ttl: DEFAULT_CACHE_TTL,
        }
    }

    /// Override the cache TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Get the next available nonce.
    ///
    /// Concurrent callers are serialized; each call returns a unique,
    /// increasing value. A stale or missing cache triggers one chain
    /// refresh; if the refresh fails but a cached value exists, the
    /// cached counter keeps serving.
    pub async fn next(&self) -> Result<u64> {
        let mut state = self.state.lock().await;

        let stale = match (state.current, state.last_refresh) {
            (Some(_), Some(at)) => at.elapsed() > self.ttl,
            _ => true,
        };

        if stale {
            match self.provider.transaction_count(self.address).await {
                Ok(count) => {
                    state.current = Some(count);
                    state.last_refresh = Some(Instant::now());
                    info!(address = %self.address, nonce = count, "Refreshed nonce from chain");
                }
                Err(e) => match state.current {
                    Some(cached) => {
                        warn!(
                            address = %self.address,
                            cached,
                            error = %e,
                            "Failed to refresh nonce, using cached value"
                        );
                    }
                    None => {
                        return Err(e).context("Failed to fetch nonce and no cached value available")
                    }
                },
            }
        }

        let nonce = state.current.context("Nonce cache unexpectedly empty")?;
        state.current = Some(nonce + 1);
        Ok(nonce)
    }

    /// Invalidate the cache; the next [`next`](Self::next) refetches the
    /// chain's transaction count.
    pub async fn reset_to_chain(&self) {
        let mut state = self.state.lock().await;
        state.current = None;
        state.last_refresh = None;
    }

    /// Recover from a nonce-related send error.
    ///
    /// If the message names the chain's expected nonce ("minimum expected
    /// nonce is K"), the counter jumps to K and K is returned. Otherwise
    /// the cache is dropped and a fresh nonce is fetched.
    pub async fn handle_error(&self, message: &str) -> Result<u64> {
        warn!(address = %self.address, error = message, "Nonce error detected");

        if let Some(expected) = extract_expected_nonce(message) {
            let mut state = self.state.lock().await;
            state.current = Some(expected);
            state.last_refresh = Some(Instant::now());
            info!(address = %self.address, nonce = expected, "Adopted chain-expected nonce");
            return Ok(expected);
        }

        self.reset_to_chain().await;
        self.next().await
    }

    /// The signer address this serializer tracks.
    pub fn address(&self) -> Address {
        self.address
    }
}
