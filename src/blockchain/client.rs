// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JSON-RPC client for one side of the bridge.

use alloy::{
    network::{Ethereum, EthereumWallet},
    primitives::{utils::format_ether, Address, U256},
    providers::{
        fillers::{
            BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller,
            WalletFiller,
        },
        Identity, Provider, ProviderBuilder, RootProvider,
    },
    rpc::types::{Filter, Log},
};

use super::types::ChainEndpoint;
use crate::models::Chain;

/// HTTP provider type (with all fillers).
pub type HttpProvider = FillProvider<
    JoinFill<
        Identity,
        JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
    >,
    RootProvider<Ethereum>,
>;

/// HTTP provider that signs with the relayer wallet.
pub type SigningProvider = FillProvider<
    JoinFill<
        JoinFill<
            Identity,
            JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
        >,
        WalletFiller<EthereumWallet>,
    >,
    RootProvider<Ethereum>,
>;

/// Read-only client for one chain.
pub struct ChainClient {
    endpoint: ChainEndpoint,
    provider: HttpProvider,
}

impl ChainClient {
    /// Create a new client for the given endpoint.
    pub fn new(endpoint: ChainEndpoint) -> Self {
        let provider = ProviderBuilder::new().connect_http(endpoint.rpc_url.clone());
        Self { endpoint, provider }
    }

    /// Build a provider that signs transactions for this chain.
    pub fn signing_provider(endpoint: &ChainEndpoint, wallet: EthereumWallet) -> SigningProvider {
        ProviderBuilder::new()
            .wallet(wallet)
            .connect_http(endpoint.rpc_url.clone())
    }

    pub fn chain(&self) -> Chain {
        self.endpoint.chain
    }

    /// Get the endpoint configuration.
    pub fn endpoint(&self) -> &ChainEndpoint {
        &self.endpoint
    }

    /// Get the current block number (`eth_blockNumber`).
    pub async fn get_block_number(&self) -> Result<u64, ChainError> {
        self.provider
            .get_block_number()
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))
    }

    /// Query logs (`eth_getLogs`).
    pub async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>, ChainError> {
        self.provider
            .get_logs(filter)
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))
    }

    /// Get the native balance for an address.
    pub async fn get_native_balance(&self, address: Address) -> Result<U256, ChainError> {
        self.provider
            .get_balance(address)
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))
    }

    /// Log the relayer's address and balance on this chain.
    ///
    /// A zero balance is only a warning; each action will then fail with
    /// insufficient funds and be retried.
    pub async fn check_relayer(&self, relayer: Address) -> Result<U256, ChainError> {
        let head = self.get_block_number().await?;
        let balance = self.get_native_balance(relayer).await?;

        if balance.is_zero() {
            tracing::warn!(
                chain = %self.chain(),
                relayer = %relayer,
                head,
                "Relayer has zero balance; counterpart transactions will fail"
            );
        } else {
            tracing::info!(
                chain = %self.chain(),
                relayer = %relayer,
                head,
                balance = %format_ether(balance),
                "Connected to chain"
            );
        }

        Ok(balance)
    }
}

/// Errors from read-side chain interactions.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Log decode error: {0}")]
    Decode(String),
}
