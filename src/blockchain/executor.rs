// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Counterpart transaction submission and confirmation.
//!
//! Each call builds the `mint` / `withdraw` call, lets the wallet filler
//! fill gas, nonce and chain id and sign it, broadcasts it, and blocks until
//! the receipt has the required confirmations. Every failure is returned to
//! the caller; nothing is retried or swallowed here.

use std::time::Duration;

use alloy::{
    network::Ethereum,
    primitives::{Address, TxHash},
    providers::{PendingTransactionBuilder, PendingTransactionError, WatchTxError},
};
use async_trait::async_trait;

use super::client::SigningProvider;
use super::contracts::{IVault, IWrappedEthscription};
use crate::models::{Chain, EthscriptionId};

/// Performs the cross-chain action for one observed event.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Mint the wrapped token on Mainnet. Returns the confirmed tx hash.
    async fn mint(&self, id: EthscriptionId, owner: Address) -> Result<TxHash, ActionError>;

    /// Release the ethscription from the Vault on the AppChain.
    async fn withdraw(&self, id: EthscriptionId, to: Address) -> Result<TxHash, ActionError>;
}

/// Failures of a counterpart action.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Insufficient relayer balance: {0}")]
    InsufficientFunds(String),

    /// Execution reverted, either at gas estimation (`tx_hash` is `None`) or
    /// in a mined receipt.
    #[error("Transaction reverted: {reason}")]
    Reverted {
        tx_hash: Option<TxHash>,
        reason: String,
    },

    /// The node already has this transaction or its nonce, typically a
    /// replay of a submission made before a restart.
    #[error("Transaction already known: {0}")]
    AlreadyKnown(String),

    #[error("Transaction {tx_hash:#x} not confirmed within timeout")]
    Timeout { tx_hash: TxHash },
}

impl ActionError {
    /// Failures expected from a lost race or a restart replay.
    ///
    /// They are still retried, but logged as warnings rather than alerts.
    pub fn is_benign(&self) -> bool {
        matches!(
            self,
            ActionError::Reverted { .. } | ActionError::AlreadyKnown(_)
        )
    }
}

/// Classify a submission error from the node's message.
///
/// JSON-RPC errors carry no stable codes across clients, so the message text
/// is the only portable signal.
pub fn classify_submission_error(message: &str) -> ActionError {
    let lower = message.to_ascii_lowercase();

    if lower.contains("insufficient funds") {
        ActionError::InsufficientFunds(message.to_string())
    } else if lower.contains("already known")
        || lower.contains("nonce too low")
        || lower.contains("replacement transaction underpriced")
        || lower.contains("already imported")
    {
        ActionError::AlreadyKnown(message.to_string())
    } else if lower.contains("revert") {
        ActionError::Reverted {
            tx_hash: None,
            reason: message.to_string(),
        }
    } else {
        ActionError::Rpc(message.to_string())
    }
}

/// [`ActionExecutor`] signing with the relayer key on both chains.
pub struct RpcActionExecutor {
    mainnet: SigningProvider,
    wrapped_address: Address,
    appchain: SigningProvider,
    vault_address: Address,
    required_confirmations: u64,
    receipt_timeout: Duration,
}

impl RpcActionExecutor {
    pub fn new(
        mainnet: SigningProvider,
        wrapped_address: Address,
        appchain: SigningProvider,
        vault_address: Address,
        receipt_timeout: Duration,
    ) -> Self {
        Self {
            mainnet,
            wrapped_address,
            appchain,
            vault_address,
            required_confirmations: 1,
            receipt_timeout,
        }
    }

    /// Wait for the receipt and check its status.
    async fn confirm(
        &self,
        chain: Chain,
        pending: PendingTransactionBuilder<Ethereum>,
    ) -> Result<TxHash, ActionError> {
        let tx_hash = *pending.tx_hash();
        tracing::debug!(chain = %chain, tx_hash = %tx_hash, "Submitted counterpart transaction");

        let receipt = pending
            .with_required_confirmations(self.required_confirmations)
            .with_timeout(Some(self.receipt_timeout))
            .get_receipt()
            .await
            .map_err(|e| match e {
                PendingTransactionError::TxWatcher(WatchTxError::Timeout) => {
                    ActionError::Timeout { tx_hash }
                }
                other => classify_submission_error(&other.to_string()),
            })?;

        if !receipt.status() {
            return Err(ActionError::Reverted {
                tx_hash: Some(tx_hash),
                reason: format!("receipt status 0 in block {:?}", receipt.block_number),
            });
        }

        Ok(receipt.transaction_hash)
    }
}

#[async_trait]
impl ActionExecutor for RpcActionExecutor {
    async fn mint(&self, id: EthscriptionId, owner: Address) -> Result<TxHash, ActionError> {
        let contract = IWrappedEthscription::new(self.wrapped_address, self.mainnet.clone());
        let pending = contract
            .mint(id.0, owner)
            .send()
            .await
            .map_err(|e| classify_submission_error(&e.to_string()))?;

        self.confirm(Chain::Mainnet, pending).await
    }

    async fn withdraw(&self, id: EthscriptionId, to: Address) -> Result<TxHash, ActionError> {
        let contract = IVault::new(self.vault_address, self.appchain.clone());
        let pending = contract
            .withdraw(id.0, to)
            .send()
            .await
            .map_err(|e| classify_submission_error(&e.to_string()))?;

        self.confirm(Chain::AppChain, pending).await
    }
}
