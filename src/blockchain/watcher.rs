// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Chain Watcher
//!
//! Read-only log scanner for one chain and one contract event.
//!
//! | Chain | Contract | Event |
//! |-------|----------|-------|
//! | AppChain | Vault | `Deposited(bytes32,address)` |
//! | Mainnet | WrappedEthscription | `Burned(bytes32,address)` |
//!
//! The watcher never touches the cursor and never retries; RPC errors go
//! straight back to the relayer loop.

use alloy::primitives::B256;
use alloy::rpc::types::{Filter, Log};
use alloy::sol_types::SolEvent;
use async_trait::async_trait;

use super::client::{ChainClient, ChainError};
use super::contracts::{IVault, IVaultData, IWrappedEthscription, IWrappedEthscriptionData};
use crate::models::{Chain, EthscriptionId, EventKind, ObservedEvent};

/// Discovers watched events on one chain.
#[async_trait]
pub trait ChainWatcher: Send + Sync {
    fn chain(&self) -> Chain;

    /// Current chain head.
    async fn head_block(&self) -> Result<u64, ChainError>;

    /// Watched events in `[from_block, to_block]`, ascending by
    /// `(block, log_index)`. Empty when `from_block > to_block`.
    async fn poll_range(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<ObservedEvent>, ChainError>;
}

/// [`ChainWatcher`] over JSON-RPC `eth_blockNumber` + `eth_getLogs`.
pub struct RpcChainWatcher {
    client: ChainClient,
}

impl RpcChainWatcher {
    pub fn new(client: ChainClient) -> Self {
        Self { client }
    }

    /// Event topic watched on this chain.
    fn topic(&self) -> B256 {
        match self.client.chain() {
            Chain::AppChain => IVault::Deposited::SIGNATURE_HASH,
            Chain::Mainnet => IWrappedEthscription::Burned::SIGNATURE_HASH,
        }
    }

    fn filter(&self, from_block: u64, to_block: u64) -> Filter {
        Filter::new()
            .address(self.client.endpoint().contract)
            .event_signature(self.topic())
            .from_block(from_block)
            .to_block(to_block)
    }
}

#[async_trait]
impl ChainWatcher for RpcChainWatcher {
    fn chain(&self) -> Chain {
        self.client.chain()
    }

    async fn head_block(&self) -> Result<u64, ChainError> {
        self.client.get_block_number().await
    }

    async fn poll_range(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<ObservedEvent>, ChainError> {
        if from_block > to_block {
            return Ok(Vec::new());
        }

        let logs = self
            .client
            .get_logs(&self.filter(from_block, to_block))
            .await?;

        let mut events = logs
            .iter()
            .map(|log| decode_log(self.chain(), log))
            .collect::<Result<Vec<_>, _>>()?;
        events.sort_by_key(ObservedEvent::position);

        tracing::debug!(
            chain = %self.chain(),
            from_block,
            to_block,
            events = events.len(),
            "Scanned block range"
        );

        Ok(events)
    }
}

/// Decode a watched log into an [`ObservedEvent`].
///
/// Logs without block/tx/index metadata come from pending blocks and are
/// rejected so the range is retried instead of half-trusted.
pub fn decode_log(chain: Chain, log: &Log) -> Result<ObservedEvent, ChainError> {
    let tx_hash = log
        .transaction_hash
        .ok_or_else(|| ChainError::Decode("log without transaction hash".to_string()))?;
    let block_number = log
        .block_number
        .ok_or_else(|| ChainError::Decode(format!("log in {tx_hash:#x} without block number")))?;
    let log_index = log
        .log_index
        .ok_or_else(|| ChainError::Decode(format!("log in {tx_hash:#x} without log index")))?;

    // A single topic means the arguments sit in the data section.
    let data_layout = log.topics().len() == 1;
    let kind = match chain {
        Chain::AppChain => {
            let (ethscription_id, owner) = if data_layout {
                let data = decode::<IVaultData::Deposited>(log)?;
                (data.ethscriptionId, data.owner)
            } else {
                let data = decode::<IVault::Deposited>(log)?;
                (data.ethscriptionId, data.owner)
            };
            EventKind::Deposited {
                ethscription_id: EthscriptionId::from(ethscription_id),
                owner,
            }
        }
        Chain::Mainnet => {
            let (ethscription_id, owner) = if data_layout {
                let data = decode::<IWrappedEthscriptionData::Burned>(log)?;
                (data.ethscriptionId, data.owner)
            } else {
                let data = decode::<IWrappedEthscription::Burned>(log)?;
                (data.ethscriptionId, data.owner)
            };
            EventKind::Burned {
                ethscription_id: EthscriptionId::from(ethscription_id),
                owner,
            }
        }
    };

    Ok(ObservedEvent {
        chain,
        tx_hash,
        log_index,
        block_number,
        kind,
    })
}

fn decode<E: SolEvent>(log: &Log) -> Result<E, ChainError> {
    log.log_decode::<E>()
        .map(|decoded| decoded.inner.data)
        .map_err(|e| ChainError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Address, LogData, TxHash};

    fn rpc_log(topics: Vec<B256>, block: Option<u64>, index: Option<u64>) -> Log {
        rpc_log_with(LogData::new_unchecked(topics, Default::default()), block, index)
    }

    fn rpc_log_with(data: LogData, block: Option<u64>, index: Option<u64>) -> Log {
        Log {
            inner: alloy::primitives::Log {
                address: Address::repeat_byte(0x01),
                data,
            },
            block_hash: None,
            block_number: block,
            block_timestamp: None,
            transaction_hash: Some(TxHash::repeat_byte(0x77)),
            transaction_index: Some(0),
            log_index: index,
            removed: false,
        }
    }

    fn address_topic(addr: Address) -> B256 {
        addr.into_word()
    }

    #[test]
    fn decodes_deposited() {
        let id = B256::repeat_byte(0xAA);
        let owner = Address::repeat_byte(0xBB);
        let log = rpc_log(
            vec![IVault::Deposited::SIGNATURE_HASH, id, address_topic(owner)],
            Some(100),
            Some(4),
        );

        let event = decode_log(Chain::AppChain, &log).unwrap();
        assert_eq!(event.block_number, 100);
        assert_eq!(event.log_index, 4);
        assert_eq!(event.tx_hash, TxHash::repeat_byte(0x77));
        assert_eq!(
            event.kind,
            EventKind::Deposited {
                ethscription_id: EthscriptionId(id),
                owner,
            }
        );
    }

    #[test]
    fn decodes_burned() {
        let id = B256::repeat_byte(0xCC);
        let owner = Address::repeat_byte(0xDD);
        let log = rpc_log(
            vec![
                IWrappedEthscription::Burned::SIGNATURE_HASH,
                id,
                address_topic(owner),
            ],
            Some(500),
            Some(0),
        );

        let event = decode_log(Chain::Mainnet, &log).unwrap();
        assert_eq!(event.chain, Chain::Mainnet);
        assert_eq!(event.recipient(), owner);
        assert_eq!(event.ethscription_id(), EthscriptionId(id));
    }

    #[test]
    fn decodes_deposited_with_arguments_in_data() {
        let id = B256::repeat_byte(0xAA);
        let owner = Address::repeat_byte(0xBB);
        let data = IVaultData::Deposited {
            ethscriptionId: id,
            owner,
        }
        .encode_log_data();
        assert_eq!(data.topics().len(), 1);

        let event = decode_log(Chain::AppChain, &rpc_log_with(data, Some(7), Some(1))).unwrap();
        assert_eq!(
            event.kind,
            EventKind::Deposited {
                ethscription_id: EthscriptionId(id),
                owner,
            }
        );
    }

    #[test]
    fn decodes_burned_with_arguments_in_data() {
        let id = B256::repeat_byte(0xCC);
        let owner = Address::repeat_byte(0xDD);
        let data = IWrappedEthscriptionData::Burned {
            ethscriptionId: id,
            owner,
        }
        .encode_log_data();

        let event = decode_log(Chain::Mainnet, &rpc_log_with(data, Some(9), Some(0))).unwrap();
        assert_eq!(event.ethscription_id(), EthscriptionId(id));
        assert_eq!(event.recipient(), owner);
    }

    #[test]
    fn rejects_truncated_data() {
        let log = rpc_log(vec![IVault::Deposited::SIGNATURE_HASH], Some(7), Some(0));
        assert!(matches!(
            decode_log(Chain::AppChain, &log),
            Err(ChainError::Decode(_))
        ));
    }

    #[test]
    fn rejects_pending_log() {
        let log = rpc_log(
            vec![
                IVault::Deposited::SIGNATURE_HASH,
                B256::ZERO,
                address_topic(Address::ZERO),
            ],
            None,
            Some(0),
        );
        assert!(matches!(
            decode_log(Chain::AppChain, &log),
            Err(ChainError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn empty_range_makes_no_rpc_call() {
        use crate::blockchain::ChainEndpoint;

        // Nothing listens on this port; any RPC call would fail.
        let client = ChainClient::new(ChainEndpoint {
            chain: Chain::AppChain,
            rpc_url: "http://127.0.0.1:1".parse().unwrap(),
            contract: Address::ZERO,
            confirmations: 0,
            start_block: 0,
        });
        let watcher = RpcChainWatcher::new(client);
        let events = watcher.poll_range(10, 9).await.unwrap();
        assert!(events.is_empty());
    }
}
