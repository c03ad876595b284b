// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Relayer Data Models
//!
//! Domain types shared by the chain watchers, the action executor, the redb
//! store and the orchestration loop.
//!
//! ## Identity
//!
//! An observed log is identified by [`EventKey`] = `(chain, tx_hash, log_index)`.
//! The same key is the primary key of the `processed_events` table, so the
//! storage layer rejects a second record for a log that was already actioned.
//!
//! ## Model Categories
//!
//! - **Chains**: [`Chain`] names the two sides of the bridge
//! - **Events**: [`ObservedEvent`] and [`EventKind`] (deposits and burns)
//! - **Ledger rows**: [`ProcessedEvent`] (append-only) and [`AttemptRecord`]
//!   (retry bookkeeping)

use std::fmt;

use alloy::primitives::{Address, TxHash, B256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Chains
// =============================================================================

/// One side of the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    /// Origin chain hosting the Vault.
    AppChain,
    /// Counterpart chain hosting the wrapped token.
    Mainnet,
}

impl Chain {
    /// Stable storage key for this chain.
    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::AppChain => "appchain",
            Chain::Mainnet => "mainnet",
        }
    }

    /// The chain on which actions for this chain's events are executed.
    pub fn counterpart(&self) -> Chain {
        match self {
            Chain::AppChain => Chain::Mainnet,
            Chain::Mainnet => Chain::AppChain,
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Ethscription Identifier
// =============================================================================

/// 32-byte ethscription identifier, the join key between both chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EthscriptionId(pub B256);

impl fmt::Display for EthscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl From<B256> for EthscriptionId {
    fn from(value: B256) -> Self {
        EthscriptionId(value)
    }
}

impl From<EthscriptionId> for B256 {
    fn from(value: EthscriptionId) -> Self {
        value.0
    }
}

// =============================================================================
// Observed Events
// =============================================================================

/// Kind of cross-chain action an event triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    /// Vault `Deposited` on the AppChain, answered by `mint` on Mainnet.
    Deposit,
    /// Wrapped `Burned` on Mainnet, answered by `withdraw` on the AppChain.
    Burn,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Deposit => "deposit",
            EventType::Burn => "burn",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoded arguments of a watched log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EventKind {
    /// `Deposited(bytes32 ethscriptionId, address owner)`
    Deposited {
        ethscription_id: EthscriptionId,
        owner: Address,
    },
    /// `Burned(bytes32 ethscriptionId, address owner)`
    Burned {
        ethscription_id: EthscriptionId,
        owner: Address,
    },
}

/// Primary key of an observed log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventKey {
    pub chain: Chain,
    pub tx_hash: TxHash,
    pub log_index: u64,
}

impl EventKey {
    pub fn new(chain: Chain, tx_hash: TxHash, log_index: u64) -> Self {
        Self {
            chain,
            tx_hash,
            log_index,
        }
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:#x}:{}", self.chain, self.tx_hash, self.log_index)
    }
}

/// A watched log found by a chain watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedEvent {
    pub chain: Chain,
    pub tx_hash: TxHash,
    pub log_index: u64,
    pub block_number: u64,
    pub kind: EventKind,
}

impl ObservedEvent {
    pub fn key(&self) -> EventKey {
        EventKey::new(self.chain, self.tx_hash, self.log_index)
    }

    pub fn ethscription_id(&self) -> EthscriptionId {
        match self.kind {
            EventKind::Deposited {
                ethscription_id, ..
            }
            | EventKind::Burned {
                ethscription_id, ..
            } => ethscription_id,
        }
    }

    /// Address that receives the asset on the counterpart chain.
    pub fn recipient(&self) -> Address {
        match self.kind {
            EventKind::Deposited { owner, .. } | EventKind::Burned { owner, .. } => owner,
        }
    }

    pub fn event_type(&self) -> EventType {
        match self.kind {
            EventKind::Deposited { .. } => EventType::Deposit,
            EventKind::Burned { .. } => EventType::Burn,
        }
    }

    /// Ordering key inside one chain's batch.
    pub fn position(&self) -> (u64, u64) {
        (self.block_number, self.log_index)
    }
}

// =============================================================================
// Ledger Rows
// =============================================================================

/// Append-only proof that an observed event was actioned exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedEvent {
    pub chain: Chain,
    pub tx_hash: TxHash,
    pub log_index: u64,
    pub event_type: EventType,
    pub ethscription_id: EthscriptionId,
    /// Confirmed counterpart transaction.
    pub target_tx_hash: TxHash,
    pub created_at: DateTime<Utc>,
}

impl ProcessedEvent {
    /// Build the ledger row for an event whose counterpart tx confirmed.
    pub fn confirmed(event: &ObservedEvent, target_tx_hash: TxHash) -> Self {
        Self {
            chain: event.chain,
            tx_hash: event.tx_hash,
            log_index: event.log_index,
            event_type: event.event_type(),
            ethscription_id: event.ethscription_id(),
            target_tx_hash,
            created_at: Utc::now(),
        }
    }

    pub fn key(&self) -> EventKey {
        EventKey::new(self.chain, self.tx_hash, self.log_index)
    }
}

/// Retry state of an event whose action has failed at least once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptStatus {
    /// Eligible again once `next_attempt_at` has passed.
    Retrying,
    /// Attempts exhausted; parked until an operator releases it.
    Stuck,
    /// The counterpart call keeps reverting because its effect already
    /// happened (lost race or replay of a pre-restart submission). Terminal
    /// and not alertable.
    Superseded,
}

/// Failure bookkeeping for one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub event: ObservedEvent,
    pub attempts: u32,
    pub status: AttemptStatus,
    pub last_error: String,
    /// Consecutive reverted attempts.
    #[serde(default)]
    pub reverts: u32,
    /// Counterpart tx that confirmed but could not be recorded yet.
    #[serde(default)]
    pub confirmed_tx: Option<TxHash>,
    pub first_failed_at: DateTime<Utc>,
    pub last_failed_at: DateTime<Utc>,
    pub next_attempt_at: DateTime<Utc>,
}

impl AttemptRecord {
    pub fn is_stuck(&self) -> bool {
        self.status == AttemptStatus::Stuck
    }

    pub fn is_superseded(&self) -> bool {
        self.status == AttemptStatus::Superseded
    }

    /// Whether the backoff window has elapsed at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == AttemptStatus::Retrying && now >= self.next_attempt_at
    }
}
