// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Relayer Storage Module
//!
//! Durable relayer state in a single embedded redb file.
//!
//! ## Stores
//!
//! - [`EventStore`]: idempotency ledger of actioned events. Rows are
//!   append-only and keyed by `(chain, tx_hash, log_index)`; a duplicate
//!   record is rejected by the store itself, not only by the pre-check.
//! - [`CursorStore`]: last fully processed block per chain.
//! - [`AttemptStore`]: retry bookkeeping for events whose action failed.
//!
//! [`RelayerDatabase`] implements all three. The orchestration loop is generic
//! over the traits so tests can inject persistence faults.

pub mod relayer_db;

pub use relayer_db::{RelayerDatabase, StoreError, StoreResult};

use crate::models::{AttemptRecord, Chain, EventKey, ProcessedEvent};

/// Idempotency ledger.
pub trait EventStore: Send + Sync {
    /// Whether a `processed_events` row exists for `key`.
    fn is_processed(&self, key: &EventKey) -> StoreResult<bool>;

    /// Append the row for a confirmed action.
    ///
    /// Fails with [`StoreError::AlreadyRecorded`] if the key already exists.
    fn record_processed(&self, event: &ProcessedEvent) -> StoreResult<()>;
}

/// Resumable per-chain scan progress.
pub trait CursorStore: Send + Sync {
    /// Last fully processed block, `0` if the chain was never scanned.
    fn get_cursor(&self, chain: Chain) -> StoreResult<u64>;

    /// Durably advance the cursor. Moving backwards is rejected.
    fn set_cursor(&self, chain: Chain, block_number: u64) -> StoreResult<()>;
}

/// Retry bookkeeping for failed actions.
pub trait AttemptStore: Send + Sync {
    fn get_attempt(&self, key: &EventKey) -> StoreResult<Option<AttemptRecord>>;

    fn record_attempt(&self, record: &AttemptRecord) -> StoreResult<()>;

    /// Retrying records for `chain` whose event sits at or below `block_number`.
    fn list_retrying_at_or_below(
        &self,
        chain: Chain,
        block_number: u64,
    ) -> StoreResult<Vec<AttemptRecord>>;

    /// All parked events, oldest failure first.
    fn list_stuck(&self) -> StoreResult<Vec<AttemptRecord>>;

    /// Reset a parked event so the next cycle retries it.
    ///
    /// Returns `false` if no stuck record exists for `key`.
    fn release_stuck(&self, key: &EventKey) -> StoreResult<bool>;
}
