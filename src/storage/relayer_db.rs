// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded relayer database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `processed_events`: (chain, tx_hash, log_index) → serialized ProcessedEvent
//! - `cursors`: chain → last fully processed block number
//! - `event_attempts`: (chain, tx_hash, log_index) → serialized AttemptRecord

use std::path::Path;

use chrono::Utc;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use super::{AttemptStore, CursorStore, EventStore};
use crate::models::{AttemptRecord, AttemptStatus, Chain, EventKey, ProcessedEvent};

// =============================================================================
// Table Definitions
// =============================================================================

/// Append-only idempotency ledger: (chain, tx_hash, log_index) → ProcessedEvent JSON.
const PROCESSED_EVENTS: TableDefinition<(&str, &str, u64), &[u8]> =
    TableDefinition::new("processed_events");

/// Cursor per chain: "appchain" | "mainnet" → block number.
const CURSORS: TableDefinition<&str, u64> = TableDefinition::new("cursors");

/// Retry bookkeeping: (chain, tx_hash, log_index) → AttemptRecord JSON.
const EVENT_ATTEMPTS: TableDefinition<(&str, &str, u64), &[u8]> =
    TableDefinition::new("event_attempts");

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("event already recorded: {0}")]
    AlreadyRecorded(EventKey),

    #[error("cursor for {chain} cannot move back from {current} to {requested}")]
    CursorRegression {
        chain: Chain,
        current: u64,
        requested: u64,
    },
}

pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// Key Helpers
// =============================================================================

/// Owned form of the composite event key (redb borrows `&str` parts).
struct KeyParts {
    chain: &'static str,
    tx_hash: String,
    log_index: u64,
}

impl KeyParts {
    fn new(key: &EventKey) -> Self {
        Self {
            chain: key.chain.as_str(),
            tx_hash: format!("{:#x}", key.tx_hash),
            log_index: key.log_index,
        }
    }

    fn as_tuple(&self) -> (&str, &str, u64) {
        (self.chain, self.tx_hash.as_str(), self.log_index)
    }
}

// =============================================================================
// RelayerDatabase
// =============================================================================

/// Embedded ACID relayer state.
pub struct RelayerDatabase {
    db: Database,
}

impl RelayerDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(PROCESSED_EVENTS)?;
            let _ = write_txn.open_table(CURSORS)?;
            let _ = write_txn.open_table(EVENT_ATTEMPTS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    // =========================================================================
    // Processed events
    // =========================================================================

    /// Look up the ledger row for an event.
    pub fn get_processed(&self, key: &EventKey) -> StoreResult<Option<ProcessedEvent>> {
        let parts = KeyParts::new(key);
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PROCESSED_EVENTS)?;
        match table.get(parts.as_tuple())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Number of ledger rows for a chain.
    pub fn count_processed(&self, chain: Chain) -> StoreResult<usize> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PROCESSED_EVENTS)?;
        let mut count = 0;
        for entry in table.iter()? {
            let (key, _) = entry?;
            if key.value().0 == chain.as_str() {
                count += 1;
            }
        }
        Ok(count)
    }
}

impl EventStore for RelayerDatabase {
    fn is_processed(&self, key: &EventKey) -> StoreResult<bool> {
        let parts = KeyParts::new(key);
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PROCESSED_EVENTS)?;
        Ok(table.get(parts.as_tuple())?.is_some())
    }

    fn record_processed(&self, event: &ProcessedEvent) -> StoreResult<()> {
        let key = event.key();
        let parts = KeyParts::new(&key);
        let json = serde_json::to_vec(event)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut ledger = write_txn.open_table(PROCESSED_EVENTS)?;
            // Uniqueness is checked inside the write transaction; redb
            // serializes writers so check-then-insert cannot interleave.
            if ledger.get(parts.as_tuple())?.is_some() {
                drop(ledger);
                write_txn.abort()?;
                return Err(StoreError::AlreadyRecorded(key));
            }
            ledger.insert(parts.as_tuple(), json.as_slice())?;

            let mut attempts = write_txn.open_table(EVENT_ATTEMPTS)?;
            attempts.remove(parts.as_tuple())?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

impl CursorStore for RelayerDatabase {
    fn get_cursor(&self, chain: Chain) -> StoreResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CURSORS)?;
        Ok(table.get(chain.as_str())?.map(|v| v.value()).unwrap_or(0))
    }

    fn set_cursor(&self, chain: Chain, block_number: u64) -> StoreResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(CURSORS)?;
            let current = table.get(chain.as_str())?.map(|v| v.value()).unwrap_or(0);
            if block_number < current {
                drop(table);
                write_txn.abort()?;
                return Err(StoreError::CursorRegression {
                    chain,
                    current,
                    requested: block_number,
                });
            }
            table.insert(chain.as_str(), block_number)?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

impl AttemptStore for RelayerDatabase {
    fn get_attempt(&self, key: &EventKey) -> StoreResult<Option<AttemptRecord>> {
        let parts = KeyParts::new(key);
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(EVENT_ATTEMPTS)?;
        match table.get(parts.as_tuple())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    fn record_attempt(&self, record: &AttemptRecord) -> StoreResult<()> {
        let parts = KeyParts::new(&record.event.key());
        let json = serde_json::to_vec(record)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(EVENT_ATTEMPTS)?;
            table.insert(parts.as_tuple(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn list_retrying_at_or_below(
        &self,
        chain: Chain,
        block_number: u64,
    ) -> StoreResult<Vec<AttemptRecord>> {
        let mut records: Vec<AttemptRecord> = self
            .all_attempts()?
            .into_iter()
            .filter(|r| {
                r.event.chain == chain
                    && r.status == AttemptStatus::Retrying
                    && r.event.block_number <= block_number
            })
            .collect();
        records.sort_by_key(|r| r.event.position());
        Ok(records)
    }

    fn list_stuck(&self) -> StoreResult<Vec<AttemptRecord>> {
        let mut records: Vec<AttemptRecord> = self
            .all_attempts()?
            .into_iter()
            .filter(AttemptRecord::is_stuck)
            .collect();
        records.sort_by_key(|r| r.first_failed_at);
        Ok(records)
    }

    fn release_stuck(&self, key: &EventKey) -> StoreResult<bool> {
        let parts = KeyParts::new(key);
        let write_txn = self.db.begin_write()?;
        let released = {
            let mut table = write_txn.open_table(EVENT_ATTEMPTS)?;
            let existing: Option<AttemptRecord> = match table.get(parts.as_tuple())? {
                Some(value) => Some(serde_json::from_slice(value.value())?),
                None => None,
            };

            match existing {
                Some(mut record) if record.is_stuck() => {
                    record.status = AttemptStatus::Retrying;
                    record.attempts = 0;
                    record.reverts = 0;
                    record.next_attempt_at = Utc::now();
                    let json = serde_json::to_vec(&record)?;
                    table.insert(parts.as_tuple(), json.as_slice())?;
                    true
                }
                _ => false,
            }
        };
        write_txn.commit()?;
        Ok(released)
    }
}

impl RelayerDatabase {
    fn all_attempts(&self) -> StoreResult<Vec<AttemptRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(EVENT_ATTEMPTS)?;
        let mut records = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            records.push(serde_json::from_slice(value.value())?);
        }
        Ok(records)
    }
}

// =============================================================================
// Tests
// =============================================================================
