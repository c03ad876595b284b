// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Relayer Loop
//!
//! Drives both bridge directions from one sequential loop:
//!
//! 1. **Deposits**: AppChain `Deposited` logs → `mint` on Mainnet.
//! 2. **Burns**: Mainnet `Burned` logs → `withdraw` on the AppChain.
//!
//! ## Strategy
//!
//! Every `poll_interval` the relayer runs one cycle. For each chain it scans
//! from `cursor + 1` up to `head - confirmations` in chunks of at most
//! `max_block_range` blocks, checks each log against the idempotency ledger,
//! performs the counterpart action, and records the confirmed action. Events
//! are handled strictly in `(block, log_index)` order.
//!
//! ## Failure isolation
//!
//! - A failing event is deferred and the rest of the batch continues.
//!   Later events for the same ethscription are deferred with it.
//! - The cursor only moves up to the block before the first deferred event,
//!   so a deferred event is rescanned until it is recorded or settled.
//!   Scanning still runs to the safe head, so blocks past it keep flowing.
//! - An action that keeps reverting is settled as superseded: the duplicate
//!   guard says its effect already happened. This is not alerted on.
//! - Each chain's poll has its own error boundary; an outage on one chain
//!   does not stop the other.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken`, checked between cycles and
//! while sleeping. An in-flight confirmation wait is not interrupted.

pub mod backoff;


use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::TxHash;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub use backoff::BackoffPolicy;

use crate::blockchain::{ActionError, ActionExecutor, ChainEndpoint, ChainWatcher};
use crate::config::RelayerConfig;
use crate::error::RelayerError;
use crate::models::{
    AttemptRecord, AttemptStatus, Chain, EthscriptionId, EventKind, ObservedEvent,
    ProcessedEvent,
};
use crate::storage::{AttemptStore, CursorStore, EventStore, StoreError};

// =============================================================================
// Settings
// =============================================================================

/// Which blocks of one chain are eligible for scanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanWindow {
    /// Blocks kept behind head
    pub confirmations: u64,
    /// Lowest block ever scanned
    pub start_block: u64,
    /// Max blocks per scan
    pub max_block_range: u64,
}

impl ScanWindow {
    pub fn new(endpoint: &ChainEndpoint, max_block_range: u64) -> Self {
        Self {
            confirmations: endpoint.confirmations,
            start_block: endpoint.start_block,
            max_block_range: max_block_range.max(1),
        }
    }

    /// Next `[from, to]` range after `cursor`, or `None` when caught up.
    pub fn next_range(&self, cursor: u64, head: u64) -> Option<(u64, u64)> {
        let from = cursor.saturating_add(1).max(self.start_block);
        let safe_head = head.saturating_sub(self.confirmations);
        if from > safe_head {
            return None;
        }
        let to = safe_head.min(from.saturating_add(self.max_block_range - 1));
        Some((from, to))
    }
}

/// Runtime knobs of the relayer loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayerSettings {
    pub poll_interval: Duration,
    pub appchain: ScanWindow,
    pub mainnet: ScanWindow,
    pub backoff: BackoffPolicy,
}

impl RelayerSettings {
    pub fn from_config(config: &RelayerConfig) -> Self {
        Self {
            poll_interval: config.poll_interval,
            appchain: ScanWindow::new(&config.appchain, config.max_block_range),
            mainnet: ScanWindow::new(&config.mainnet, config.max_block_range),
            backoff: config.backoff,
        }
    }

    fn window(&self, chain: Chain) -> &ScanWindow {
        match chain {
            Chain::AppChain => &self.appchain,
            Chain::Mainnet => &self.mainnet,
        }
    }
}

// =============================================================================
// Reports
// =============================================================================

/// Result of handling one observed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Counterpart action confirmed and recorded in this cycle.
    Confirmed(TxHash),
    /// A ledger row already exists.
    AlreadyProcessed,
    /// Not finished; the event is rescanned or retried later.
    Deferred,
    /// Attempts exhausted; parked for an operator.
    Stuck,
    /// The action keeps reverting because its effect already happened.
    Superseded,
}

/// Summary of one chain's poll.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteReport {
    /// Blocks scanned this cycle, `None` when already caught up
    pub range: Option<(u64, u64)>,
    /// `eth_getLogs` chunks the range was split into
    pub chunks: usize,
    pub observed: usize,
    pub confirmed: usize,
    pub already_processed: usize,
    pub deferred: usize,
    pub stuck: usize,
    pub superseded: usize,
    /// Released events retried below the cursor
    pub redriven: usize,
    /// Cursor after this poll
    pub cursor: u64,
}

impl RouteReport {
    fn tally(&mut self, outcome: EventOutcome) {
        match outcome {
            EventOutcome::Confirmed(_) => self.confirmed += 1,
            EventOutcome::AlreadyProcessed => self.already_processed += 1,
            EventOutcome::Deferred => self.deferred += 1,
            EventOutcome::Stuck => self.stuck += 1,
            EventOutcome::Superseded => self.superseded += 1,
        }
    }

    fn is_idle(&self) -> bool {
        self.observed == 0 && self.redriven == 0
    }
}

/// Summary of one cycle. `None` means that chain's poll failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub appchain: Option<RouteReport>,
    pub mainnet: Option<RouteReport>,
}

// =============================================================================
// Relayer
// =============================================================================

/// Cross-chain relayer over two watchers, one executor and one store.
pub struct Relayer<W, E, S> {
    appchain: W,
    mainnet: W,
    executor: E,
    store: Arc<S>,
    settings: RelayerSettings,
}

impl<W, E, S> Relayer<W, E, S>
where
    W: ChainWatcher,
    E: ActionExecutor,
    S: EventStore + CursorStore + AttemptStore,
{
    pub fn new(
        appchain: W,
        mainnet: W,
        executor: E,
        store: Arc<S>,
        settings: RelayerSettings,
    ) -> Self {
        debug_assert_eq!(appchain.chain(), Chain::AppChain);
        debug_assert_eq!(mainnet.chain(), Chain::Mainnet);
        Self {
            appchain,
            mainnet,
            executor,
            store,
            settings,
        }
    }

    /// Run the relayer loop until the cancellation token is triggered.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_ms = self.settings.poll_interval.as_millis() as u64,
            "Relayer starting"
        );
        self.report_parked();

        loop {
            if shutdown.is_cancelled() {
                info!("Relayer shutting down");
                return;
            }

            self.run_cycle().await;

            tokio::select! {
                _ = tokio::time::sleep(self.settings.poll_interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Relayer shutting down");
                    return;
                }
            }
        }
    }

    /// Log every parked event. Returns how many there are.
    pub fn report_parked(&self) -> usize {
        let parked = match self.store.list_stuck() {
            Ok(parked) => parked,
            Err(e) => {
                error!(error = %e, "Failed to list stuck events");
                return 0;
            }
        };
        for record in &parked {
            warn!(
                chain = %record.event.chain,
                ethscription_id = %record.event.ethscription_id(),
                event = %record.event.key(),
                attempts = record.attempts,
                last_error = %record.last_error,
                first_failed_at = %record.first_failed_at,
                "Event is parked as stuck"
            );
        }
        parked.len()
    }

    /// Poll deposits, then burns. Never fails; errors are logged per chain.
    pub async fn run_cycle(&self) -> CycleReport {
        CycleReport {
            appchain: self.poll_chain(&self.appchain).await,
            mainnet: self.poll_chain(&self.mainnet).await,
        }
    }

    /// Outer error boundary around one chain's poll.
    async fn poll_chain(&self, watcher: &W) -> Option<RouteReport> {
        let chain = watcher.chain();
        match self.poll_route(watcher).await {
            Ok(report) => {
                if report.is_idle() {
                    debug!(chain = %chain, cursor = report.cursor, "No new events");
                } else {
                    info!(
                        chain = %chain,
                        range = ?report.range,
                        observed = report.observed,
                        confirmed = report.confirmed,
                        already_processed = report.already_processed,
                        deferred = report.deferred,
                        stuck = report.stuck,
                        superseded = report.superseded,
                        redriven = report.redriven,
                        cursor = report.cursor,
                        "Poll cycle complete"
                    );
                }
                Some(report)
            }
            Err(e) => {
                error!(chain = %chain, error = %e, "Poll failed, will retry next cycle");
                None
            }
        }
    }

    /// Scan one chain up to its safe head and action what it contains.
    async fn poll_route(&self, watcher: &W) -> Result<RouteReport, RelayerError> {
        let chain = watcher.chain();
        let cursor = self.store.get_cursor(chain)?;
        let mut report = RouteReport {
            cursor,
            ..RouteReport::default()
        };

        self.redrive_released(chain, cursor, &mut report).await?;

        let head = watcher.head_block().await?;
        let window = self.settings.window(chain);

        let mut scanned = cursor;
        let mut blocked: HashSet<EthscriptionId> = HashSet::new();
        let mut first_deferred: Option<u64> = None;

        while let Some((from, to)) = window.next_range(scanned, head) {
            let mut events = watcher.poll_range(from, to).await?;
            events.sort_by_key(ObservedEvent::position);
            report.range = Some((report.range.map_or(from, |(start, _)| start), to));
            report.chunks += 1;
            report.observed += events.len();

            for event in &events {
                let outcome = if blocked.contains(&event.ethscription_id()) {
                    debug!(
                        chain = %chain,
                        ethscription_id = %event.ethscription_id(),
                        tx_hash = %event.tx_hash,
                        log_index = event.log_index,
                        "Earlier event for this ethscription is pending, deferring"
                    );
                    EventOutcome::Deferred
                } else {
                    self.process_event(event, Utc::now()).await
                };

                report.tally(outcome);
                if outcome == EventOutcome::Deferred {
                    blocked.insert(event.ethscription_id());
                    first_deferred.get_or_insert(event.block_number);
                }
            }

            // Never move past an event that is not yet accounted for.
            let target = match first_deferred {
                Some(block) => block.saturating_sub(1),
                None => to,
            };
            if target > report.cursor {
                self.store.set_cursor(chain, target)?;
                report.cursor = target;
            }
            scanned = to;
        }

        Ok(report)
    }

    /// Retry released stuck events that sit at or below the cursor.
    async fn redrive_released(
        &self,
        chain: Chain,
        cursor: u64,
        report: &mut RouteReport,
    ) -> Result<(), RelayerError> {
        let now = Utc::now();
        for record in self.store.list_retrying_at_or_below(chain, cursor)? {
            if !record.is_due(now) {
                continue;
            }
            report.redriven += 1;
            let outcome = self.process_event(&record.event, now).await;
            report.tally(outcome);
        }
        Ok(())
    }

    /// Per-event error boundary: check, act, record.
    async fn process_event(&self, event: &ObservedEvent, now: DateTime<Utc>) -> EventOutcome {
        let key = event.key();

        match self.store.is_processed(&key) {
            Ok(true) => return EventOutcome::AlreadyProcessed,
            Ok(false) => {}
            Err(e) => {
                error!(event = %key, error = %e, "Failed to read processed events");
                return EventOutcome::Deferred;
            }
        }

        let previous = match self.store.get_attempt(&key) {
            Ok(previous) => previous,
            Err(e) => {
                error!(event = %key, error = %e, "Failed to read retry state");
                return EventOutcome::Deferred;
            }
        };
        if let Some(record) = &previous {
            if record.is_superseded() {
                return EventOutcome::Superseded;
            }
            if record.is_stuck() {
                return EventOutcome::Stuck;
            }
            // Already confirmed on the counterpart chain; only the ledger
            // write is missing.
            if let Some(target_tx_hash) = record.confirmed_tx {
                return self.record_confirmed(event, target_tx_hash, previous.as_ref(), now);
            }
            if !record.is_due(now) {
                debug!(
                    event = %key,
                    attempt = record.attempts,
                    next_attempt_at = %record.next_attempt_at,
                    "Backing off"
                );
                return EventOutcome::Deferred;
            }
        }

        let backoff = &self.settings.backoff;
        match self.execute(event).await {
            Ok(target_tx_hash) => {
                self.record_confirmed(event, target_tx_hash, previous.as_ref(), now)
            }
            Err(e @ ActionError::Reverted { .. }) => {
                warn!(
                    chain = %event.chain,
                    ethscription_id = %event.ethscription_id(),
                    event = %key,
                    error = %e,
                    "Counterpart action reverted (possible lost race or replay)"
                );
                self.persist_attempt(backoff.record_revert(
                    event,
                    previous.as_ref(),
                    &e.to_string(),
                    now,
                ))
            }
            Err(e) => {
                if e.is_benign() {
                    warn!(
                        chain = %event.chain,
                        ethscription_id = %event.ethscription_id(),
                        event = %key,
                        error = %e,
                        "Counterpart transaction already submitted, will retry"
                    );
                } else {
                    warn!(
                        chain = %event.chain,
                        ethscription_id = %event.ethscription_id(),
                        event = %key,
                        error = %e,
                        "Counterpart action failed, will retry"
                    );
                }
                self.persist_attempt(backoff.record_failure(
                    event,
                    previous.as_ref(),
                    &e.to_string(),
                    now,
                ))
            }
        }
    }

    /// Issue the counterpart call for an event.
    async fn execute(&self, event: &ObservedEvent) -> Result<TxHash, ActionError> {
        match event.kind {
            EventKind::Deposited {
                ethscription_id,
                owner,
            } => self.executor.mint(ethscription_id, owner).await,
            EventKind::Burned {
                ethscription_id,
                owner,
            } => self.executor.withdraw(ethscription_id, owner).await,
        }
    }

    fn record_confirmed(
        &self,
        event: &ObservedEvent,
        target_tx_hash: TxHash,
        previous: Option<&AttemptRecord>,
        now: DateTime<Utc>,
    ) -> EventOutcome {
        let row = ProcessedEvent::confirmed(event, target_tx_hash);
        match self.store.record_processed(&row) {
            Ok(()) => {
                info!(
                    chain = %event.chain,
                    target_chain = %event.chain.counterpart(),
                    event_type = %event.event_type(),
                    ethscription_id = %event.ethscription_id(),
                    recipient = %event.recipient(),
                    tx_hash = %event.tx_hash,
                    log_index = event.log_index,
                    target_tx_hash = %target_tx_hash,
                    "Counterpart action confirmed"
                );
                EventOutcome::Confirmed(target_tx_hash)
            }
            Err(StoreError::AlreadyRecorded(key)) => {
                warn!(event = %key, "Event was recorded by another writer");
                EventOutcome::AlreadyProcessed
            }
            Err(e) => {
                error!(
                    chain = %event.chain,
                    ethscription_id = %event.ethscription_id(),
                    event = %row.key(),
                    target_tx_hash = %target_tx_hash,
                    error = %e,
                    "Confirmed action could not be recorded, event stays pending"
                );
                let mut record = self.settings.backoff.record_failure(
                    event,
                    previous,
                    &format!("confirmed as {target_tx_hash:#x} but not recorded: {e}"),
                    now,
                );
                record.confirmed_tx = Some(target_tx_hash);
                self.persist_attempt(record)
            }
        }
    }

    /// Store the new retry state and map it to an outcome.
    fn persist_attempt(&self, record: AttemptRecord) -> EventOutcome {
        let event = &record.event;
        if let Err(e) = self.store.record_attempt(&record) {
            error!(event = %event.key(), error = %e, "Failed to persist retry state");
            return EventOutcome::Deferred;
        }

        match record.status {
            AttemptStatus::Superseded => {
                warn!(
                    chain = %event.chain,
                    ethscription_id = %event.ethscription_id(),
                    event = %event.key(),
                    reverts = record.reverts,
                    last_error = %record.last_error,
                    "Counterpart action keeps reverting, settled as already done"
                );
                EventOutcome::Superseded
            }
            AttemptStatus::Stuck => {
                error!(
                    chain = %event.chain,
                    ethscription_id = %event.ethscription_id(),
                    event = %event.key(),
                    attempts = record.attempts,
                    last_error = %record.last_error,
                    "Event parked as stuck after repeated failures"
                );
                EventOutcome::Stuck
            }
            AttemptStatus::Retrying => {
                debug!(
                    event = %event.key(),
                    attempt = record.attempts,
                    next_attempt_at = %record.next_attempt_at,
                    "Scheduled retry"
                );
                EventOutcome::Deferred
            }
        }
    }
}

#[cfg(test)]
mod window_tests {
    use super::*;

    fn window(confirmations: u64, start_block: u64, max_block_range: u64) -> ScanWindow {
        ScanWindow {
            confirmations,
            start_block,
            max_block_range,
        }
    }

    #[test]
    fn scans_from_cursor_plus_one_to_head() {
        assert_eq!(window(0, 0, 2000).next_range(0, 100), Some((1, 100)));
        assert_eq!(window(0, 0, 2000).next_range(99, 100), Some((100, 100)));
        assert_eq!(window(0, 0, 2000).next_range(100, 100), None);
    }

    #[test]
    fn applies_confirmation_depth() {
        assert_eq!(window(10, 0, 2000).next_range(0, 100), Some((1, 90)));
        assert_eq!(window(10, 0, 2000).next_range(90, 100), None);
        assert_eq!(window(10, 0, 2000).next_range(0, 5), None);
    }

    #[test]
    fn chunks_large_gaps() {
        assert_eq!(window(0, 0, 50).next_range(0, 1000), Some((1, 50)));
        assert_eq!(window(0, 0, 50).next_range(50, 1000), Some((51, 100)));
        assert_eq!(window(0, 0, 1).next_range(7, 1000), Some((8, 8)));
    }

    #[test]
    fn start_block_only_raises_the_floor() {
        assert_eq!(window(0, 1000, 2000).next_range(0, 1500), Some((1000, 1500)));
        assert_eq!(window(0, 1000, 2000).next_range(1200, 1500), Some((1201, 1500)));
        assert_eq!(window(0, 1000, 2000).next_range(0, 999), None);
    }
}
