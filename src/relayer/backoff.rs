// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Exponential backoff for failed counterpart actions.
//!
//! A failure either schedules another attempt, parks the event as `Stuck`
//! once `max_attempts` is reached, or settles it as `Superseded` once the
//! action has reverted `supersede_after_reverts` times in a row. Repeated
//! reverts mean the contract's duplicate guard is rejecting the call: the
//! mint/withdraw already happened, through a lost race or a submission made
//! before a restart.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::models::{AttemptRecord, AttemptStatus, ObservedEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Failed attempts after which an event is parked as stuck.
    pub max_attempts: u32,
    /// Consecutive reverts after which an event is settled as superseded.
    pub supersede_after_reverts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_secs(5),
            max_backoff: Duration::from_secs(600),
            max_attempts: 20,
            supersede_after_reverts: 2,
        }
    }
}

impl BackoffPolicy {
    /// Delay after the `attempts`-th consecutive failure.
    pub fn backoff_duration(&self, attempts: u32) -> Duration {
        let factor = 2u32
            .checked_pow(attempts.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    /// Fold one more non-revert failure into the event's retry state.
    pub fn record_failure(
        &self,
        event: &ObservedEvent,
        previous: Option<&AttemptRecord>,
        error: &str,
        now: DateTime<Utc>,
    ) -> AttemptRecord {
        self.next_record(event, previous, error, 0, now)
    }

    /// Fold one more reverted attempt into the event's retry state.
    pub fn record_revert(
        &self,
        event: &ObservedEvent,
        previous: Option<&AttemptRecord>,
        error: &str,
        now: DateTime<Utc>,
    ) -> AttemptRecord {
        let reverts = previous.map_or(0, |p| p.reverts).saturating_add(1);
        self.next_record(event, previous, error, reverts, now)
    }

    fn next_record(
        &self,
        event: &ObservedEvent,
        previous: Option<&AttemptRecord>,
        error: &str,
        reverts: u32,
        now: DateTime<Utc>,
    ) -> AttemptRecord {
        let attempts = previous.map_or(0, |p| p.attempts).saturating_add(1);
        let status = if reverts >= self.supersede_after_reverts {
            AttemptStatus::Superseded
        } else if attempts >= self.max_attempts {
            AttemptStatus::Stuck
        } else {
            AttemptStatus::Retrying
        };

        let delay = chrono::Duration::from_std(self.backoff_duration(attempts))
            .unwrap_or(chrono::Duration::MAX);
        let next_attempt_at = now
            .checked_add_signed(delay)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        AttemptRecord {
            event: *event,
            attempts,
            status,
            last_error: error.to_string(),
            reverts,
            confirmed_tx: previous.and_then(|p| p.confirmed_tx),
            first_failed_at: previous.map_or(now, |p| p.first_failed_at),
            last_failed_at: now,
            next_attempt_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Chain, EthscriptionId, EventKind};
    use alloy::primitives::{Address, TxHash, B256};

    fn event() -> ObservedEvent {
        ObservedEvent {
            chain: Chain::Mainnet,
            tx_hash: TxHash::repeat_byte(0x01),
            log_index: 0,
            block_number: 500,
            kind: EventKind::Burned {
                ethscription_id: EthscriptionId(B256::repeat_byte(0xCC)),
                owner: Address::repeat_byte(0xDD),
            },
        }
    }

    fn policy(max_attempts: u32) -> BackoffPolicy {
        BackoffPolicy {
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            max_attempts,
            supersede_after_reverts: 2,
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = BackoffPolicy {
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(10),
            max_attempts: 100,
            supersede_after_reverts: 2,
        };
        assert_eq!(policy.backoff_duration(1), Duration::from_secs(1));
        assert_eq!(policy.backoff_duration(2), Duration::from_secs(2));
        assert_eq!(policy.backoff_duration(4), Duration::from_secs(8));
        assert_eq!(policy.backoff_duration(5), Duration::from_secs(10));
        assert_eq!(policy.backoff_duration(64), Duration::from_secs(10));
    }

    #[test]
    fn failures_accumulate_until_stuck() {
        let policy = policy(3);
        let t0 = Utc::now();

        let first = policy.record_failure(&event(), None, "503", t0);
        assert_eq!(first.attempts, 1);
        assert_eq!(first.status, AttemptStatus::Retrying);
        assert_eq!(first.next_attempt_at, t0 + chrono::Duration::seconds(1));

        let t1 = t0 + chrono::Duration::seconds(5);
        let second = policy.record_failure(&event(), Some(&first), "timeout", t1);
        assert_eq!(second.attempts, 2);
        assert_eq!(second.first_failed_at, t0);
        assert_eq!(second.last_failed_at, t1);
        assert_eq!(second.last_error, "timeout");
        assert_eq!(second.next_attempt_at, t1 + chrono::Duration::seconds(2));

        let third = policy.record_failure(&event(), Some(&second), "503", t1);
        assert_eq!(third.attempts, 3);
        assert!(third.is_stuck());
    }

    #[test]
    fn repeated_reverts_settle_as_superseded_not_stuck() {
        let policy = policy(2);
        let now = Utc::now();

        let first = policy.record_revert(&event(), None, "already minted", now);
        assert_eq!(first.reverts, 1);
        assert_eq!(first.status, AttemptStatus::Retrying);

        let second = policy.record_revert(&event(), Some(&first), "already minted", now);
        assert_eq!(second.reverts, 2);
        assert!(second.is_superseded());
        assert!(!second.is_stuck());
    }

    #[test]
    fn other_failure_breaks_the_revert_streak() {
        let policy = policy(20);
        let now = Utc::now();

        let reverted = policy.record_revert(&event(), None, "reverted", now);
        let timed_out = policy.record_failure(&event(), Some(&reverted), "timeout", now);
        assert_eq!(timed_out.reverts, 0);

        let reverted = policy.record_revert(&event(), Some(&timed_out), "reverted", now);
        assert_eq!(reverted.reverts, 1);
        assert_eq!(reverted.status, AttemptStatus::Retrying);
        assert_eq!(reverted.attempts, 3);
    }

    #[test]
    fn confirmed_tx_is_carried_forward() {
        let policy = policy(20);
        let now = Utc::now();

        let mut first = policy.record_failure(&event(), None, "disk full", now);
        first.confirmed_tx = Some(TxHash::repeat_byte(0x42));
        let second = policy.record_failure(&event(), Some(&first), "disk full", now);
        assert_eq!(second.confirmed_tx, Some(TxHash::repeat_byte(0x42)));
    }
}
