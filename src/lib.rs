// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ethscription Relayer - Cross-Chain Wrapper Bridge
//!
//! Watches an AppChain Vault for `Deposited` and a Mainnet wrapped-token
//! contract for `Burned`, and performs the counterpart `mint` / `withdraw`
//! exactly once per observed log.
//!
//! ## Modules
//!
//! - `blockchain` - Log scanning, contract calls, key loading (alloy)
//! - `config` - Environment configuration
//! - `relayer` - Poll loop, retry backoff
//! - `storage` - Idempotency ledger and cursors (redb)

pub mod blockchain;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod relayer;
pub mod storage;
