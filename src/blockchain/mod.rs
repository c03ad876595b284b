// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Blockchain integration for both sides of the bridge.
//!
//! This module provides functionality for:
//! - Scanning Vault / wrapped-token logs over a block range ([`ChainWatcher`])
//! - Signing, submitting and confirming `mint` / `withdraw` ([`ActionExecutor`])
//! - Loading the relayer signing key

pub mod client;
pub mod contracts;
pub mod executor;
pub mod signing;
pub mod types;
pub mod watcher;

pub use client::{ChainClient, ChainError};
pub use executor::{ActionError, ActionExecutor, RpcActionExecutor};
pub use signing::{load_signer, KeyError};
pub use types::ChainEndpoint;
pub use watcher::{ChainWatcher, RpcChainWatcher};
