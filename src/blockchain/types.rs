// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-chain connection settings.

use alloy::primitives::Address;
use url::Url;

use crate::models::Chain;

/// Connection and scanning settings for one side of the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainEndpoint {
    /// Which side of the bridge this is
    pub chain: Chain,
    /// JSON-RPC endpoint URL
    pub rpc_url: Url,
    /// Watched contract (Vault on the AppChain, wrapped token on Mainnet).
    /// Counterpart actions for the other chain's events are sent here too.
    pub contract: Address,
    /// Blocks kept behind head before a log is acted on (0 = raw head)
    pub confirmations: u64,
    /// First block scanned when no cursor has been stored yet
    pub start_block: u64,
}
