// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use crate::blockchain::ChainError;
use crate::config::ConfigError;
use crate::storage::StoreError;

/// Errors that abort startup or one chain's poll.
#[derive(Debug, thiserror::Error)]
pub enum RelayerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("chain error: {0}")]
    Chain(#[from] ChainError),
}
