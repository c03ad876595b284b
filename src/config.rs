// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! [`RelayerConfig`] is loaded from the environment once at startup and passed
//! explicitly to every constructor. A missing or malformed required variable is
//! fatal.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `APPCHAIN_RPC_URL` | AppChain JSON-RPC endpoint | Required |
//! | `MAINNET_RPC_URL` | Mainnet JSON-RPC endpoint | Required |
//! | `VAULT_ADDRESS` | Vault contract on the AppChain | Required |
//! | `WRAPPED_ADDRESS` | WrappedEthscription contract on Mainnet | Required |
//! | `RELAYER_PRIVATE_KEY` | Relayer key (hex or PEM) | Required |
//! | `POLL_INTERVAL_MS` | Delay between poll cycles | Required |
//! | `DATABASE_PATH` | redb file for ledger and cursors | Required |
//! | `APPCHAIN_CONFIRMATIONS` | Blocks kept behind AppChain head | `0` |
//! | `MAINNET_CONFIRMATIONS` | Blocks kept behind Mainnet head | `0` |
//! | `APPCHAIN_START_BLOCK` | First AppChain block on a fresh database | `0` |
//! | `MAINNET_START_BLOCK` | First Mainnet block on a fresh database | `0` |
//! | `MAX_BLOCK_RANGE` | Blocks per `eth_getLogs` query | `2000` |
//! | `RECEIPT_TIMEOUT_SECS` | Max wait for a confirmation | `120` |
//! | `RETRY_INITIAL_BACKOFF_MS` | First retry delay after a failed action | `5000` |
//! | `RETRY_MAX_BACKOFF_MS` | Retry delay ceiling | `600000` |
//! | `RETRY_MAX_ATTEMPTS` | Attempts before an event is parked as stuck | `20` |
//! | `RETRY_SUPERSEDE_AFTER_REVERTS` | Consecutive reverts before an event is settled as superseded | `2` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use url::Url;

use crate::blockchain::{load_signer, ChainEndpoint};
use crate::logging::LogFormat;
use crate::models::Chain;
use crate::relayer::BackoffPolicy;

pub const APPCHAIN_RPC_URL_ENV: &str = "APPCHAIN_RPC_URL";
pub const MAINNET_RPC_URL_ENV: &str = "MAINNET_RPC_URL";
pub const VAULT_ADDRESS_ENV: &str = "VAULT_ADDRESS";
pub const WRAPPED_ADDRESS_ENV: &str = "WRAPPED_ADDRESS";
pub const RELAYER_PRIVATE_KEY_ENV: &str = "RELAYER_PRIVATE_KEY";
pub const POLL_INTERVAL_MS_ENV: &str = "POLL_INTERVAL_MS";
pub const DATABASE_PATH_ENV: &str = "DATABASE_PATH";

pub const APPCHAIN_CONFIRMATIONS_ENV: &str = "APPCHAIN_CONFIRMATIONS";
pub const MAINNET_CONFIRMATIONS_ENV: &str = "MAINNET_CONFIRMATIONS";
pub const APPCHAIN_START_BLOCK_ENV: &str = "APPCHAIN_START_BLOCK";
pub const MAINNET_START_BLOCK_ENV: &str = "MAINNET_START_BLOCK";
pub const MAX_BLOCK_RANGE_ENV: &str = "MAX_BLOCK_RANGE";
pub const RECEIPT_TIMEOUT_SECS_ENV: &str = "RECEIPT_TIMEOUT_SECS";
pub const RETRY_INITIAL_BACKOFF_MS_ENV: &str = "RETRY_INITIAL_BACKOFF_MS";
pub const RETRY_MAX_BACKOFF_MS_ENV: &str = "RETRY_MAX_BACKOFF_MS";
pub const RETRY_MAX_ATTEMPTS_ENV: &str = "RETRY_MAX_ATTEMPTS";
pub const RETRY_SUPERSEDE_AFTER_REVERTS_ENV: &str = "RETRY_SUPERSEDE_AFTER_REVERTS";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Default block chunk size per `eth_getLogs` query.
pub const DEFAULT_MAX_BLOCK_RANGE: u64 = 2000;

/// Default wait for one confirmation of a counterpart transaction.
pub const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(120);

/// Configuration errors. All of them abort startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Everything the relayer needs, resolved and validated.
#[derive(Debug, Clone)]
pub struct RelayerConfig {
    pub appchain: ChainEndpoint,
    pub mainnet: ChainEndpoint,
    pub signer: PrivateKeySigner,
    pub poll_interval: Duration,
    pub database_path: PathBuf,
    pub max_block_range: u64,
    pub receipt_timeout: Duration,
    pub backoff: BackoffPolicy,
    pub log_format: LogFormat,
}

impl RelayerConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load using an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup };

        let appchain = ChainEndpoint {
            chain: Chain::AppChain,
            rpc_url: vars.required_parsed::<Url>(APPCHAIN_RPC_URL_ENV)?,
            contract: vars.required_parsed::<Address>(VAULT_ADDRESS_ENV)?,
            confirmations: vars.optional_parsed(APPCHAIN_CONFIRMATIONS_ENV, 0)?,
            start_block: vars.optional_parsed(APPCHAIN_START_BLOCK_ENV, 0)?,
        };
        let mainnet = ChainEndpoint {
            chain: Chain::Mainnet,
            rpc_url: vars.required_parsed::<Url>(MAINNET_RPC_URL_ENV)?,
            contract: vars.required_parsed::<Address>(WRAPPED_ADDRESS_ENV)?,
            confirmations: vars.optional_parsed(MAINNET_CONFIRMATIONS_ENV, 0)?,
            start_block: vars.optional_parsed(MAINNET_START_BLOCK_ENV, 0)?,
        };

        let signer = load_signer(&vars.required(RELAYER_PRIVATE_KEY_ENV)?).map_err(|e| {
            ConfigError::Invalid {
                var: RELAYER_PRIVATE_KEY_ENV,
                reason: e.to_string(),
            }
        })?;

        let poll_interval_ms: u64 = vars.required_parsed(POLL_INTERVAL_MS_ENV)?;
        if poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                var: POLL_INTERVAL_MS_ENV,
                reason: "must be greater than zero".to_string(),
            });
        }

        let database_path = PathBuf::from(vars.required(DATABASE_PATH_ENV)?);

        let max_block_range = vars.optional_parsed(MAX_BLOCK_RANGE_ENV, DEFAULT_MAX_BLOCK_RANGE)?;
        if max_block_range == 0 {
            return Err(ConfigError::Invalid {
                var: MAX_BLOCK_RANGE_ENV,
                reason: "must be greater than zero".to_string(),
            });
        }

        let receipt_timeout = Duration::from_secs(
            vars.optional_parsed(RECEIPT_TIMEOUT_SECS_ENV, DEFAULT_RECEIPT_TIMEOUT.as_secs())?,
        );

        let defaults = BackoffPolicy::default();
        let backoff = BackoffPolicy {
            initial_backoff: Duration::from_millis(vars.optional_parsed(
                RETRY_INITIAL_BACKOFF_MS_ENV,
                defaults.initial_backoff.as_millis() as u64,
            )?),
            max_backoff: Duration::from_millis(vars.optional_parsed(
                RETRY_MAX_BACKOFF_MS_ENV,
                defaults.max_backoff.as_millis() as u64,
            )?),
            max_attempts: vars.optional_parsed(RETRY_MAX_ATTEMPTS_ENV, defaults.max_attempts)?,
            supersede_after_reverts: vars.optional_parsed(
                RETRY_SUPERSEDE_AFTER_REVERTS_ENV,
                defaults.supersede_after_reverts,
            )?,
        };
        if backoff.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                var: RETRY_MAX_ATTEMPTS_ENV,
                reason: "must be greater than zero".to_string(),
            });
        }
        if backoff.supersede_after_reverts == 0 {
            return Err(ConfigError::Invalid {
                var: RETRY_SUPERSEDE_AFTER_REVERTS_ENV,
                reason: "must be greater than zero".to_string(),
            });
        }

        let log_format = vars.optional_parsed(LOG_FORMAT_ENV, LogFormat::Pretty)?;

        Ok(Self {
            appchain,
            mainnet,
            signer,
            poll_interval: Duration::from_millis(poll_interval_ms),
            database_path,
            max_block_range,
            receipt_timeout,
            backoff,
            log_format,
        })
    }

    /// Relayer account address (same on both chains).
    pub fn relayer_address(&self) -> Address {
        self.signer.address()
    }
}

struct Vars<F> {
    lookup: F,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.get(name).ok_or(ConfigError::Missing(name))
    }

    fn required_parsed<T>(&self, name: &'static str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        parse_value(name, &self.required(name)?)
    }

    fn optional_parsed<T>(&self, name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(name) {
            Some(raw) => parse_value(name, &raw),
            None => Ok(default),
        }
    }
}

fn parse_value<T>(name: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>().map_err(|e| ConfigError::Invalid {
        var: name,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, String> {
        HashMap::from([
            (APPCHAIN_RPC_URL_ENV, "http://localhost:8545".to_string()),
            (MAINNET_RPC_URL_ENV, "https://mainnet.example.org/rpc".to_string()),
            (
                VAULT_ADDRESS_ENV,
                "0x1111111111111111111111111111111111111111".to_string(),
            ),
            (
                WRAPPED_ADDRESS_ENV,
                "0x2222222222222222222222222222222222222222".to_string(),
            ),
            (
                RELAYER_PRIVATE_KEY_ENV,
                "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80".to_string(),
            ),
            (POLL_INTERVAL_MS_ENV, "3000".to_string()),
            (DATABASE_PATH_ENV, "/tmp/relayer.redb".to_string()),
        ])
    }

    fn load(env: &HashMap<&'static str, String>) -> Result<RelayerConfig, ConfigError> {
        RelayerConfig::from_lookup(|name| env.get(name).cloned())
    }

    #[test]
    fn loads_required_with_defaults() {
        let config = load(&base_env()).unwrap();

        assert_eq!(config.appchain.chain, Chain::AppChain);
        assert_eq!(config.mainnet.chain, Chain::Mainnet);
        assert_eq!(
            config.appchain.contract,
            "0x1111111111111111111111111111111111111111"
                .parse::<Address>()
                .unwrap()
        );
        assert_eq!(config.poll_interval, Duration::from_millis(3000));
        assert_eq!(config.database_path, PathBuf::from("/tmp/relayer.redb"));
        assert_eq!(config.appchain.confirmations, 0);
        assert_eq!(config.mainnet.start_block, 0);
        assert_eq!(config.max_block_range, DEFAULT_MAX_BLOCK_RANGE);
        assert_eq!(config.receipt_timeout, DEFAULT_RECEIPT_TIMEOUT);
        assert_eq!(config.backoff, BackoffPolicy::default());
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(
            config.relayer_address(),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
                .parse::<Address>()
                .unwrap()
        );
    }

    #[test]
    fn every_required_variable_is_fatal_when_missing() {
        for var in [
            APPCHAIN_RPC_URL_ENV,
            MAINNET_RPC_URL_ENV,
            VAULT_ADDRESS_ENV,
            WRAPPED_ADDRESS_ENV,
            RELAYER_PRIVATE_KEY_ENV,
            POLL_INTERVAL_MS_ENV,
            DATABASE_PATH_ENV,
        ] {
            let mut env = base_env();
            env.remove(var);
            match load(&env) {
                Err(ConfigError::Missing(name)) => assert_eq!(name, var),
                other => panic!("expected Missing({var}), got {other:?}"),
            }
        }
    }

    #[test]
    fn blank_value_counts_as_missing() {
        let mut env = base_env();
        env.insert(DATABASE_PATH_ENV, "   ".to_string());
        assert!(matches!(
            load(&env),
            Err(ConfigError::Missing(DATABASE_PATH_ENV))
        ));
    }

    #[test]
    fn malformed_values_are_invalid() {
        let cases = [
            (APPCHAIN_RPC_URL_ENV, "not a url"),
            (VAULT_ADDRESS_ENV, "0x1234"),
            (RELAYER_PRIVATE_KEY_ENV, "nothex"),
            (POLL_INTERVAL_MS_ENV, "soon"),
            (POLL_INTERVAL_MS_ENV, "0"),
            (MAX_BLOCK_RANGE_ENV, "0"),
            (RETRY_MAX_ATTEMPTS_ENV, "0"),
            (RETRY_SUPERSEDE_AFTER_REVERTS_ENV, "0"),
            (LOG_FORMAT_ENV, "xml"),
        ];
        for (var, value) in cases {
            let mut env = base_env();
            env.insert(var, value.to_string());
            match load(&env) {
                Err(ConfigError::Invalid { var: got, .. }) => assert_eq!(got, var),
                other => panic!("expected Invalid({var}={value}), got {other:?}"),
            }
        }
    }

    #[test]
    fn optional_overrides() {
        let mut env = base_env();
        env.insert(APPCHAIN_CONFIRMATIONS_ENV, "6".to_string());
        env.insert(MAINNET_CONFIRMATIONS_ENV, "12".to_string());
        env.insert(APPCHAIN_START_BLOCK_ENV, "1000".to_string());
        env.insert(MAX_BLOCK_RANGE_ENV, "500".to_string());
        env.insert(RECEIPT_TIMEOUT_SECS_ENV, "30".to_string());
        env.insert(RETRY_INITIAL_BACKOFF_MS_ENV, "100".to_string());
        env.insert(RETRY_MAX_BACKOFF_MS_ENV, "1000".to_string());
        env.insert(RETRY_MAX_ATTEMPTS_ENV, "3".to_string());
        env.insert(RETRY_SUPERSEDE_AFTER_REVERTS_ENV, "4".to_string());
        env.insert(LOG_FORMAT_ENV, "json".to_string());

        let config = load(&env).unwrap();
        assert_eq!(config.appchain.confirmations, 6);
        assert_eq!(config.mainnet.confirmations, 12);
        assert_eq!(config.appchain.start_block, 1000);
        assert_eq!(config.max_block_range, 500);
        assert_eq!(config.receipt_timeout, Duration::from_secs(30));
        assert_eq!(config.backoff.initial_backoff, Duration::from_millis(100));
        assert_eq!(config.backoff.max_backoff, Duration::from_millis(1000));
        assert_eq!(config.backoff.max_attempts, 3);
        assert_eq!(config.backoff.supersede_after_reverts, 4);
        assert_eq!(config.log_format, LogFormat::Json);
    }
}
