// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::process;
use std::sync::Arc;

use ethscription_relayer::blockchain::{
    signing, ChainClient, RpcActionExecutor, RpcChainWatcher,
};
use ethscription_relayer::config::RelayerConfig;
use ethscription_relayer::error::RelayerError;
use ethscription_relayer::logging::init_tracing;
use ethscription_relayer::models::Chain;
use ethscription_relayer::relayer::{Relayer, RelayerSettings};
use ethscription_relayer::storage::RelayerDatabase;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    // Config errors happen before logging exists, so report on stderr.
    if let Err(e) = run().await {
        eprintln!("ethscription-relayer: {e}");
        process::exit(1);
    }
}

async fn run() -> Result<(), RelayerError> {
    let config = RelayerConfig::from_env()?;
    init_tracing(config.log_format);

    let relayer_address = config.relayer_address();
    info!(
        relayer = %relayer_address,
        database = %config.database_path.display(),
        poll_interval_ms = config.poll_interval.as_millis() as u64,
        "Loaded configuration"
    );

    let store = Arc::new(RelayerDatabase::open(&config.database_path)?);
    let deposits_relayed = store.count_processed(Chain::AppChain)?;
    let burns_relayed = store.count_processed(Chain::Mainnet)?;
    info!(deposits_relayed, burns_relayed, "Opened relayer database");

    let appchain = ChainClient::new(config.appchain.clone());
    let mainnet = ChainClient::new(config.mainnet.clone());
    for client in [&appchain, &mainnet] {
        // An unreachable node at startup is retried by the loop.
        if let Err(e) = client.check_relayer(relayer_address).await {
            warn!(chain = %client.chain(), error = %e, "Startup balance check failed");
        }
    }

    let wallet = signing::wallet(config.signer.clone());
    let executor = RpcActionExecutor::new(
        ChainClient::signing_provider(&config.mainnet, wallet.clone()),
        config.mainnet.contract,
        ChainClient::signing_provider(&config.appchain, wallet),
        config.appchain.contract,
        config.receipt_timeout,
    );

    let relayer = Relayer::new(
        RpcChainWatcher::new(appchain),
        RpcChainWatcher::new(mainnet),
        executor,
        store,
        RelayerSettings::from_config(&config),
    );

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received");
                signal.cancel();
            }
            Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
        }
    });

    relayer.run(shutdown).await;
    Ok(())
}
