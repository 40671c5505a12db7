// Copyright 2024 Aegis Network Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Aegis Relayer Binary.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::sync::Arc;
use std::time::Duration;

use tokio::signal::unix;
use tokio::time;

use aegis_relayer::service::{build_web_services, ignite};
use aegis_relayer_config::cli::{
    create_store, load_config, setup_logger, Opts,
};
use aegis_relayer_context::RelayerContext;

/// The main entry point for the relayer.
///
/// # Arguments
///
/// * `args` - The command line arguments.
#[paw::main]
#[tokio::main]
async fn main(args: Opts) -> anyhow::Result<()> {
    setup_logger(args.verbose, "aegis_relayer")?;
    match dotenv::dotenv() {
        Ok(_) => {
            tracing::trace!("Loaded .env file");
        }
        Err(e) => {
            tracing::warn!("Failed to load .env file: {}", e);
        }
    }

    // The configuration is validated and loaded from the given directory.
    // A missing ledger endpoint or token contract is fatal here: the
    // relayer refuses to start serving without them.
    let config = load_config(args.config_dir.clone())?;

    // persistent storage for the relayer
    let store = create_store(&args).await?;

    // The RelayerContext takes the configuration and the store, and
    // populates every object that is shared for the lifetime of the
    // relayer: the session registry, the ledger provider, the cache-backed
    // balance service and the metrics.
    let ctx = RelayerContext::new(config, store.clone())?;

    // metric for data stored which is determined every 1 hour
    let data_metric_store = store.clone();
    let data_metric_ctx = ctx.clone();
    let store_metric_task_handle = tokio::task::spawn(async move {
        let mut interval = time::interval(Duration::from_secs(3600));
        loop {
            interval.tick().await;
            data_metric_ctx
                .metrics
                .lock()
                .await
                .total_amount_of_data_stored
                .set(data_metric_store.get_data_stored_size() as f64);
        }
    });

    // the web services serve the query surface and accept persistent
    // connections; clients can interact with the relayer through them.
    let server_handle = tokio::spawn(build_web_services(ctx.clone()));
    // start all background services.
    // this does not block, will fire the services on background tasks.
    ignite(&ctx, Arc::new(store)).await?;
    tracing::event!(
        target: aegis_relayer_utils::probe::TARGET,
        tracing::Level::DEBUG,
        kind = %aegis_relayer_utils::probe::Kind::Lifecycle,
        started = true
    );

    // watch for signals
    let mut ctrlc_signal = unix::signal(unix::SignalKind::interrupt())?;
    let mut termination_signal = unix::signal(unix::SignalKind::terminate())?;
    let mut quit_signal = unix::signal(unix::SignalKind::quit())?;
    let shutdown = || {
        tracing::event!(
            target: aegis_relayer_utils::probe::TARGET,
            tracing::Level::DEBUG,
            kind = %aegis_relayer_utils::probe::Kind::Lifecycle,
            shutdown = true
        );
        tracing::warn!("Shutting down...");
        // send shutdown signal to all of the application.
        ctx.shutdown();
        // also abort the server task
        server_handle.abort();
        // abort the store size metric task
        store_metric_task_handle.abort();
        std::thread::sleep(std::time::Duration::from_millis(300));
        tracing::info!("Clean Exit ..");
    };
    tokio::select! {
        _ = ctrlc_signal.recv() => {
            tracing::warn!("Interrupted (Ctrl+C) ...");
            shutdown();
        },
        _ = termination_signal.recv() => {
            tracing::warn!("Got Terminate signal ...");
            shutdown();
        },
        _ = quit_signal.recv() => {
            tracing::warn!("Quitting ...");
            shutdown();
        },
    }
    Ok(())
}
