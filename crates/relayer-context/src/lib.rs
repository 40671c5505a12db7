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

#![warn(missing_docs)]

//! # Relayer Context Module
//!
//! A module for managing the context of the relayer: the objects that live
//! for the whole lifetime of the process and are shared by every
//! connection-handling task.

use std::sync::Arc;
use std::time::Duration;

use ethers::providers::{Http, Provider};
use tokio::sync::{broadcast, Mutex};

use aegis_balance_backends::{
    BalanceBackend, CachedBalanceBackend, ContractBalanceBackend,
    TrackedAsset,
};
use aegis_relayer_config::AegisRelayerConfig;
use aegis_relayer_handler_utils::ServerEvent;
use aegis_relayer_sessions::SessionRegistry;
use aegis_relayer_store::SledStore;
use aegis_relayer_utils::metric::Metrics;

/// The session registry instantiated over the wire event type.
pub type EventRegistry = SessionRegistry<ServerEvent>;

/// RelayerContext contains the relayer's configuration and every shared
/// long-lived object: the store, the session registry, the ledger provider,
/// the cache-backed balance service, metrics and the shutdown signal.
#[derive(Clone)]
pub struct RelayerContext {
    /// The configuration of the relayer.
    pub config: AegisRelayerConfig,
    /// Broadcasts a shutdown signal to all active connections.
    ///
    /// The initial `shutdown` trigger is provided by the `run` caller. When
    /// a connection task is spawned, it is passed a broadcast receiver
    /// handle. When a graceful shutdown is initiated, a `()` value is sent;
    /// each active task receives it, reaches a safe terminal state and
    /// completes.
    notify_shutdown: broadcast::Sender<()>,
    /// Represents the metrics for the relayer.
    pub metrics: Arc<Mutex<Metrics>>,
    store: SledStore,
    sessions: Arc<EventRegistry>,
    balances: Arc<dyn BalanceBackend>,
    provider: Arc<Provider<Http>>,
}

impl RelayerContext {
    /// Creates a new RelayerContext.
    pub fn new(
        config: AegisRelayerConfig,
        store: SledStore,
    ) -> aegis_relayer_utils::Result<Self> {
        let (notify_shutdown, _) = broadcast::channel(2);
        let metrics = Arc::new(Mutex::new(Metrics::new()?));
        let sessions = Arc::new(EventRegistry::new());

        let provider = Arc::new(
            Provider::<Http>::try_from(
                config.ledger.http_endpoint.as_url().as_str(),
            )?
            .interval(Duration::from_millis(5u64)),
        );

        let tracked_assets = config
            .assets
            .iter()
            .map(|(symbol, asset)| {
                (
                    symbol.clone(),
                    TrackedAsset {
                        token_id: asset.token_id,
                        decimals: asset.decimals,
                    },
                )
            })
            .collect();
        let ledger_backend = ContractBalanceBackend::new(
            provider.clone(),
            config.ledger.token_contract.inner(),
            tracked_assets,
        );
        let cached_backend = CachedBalanceBackend::builder()
            .backend(ledger_backend)
            .store(store.clone())
            .cache_expiration(Some(Duration::from_secs(
                config.api.balance_cache_ttl,
            )))
            .use_cache_if_source_unavailable()
            .build();
        let balances = Arc::new(cached_backend);

        Ok(Self {
            config,
            notify_shutdown,
            metrics,
            store,
            sessions,
            balances,
            provider,
        })
    }

    /// Returns a broadcast receiver handle for the shutdown signal.
    pub fn shutdown_signal(&self) -> Shutdown {
        Shutdown::new(self.notify_shutdown.subscribe())
    }

    /// Sends a shutdown signal to all subscribed tasks/connections.
    pub fn shutdown(&self) {
        let _ = self.notify_shutdown.send(());
    }

    /// Returns the shared ledger JSON-RPC provider.
    ///
    /// There is exactly one provider per process; all watchers and balance
    /// queries multiplex over it.
    pub fn evm_provider(&self) -> Arc<Provider<Http>> {
        self.provider.clone()
    }

    /// Returns the [Sled](https://sled.rs)-based database store.
    pub fn store(&self) -> &SledStore {
        &self.store
    }

    /// Returns the registry of live sessions.
    pub fn sessions(&self) -> &Arc<EventRegistry> {
        &self.sessions
    }

    /// Returns the cache-backed balance service.
    pub fn balances(&self) -> Arc<dyn BalanceBackend> {
        self.balances.clone()
    }
}

/// Listens for the server shutdown signal.
///
/// Shutdown is signalled using a `broadcast::Receiver`. Only a single value
/// is ever sent. Once a value has been sent via the broadcast channel, the
/// server should shut down.
///
/// The `Shutdown` struct listens for the signal and tracks that the signal
/// has been received. Callers may query for whether the shutdown signal has
/// been received or not.
#[derive(Debug)]
pub struct Shutdown {
    /// `true` if the shutdown signal has been received
    shutdown: bool,
    /// The receive half of the channel used to listen for shutdown.
    notify: broadcast::Receiver<()>,
}

impl Shutdown {
    /// Create a new `Shutdown` backed by the given `broadcast::Receiver`.
    pub fn new(notify: broadcast::Receiver<()>) -> Shutdown {
        Shutdown {
            shutdown: false,
            notify,
        }
    }

    /// Receive the shutdown notice, waiting if necessary.
    pub async fn recv(&mut self) {
        // If the shutdown signal has already been received, then return
        // immediately.
        if self.shutdown {
            return;
        }

        // Cannot receive a "lag error" as only one value is ever sent.
        let _ = self.notify.recv().await;

        // Remember that the signal has been received.
        self.shutdown = true;
    }
}
