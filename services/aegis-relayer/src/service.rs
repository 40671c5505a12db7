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

//! # Relayer Service Module
//!
//! A module for starting the long-running relayer tasks: the HTTP/WS
//! server and the background token event watcher.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use aegis_event_watcher_traits::EventWatcher;
use aegis_ew_evm::{
    AegisTokenContractWrapper, AegisTokenWatcher, TransferHandler,
};
use aegis_relayer_context::RelayerContext;
use aegis_relayer_handlers::middleware::{cleanup_task, RateLimitLayer};
use aegis_relayer_handlers::{routes, websocket_handler};
use aegis_relayer_store::SledStore;

/// Type alias for the [Sled](https://sled.rs)-based database store.
pub type Store = SledStore;

/// Sets up the HTTP and WebSocket server for the relayer: the rate-limited
/// query surface under `/api`, the oracle webhook, and the persistent
/// connection route. Serves until the process shuts down.
///
/// # Arguments
///
/// * `ctx` - RelayerContext that holds the configuration and shared state
pub async fn build_web_services(
    ctx: RelayerContext,
) -> aegis_relayer_utils::Result<()> {
    let socket_addr = SocketAddr::new([0, 0, 0, 0].into(), ctx.config.port);

    let rate_limit_config = ctx.config.api.rate_limit;
    let rejected_counter =
        ctx.metrics.lock().await.rate_limited_requests.clone();
    let rate_limit = RateLimitLayer::new(rate_limit_config, rejected_counter);
    // reclaim per-IP windows that went quiet
    tokio::spawn(cleanup_task(
        rate_limit.state(),
        Duration::from_secs(rate_limit_config.window_seconds.max(1)),
    ));

    let mut api = Router::new()
        .route("/health", get(routes::handle_health))
        .route("/metrics", get(routes::handle_metric_info))
        .route(
            "/webhook/disaster",
            post(routes::handle_disaster_webhook),
        );
    if ctx.config.features.data_query {
        api = api
            .route("/user/:address", get(routes::handle_user_info))
            .route("/balances/:address", get(routes::handle_balances))
            .route(
                "/transactions/:address",
                get(routes::handle_transaction_history),
            )
            .route("/donations", get(routes::handle_donations))
            .route("/disasters", get(routes::handle_disasters))
            .route("/stats", get(routes::handle_stats));
    } else {
        tracing::warn!("Data query is not enabled for relayer.");
    }
    // admission control protects only this request/response surface, not
    // the push-based event path below.
    let api = api.layer(rate_limit);

    let cors = match &ctx.config.api.allowed_origin {
        Some(origin) => {
            let origin = origin.parse::<HeaderValue>().map_err(|_| {
                aegis_relayer_utils::Error::MissingRequiredConfig(
                    "api.allowed-origin is not a valid origin".into(),
                )
            })?;
            CorsLayer::new().allow_origin(origin)
        }
        None => CorsLayer::new().allow_origin(Any),
    };

    let app = Router::new()
        .nest("/api", api)
        .route("/ws", get(websocket_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(ctx))
        .into_make_service_with_connect_info::<SocketAddr>();

    tracing::info!("Starting the server on {}", socket_addr);
    axum::Server::bind(&socket_addr).serve(app).await?;
    Ok(())
}

/// Starts all background services.
///
/// This does not block; the services are fired on background tasks.
///
/// # Arguments
///
/// * `ctx` - RelayerContext that holds the configuration and shared state
/// * `store` - [Sled](https://sled.rs)-based database store
pub async fn ignite(
    ctx: &RelayerContext,
    store: Arc<Store>,
) -> aegis_relayer_utils::Result<()> {
    tracing::trace!(
        "Relayer configuration: {}",
        serde_json::to_string_pretty(&ctx.config)?
    );
    if !ctx.config.features.event_relay {
        tracing::warn!("Event relaying is not enabled for relayer.");
        return Ok(());
    }
    if !ctx.config.ledger.events_watcher.enabled {
        tracing::warn!(
            "Aegis token events watcher is disabled for ({}).",
            ctx.config.ledger.token_contract,
        );
        return Ok(());
    }
    start_token_transfer_watcher(ctx, store).await
}

/// Starts the event watcher for Aegis token transfer events.
///
/// The watcher shares the process-wide ledger provider; transfer events
/// are routed in-process to registered sessions, so client registrations
/// never open additional ledger connections.
///
/// # Arguments
///
/// * `ctx` - RelayerContext that holds the configuration and shared state
/// * `store` - [Sled](https://sled.rs)-based database store
async fn start_token_transfer_watcher(
    ctx: &RelayerContext,
    store: Arc<Store>,
) -> aegis_relayer_utils::Result<()> {
    let client = ctx.evm_provider();
    let wrapper =
        AegisTokenContractWrapper::new(ctx.config.ledger.clone(), client.clone());
    let contract_address = ctx.config.ledger.token_contract;
    let mut shutdown_signal = ctx.shutdown_signal();
    let metrics = ctx.metrics.clone();
    let sessions = ctx.sessions().clone();
    let decimals_by_token = ctx
        .config
        .assets
        .values()
        .map(|asset| (asset.token_id, asset.decimals))
        .collect();
    let task = async move {
        tracing::debug!(
            "Aegis token events watcher for ({}) Started.",
            contract_address,
        );
        let contract_watcher = AegisTokenWatcher;
        let transfer_handler =
            TransferHandler::<Store>::new(sessions, decimals_by_token);
        let watcher_task = contract_watcher.run(
            client,
            store,
            wrapper,
            vec![Box::new(transfer_handler)],
            metrics,
        );
        tokio::select! {
            _ = watcher_task => {
                tracing::warn!(
                    "Aegis token watcher task stopped for ({})",
                    contract_address,
                );
            },
            _ = shutdown_signal.recv() => {
                tracing::trace!(
                    "Stopping Aegis token watcher for ({})",
                    contract_address,
                );
            },
        }
    };
    tokio::task::spawn(task);
    Ok(())
}
