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

use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use aegis_relayer_context::RelayerContext;
use aegis_relayer_store::{
    AggregateStats, DisasterEventStore, DonationStore, TransactionStore,
    UserProfileStore,
};
use aegis_relayer_utils::HandlerError;

/// Handles aggregate statistics over the whole store.
///
/// Reads the store directly; this path is queried far less often than the
/// balance path and carries no caching requirement.
///
/// # Arguments
///
/// * `ctx` - RelayerContext reference that holds the shared state
pub async fn handle_stats(
    State(ctx): State<Arc<RelayerContext>>,
) -> Result<Json<AggregateStats>, HandlerError> {
    let store = ctx.store();
    let stats = AggregateStats {
        total_users: store.user_count().map_err(log_and_wrap)?,
        total_transactions: store.transaction_count().map_err(log_and_wrap)?,
        total_donations: store.total_donated().map_err(log_and_wrap)?,
        total_disasters: store
            .disaster_event_count()
            .map_err(log_and_wrap)?,
    };
    Ok(Json(stats))
}

fn log_and_wrap(e: aegis_relayer_utils::Error) -> HandlerError {
    tracing::error!("Error fetching stats: {e}");
    HandlerError::from(e)
}
