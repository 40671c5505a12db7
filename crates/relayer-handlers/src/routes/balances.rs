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

use axum::extract::{Path, State};
use axum::Json;

use aegis_balance_backends::BalancesMap;
use aegis_relayer_context::RelayerContext;
use aegis_relayer_utils::HandlerError;

use super::parse_address;

/// Handles balance queries, cache-first.
///
/// A fresh cache entry answers without touching the ledger; otherwise the
/// ledger is queried per tracked asset and the cache refreshed. A cache
/// outage degrades latency, never correctness.
///
/// # Arguments
///
/// * `ctx` - RelayerContext reference that holds the shared state
/// * `address` - The address to query, any casing
pub async fn handle_balances(
    State(ctx): State<Arc<RelayerContext>>,
    Path(address): Path<String>,
) -> Result<Json<BalancesMap>, HandlerError> {
    let address = parse_address(&address)?;
    let balances =
        ctx.balances().get_balances(&address).await.map_err(|e| {
            tracing::error!("Error fetching balances: {e}");
            HandlerError::from(e)
        })?;
    Ok(Json(balances))
}
