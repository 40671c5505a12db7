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

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use aegis_relayer_context::RelayerContext;
use aegis_relayer_store::{Transaction, TransactionStore};
use aegis_relayer_utils::HandlerError;

use super::parse_address;

/// The default page size of the transaction history.
const fn default_limit() -> usize {
    50
}

/// Pagination of the transaction history.
#[derive(Debug, Deserialize)]
pub struct TransactionHistoryQuery {
    /// Maximum number of rows to return.
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Number of newest rows to skip.
    #[serde(default)]
    pub offset: usize,
}

/// Handles transaction history queries, newest first.
///
/// # Arguments
///
/// * `ctx` - RelayerContext reference that holds the shared state
/// * `address` - The address whose history to return, any casing
/// * `pagination` - limit/offset query parameters
pub async fn handle_transaction_history(
    State(ctx): State<Arc<RelayerContext>>,
    Path(address): Path<String>,
    Query(pagination): Query<TransactionHistoryQuery>,
) -> Result<Json<Vec<Transaction>>, HandlerError> {
    let address = parse_address(&address)?;
    let transactions = ctx
        .store()
        .transactions_for_address(
            &address,
            pagination.limit,
            pagination.offset,
        )
        .map_err(|e| {
            tracing::error!("Error fetching transactions: {e}");
            HandlerError::from(e)
        })?;
    Ok(Json(transactions))
}
