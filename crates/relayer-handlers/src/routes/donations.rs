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

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use aegis_relayer_context::RelayerContext;
use aegis_relayer_store::{Donation, DonationStore};
use aegis_relayer_utils::HandlerError;

/// Optional campaign filter of the donations listing.
#[derive(Debug, Deserialize)]
pub struct DonationsQuery {
    /// Only return donations for this campaign.
    pub campaign: Option<String>,
}

/// Handles donation listings, newest first, optionally filtered by
/// campaign.
///
/// # Arguments
///
/// * `ctx` - RelayerContext reference that holds the shared state
/// * `query` - optional campaign filter
pub async fn handle_donations(
    State(ctx): State<Arc<RelayerContext>>,
    Query(query): Query<DonationsQuery>,
) -> Result<Json<Vec<Donation>>, HandlerError> {
    let donations = ctx
        .store()
        .donations(query.campaign.as_deref())
        .map_err(|e| {
            tracing::error!("Error fetching donations: {e}");
            HandlerError::from(e)
        })?;
    Ok(Json(donations))
}
