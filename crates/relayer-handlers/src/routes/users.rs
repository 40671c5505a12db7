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
use axum::http::StatusCode;
use axum::Json;

use aegis_relayer_context::RelayerContext;
use aegis_relayer_store::{UserProfile, UserProfileStore};
use aegis_relayer_utils::HandlerError;

use super::parse_address;

/// Handles user profile lookups by address.
///
/// Returns the stored profile, or a 404 when the address is unknown.
///
/// # Arguments
///
/// * `ctx` - RelayerContext reference that holds the shared state
/// * `address` - The address to look up, any casing
pub async fn handle_user_info(
    State(ctx): State<Arc<RelayerContext>>,
    Path(address): Path<String>,
) -> Result<Json<UserProfile>, HandlerError> {
    let address = parse_address(&address)?;
    let user = ctx.store().get_user(&address).map_err(|e| {
        tracing::error!("Error fetching user: {e}");
        HandlerError::from(e)
    })?;
    match user {
        Some(user) => Ok(Json(user)),
        None => Err(HandlerError(
            StatusCode::NOT_FOUND,
            "User not found".to_string(),
        )),
    }
}
