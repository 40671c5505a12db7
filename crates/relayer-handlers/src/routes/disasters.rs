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
use serde::{Deserialize, Serialize};

use aegis_relayer_context::RelayerContext;
use aegis_relayer_handler_utils::{NewDisasterEvent, ServerEvent};
use aegis_relayer_sessions::BroadcastScope;
use aegis_relayer_store::{DisasterEvent, DisasterEventStore, EventHashStore};
use aegis_relayer_types::UserRole;
use aegis_relayer_utils::HandlerError;

/// The number of rows the disaster listing is capped at.
const RECENT_DISASTERS_LIMIT: usize = 100;

/// Handles disaster listings: the most recent 100, newest first.
///
/// # Arguments
///
/// * `ctx` - RelayerContext reference that holds the shared state
pub async fn handle_disasters(
    State(ctx): State<Arc<RelayerContext>>,
) -> Result<Json<Vec<DisasterEvent>>, HandlerError> {
    let disasters = ctx
        .store()
        .recent_disaster_events(RECENT_DISASTERS_LIMIT)
        .map_err(|e| {
            tracing::error!("Error fetching disasters: {e}");
            HandlerError::from(e)
        })?;
    Ok(Json(disasters))
}

/// The oracle webhook payload.
///
/// `external_id` is optional because the upstream oracle does not assign
/// one for every source; when present it is the idempotency key for
/// duplicate webhook deliveries.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisasterWebhookPayload {
    /// Where the incident happened.
    pub location: String,
    /// Reported magnitude.
    pub magnitude: f64,
    /// Incident category, e.g. `earthquake`.
    #[serde(rename = "type")]
    pub category: String,
    /// Oracle-assigned identifier of this report, if any.
    pub external_id: Option<String>,
}

/// The webhook acknowledgment.
#[derive(Debug, Serialize)]
pub struct DisasterWebhookResponse {
    /// Whether the report was accepted (duplicates are also acknowledged).
    pub success: bool,
}

/// Handles the disaster oracle webhook.
///
/// The caller receives success only after the durable write; the admin-room
/// broadcast is fire-and-forget. Reports that carry an `externalId` are
/// collapsed on redelivery: a duplicate neither creates a second row nor a
/// second broadcast.
///
/// # Arguments
///
/// * `ctx` - RelayerContext reference that holds the shared state
/// * `payload` - The reported incident
pub async fn handle_disaster_webhook(
    State(ctx): State<Arc<RelayerContext>>,
    Json(payload): Json<DisasterWebhookPayload>,
) -> Result<Json<DisasterWebhookResponse>, HandlerError> {
    if let Some(external_id) = &payload.external_id {
        let dedup_key = format!("disaster/{external_id}");
        let first_delivery = ctx
            .store()
            .store_event(dedup_key.as_bytes())
            .map_err(log_and_wrap)?;
        if !first_delivery {
            tracing::debug!(
                external_id,
                "duplicate disaster report, already ingested"
            );
            return Ok(Json(DisasterWebhookResponse { success: true }));
        }
    }

    let event = ctx
        .store()
        .insert_disaster_event(
            &payload.location,
            payload.magnitude,
            &payload.category,
        )
        .map_err(log_and_wrap)?;
    ctx.metrics.lock().await.disasters_ingested.inc();
    tracing::event!(
        target: aegis_relayer_utils::probe::TARGET,
        tracing::Level::DEBUG,
        kind = %aegis_relayer_utils::probe::Kind::Ingest,
        location = %event.location,
        category = %event.category,
        magnitude = event.magnitude,
    );

    // Durable at this point; the broadcast may race disconnects freely.
    ctx.sessions().broadcast(
        BroadcastScope::Room(UserRole::Admin),
        ServerEvent::NewDisaster(NewDisasterEvent {
            location: event.location.clone(),
            magnitude: event.magnitude,
            category: event.category.clone(),
            timestamp: event.timestamp,
        }),
    );

    Ok(Json(DisasterWebhookResponse { success: true }))
}

fn log_and_wrap(e: aegis_relayer_utils::Error) -> HandlerError {
    tracing::error!("Error processing disaster webhook: {e}");
    HandlerError::from(e)
}
