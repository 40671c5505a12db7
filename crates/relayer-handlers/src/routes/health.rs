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
use chrono::{DateTime, Utc};
use serde::Serialize;

use aegis_relayer_context::RelayerContext;

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always `ok` while the process serves requests.
    pub status: &'static str,
    /// The server time the check ran at.
    pub timestamp: DateTime<Utc>,
    /// Number of currently connected WebSocket sessions.
    pub connection_count: usize,
}

/// Handles the health check.
///
/// # Arguments
///
/// * `ctx` - RelayerContext reference that holds the shared state
pub async fn handle_health(
    State(ctx): State<Arc<RelayerContext>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now(),
        connection_count: ctx.sessions().connection_count(),
    })
}
