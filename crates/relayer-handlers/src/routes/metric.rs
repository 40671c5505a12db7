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

use aegis_relayer_context::RelayerContext;
use aegis_relayer_utils::HandlerError;

/// Handles the relayer metrics endpoint, prometheus text format.
///
/// # Arguments
///
/// * `ctx` - RelayerContext reference that holds the shared state
pub async fn handle_metric_info(
    State(ctx): State<Arc<RelayerContext>>,
) -> Result<String, HandlerError> {
    let metrics = ctx.metrics.lock().await;
    metrics
        .gather()
        .map_err(|e| HandlerError::from(aegis_relayer_utils::Error::from(e)))
}
