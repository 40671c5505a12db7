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

use axum::http::StatusCode;

use aegis_relayer_types::EthAddress;
use aegis_relayer_utils::HandlerError;

/// Module for handling balance queries.
mod balances;
pub use balances::*;

/// Module for handling disaster queries and the ingestion webhook.
mod disasters;
pub use disasters::*;

/// Module for handling donation queries.
mod donations;
pub use donations::*;

/// Module for handling the health check.
mod health;
pub use health::*;

/// Module for handling the relayer metrics API.
mod metric;
pub use metric::*;

/// Module for handling aggregate statistics.
mod stats;
pub use stats::*;

/// Module for handling transaction history queries.
mod transactions;
pub use transactions::*;

/// Module for handling user profile queries.
mod users;
pub use users::*;

/// Parses a path segment into a normalized address, rejecting garbage with
/// a 400 instead of a store miss.
pub(crate) fn parse_address(raw: &str) -> Result<EthAddress, HandlerError> {
    raw.parse().map_err(
        |e: aegis_relayer_types::InvalidEthAddress| {
            HandlerError(StatusCode::BAD_REQUEST, e.to_string())
        },
    )
}
