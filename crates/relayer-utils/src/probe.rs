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

use derive_more::Display;

/// Target for the probe logger.
pub const TARGET: &str = "aegis_probe";

/// The Kind of the Probe.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// When the lifecycle of the relayer changes, like starting or
    /// shutting down.
    #[display(fmt = "lifecycle")]
    Lifecycle,
    /// Relayer sync state against the ledger.
    #[display(fmt = "sync")]
    Sync,
    /// A transfer was durably recorded in the transaction store.
    #[display(fmt = "tx_store")]
    TxStore,
    /// An event was fanned out to connected sessions.
    #[display(fmt = "broadcast")]
    Broadcast,
    /// An externally pushed event was ingested.
    #[display(fmt = "ingest")]
    Ingest,
    /// When the relayer will retry to do something.
    #[display(fmt = "retry")]
    Retry,
}
