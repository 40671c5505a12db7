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

#![warn(missing_docs)]

//! # Balance Backends Module
//!
//! Backends for answering "what does this address hold" queries.
//!
//! The authoritative source is the ledger ([`ContractBalanceBackend`]);
//! [`CachedBalanceBackend`] decorates any backend with a read-through
//! cache so the hot query path does not touch the ledger on every request.

use std::collections::{BTreeMap, HashMap};

use aegis_relayer_types::EthAddress;
use aegis_relayer_utils::Result;

/// A cached balance backend over any other backend.
pub mod cached;
/// The ledger-backed balance backend.
pub mod contract;

pub use cached::{CachedBalanceBackend, CachedBalances};
pub use contract::{ContractBalanceBackend, TrackedAsset};

/// A map of asset symbol to formatted (token-unit) amount.
pub type BalancesMap = BTreeMap<String, String>;

/// A backend that can resolve the balances of an address across the
/// tracked assets.
#[async_trait::async_trait]
pub trait BalanceBackend: Send + Sync {
    /// Returns the balances of the given address.
    async fn get_balances(&self, address: &EthAddress)
        -> Result<BalancesMap>;
}

/// A backend that returns fixed balances from memory.
///
/// Used in tests and as a stand-in when no ledger is configured.
#[derive(Debug, Clone, Default)]
pub struct DummyBalanceBackend {
    balances: HashMap<EthAddress, BalancesMap>,
}

impl DummyBalanceBackend {
    /// Creates a new dummy backend with the given fixed balances.
    pub fn new(balances: HashMap<EthAddress, BalancesMap>) -> Self {
        Self { balances }
    }
}

#[async_trait::async_trait]
impl BalanceBackend for DummyBalanceBackend {
    async fn get_balances(
        &self,
        address: &EthAddress,
    ) -> Result<BalancesMap> {
        Ok(self.balances.get(address).cloned().unwrap_or_default())
    }
}
