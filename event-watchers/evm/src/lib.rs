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

//! # Aegis Token Event Watcher
//!
//! One multiplexed watcher over the Aegis token contract. All registered
//! sessions share this single polling loop; decoded transfer events are
//! routed in-process to the interested sessions by normalized address.

use std::ops;
use std::sync::Arc;
use std::time::Duration;

use ethers::contract::Contract;
use ethers::providers::Middleware;
use ethers::types;

use aegis_contracts::{AegisToken, AegisTokenEvents};
use aegis_event_watcher_traits::evm::{
    EthersClient, EventWatcher, WatchableContract,
};
use aegis_relayer_config::LedgerConfig;
use aegis_relayer_store::SledStore;

/// A module for handling decoded transfer events.
pub mod transfer_handler;

pub use transfer_handler::TransferHandler;

/// AegisTokenContractWrapper contains the AegisToken contract along with
/// the ledger configuration.
#[derive(Clone, Debug)]
pub struct AegisTokenContractWrapper<M>
where
    M: Middleware,
{
    /// The ledger configuration of this wrapper.
    pub config: LedgerConfig,
    /// The underlying token contract instance.
    pub contract: AegisToken<M>,
}

impl<M> AegisTokenContractWrapper<M>
where
    M: Middleware,
{
    /// Creates a new AegisTokenContractWrapper.
    pub fn new(config: LedgerConfig, client: Arc<M>) -> Self {
        Self {
            contract: AegisToken::new(config.token_contract.inner(), client),
            config,
        }
    }
}

impl<M> ops::Deref for AegisTokenContractWrapper<M>
where
    M: Middleware,
{
    type Target = Contract<M>;

    fn deref(&self) -> &Self::Target {
        &self.contract
    }
}

impl<M> WatchableContract for AegisTokenContractWrapper<M>
where
    M: Middleware,
{
    fn deployed_at(&self) -> types::U64 {
        self.config.deployed_at.into()
    }

    fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.config.events_watcher.polling_interval)
    }

    fn max_blocks_per_step(&self) -> types::U64 {
        self.config.events_watcher.max_blocks_per_step.into()
    }

    fn print_progress_interval(&self) -> Duration {
        Duration::from_millis(
            self.config.events_watcher.print_progress_interval,
        )
    }
}

/// An Aegis token watcher that watches the token contract for transfer
/// events and calls the event handlers.
#[derive(Copy, Clone, Debug, Default)]
pub struct AegisTokenWatcher;

#[async_trait::async_trait]
impl EventWatcher for AegisTokenWatcher {
    const TAG: &'static str = "Aegis Token Watcher";

    type Contract = AegisTokenContractWrapper<EthersClient>;

    type Events = AegisTokenEvents;

    type Store = SledStore;
}
