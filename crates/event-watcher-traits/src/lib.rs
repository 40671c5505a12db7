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

//! # Event Watcher Traits Module
//!
//! Traits for watching contract events on the ledger.
//!
//! ## Overview
//!
//! A watcher owns the polling loop against one contract: it resumes from
//! the stored block cursor, fetches event logs step by step and feeds every
//! decoded event through its handlers. Handlers are implemented separately
//! from the watcher so one watcher can drive many handlers.
//!
//! A restart replays everything after the last advanced cursor; handlers
//! must therefore tolerate redelivery (the transfer handler does so through
//! the idempotent transaction store).

/// EVM event watching traits.
pub mod evm;

pub use evm::{
    EthersClient, EventHandler, EventHandlerFor, EventHandlerWithRetry,
    EventWatcher, WatchableContract,
};
