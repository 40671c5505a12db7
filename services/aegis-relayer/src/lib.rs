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

#![deny(unsafe_code)]
#![warn(missing_docs)]

//! # Aegis Relayer Crate
//!
//! The backend of the Aegis disaster-relief platform: a real-time
//! blockchain event relay.
//!
//! ## Overview
//!
//! The relayer watches the Aegis token contract for transfer events,
//! durably and idempotently records the resulting transactions, serves
//! cache-backed balance queries and store queries over HTTP, and fans
//! events out to the connected WebSocket clients with room semantics.
//!
//! The relayer is composed of three externally visible surfaces:
//!
//!   1. The persistent connection protocol (`/ws`): clients register an
//!      address and a role, then receive transfer and disaster events
//!      scoped to them.
//!   2. The rate-limited HTTP query surface (`/api/...`): profile,
//!      balance, history, donation, disaster and statistics reads.
//!   3. The oracle webhook (`/api/webhook/disaster`): externally reported
//!      incidents are persisted and pushed to the admin room.
//!
//! Durable state is the source of truth: an event is only broadcast after
//! its transaction has been recorded, and a redelivered event is dropped
//! by the idempotent insert instead of reaching clients twice.

/// A module for starting the long-running relayer services.
pub mod service;

pub use aegis_relayer_utils::{Error, Result};
