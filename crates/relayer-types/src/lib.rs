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

//! # Relayer Types Module
//!
//! Wrapper types shared across the relayer crates. Most of these exist to
//! enforce an invariant at the type level (normalized addresses, validated
//! URLs) instead of re-checking it at every call site.

/// Normalized Ethereum address wrapper.
pub mod eth_address;
/// Client-declared user roles.
pub mod role;
/// RPC URL wrapper with environment variable expansion.
pub mod rpc_url;

pub use eth_address::{EthAddress, InvalidEthAddress};
pub use role::UserRole;
pub use rpc_url::RpcUrl;
