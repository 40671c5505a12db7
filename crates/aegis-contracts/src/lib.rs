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

//! # Aegis Contracts Module
//!
//! Generated ethers bindings for the on-ledger surface the relayer consumes.
//!
//! The relayer is strictly read-only against the ledger: it subscribes to
//! ERC-1155 `TransferSingle` events and queries `balanceOf` per tracked
//! asset. Only that subset of the token ABI is bound here.

use ethers::contract::abigen;

abigen!(
    AegisToken,
    r#"[
        event TransferSingle(address indexed operator, address indexed from, address indexed to, uint256 id, uint256 value)
        function balanceOf(address account, uint256 id) external view returns (uint256)
    ]"#
);

// `abigen!` only emits the `<Contract>Events` container enum when the ABI
// declares two or more events (see ethers-contract-abigen events expansion,
// gated on `data_types.len() > 1`). This ABI binds a single event, so the
// macro generates `TransferSingleFilter` but not `AegisTokenEvents`. The rest
// of the workspace consumes `AegisTokenEvents` as the event-watcher `Events`
// associated type, so we reconstruct the exact enum abigen would have produced
// for a multi-event contract. No behavior is added beyond wrapping the single
// generated filter struct.
#[doc = "Container type for all of the contract's events"]
#[derive(Clone, ::ethers::contract::EthAbiType, Debug, PartialEq, Eq, Hash)]
pub enum AegisTokenEvents {
    TransferSingleFilter(TransferSingleFilter),
}

impl ::ethers::contract::EthLogDecode for AegisTokenEvents {
    fn decode_log(
        log: &::ethers::core::abi::RawLog,
    ) -> ::core::result::Result<Self, ::ethers::core::abi::Error> {
        if let Ok(decoded) = TransferSingleFilter::decode_log(log) {
            return Ok(AegisTokenEvents::TransferSingleFilter(decoded));
        }
        Err(::ethers::core::abi::Error::InvalidData)
    }
}

impl ::core::fmt::Display for AegisTokenEvents {
    fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
        match self {
            Self::TransferSingleFilter(element) => ::core::fmt::Display::fmt(element, f),
        }
    }
}

impl ::core::convert::From<TransferSingleFilter> for AegisTokenEvents {
    fn from(value: TransferSingleFilter) -> Self {
        Self::TransferSingleFilter(value)
    }
}
