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

use ethereum_types::H160;
use serde::{Deserialize, Serialize};

/// A normalized Ethereum address.
///
/// The same on-chain account may reach us spelled in any mix of cases
/// (checksummed, upper, lower). Every comparison, storage key, cache key and
/// routing-table key in the relayer goes through this type, so the
/// normalization happens exactly once: at the parsing boundary.
///
/// Internally this is a plain [`H160`]; the canonical textual form is
/// `0x`-prefixed lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EthAddress(H160);

/// Error returned when a string does not parse as a 20-byte hex address.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid ethereum address: {0}")]
pub struct InvalidEthAddress(pub String);

impl EthAddress {
    /// Wraps a raw [`H160`].
    pub fn new(inner: H160) -> Self {
        Self(inner)
    }

    /// Returns the inner [`H160`].
    pub fn inner(&self) -> H160 {
        self.0
    }

    /// Returns the raw 20 address bytes.
    pub fn to_fixed_bytes(&self) -> [u8; 20] {
        self.0.to_fixed_bytes()
    }

    /// Returns the canonical `0x`-prefixed lowercase hex form.
    ///
    /// This is the form used for store keys and cache keys.
    pub fn to_canonical_string(&self) -> String {
        format!("{:#x}", self.0)
    }
}

impl std::str::FromStr for EthAddress {
    type Err = InvalidEthAddress;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let hex_part = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if hex_part.len() != 40 {
            return Err(InvalidEthAddress(s.to_string()));
        }
        let bytes = hex::decode(hex_part)
            .map_err(|_| InvalidEthAddress(s.to_string()))?;
        Ok(Self(H160::from_slice(&bytes)))
    }
}

impl std::fmt::Display for EthAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl std::fmt::Debug for EthAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EthAddress({:#x})", self.0)
    }
}

impl From<H160> for EthAddress {
    fn from(inner: H160) -> Self {
        Self(inner)
    }
}

impl From<EthAddress> for H160 {
    fn from(address: EthAddress) -> Self {
        address.0
    }
}

impl Serialize for EthAddress {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_canonical_string())
    }
}

impl<'de> Deserialize<'de> for EthAddress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_case_inputs_normalize_to_one_identity() {
        let lower: EthAddress =
            "0xdeadbeefdeadbeefdeadbeefdeadbeefdeadbeef".parse().unwrap();
        let upper: EthAddress =
            "0xDEADBEEFDEADBEEFDEADBEEFDEADBEEFDEADBEEF".parse().unwrap();
        assert_eq!(lower, upper);
        assert_eq!(lower.to_canonical_string(), upper.to_canonical_string());
    }

    #[test]
    fn canonical_form_is_lowercase_prefixed() {
        let addr: EthAddress =
            "AABBCCDDEEFF00112233445566778899AABBCCDD".parse().unwrap();
        assert_eq!(
            addr.to_canonical_string(),
            "0xaabbccddeeff00112233445566778899aabbccdd"
        );
    }

    #[test]
    fn rejects_malformed_input() {
        assert!("0x1234".parse::<EthAddress>().is_err());
        assert!("not-an-address".parse::<EthAddress>().is_err());
        assert!("0xzzbbccddeeff00112233445566778899aabbccdd"
            .parse::<EthAddress>()
            .is_err());
    }

    #[test]
    fn serde_round_trip_uses_canonical_form() {
        let addr: EthAddress =
            "0xAABBCCDDEEFF00112233445566778899AABBCCDD".parse().unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"0xaabbccddeeff00112233445566778899aabbccdd\"");
        let back: EthAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(addr, back);
    }
}
