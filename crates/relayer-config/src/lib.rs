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

//! # Relayer Configuration Module
//!
//! A module for configuring the relayer.
//!
//! ## Overview
//!
//! Configuration is loaded once at startup from a directory of TOML/JSON
//! files merged with `AEGIS_*` environment variables. Possible
//! configuration includes:
//! * `port`: The port the relayer will listen on. Defaults to 9955.
//! * `ledger`: The ledger endpoint and the watched token contract.
//! * `api`: CORS origin and the admission rate limit of the query surface.
//! * `assets`: The token assets tracked for balance queries.

/// CLI configuration
#[cfg(feature = "cli")]
pub mod cli;
/// Event watcher configuration
pub mod event_watcher;
/// Utils for processing configuration
pub mod utils;

use std::collections::HashMap;

use event_watcher::EventsWatcherConfig;
use serde::{Deserialize, Serialize};

use aegis_relayer_types::{EthAddress, RpcUrl};

/// The default port the relayer will listen on. Defaults to 9955.
const fn default_port() -> u16 {
    9955
}
/// The default balance cache time-to-live, in seconds.
const fn balance_cache_ttl_default() -> u64 {
    30
}
/// The admission gateway allows `100` requests per window by default.
const fn rate_limit_max_requests_default() -> u32 {
    100
}
/// The admission gateway window is `15` minutes by default.
const fn rate_limit_window_seconds_default() -> u64 {
    15 * 60
}
/// The first block to scan when no cursor is stored yet.
const fn deployed_at_default() -> u64 {
    1
}

/// The default tracked assets, mirroring the five reference token ids.
fn default_assets() -> HashMap<String, AssetConfig> {
    HashMap::from_iter([
        (
            String::from("AID"),
            AssetConfig {
                name: String::from("Aegis Aid Token"),
                token_id: 1,
                decimals: 18,
            },
        ),
        (
            String::from("FOOD"),
            AssetConfig {
                name: String::from("Food Voucher"),
                token_id: 2,
                decimals: 18,
            },
        ),
        (
            String::from("WATER"),
            AssetConfig {
                name: String::from("Water Voucher"),
                token_id: 3,
                decimals: 18,
            },
        ),
        (
            String::from("SHELTER"),
            AssetConfig {
                name: String::from("Shelter Voucher"),
                token_id: 4,
                decimals: 18,
            },
        ),
        (
            String::from("MEDICAL"),
            AssetConfig {
                name: String::from("Medical Voucher"),
                token_id: 5,
                decimals: 18,
            },
        ),
    ])
}

/// AegisRelayerConfig is the configuration for the Aegis relayer.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct AegisRelayerConfig {
    /// HTTP/WebSocket server port number.
    ///
    /// default to 9955
    #[serde(default = "default_port", skip_serializing)]
    pub port: u16,
    /// The ledger the relayer watches and queries.
    pub ledger: LedgerConfig,
    /// The HTTP query surface configuration.
    #[serde(default)]
    pub api: ApiConfig,
    /// The assets tracked for balance queries.
    ///
    /// a simple map between the asset symbol and its configuration.
    #[serde(default = "default_assets")]
    pub assets: HashMap<String, AssetConfig>,
    /// Configuration for running the relayer with features toggled.
    #[serde(default)]
    pub features: FeaturesConfig,
}

impl AegisRelayerConfig {
    /// Makes sure that the config is valid by doing some basic checks.
    ///
    /// A failure here is fatal: the relayer must not start serving with a
    /// ledger it cannot identify.
    pub fn verify(&self) -> aegis_relayer_utils::Result<()> {
        if self.ledger.token_contract.inner().is_zero() {
            return Err(aegis_relayer_utils::Error::MissingRequiredConfig(
                "ledger.token-contract".into(),
            ));
        }
        if self.assets.is_empty() {
            return Err(aegis_relayer_utils::Error::MissingRequiredConfig(
                "assets".into(),
            ));
        }
        Ok(())
    }
}

/// LedgerConfig is the configuration of the watched ledger.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct LedgerConfig {
    /// Http endpoint of the ledger JSON-RPC node.
    #[serde(rename(serialize = "httpEndpoint"))]
    pub http_endpoint: RpcUrl,
    /// The chain id of the ledger.
    #[serde(rename(serialize = "chainId"))]
    pub chain_id: u32,
    /// The Aegis token contract address.
    #[serde(rename(serialize = "tokenContract"))]
    pub token_contract: EthAddress,
    /// The block the token contract was deployed at; scanning starts here
    /// when no cursor is stored yet.
    #[serde(
        rename(serialize = "deployedAt"),
        default = "deployed_at_default"
    )]
    pub deployed_at: u64,
    /// Event watcher polling configuration.
    #[serde(default)]
    pub events_watcher: EventsWatcherConfig,
}

/// ApiConfig is the configuration of the HTTP query surface.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ApiConfig {
    /// The origin allowed to call the query surface. `None` allows any.
    #[serde(rename(serialize = "allowedOrigin"))]
    pub allowed_origin: Option<String>,
    /// Balance cache time-to-live, in seconds.
    #[serde(
        rename(serialize = "balanceCacheTtl"),
        default = "balance_cache_ttl_default"
    )]
    pub balance_cache_ttl: u64,
    /// Admission rate limit of the query surface.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            allowed_origin: None,
            balance_cache_ttl: balance_cache_ttl_default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

/// RateLimitConfig is the fixed-window admission budget per client IP.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RateLimitConfig {
    /// Maximum number of requests per window.
    #[serde(rename(serialize = "maxRequests"))]
    pub max_requests: u32,
    /// Window length in seconds.
    #[serde(rename(serialize = "windowSeconds"))]
    pub window_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: rate_limit_max_requests_default(),
            window_seconds: rate_limit_window_seconds_default(),
        }
    }
}

/// FeaturesConfig is the configuration for running the relayer with
/// features toggled.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct FeaturesConfig {
    /// Enable watching the ledger and relaying transfer events.
    #[serde(rename(serialize = "eventRelay"))]
    pub event_relay: bool,
    /// Enable the HTTP data query endpoints.
    #[serde(rename(serialize = "dataQuery"))]
    pub data_query: bool,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            event_relay: true,
            data_query: true,
        }
    }
}

/// AssetConfig is the configuration of one tracked asset.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct AssetConfig {
    /// The name of the asset.
    pub name: String,
    /// The token id of the asset on the Aegis token contract.
    #[serde(rename(serialize = "tokenId"))]
    pub token_id: u64,
    /// The decimals of the asset.
    pub decimals: u32,
}
