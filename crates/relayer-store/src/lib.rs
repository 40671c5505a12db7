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

//! # Relayer Store Module
//!
//! A module for managing the storage of the relayer.
//!
//! ## Overview
//!
//! The store is the single source of truth for recorded transfers, disaster
//! events, donations and user profiles, and it keeps the block cursor of the
//! event watcher so that a restart resumes (and possibly replays) from where
//! it left off. Replay is safe because transfer recording is an atomic
//! insert-if-absent keyed by the transaction hash.

use std::fmt::{Debug, Display};

use chrono::{DateTime, Utc};
use ethereum_types::H160;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use aegis_relayer_types::{EthAddress, UserRole};
use aegis_relayer_utils::Result;

/// A module for managing in-memory storage of the relayer.
pub mod mem;
/// A module for setting up and managing a [Sled](https://sled.rs)-based database.
#[cfg(feature = "sled")]
pub mod sled;

/// A store that uses [`sled`](https://sled.rs) as the backend.
#[cfg(feature = "sled")]
pub use self::sled::SledStore;
/// A store that uses in memory data structures as the backend.
pub use mem::InMemoryStore;

/// HistoryStoreKey identifies the block cursor of one watched contract.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct HistoryStoreKey {
    /// The chain the contract lives on.
    pub chain_id: u32,
    /// The watched contract address.
    pub address: H160,
}

impl HistoryStoreKey {
    /// Returns the bytes of the key.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut vec = Vec::with_capacity(24);
        vec.extend_from_slice(&self.chain_id.to_be_bytes());
        vec.extend_from_slice(self.address.as_bytes());
        vec
    }
}

impl Display for HistoryStoreKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Contract({:#x} @ chain {})", self.address, self.chain_id)
    }
}

impl From<(u32, H160)> for HistoryStoreKey {
    fn from((chain_id, address): (u32, H160)) -> Self {
        Self { chain_id, address }
    }
}

/// A recorded token transfer.
///
/// The transaction hash is the natural idempotency key: the same on-chain
/// event may be redelivered after a reconnect replays recent blocks, and a
/// redelivery must neither create a second record nor a second broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// The ledger-assigned transaction hash, lowercase `0x`-prefixed hex.
    pub tx_hash: String,
    /// The sender address.
    pub from: EthAddress,
    /// The recipient address.
    pub to: EthAddress,
    /// The transferred token id.
    pub token_id: u64,
    /// The transferred amount in raw units, as a decimal string.
    pub amount: String,
    /// When the transfer was recorded.
    pub timestamp: DateTime<Utc>,
}

/// An externally reported incident, ingested through the disaster webhook.
///
/// Append-only: there is no update or delete path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisasterEvent {
    /// Store-assigned identifier.
    pub id: u64,
    /// Where the incident happened.
    pub location: String,
    /// Reported magnitude.
    pub magnitude: f64,
    /// Incident category, e.g. `earthquake`.
    #[serde(rename = "type")]
    pub category: String,
    /// When the incident was ingested.
    pub timestamp: DateTime<Utc>,
}

/// A donation towards a relief campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Donation {
    /// The donor address.
    pub donor: EthAddress,
    /// The campaign the donation is for.
    pub campaign: String,
    /// Donated amount in token units.
    pub amount: f64,
    /// When the donation was made.
    pub timestamp: DateTime<Utc>,
}

/// A registered platform user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// The user's on-chain address, the primary key.
    pub address: EthAddress,
    /// Display name.
    pub name: String,
    /// The user's platform role, if known.
    pub role: Option<UserRole>,
    /// When the profile was created.
    pub created_at: DateTime<Utc>,
}

/// Aggregate counters over the whole store.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateStats {
    /// Number of registered user profiles.
    pub total_users: u64,
    /// Number of recorded transfers.
    pub total_transactions: u64,
    /// Sum of all donations, in token units.
    pub total_donations: f64,
    /// Number of ingested disaster events.
    pub total_disasters: u64,
}

/// HistoryStore is a simple trait for storing and retrieving the block
/// cursor of an event watcher.
pub trait HistoryStore: Clone + Send + Sync {
    /// Sets the new block number for that contract and returns the old one.
    fn set_last_block_number<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        block_number: u64,
    ) -> Result<u64>;
    /// Get the last block number for that contract.
    /// if not found, returns the `default_block_number`.
    fn get_last_block_number<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        default_block_number: u64,
    ) -> Result<u64>;

    /// Sets the target block number (usually the latest block of the chain).
    /// This is used to check if we are fully synced with the chain or not.
    fn set_target_block_number<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        block_number: u64,
    ) -> Result<u64>;
    /// Get the target block number.
    /// if not found, returns the `default_block_number`.
    fn get_target_block_number<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        default_block_number: u64,
    ) -> Result<u64>;
}

/// The durable, idempotent record of token transfers.
pub trait TransactionStore: Send + Sync {
    /// Records a transfer as a single atomic insert-if-absent keyed by the
    /// transaction hash.
    ///
    /// Returns `Ok(true)` if this call created the record, `Ok(false)` if a
    /// record with the same hash already exists. A duplicate is a normal
    /// outcome, not an error; callers use the return value to decide
    /// whether to broadcast (broadcast-on-insert, never on duplicate).
    fn insert_transaction(&self, tx: &Transaction) -> Result<bool>;

    /// Fetch a single transfer by its hash.
    fn get_transaction(&self, tx_hash: &str) -> Result<Option<Transaction>>;

    /// The transfer history of one address (as sender or recipient),
    /// newest first.
    fn transactions_for_address(
        &self,
        address: &EthAddress,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Transaction>>;

    /// Total number of recorded transfers.
    fn transaction_count(&self) -> Result<u64>;
}

/// A simple event store that keeps only the hash of an event to mark it as
/// processed.
///
/// Used for externally pushed events that carry an explicit idempotency key
/// (there is nothing like a transaction hash to key on).
pub trait EventHashStore: Send + Sync + Clone {
    /// Mark the event as processed. The key is the hash of the event.
    ///
    /// Returns `Ok(true)` if the event was newly marked, `Ok(false)` if it
    /// was already present.
    fn store_event(&self, event: &[u8]) -> Result<bool>;

    /// Check if the event is already marked as processed.
    fn contains_event(&self, event: &[u8]) -> Result<bool>;

    /// Delete the event mark from the store.
    fn delete_event(&self, event: &[u8]) -> Result<()>;
}

/// Append-only storage of disaster events.
pub trait DisasterEventStore: Send + Sync {
    /// Persist a new disaster event; the store assigns id and timestamp.
    fn insert_disaster_event(
        &self,
        location: &str,
        magnitude: f64,
        category: &str,
    ) -> Result<DisasterEvent>;

    /// The most recent disaster events, newest first.
    fn recent_disaster_events(&self, limit: usize)
        -> Result<Vec<DisasterEvent>>;

    /// Total number of ingested disaster events.
    fn disaster_event_count(&self) -> Result<u64>;
}

/// Storage of donations.
pub trait DonationStore: Send + Sync {
    /// Append a donation.
    fn record_donation(&self, donation: &Donation) -> Result<()>;

    /// All donations newest first, optionally filtered by campaign.
    fn donations(&self, campaign: Option<&str>) -> Result<Vec<Donation>>;

    /// Sum of all donated amounts.
    fn total_donated(&self) -> Result<f64>;
}

/// Storage of user profiles, keyed by normalized address.
pub trait UserProfileStore: Send + Sync {
    /// Fetch a profile by address.
    fn get_user(&self, address: &EthAddress) -> Result<Option<UserProfile>>;

    /// Insert or overwrite a profile.
    fn upsert_user(&self, user: &UserProfile) -> Result<()>;

    /// Number of stored profiles.
    fn user_count(&self) -> Result<u64>;
}

/// A cache of derived balance values, keyed by normalized address.
///
/// The cached value is advisory: absence, staleness or a failing cache must
/// never block correctness, only freshness. Expiry is enforced by the
/// reader, which knows its own notion of time-to-live.
pub trait BalanceCacheStore<Cached>
where
    Cached: Serialize + DeserializeOwned,
{
    /// Get the cached balances for the given address, if any.
    fn get_cached_balances(
        &self,
        address: &EthAddress,
    ) -> Result<Option<Cached>>;

    /// Insert the cached balances for the given address.
    ///
    /// **Note**: this will override the previous value.
    fn insert_cached_balances(
        &self,
        address: &EthAddress,
        value: Cached,
    ) -> Result<()>;
}

/// Big-endian inverted-timestamp index key: ordering the tree ascending by
/// this key yields newest-first iteration. The tx hash (or id) suffix keeps
/// keys unique within one millisecond.
pub(crate) fn inverted_time_key(
    timestamp: &DateTime<Utc>,
    suffix: &[u8],
) -> Vec<u8> {
    let millis = timestamp.timestamp_millis().max(0) as u64;
    let mut key = Vec::with_capacity(8 + suffix.len());
    key.extend_from_slice(&(u64::MAX - millis).to_be_bytes());
    key.extend_from_slice(suffix);
    key
}
