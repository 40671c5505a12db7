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

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;

use aegis_relayer_types::EthAddress;

use super::{
    BalanceCacheStore, DisasterEvent, DisasterEventStore, Donation,
    DonationStore, EventHashStore, HistoryStore, HistoryStoreKey, Transaction,
    TransactionStore, UserProfile, UserProfileStore,
};

/// InMemoryStore keeps the whole relayer state in process memory.
///
/// Used as the store double in tests and wherever durability is not needed;
/// it implements the exact same traits as the sled backend.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    last_block_numbers: Arc<RwLock<HashMap<HistoryStoreKey, u64>>>,
    target_block_numbers: Arc<RwLock<HashMap<HistoryStoreKey, u64>>>,
    transactions: Arc<RwLock<HashMap<String, Transaction>>>,
    event_hashes: Arc<RwLock<HashSet<[u8; 32]>>>,
    disasters: Arc<RwLock<Vec<DisasterEvent>>>,
    donations: Arc<RwLock<Vec<Donation>>>,
    users: Arc<RwLock<HashMap<EthAddress, UserProfile>>>,
    balances_cache: Arc<RwLock<HashMap<EthAddress, Vec<u8>>>>,
    next_id: Arc<AtomicU64>,
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore").finish()
    }
}

impl HistoryStore for InMemoryStore {
    #[tracing::instrument(skip(self))]
    fn set_last_block_number<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        block_number: u64,
    ) -> crate::Result<u64> {
        let mut guard = self.last_block_numbers.write();
        let val = guard.entry(key.into()).or_insert(block_number);
        let old = *val;
        *val = block_number;
        Ok(old)
    }

    #[tracing::instrument(skip(self))]
    fn get_last_block_number<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        default_block_number: u64,
    ) -> crate::Result<u64> {
        let guard = self.last_block_numbers.read();
        Ok(guard.get(&key.into()).copied().unwrap_or(default_block_number))
    }

    #[tracing::instrument(skip(self))]
    fn set_target_block_number<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        block_number: u64,
    ) -> crate::Result<u64> {
        let mut guard = self.target_block_numbers.write();
        let val = guard.entry(key.into()).or_insert(block_number);
        let old = *val;
        *val = block_number;
        Ok(old)
    }

    #[tracing::instrument(skip(self))]
    fn get_target_block_number<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        default_block_number: u64,
    ) -> crate::Result<u64> {
        let guard = self.target_block_numbers.read();
        Ok(guard.get(&key.into()).copied().unwrap_or(default_block_number))
    }
}

impl TransactionStore for InMemoryStore {
    fn insert_transaction(&self, tx: &Transaction) -> crate::Result<bool> {
        let mut guard = self.transactions.write();
        let key = tx.tx_hash.to_lowercase();
        if guard.contains_key(&key) {
            return Ok(false);
        }
        guard.insert(key, tx.clone());
        Ok(true)
    }

    fn get_transaction(
        &self,
        tx_hash: &str,
    ) -> crate::Result<Option<Transaction>> {
        let guard = self.transactions.read();
        Ok(guard.get(&tx_hash.to_lowercase()).cloned())
    }

    fn transactions_for_address(
        &self,
        address: &EthAddress,
        limit: usize,
        offset: usize,
    ) -> crate::Result<Vec<Transaction>> {
        let guard = self.transactions.read();
        let mut matching: Vec<Transaction> = guard
            .values()
            .filter(|tx| tx.from == *address || tx.to == *address)
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| a.tx_hash.cmp(&b.tx_hash))
        });
        Ok(matching.into_iter().skip(offset).take(limit).collect())
    }

    fn transaction_count(&self) -> crate::Result<u64> {
        Ok(self.transactions.read().len() as u64)
    }
}

impl EventHashStore for InMemoryStore {
    fn store_event(&self, event: &[u8]) -> crate::Result<bool> {
        let hash = ethers::utils::keccak256(event);
        Ok(self.event_hashes.write().insert(hash))
    }

    fn contains_event(&self, event: &[u8]) -> crate::Result<bool> {
        let hash = ethers::utils::keccak256(event);
        Ok(self.event_hashes.read().contains(&hash))
    }

    fn delete_event(&self, event: &[u8]) -> crate::Result<()> {
        let hash = ethers::utils::keccak256(event);
        self.event_hashes.write().remove(&hash);
        Ok(())
    }
}

impl DisasterEventStore for InMemoryStore {
    fn insert_disaster_event(
        &self,
        location: &str,
        magnitude: f64,
        category: &str,
    ) -> crate::Result<DisasterEvent> {
        let event = DisasterEvent {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            location: location.to_string(),
            magnitude,
            category: category.to_string(),
            timestamp: chrono::Utc::now(),
        };
        self.disasters.write().push(event.clone());
        Ok(event)
    }

    fn recent_disaster_events(
        &self,
        limit: usize,
    ) -> crate::Result<Vec<DisasterEvent>> {
        let guard = self.disasters.read();
        let mut events: Vec<DisasterEvent> = guard.clone();
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        events.truncate(limit);
        Ok(events)
    }

    fn disaster_event_count(&self) -> crate::Result<u64> {
        Ok(self.disasters.read().len() as u64)
    }
}

impl DonationStore for InMemoryStore {
    fn record_donation(&self, donation: &Donation) -> crate::Result<()> {
        self.donations.write().push(donation.clone());
        Ok(())
    }

    fn donations(
        &self,
        campaign: Option<&str>,
    ) -> crate::Result<Vec<Donation>> {
        let guard = self.donations.read();
        let mut matching: Vec<Donation> = guard
            .iter()
            .filter(|d| campaign.map_or(true, |c| d.campaign == c))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(matching)
    }

    fn total_donated(&self) -> crate::Result<f64> {
        Ok(self.donations.read().iter().map(|d| d.amount).sum())
    }
}

impl UserProfileStore for InMemoryStore {
    fn get_user(
        &self,
        address: &EthAddress,
    ) -> crate::Result<Option<UserProfile>> {
        Ok(self.users.read().get(address).cloned())
    }

    fn upsert_user(&self, user: &UserProfile) -> crate::Result<()> {
        self.users.write().insert(user.address, user.clone());
        Ok(())
    }

    fn user_count(&self) -> crate::Result<u64> {
        Ok(self.users.read().len() as u64)
    }
}

impl<Cached> BalanceCacheStore<Cached> for InMemoryStore
where
    Cached: Serialize + DeserializeOwned,
{
    fn get_cached_balances(
        &self,
        address: &EthAddress,
    ) -> crate::Result<Option<Cached>> {
        let guard = self.balances_cache.read();
        match guard.get(address) {
            Some(bytes) => Ok(Some(serde_json::from_slice(bytes)?)),
            None => Ok(None),
        }
    }

    fn insert_cached_balances(
        &self,
        address: &EthAddress,
        value: Cached,
    ) -> crate::Result<()> {
        let bytes = serde_json::to_vec(&value)?;
        self.balances_cache.write().insert(*address, bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn addr(byte: u8) -> EthAddress {
        EthAddress::new(ethereum_types::H160::repeat_byte(byte))
    }

    #[test]
    fn clones_share_state() {
        let store = InMemoryStore::default();
        let other = store.clone();
        let tx = Transaction {
            tx_hash: "0xabc".to_string(),
            from: addr(0x01),
            to: addr(0x02),
            token_id: 1,
            amount: "10".to_string(),
            timestamp: Utc::now(),
        };
        assert!(store.insert_transaction(&tx).unwrap());
        assert!(!other.insert_transaction(&tx).unwrap());
        assert_eq!(other.transaction_count().unwrap(), 1);
    }

    #[test]
    fn cached_balances_round_trip() {
        let store = InMemoryStore::default();
        let address = addr(0x03);
        let value: Option<HashMap<String, String>> =
            store.get_cached_balances(&address).unwrap();
        assert!(value.is_none());
        let mut balances = HashMap::new();
        balances.insert("AID".to_string(), "1.5".to_string());
        store
            .insert_cached_balances(&address, balances.clone())
            .unwrap();
        let value: Option<HashMap<String, String>> =
            store.get_cached_balances(&address).unwrap();
        assert_eq!(value.unwrap(), balances);
    }
}
