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

use std::fmt::Debug;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use aegis_relayer_types::EthAddress;

use super::{
    inverted_time_key, BalanceCacheStore, DisasterEvent, DisasterEventStore,
    Donation, DonationStore, EventHashStore, HistoryStore, HistoryStoreKey,
    Transaction, TransactionStore, UserProfile, UserProfileStore,
};

/// SledStore is the durable store backend, backed by a
/// [Sled](https://sled.rs)-based database.
#[derive(Clone)]
pub struct SledStore {
    db: sled::Db,
}

impl std::fmt::Debug for SledStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledStore").finish()
    }
}

impl SledStore {
    /// Create a new SledStore.
    pub fn open<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let db = sled::Config::new()
            .path(path)
            .temporary(cfg!(test))
            .mode(sled::Mode::HighThroughput)
            .open()?;
        Ok(Self { db })
    }

    /// Creates a temporary SledStore.
    pub fn temporary() -> crate::Result<Self> {
        let dir = tempfile::tempdir()?;
        Self::open(dir.path())
    }

    /// Gets the total amount of data stored on disk.
    pub fn get_data_stored_size(&self) -> u64 {
        self.db.size_on_disk().unwrap_or_default()
    }

    fn address_index_tree(
        &self,
        address: &EthAddress,
    ) -> crate::Result<sled::Tree> {
        let tree = self
            .db
            .open_tree(format!("transactions/{}", address.to_canonical_string()))?;
        Ok(tree)
    }
}

impl HistoryStore for SledStore {
    #[tracing::instrument(skip(self))]
    fn set_last_block_number<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        block_number: u64,
    ) -> crate::Result<u64> {
        let tree = self.db.open_tree("last_block_numbers")?;
        let key: HistoryStoreKey = key.into();
        let old = tree.insert(key.to_bytes(), &block_number.to_le_bytes())?;
        match old {
            Some(v) => {
                let mut output = [0u8; 8];
                output.copy_from_slice(&v);
                Ok(u64::from_le_bytes(output))
            }
            None => Ok(block_number),
        }
    }

    #[tracing::instrument(skip(self))]
    fn get_last_block_number<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        default_block_number: u64,
    ) -> crate::Result<u64> {
        let tree = self.db.open_tree("last_block_numbers")?;
        let key: HistoryStoreKey = key.into();
        let val = tree.get(key.to_bytes())?;
        match val {
            Some(v) => {
                let mut output = [0u8; 8];
                output.copy_from_slice(&v);
                Ok(u64::from_le_bytes(output))
            }
            None => Ok(default_block_number),
        }
    }

    #[tracing::instrument(skip(self))]
    fn set_target_block_number<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        block_number: u64,
    ) -> crate::Result<u64> {
        let tree = self.db.open_tree("target_block_numbers")?;
        let key: HistoryStoreKey = key.into();
        let old = tree.insert(key.to_bytes(), &block_number.to_le_bytes())?;
        match old {
            Some(v) => {
                let mut output = [0u8; 8];
                output.copy_from_slice(&v);
                Ok(u64::from_le_bytes(output))
            }
            None => Ok(block_number),
        }
    }

    #[tracing::instrument(skip(self))]
    fn get_target_block_number<K: Into<HistoryStoreKey> + Debug>(
        &self,
        key: K,
        default_block_number: u64,
    ) -> crate::Result<u64> {
        let tree = self.db.open_tree("target_block_numbers")?;
        let key: HistoryStoreKey = key.into();
        let val = tree.get(key.to_bytes())?;
        match val {
            Some(v) => {
                let mut output = [0u8; 8];
                output.copy_from_slice(&v);
                Ok(u64::from_le_bytes(output))
            }
            None => Ok(default_block_number),
        }
    }
}

impl TransactionStore for SledStore {
    #[tracing::instrument(skip(self, tx), fields(tx_hash = %tx.tx_hash))]
    fn insert_transaction(&self, tx: &Transaction) -> crate::Result<bool> {
        let tree = self.db.open_tree("transactions")?;
        let key = tx.tx_hash.to_lowercase();
        let value = serde_json::to_vec(tx)?;
        // The compare-and-swap against an absent key is the whole
        // idempotency story: concurrent redeliveries race here and exactly
        // one of them observes an insertion.
        let swapped = tree.compare_and_swap(
            key.as_bytes(),
            None as Option<&[u8]>,
            Some(value),
        )?;
        if swapped.is_err() {
            return Ok(false);
        }
        // Secondary indexes are only written on first insertion.
        let index_key = inverted_time_key(&tx.timestamp, key.as_bytes());
        self.address_index_tree(&tx.from)?
            .insert(index_key.as_slice(), key.as_bytes())?;
        if tx.to != tx.from {
            self.address_index_tree(&tx.to)?
                .insert(index_key.as_slice(), key.as_bytes())?;
        }
        Ok(true)
    }

    fn get_transaction(
        &self,
        tx_hash: &str,
    ) -> crate::Result<Option<Transaction>> {
        let tree = self.db.open_tree("transactions")?;
        let val = tree.get(tx_hash.to_lowercase().as_bytes())?;
        match val {
            Some(v) => Ok(Some(serde_json::from_slice(&v)?)),
            None => Ok(None),
        }
    }

    #[tracing::instrument(skip(self))]
    fn transactions_for_address(
        &self,
        address: &EthAddress,
        limit: usize,
        offset: usize,
    ) -> crate::Result<Vec<Transaction>> {
        let index = self.address_index_tree(address)?;
        let tree = self.db.open_tree("transactions")?;
        // The index keys are inverted timestamps, so ascending iteration is
        // newest first.
        let mut result = Vec::with_capacity(limit);
        for item in index.iter().skip(offset).take(limit) {
            let (_, hash) = item?;
            if let Some(v) = tree.get(&hash)? {
                result.push(serde_json::from_slice(&v)?);
            }
        }
        Ok(result)
    }

    fn transaction_count(&self) -> crate::Result<u64> {
        let tree = self.db.open_tree("transactions")?;
        Ok(tree.len() as u64)
    }
}

impl EventHashStore for SledStore {
    fn store_event(&self, event: &[u8]) -> crate::Result<bool> {
        let tree = self.db.open_tree("event_hashes")?;
        let hash = ethers::utils::keccak256(event);
        let swapped = tree.compare_and_swap(
            hash,
            None as Option<&[u8]>,
            Some(&[] as &[u8]),
        )?;
        Ok(swapped.is_ok())
    }

    fn contains_event(&self, event: &[u8]) -> crate::Result<bool> {
        let tree = self.db.open_tree("event_hashes")?;
        let hash = ethers::utils::keccak256(event);
        let exists = tree.contains_key(hash)?;
        Ok(exists)
    }

    fn delete_event(&self, event: &[u8]) -> crate::Result<()> {
        let tree = self.db.open_tree("event_hashes")?;
        let hash = ethers::utils::keccak256(event);
        tree.remove(hash)?;
        Ok(())
    }
}

impl DisasterEventStore for SledStore {
    #[tracing::instrument(skip(self))]
    fn insert_disaster_event(
        &self,
        location: &str,
        magnitude: f64,
        category: &str,
    ) -> crate::Result<DisasterEvent> {
        let tree = self.db.open_tree("disasters")?;
        let event = DisasterEvent {
            id: self.db.generate_id()?,
            location: location.to_string(),
            magnitude,
            category: category.to_string(),
            timestamp: chrono::Utc::now(),
        };
        let key = inverted_time_key(&event.timestamp, &event.id.to_be_bytes());
        tree.insert(key, serde_json::to_vec(&event)?)?;
        Ok(event)
    }

    fn recent_disaster_events(
        &self,
        limit: usize,
    ) -> crate::Result<Vec<DisasterEvent>> {
        let tree = self.db.open_tree("disasters")?;
        let mut result = Vec::new();
        for item in tree.iter().take(limit) {
            let (_, v) = item?;
            result.push(serde_json::from_slice(&v)?);
        }
        Ok(result)
    }

    fn disaster_event_count(&self) -> crate::Result<u64> {
        let tree = self.db.open_tree("disasters")?;
        Ok(tree.len() as u64)
    }
}

impl DonationStore for SledStore {
    #[tracing::instrument(skip(self, donation))]
    fn record_donation(&self, donation: &Donation) -> crate::Result<()> {
        let tree = self.db.open_tree("donations")?;
        let id = self.db.generate_id()?;
        let key = inverted_time_key(&donation.timestamp, &id.to_be_bytes());
        tree.insert(key, serde_json::to_vec(donation)?)?;
        Ok(())
    }

    fn donations(
        &self,
        campaign: Option<&str>,
    ) -> crate::Result<Vec<Donation>> {
        let tree = self.db.open_tree("donations")?;
        let mut result = Vec::new();
        for item in tree.iter() {
            let (_, v) = item?;
            let donation: Donation = serde_json::from_slice(&v)?;
            if campaign.map_or(true, |c| donation.campaign == c) {
                result.push(donation);
            }
        }
        Ok(result)
    }

    fn total_donated(&self) -> crate::Result<f64> {
        let tree = self.db.open_tree("donations")?;
        let mut total = 0.0;
        for item in tree.iter() {
            let (_, v) = item?;
            let donation: Donation = serde_json::from_slice(&v)?;
            total += donation.amount;
        }
        Ok(total)
    }
}

impl UserProfileStore for SledStore {
    fn get_user(
        &self,
        address: &EthAddress,
    ) -> crate::Result<Option<UserProfile>> {
        let tree = self.db.open_tree("users")?;
        let val = tree.get(address.to_canonical_string().as_bytes())?;
        match val {
            Some(v) => Ok(Some(serde_json::from_slice(&v)?)),
            None => Ok(None),
        }
    }

    fn upsert_user(&self, user: &UserProfile) -> crate::Result<()> {
        let tree = self.db.open_tree("users")?;
        tree.insert(
            user.address.to_canonical_string().as_bytes(),
            serde_json::to_vec(user)?,
        )?;
        Ok(())
    }

    fn user_count(&self) -> crate::Result<u64> {
        let tree = self.db.open_tree("users")?;
        Ok(tree.len() as u64)
    }
}

impl<Cached> BalanceCacheStore<Cached> for SledStore
where
    Cached: Serialize + DeserializeOwned,
{
    fn get_cached_balances(
        &self,
        address: &EthAddress,
    ) -> crate::Result<Option<Cached>> {
        let tree = self.db.open_tree("balances_cache")?;
        let val = tree.get(address.to_canonical_string().as_bytes())?;
        match val {
            Some(v) => Ok(Some(serde_json::from_slice(&v)?)),
            None => Ok(None),
        }
    }

    fn insert_cached_balances(
        &self,
        address: &EthAddress,
        value: Cached,
    ) -> crate::Result<()> {
        let tree = self.db.open_tree("balances_cache")?;
        tree.insert(
            address.to_canonical_string().as_bytes(),
            serde_json::to_vec(&value)?,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn addr(byte: u8) -> EthAddress {
        EthAddress::new(ethereum_types::H160::repeat_byte(byte))
    }

    fn sample_tx(hash: &str, at: chrono::DateTime<Utc>) -> Transaction {
        Transaction {
            tx_hash: hash.to_string(),
            from: addr(0xaa),
            to: addr(0xbb),
            token_id: 1,
            amount: "1000000000000000000".to_string(),
            timestamp: at,
        }
    }

    #[test]
    fn transaction_insert_is_idempotent() {
        let store = SledStore::temporary().unwrap();
        let tx = sample_tx("0xdeadbeef01", Utc::now());
        assert!(store.insert_transaction(&tx).unwrap());
        assert!(!store.insert_transaction(&tx).unwrap());
        assert_eq!(store.transaction_count().unwrap(), 1);
        let stored = store.get_transaction("0xdeadbeef01").unwrap().unwrap();
        assert_eq!(stored, tx);
    }

    #[test]
    fn mixed_case_hashes_collapse_to_one_record() {
        let store = SledStore::temporary().unwrap();
        let tx = sample_tx("0xDEADBEEF02", Utc::now());
        assert!(store.insert_transaction(&tx).unwrap());
        let mut dup = tx.clone();
        dup.tx_hash = "0xdeadbeef02".to_string();
        assert!(!store.insert_transaction(&dup).unwrap());
        assert_eq!(store.transaction_count().unwrap(), 1);
    }

    #[test]
    fn address_history_is_newest_first() {
        let store = SledStore::temporary().unwrap();
        let now = Utc::now();
        for i in 0..5u8 {
            let tx = sample_tx(
                &format!("0xaaa{i}"),
                now - Duration::seconds(i64::from(i)),
            );
            assert!(store.insert_transaction(&tx).unwrap());
        }
        let page = store
            .transactions_for_address(&addr(0xaa), 3, 0)
            .unwrap();
        assert_eq!(page.len(), 3);
        assert!(page.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
        // offset skips the newest entries
        let next = store
            .transactions_for_address(&addr(0xaa), 3, 3)
            .unwrap();
        assert_eq!(next.len(), 2);
        assert!(next[0].timestamp <= page[2].timestamp);
        // the recipient sees the same history
        let seen_by_to = store
            .transactions_for_address(&addr(0xbb), 10, 0)
            .unwrap();
        assert_eq!(seen_by_to.len(), 5);
    }

    #[test]
    fn event_hash_store_marks_once() {
        let store = SledStore::temporary().unwrap();
        assert!(store.store_event(b"disaster-42").unwrap());
        assert!(!store.store_event(b"disaster-42").unwrap());
        assert!(store.contains_event(b"disaster-42").unwrap());
        store.delete_event(b"disaster-42").unwrap();
        assert!(!store.contains_event(b"disaster-42").unwrap());
    }

    #[test]
    fn history_store_round_trip() {
        let store = SledStore::temporary().unwrap();
        let key = (1u32, ethereum_types::H160::repeat_byte(0x11));
        assert_eq!(store.get_last_block_number(key, 7).unwrap(), 7);
        store.set_last_block_number(key, 42).unwrap();
        assert_eq!(store.get_last_block_number(key, 7).unwrap(), 42);
        store.set_target_block_number(key, 100).unwrap();
        assert_eq!(store.get_target_block_number(key, 0).unwrap(), 100);
    }

    #[test]
    fn disasters_are_append_only_and_recent_first() {
        let store = SledStore::temporary().unwrap();
        store
            .insert_disaster_event("Tokyo", 5.0, "earthquake")
            .unwrap();
        store
            .insert_disaster_event("Osaka", 3.2, "flood")
            .unwrap();
        let recent = store.recent_disaster_events(100).unwrap();
        assert_eq!(recent.len(), 2);
        assert!(recent[0].timestamp >= recent[1].timestamp);
        assert_eq!(store.disaster_event_count().unwrap(), 2);
    }

    #[test]
    fn donations_filter_and_sum() {
        let store = SledStore::temporary().unwrap();
        let donation = |campaign: &str, amount: f64| Donation {
            donor: addr(0xcc),
            campaign: campaign.to_string(),
            amount,
            timestamp: Utc::now(),
        };
        store.record_donation(&donation("tokyo-relief", 10.0)).unwrap();
        store.record_donation(&donation("tokyo-relief", 5.0)).unwrap();
        store.record_donation(&donation("osaka-relief", 2.5)).unwrap();
        assert_eq!(store.donations(None).unwrap().len(), 3);
        assert_eq!(
            store.donations(Some("tokyo-relief")).unwrap().len(),
            2
        );
        assert!((store.total_donated().unwrap() - 17.5).abs() < f64::EPSILON);
    }

    #[test]
    fn user_profiles_round_trip() {
        let store = SledStore::temporary().unwrap();
        let user = UserProfile {
            address: addr(0xdd),
            name: "Alice".to_string(),
            role: Some(aegis_relayer_types::UserRole::Victim),
            created_at: Utc::now(),
        };
        assert!(store.get_user(&user.address).unwrap().is_none());
        store.upsert_user(&user).unwrap();
        assert_eq!(store.get_user(&user.address).unwrap().unwrap(), user);
        assert_eq!(store.user_count().unwrap(), 1);
    }
}
