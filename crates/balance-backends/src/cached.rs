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

use std::time::Duration;

use chrono::Utc;

use aegis_relayer_store::BalanceCacheStore;
use aegis_relayer_types::EthAddress;
use aegis_relayer_utils::Result;

use super::{BalanceBackend, BalancesMap};

/// A balance backend that caches results in a local store.
///
/// The cache is read-through: a fresh entry answers the query without
/// touching the inner backend; a miss (or an expired entry) queries the
/// inner backend and refreshes the entry.
///
/// The cache is strictly advisory. Read and write failures of the store
/// degrade to a direct backend query; they are never surfaced to the
/// caller.
#[derive(Debug, Clone, typed_builder::TypedBuilder)]
pub struct CachedBalanceBackend<B, S> {
    /// The inner balance backend.
    backend: B,
    /// The local store used for caching.
    store: S,
    /// The cache expiration time.
    ///
    /// If an entry is older than this value, it will be refreshed from the
    /// inner backend. If the value is `None`, entries never expire.
    #[builder(default = Some(Duration::from_secs(30)))]
    cache_expiration: Option<Duration>,
    /// Specifies whether a cached entry should be returned when the inner
    /// backend is unavailable, even if the entry is expired.
    ///
    /// Stale balances are better than no balances for a dashboard, but
    /// this is opt-in.
    #[builder(setter(strip_bool))]
    use_cache_if_source_unavailable: bool,
}

/// A cached balances value, timestamped at write time.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CachedBalances {
    /// The cached balances map.
    pub balances: BalancesMap,
    /// Unix timestamp of when the entry was written.
    pub timestamp: i64,
}

impl<B, S> CachedBalanceBackend<B, S>
where
    B: BalanceBackend,
    S: BalanceCacheStore<CachedBalances>,
{
    /// Returns the cache expiration duration.
    pub const fn cache_expiration(&self) -> Option<Duration> {
        self.cache_expiration
    }

    /// Returns the inner balance backend.
    pub const fn inner(&self) -> &B {
        &self.backend
    }

    fn is_expired(&self, entry: &CachedBalances) -> bool {
        self.cache_expiration.map_or(false, |expiration| {
            let expires_at = entry.timestamp + expiration.as_secs() as i64;
            Utc::now().timestamp() >= expires_at
        })
    }
}

#[async_trait::async_trait]
impl<B, S> BalanceBackend for CachedBalanceBackend<B, S>
where
    B: BalanceBackend + Clone + 'static,
    S: BalanceCacheStore<CachedBalances> + Clone + Send + Sync + 'static,
{
    async fn get_balances(
        &self,
        address: &EthAddress,
    ) -> Result<BalancesMap> {
        // A failing cache is a miss, not an error.
        let cached = match self.store.get_cached_balances(address) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!(%address, "balance cache read failed: {e}");
                None
            }
        };
        if let Some(entry) = &cached {
            if !self.is_expired(entry) {
                return Ok(entry.balances.clone());
            }
        }

        match self.backend.get_balances(address).await {
            Ok(fresh) => {
                let value = CachedBalances {
                    balances: fresh.clone(),
                    timestamp: Utc::now().timestamp(),
                };
                // Best-effort write; a cache outage only costs freshness.
                if let Err(e) =
                    self.store.insert_cached_balances(address, value)
                {
                    tracing::debug!(%address, "balance cache write failed: {e}");
                }
                Ok(fresh)
            }
            Err(e) => {
                if self.use_cache_if_source_unavailable {
                    if let Some(entry) = cached {
                        tracing::warn!(
                            %address,
                            "ledger unavailable, serving stale balances: {e}"
                        );
                        return Ok(entry.balances);
                    }
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use aegis_relayer_store::InMemoryStore;
    use aegis_relayer_utils::Error;

    use super::*;
    use crate::DummyBalanceBackend;

    fn addr(s: &str) -> EthAddress {
        s.parse().unwrap()
    }

    fn make_backend(address: &EthAddress) -> DummyBalanceBackend {
        let mut balances = BalancesMap::new();
        balances.insert("AID".to_string(), "1.5".to_string());
        balances.insert("FOOD".to_string(), "20.0".to_string());
        DummyBalanceBackend::new(HashMap::from_iter([(*address, balances)]))
    }

    /// A backend standing in for an unreachable ledger.
    #[derive(Debug, Clone)]
    struct UnreachableBackend;

    #[async_trait::async_trait]
    impl BalanceBackend for UnreachableBackend {
        async fn get_balances(
            &self,
            _address: &EthAddress,
        ) -> Result<BalancesMap> {
            Err(Error::Generic("ledger unreachable"))
        }
    }

    /// A cache store standing in for an unreachable cache.
    #[derive(Debug, Clone)]
    struct BrokenCacheStore;

    impl BalanceCacheStore<CachedBalances> for BrokenCacheStore {
        fn get_cached_balances(
            &self,
            _address: &EthAddress,
        ) -> Result<Option<CachedBalances>> {
            Err(Error::Generic("cache unreachable"))
        }

        fn insert_cached_balances(
            &self,
            _address: &EthAddress,
            _value: CachedBalances,
        ) -> Result<()> {
            Err(Error::Generic("cache unreachable"))
        }
    }

    #[tokio::test]
    async fn miss_populates_cache_and_hit_skips_backend() {
        let address = addr("0xaabbccddeeff00112233445566778899aabbccdd");
        let store = InMemoryStore::default();
        let backend = CachedBalanceBackend::builder()
            .backend(make_backend(&address))
            .store(store.clone())
            .build();

        let first = backend.get_balances(&address).await.unwrap();
        assert_eq!(first.get("AID"), Some(&"1.5".to_string()));

        // the entry landed in the cache
        let entry: Option<CachedBalances> =
            store.get_cached_balances(&address).unwrap();
        assert!(entry.is_some());

        // a hit is served from the cache even if the source now fails
        let cached_over_failing = CachedBalanceBackend::builder()
            .backend(UnreachableBackend)
            .store(store)
            .build();
        let second = cached_over_failing.get_balances(&address).await.unwrap();
        assert_eq!(second, first);
    }

    #[tokio::test]
    async fn mixed_case_addresses_share_one_cache_entry() {
        let lower = addr("0xaabbccddeeff00112233445566778899aabbccdd");
        let upper = addr("0xAABBCCDDEEFF00112233445566778899AABBCCDD");
        let store = InMemoryStore::default();
        let backend = CachedBalanceBackend::builder()
            .backend(make_backend(&lower))
            .store(store)
            .build();

        let first = backend.get_balances(&lower).await.unwrap();
        let second = backend.get_balances(&upper).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn expired_entry_is_refreshed_from_the_source() {
        let address = addr("0xaabbccddeeff00112233445566778899aabbccdd");
        let store = InMemoryStore::default();
        store
            .insert_cached_balances(
                &address,
                CachedBalances {
                    balances: BalancesMap::from_iter([(
                        "AID".to_string(),
                        "0.0".to_string(),
                    )]),
                    timestamp: 0,
                },
            )
            .unwrap();
        let backend = CachedBalanceBackend::builder()
            .backend(make_backend(&address))
            .store(store)
            .cache_expiration(Some(Duration::from_secs(30)))
            .build();

        let fresh = backend.get_balances(&address).await.unwrap();
        assert_eq!(fresh.get("AID"), Some(&"1.5".to_string()));
    }

    #[tokio::test]
    async fn cache_outage_degrades_to_direct_reads() {
        let address = addr("0xaabbccddeeff00112233445566778899aabbccdd");
        let backend = CachedBalanceBackend::builder()
            .backend(make_backend(&address))
            .store(BrokenCacheStore)
            .build();

        // both the read and the write fail; the result is still correct
        let result = backend.get_balances(&address).await.unwrap();
        assert_eq!(result.get("FOOD"), Some(&"20.0".to_string()));
    }

    #[tokio::test]
    async fn stale_entry_serves_when_source_unavailable() {
        let address = addr("0xaabbccddeeff00112233445566778899aabbccdd");
        let store = InMemoryStore::default();
        store
            .insert_cached_balances(
                &address,
                CachedBalances {
                    balances: BalancesMap::from_iter([(
                        "AID".to_string(),
                        "3.0".to_string(),
                    )]),
                    timestamp: 0,
                },
            )
            .unwrap();
        let backend = CachedBalanceBackend::builder()
            .backend(UnreachableBackend)
            .store(store)
            .use_cache_if_source_unavailable()
            .build();

        let stale = backend.get_balances(&address).await.unwrap();
        assert_eq!(stale.get("AID"), Some(&"3.0".to_string()));

        // without the opt-in, the source error propagates
        let strict = CachedBalanceBackend::builder()
            .backend(UnreachableBackend)
            .store(InMemoryStore::default())
            .build();
        assert!(strict.get_balances(&address).await.is_err());
    }
}
