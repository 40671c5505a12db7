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

use std::collections::HashMap;
use std::sync::Arc;

use ethers::prelude::LogMeta;
use tokio::sync::Mutex;

use aegis_contracts::AegisTokenEvents;
use aegis_event_watcher_traits::evm::{EthersClient, EventHandler};
use aegis_relayer_handler_utils::{
    NewTransactionEvent, ServerEvent, TokenTransferEvent, TransferDirection,
};
use aegis_relayer_sessions::{BroadcastScope, SessionId, SessionRegistry};
use aegis_relayer_store::{
    HistoryStore, Transaction, TransactionStore,
};
use aegis_relayer_types::EthAddress;
use aegis_relayer_utils::metric;

use super::AegisTokenContractWrapper;

/// A transfer handler that records `TransferSingle` events idempotently and
/// fans them out to the interested sessions.
///
/// The transaction hash is the idempotency key: persistence is an atomic
/// insert-if-absent, and events are broadcast only when that insert
/// actually created the record. A redelivered event (for example after the
/// watcher replays recent blocks on restart) is a silent no-op.
pub struct TransferHandler<S> {
    sessions: Arc<SessionRegistry<ServerEvent>>,
    decimals_by_token: HashMap<u64, u32>,
    _store: std::marker::PhantomData<S>,
}

impl<S> TransferHandler<S> {
    /// Creates a new transfer handler.
    ///
    /// `decimals_by_token` maps the configured token ids to their decimals
    /// for rendering event amounts in token units; unknown token ids fall
    /// back to 18 decimals.
    pub fn new(
        sessions: Arc<SessionRegistry<ServerEvent>>,
        decimals_by_token: HashMap<u64, u32>,
    ) -> Self {
        Self {
            sessions,
            decimals_by_token,
            _store: std::marker::PhantomData,
        }
    }

    fn format_amount(
        &self,
        token_id: u64,
        value: ethers::types::U256,
    ) -> aegis_relayer_utils::Result<String> {
        let decimals =
            self.decimals_by_token.get(&token_id).copied().unwrap_or(18);
        Ok(ethers::utils::format_units(value, decimals)?)
    }
}

#[async_trait::async_trait]
impl<S> EventHandler for TransferHandler<S>
where
    S: HistoryStore + TransactionStore + 'static,
{
    type Contract = AegisTokenContractWrapper<EthersClient>;

    type Events = AegisTokenEvents;

    type Store = S;

    #[tracing::instrument(skip_all)]
    async fn handle_event(
        &self,
        store: Arc<Self::Store>,
        _contract: &Self::Contract,
        (event, log): (Self::Events, LogMeta),
        metrics: Arc<Mutex<metric::Metrics>>,
    ) -> aegis_relayer_utils::Result<()> {
        let AegisTokenEvents::TransferSingleFilter(transfer) = event;
        let from = EthAddress::new(transfer.from);
        let to = EthAddress::new(transfer.to);
        let token_id = transfer.id.as_u64();
        let tx_hash = format!("{:#x}", log.transaction_hash);

        let tx = Transaction {
            tx_hash: tx_hash.clone(),
            from,
            to,
            token_id,
            amount: transfer.value.to_string(),
            timestamp: chrono::Utc::now(),
        };
        let inserted = store.insert_transaction(&tx)?;
        if !inserted {
            // Redelivered event: already recorded, never re-broadcast.
            metrics.lock().await.duplicate_events_ignored.inc();
            tracing::trace!(%tx_hash, "transfer already recorded, skipping");
            return Ok(());
        }
        metrics.lock().await.transactions_recorded.inc();
        tracing::event!(
            target: aegis_relayer_utils::probe::TARGET,
            tracing::Level::DEBUG,
            kind = %aegis_relayer_utils::probe::Kind::TxStore,
            %tx_hash,
            %from,
            %to,
            token_id,
            block_number = %log.block_number,
        );

        // The record is durable at this point; everything below is
        // fire-and-forget fan-out.
        let amount = self.format_amount(token_id, transfer.value)?;
        let mut delivered = self.sessions.broadcast(
            BroadcastScope::All,
            ServerEvent::NewTransaction(NewTransactionEvent {
                tx_hash: tx_hash.clone(),
                from,
                to,
                token_id: token_id.to_string(),
                amount: amount.clone(),
            }),
        );

        // Route the scoped transfer to the sessions registered for either
        // side; a session registered for both sides sees it as "sent".
        let mut targets: Vec<(SessionId, TransferDirection)> = self
            .sessions
            .sessions_for_address(&from)
            .into_iter()
            .map(|id| (id, TransferDirection::Sent))
            .collect();
        for id in self.sessions.sessions_for_address(&to) {
            if !targets.iter().any(|(existing, _)| *existing == id) {
                targets.push((id, TransferDirection::Received));
            }
        }
        for (session, direction) in targets {
            delivered += self.sessions.broadcast(
                BroadcastScope::Session(session),
                ServerEvent::TokenTransfer(TokenTransferEvent {
                    from,
                    to,
                    token_id: token_id.to_string(),
                    amount: amount.clone(),
                    direction,
                    tx_hash: tx_hash.clone(),
                }),
            );
        }
        metrics
            .lock()
            .await
            .events_broadcasted
            .inc_by(delivered as f64);
        tracing::event!(
            target: aegis_relayer_utils::probe::TARGET,
            tracing::Level::DEBUG,
            kind = %aegis_relayer_utils::probe::Kind::Broadcast,
            %tx_hash,
            delivered,
        );
        Ok(())
    }

    async fn can_handle_events(
        &self,
        (event, _log): (Self::Events, LogMeta),
        _contract: &Self::Contract,
    ) -> aegis_relayer_utils::Result<bool> {
        let AegisTokenEvents::TransferSingleFilter(_) = event;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use aegis_contracts::TransferSingleFilter;
    use aegis_relayer_config::event_watcher::EventsWatcherConfig;
    use aegis_relayer_config::LedgerConfig;
    use aegis_relayer_store::InMemoryStore;
    use aegis_relayer_types::UserRole;
    use ethers::providers::Provider;
    use ethers::types::{H160, H256, U256, U64};

    use super::*;

    fn addr(byte: u8) -> EthAddress {
        format!("0x{:040x}", u64::from(byte)).parse().unwrap()
    }

    fn ledger_config() -> LedgerConfig {
        LedgerConfig {
            http_endpoint: url::Url::parse("http://localhost:8545")
                .unwrap()
                .into(),
            chain_id: 31337,
            token_contract: addr(0x99),
            deployed_at: 1,
            events_watcher: EventsWatcherConfig::default(),
        }
    }

    fn wrapper() -> AegisTokenContractWrapper<EthersClient> {
        let provider =
            Provider::<ethers::providers::Http>::try_from(
                "http://localhost:8545",
            )
            .unwrap();
        AegisTokenContractWrapper::new(ledger_config(), Arc::new(provider))
    }

    fn transfer_event(
        from: EthAddress,
        to: EthAddress,
        tx_hash_byte: u8,
    ) -> (AegisTokenEvents, LogMeta) {
        let event = AegisTokenEvents::TransferSingleFilter(
            TransferSingleFilter {
                operator: H160::zero(),
                from: from.inner(),
                to: to.inner(),
                id: U256::from(1u64),
                value: U256::from(100_000_000_000_000_000_000u128),
            },
        );
        let log = LogMeta {
            address: H160::zero(),
            block_number: U64::from(10u64),
            block_hash: H256::zero(),
            transaction_hash: H256::repeat_byte(tx_hash_byte),
            transaction_index: U64::zero(),
            log_index: U256::zero(),
        };
        (event, log)
    }

    async fn recv_event(
        rx: &mut tokio::sync::mpsc::Receiver<ServerEvent>,
    ) -> ServerEvent {
        tokio::time::timeout(Duration::from_millis(100), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("channel closed")
    }

    #[tokio::test]
    async fn records_then_broadcasts_and_ignores_redelivery() {
        let sessions = Arc::new(SessionRegistry::new());
        let store = Arc::new(InMemoryStore::default());
        let metrics = Arc::new(Mutex::new(metric::Metrics::new().unwrap()));
        let handler: TransferHandler<InMemoryStore> = TransferHandler::new(
            sessions.clone(),
            HashMap::from_iter([(1u64, 18u32)]),
        );

        // register S1 with the sender address, role victim
        let (s1, mut rx) = sessions.connect();
        sessions.register(s1, addr(0xaa), UserRole::Victim);

        let (event, log) = transfer_event(addr(0xaa), addr(0xbb), 0x01);
        handler
            .handle_event(
                store.clone(),
                &wrapper(),
                (event.clone(), log.clone()),
                metrics.clone(),
            )
            .await
            .unwrap();

        // persisted exactly once
        assert_eq!(store.transaction_count().unwrap(), 1);
        // the global broadcast arrives first, then the scoped transfer
        match recv_event(&mut rx).await {
            ServerEvent::NewTransaction(new_tx) => {
                assert_eq!(new_tx.from, addr(0xaa));
                assert_eq!(new_tx.amount, "100.000000000000000000");
            }
            other => panic!("expected newTransaction, got {other:?}"),
        }
        match recv_event(&mut rx).await {
            ServerEvent::TokenTransfer(transfer) => {
                assert_eq!(transfer.direction, TransferDirection::Sent);
                assert_eq!(transfer.to, addr(0xbb));
            }
            other => panic!("expected tokenTransfer, got {other:?}"),
        }

        // redelivery: same event again, nothing stored, nothing delivered
        handler
            .handle_event(store.clone(), &wrapper(), (event, log), metrics)
            .await
            .unwrap();
        assert_eq!(store.transaction_count().unwrap(), 1);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn recipient_sees_the_transfer_as_received() {
        let sessions = Arc::new(SessionRegistry::new());
        let store = Arc::new(InMemoryStore::default());
        let metrics = Arc::new(Mutex::new(metric::Metrics::new().unwrap()));
        let handler: TransferHandler<InMemoryStore> =
            TransferHandler::new(sessions.clone(), HashMap::new());

        let (recipient, mut rx) = sessions.connect();
        sessions.register(recipient, addr(0xbb), UserRole::Merchant);

        let (event, log) = transfer_event(addr(0xaa), addr(0xbb), 0x02);
        handler
            .handle_event(store, &wrapper(), (event, log), metrics)
            .await
            .unwrap();

        // skip the global broadcast
        let _ = recv_event(&mut rx).await;
        match recv_event(&mut rx).await {
            ServerEvent::TokenTransfer(transfer) => {
                assert_eq!(transfer.direction, TransferDirection::Received);
            }
            other => panic!("expected tokenTransfer, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn disconnected_sessions_receive_nothing() {
        let sessions = Arc::new(SessionRegistry::new());
        let store = Arc::new(InMemoryStore::default());
        let metrics = Arc::new(Mutex::new(metric::Metrics::new().unwrap()));
        let handler: TransferHandler<InMemoryStore> =
            TransferHandler::new(sessions.clone(), HashMap::new());

        let (s1, mut rx) = sessions.connect();
        sessions.register(s1, addr(0xaa), UserRole::Victim);
        sessions.disconnect(s1);

        let (event, log) = transfer_event(addr(0xaa), addr(0xbb), 0x03);
        handler
            .handle_event(store.clone(), &wrapper(), (event, log), metrics)
            .await
            .unwrap();

        // the record still lands, but nothing is delivered to the dead
        // session
        assert_eq!(store.transaction_count().unwrap(), 1);
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn re_registered_session_stops_seeing_the_old_address() {
        let sessions = Arc::new(SessionRegistry::new());
        let store = Arc::new(InMemoryStore::default());
        let metrics = Arc::new(Mutex::new(metric::Metrics::new().unwrap()));
        let handler: TransferHandler<InMemoryStore> =
            TransferHandler::new(sessions.clone(), HashMap::new());

        let (s1, mut rx) = sessions.connect();
        sessions.register(s1, addr(0xaa), UserRole::Victim);
        sessions.register(s1, addr(0xcc), UserRole::Victim);

        let (event, log) = transfer_event(addr(0xaa), addr(0xbb), 0x04);
        handler
            .handle_event(store, &wrapper(), (event, log), metrics)
            .await
            .unwrap();

        // only the global newTransaction arrives; no scoped transfer for
        // the old address
        match recv_event(&mut rx).await {
            ServerEvent::NewTransaction(_) => {}
            other => panic!("expected newTransaction, got {other:?}"),
        }
        assert!(rx.try_recv().is_err());
    }
}
