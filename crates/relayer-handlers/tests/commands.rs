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

//! Persistent-connection command handling, driven through `handle_text`
//! directly (the piece between the socket and the registry).

use std::sync::Arc;

use aegis_relayer_config::event_watcher::EventsWatcherConfig;
use aegis_relayer_config::{
    AegisRelayerConfig, ApiConfig, FeaturesConfig, LedgerConfig,
};
use aegis_relayer_context::RelayerContext;
use aegis_relayer_handler_utils::ServerEvent;
use aegis_relayer_handlers::handle_text;
use aegis_relayer_sessions::BroadcastScope;
use aegis_relayer_store::SledStore;
use aegis_relayer_types::UserRole;

fn test_context() -> Arc<RelayerContext> {
    let config = AegisRelayerConfig {
        port: 0,
        ledger: LedgerConfig {
            http_endpoint: url::Url::parse("http://localhost:8545")
                .unwrap()
                .into(),
            chain_id: 31337,
            token_contract: "0x00000000000000000000000000000000000000aa"
                .parse()
                .unwrap(),
            deployed_at: 1,
            events_watcher: EventsWatcherConfig::default(),
        },
        api: ApiConfig::default(),
        assets: Default::default(),
        features: FeaturesConfig::default(),
    };
    let store = SledStore::temporary().unwrap();
    Arc::new(RelayerContext::new(config, store).unwrap())
}

#[tokio::test]
async fn register_command_acks_and_joins_the_room() {
    let ctx = test_context();
    let (session, mut rx) = ctx.sessions().connect();

    handle_text(
        &ctx,
        session,
        r#"{"register":{"address":"0x00000000000000000000000000000000000000AA","role":"victim"}}"#,
    )
    .await;

    assert_eq!(
        rx.try_recv().unwrap(),
        ServerEvent::Registered { success: true }
    );
    // the session now hears victim-room traffic
    ctx.sessions()
        .broadcast(BroadcastScope::Room(UserRole::Victim), ServerEvent::Pong);
    assert_eq!(rx.try_recv().unwrap(), ServerEvent::Pong);
    // and is routed for the (normalized) address
    let routed = ctx.sessions().sessions_for_address(
        &"0x00000000000000000000000000000000000000aa".parse().unwrap(),
    );
    assert_eq!(routed, vec![session]);
}

#[tokio::test]
async fn malformed_payloads_get_an_error_event_not_a_hangup() {
    let ctx = test_context();
    let (session, mut rx) = ctx.sessions().connect();

    handle_text(&ctx, session, "not json at all").await;
    assert!(matches!(
        rx.try_recv().unwrap(),
        ServerEvent::Error { .. }
    ));

    // an unknown role is a parse error too
    handle_text(
        &ctx,
        session,
        r#"{"register":{"address":"0x00000000000000000000000000000000000000aa","role":"superuser"}}"#,
    )
    .await;
    assert!(matches!(
        rx.try_recv().unwrap(),
        ServerEvent::Error { .. }
    ));

    // the session is still alive and usable
    handle_text(&ctx, session, r#"{"ping":[]}"#).await;
    assert_eq!(rx.try_recv().unwrap(), ServerEvent::Pong);
}

#[tokio::test]
async fn register_on_an_unknown_session_acks_failure() {
    let ctx = test_context();
    let (session, mut rx) = ctx.sessions().connect();
    ctx.sessions().disconnect(session);

    handle_text(
        &ctx,
        session,
        r#"{"register":{"address":"0x00000000000000000000000000000000000000aa","role":"victim"}}"#,
    )
    .await;

    // the ack goes nowhere (the channel is closed), but nothing panics and
    // no routing entry leaks
    assert!(rx.try_recv().is_err());
    assert!(ctx
        .sessions()
        .sessions_for_address(
            &"0x00000000000000000000000000000000000000aa".parse().unwrap()
        )
        .is_empty());
}
