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

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use tower::ServiceExt;

use aegis_relayer_config::event_watcher::EventsWatcherConfig;
use aegis_relayer_config::{
    AegisRelayerConfig, ApiConfig, FeaturesConfig, LedgerConfig,
};
use aegis_relayer_context::RelayerContext;
use aegis_relayer_handler_utils::ServerEvent;
use aegis_relayer_handlers::routes;
use aegis_relayer_store::{
    SledStore, Transaction, TransactionStore, UserProfile, UserProfileStore,
};
use aegis_relayer_types::{EthAddress, UserRole};

fn test_config() -> AegisRelayerConfig {
    AegisRelayerConfig {
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
    }
}

fn test_context() -> Arc<RelayerContext> {
    let store = SledStore::temporary().unwrap();
    Arc::new(RelayerContext::new(test_config(), store).unwrap())
}

fn test_router(ctx: Arc<RelayerContext>) -> Router {
    Router::new()
        .route("/api/health", get(routes::handle_health))
        .route("/api/user/:address", get(routes::handle_user_info))
        .route(
            "/api/transactions/:address",
            get(routes::handle_transaction_history),
        )
        .route("/api/donations", get(routes::handle_donations))
        .route("/api/disasters", get(routes::handle_disasters))
        .route("/api/stats", get(routes::handle_stats))
        .route(
            "/api/webhook/disaster",
            post(routes::handle_disaster_webhook),
        )
        .with_state(ctx)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, payload: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

fn addr(s: &str) -> EthAddress {
    s.parse().unwrap()
}

#[tokio::test]
async fn health_reports_connection_count() {
    let ctx = test_context();
    let _session = ctx.sessions().connect();
    let response = test_router(ctx)
        .oneshot(get_request("/api/health"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["connectionCount"], 1);
}

#[tokio::test]
async fn unknown_user_is_a_404_and_garbage_a_400() {
    let ctx = test_context();
    let router = test_router(ctx);

    let response = router
        .clone()
        .oneshot(get_request(
            "/api/user/0x00000000000000000000000000000000000000bb",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = router
        .oneshot(get_request("/api/user/not-an-address"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn user_lookup_is_case_insensitive() {
    let ctx = test_context();
    ctx.store()
        .upsert_user(&UserProfile {
            address: addr("0x00000000000000000000000000000000000000cc"),
            name: "Alice".to_string(),
            role: Some(UserRole::Victim),
            created_at: chrono::Utc::now(),
        })
        .unwrap();
    let response = test_router(ctx)
        .oneshot(get_request(
            "/api/user/0x00000000000000000000000000000000000000CC",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["name"], "Alice");
}

#[tokio::test]
async fn transaction_history_pages_newest_first() {
    let ctx = test_context();
    let from = addr("0x00000000000000000000000000000000000000aa");
    let to = addr("0x00000000000000000000000000000000000000bb");
    for i in 0..3u8 {
        ctx.store()
            .insert_transaction(&Transaction {
                tx_hash: format!("0xfeed{i}"),
                from,
                to,
                token_id: 1,
                amount: "100".to_string(),
                timestamp: chrono::Utc::now()
                    - chrono::Duration::seconds(i64::from(i)),
            })
            .unwrap();
    }
    let response = test_router(ctx)
        .oneshot(get_request(
            "/api/transactions/0x00000000000000000000000000000000000000AA?limit=2",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let rows = json.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["txHash"], "0xfeed0");
}

#[tokio::test]
async fn webhook_persists_then_notifies_the_admin_room() {
    let ctx = test_context();
    let (admin, mut admin_rx) = ctx.sessions().connect();
    let (victim, mut victim_rx) = ctx.sessions().connect();
    ctx.sessions().register(
        admin,
        addr("0x00000000000000000000000000000000000000ad"),
        UserRole::Admin,
    );
    ctx.sessions().register(
        victim,
        addr("0x00000000000000000000000000000000000000cd"),
        UserRole::Victim,
    );

    let response = test_router(ctx.clone())
        .oneshot(post_json(
            "/api/webhook/disaster",
            serde_json::json!({
                "location": "Tokyo",
                "magnitude": 5.0,
                "type": "earthquake"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["success"], true);

    // the row is durable
    let listed = test_router(ctx)
        .oneshot(get_request("/api/disasters"))
        .await
        .unwrap();
    let json = body_json(listed).await;
    assert_eq!(json[0]["location"], "Tokyo");
    assert_eq!(json[0]["type"], "earthquake");

    // the admin room heard about it, the victim room did not
    match admin_rx.try_recv().unwrap() {
        ServerEvent::NewDisaster(disaster) => {
            assert_eq!(disaster.location, "Tokyo");
            assert_eq!(disaster.magnitude, 5.0);
            assert_eq!(disaster.category, "earthquake");
        }
        other => panic!("expected newDisaster, got {other:?}"),
    }
    assert!(victim_rx.try_recv().is_err());
}

#[tokio::test]
async fn webhook_with_external_id_collapses_duplicates() {
    let ctx = test_context();
    let (admin, mut admin_rx) = ctx.sessions().connect();
    ctx.sessions().register(
        admin,
        addr("0x00000000000000000000000000000000000000ad"),
        UserRole::Admin,
    );
    let router = test_router(ctx.clone());
    let payload = serde_json::json!({
        "location": "Osaka",
        "magnitude": 3.5,
        "type": "flood",
        "externalId": "usgs-123"
    });

    for _ in 0..2 {
        let response = router
            .clone()
            .oneshot(post_json("/api/webhook/disaster", payload.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    // one row, one broadcast
    let listed = router
        .oneshot(get_request("/api/disasters"))
        .await
        .unwrap();
    assert_eq!(body_json(listed).await.as_array().unwrap().len(), 1);
    assert!(admin_rx.try_recv().is_ok());
    assert!(admin_rx.try_recv().is_err());
}

#[tokio::test]
async fn stats_aggregate_the_store() {
    let ctx = test_context();
    ctx.store()
        .upsert_user(&UserProfile {
            address: addr("0x00000000000000000000000000000000000000cc"),
            name: "Bob".to_string(),
            role: Some(UserRole::Donor),
            created_at: chrono::Utc::now(),
        })
        .unwrap();
    ctx.store()
        .insert_transaction(&Transaction {
            tx_hash: "0xstat".to_string(),
            from: addr("0x00000000000000000000000000000000000000aa"),
            to: addr("0x00000000000000000000000000000000000000bb"),
            token_id: 1,
            amount: "5".to_string(),
            timestamp: chrono::Utc::now(),
        })
        .unwrap();

    let response = test_router(ctx)
        .oneshot(get_request("/api/stats"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["totalUsers"], 1);
    assert_eq!(json["totalTransactions"], 1);
    assert_eq!(json["totalDisasters"], 0);
}
