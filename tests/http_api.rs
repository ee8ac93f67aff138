//! Router-level tests: credential extraction, error → status mapping,
//! and one happy path per endpoint.

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

use coin_ledger::auth::{Role, StaticTokens};
use coin_ledger::config::{Limits, PackageTable};
use coin_ledger::http::{AppState, router};
use coin_ledger::ledger::MemoryLog;
use coin_ledger::model::AccountId;
use coin_ledger::notify::MemoryConversations;
use coin_ledger::signature;
use coin_ledger::store::{BalanceStore, MemoryStore};
use coin_ledger::voucher::StaticVouchers;
use coin_ledger::{Coins, Ledger};

const SECRET: &[u8] = b"api-test-secret";

fn id(raw: &str) -> AccountId {
    AccountId::parse(raw).unwrap()
}

struct Api {
    app: Router,
    store: Arc<MemoryStore>,
    vouchers: Arc<StaticVouchers>,
}

/// Router over in-memory collaborators: alice has 100 coins, bob 10.
async fn api() -> Api {
    let store = Arc::new(MemoryStore::new());
    store.seed(id("alice"), Coins::new(100)).await;
    store.seed(id("bob"), Coins::new(10)).await;
    let vouchers = Arc::new(StaticVouchers::new());
    let ledger = Arc::new(Ledger::new(
        store.clone(),
        Arc::new(MemoryLog::new()),
        vouchers.clone(),
        Arc::new(MemoryConversations::new()),
        SECRET,
        Limits::default(),
        PackageTable::default(),
    ));
    let identity = Arc::new(
        StaticTokens::new()
            .with_token("tok-alice", id("alice"), Role::Member)
            .with_token("tok-staff", id("carol"), Role::Staff)
            .with_token("tok-admin", id("root"), Role::Admin),
    );
    Api {
        app: router(AppState { ledger, identity }),
        store,
        vouchers,
    }
}

fn post(path: &str, auth: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn balance(store: &MemoryStore, account: &str) -> u64 {
    store.get(&id(account)).await.unwrap().0.get()
}

#[tokio::test]
async fn health_reports_ok() {
    let api = api().await;
    let response = api
        .app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "ok");
}

#[tokio::test]
async fn transfer_without_credential_is_unauthorized() {
    let api = api().await;
    let request = post(
        "/transfer",
        None,
        json!({ "to_account_id": "bob", "amount": 30 }),
    );
    let response = api.app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["code"], "unauthorized");
    assert_eq!(balance(&api.store, "alice").await, 100);
    assert_eq!(balance(&api.store, "bob").await, 10);
}

#[tokio::test]
async fn transfer_with_non_bearer_credential_is_unauthorized() {
    let api = api().await;
    // A valid token without the scheme prefix must not pass.
    let request = post(
        "/transfer",
        Some("tok-alice"),
        json!({ "to_account_id": "bob", "amount": 30 }),
    );
    let response = api.app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["code"], "unauthorized");
}

#[tokio::test]
async fn transfer_with_unknown_token_is_unauthorized() {
    let api = api().await;
    let request = post(
        "/transfer",
        Some("Bearer tok-nobody"),
        json!({ "to_account_id": "bob", "amount": 30 }),
    );
    let response = api.app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(balance(&api.store, "bob").await, 10);
}

#[tokio::test]
async fn transfer_sender_comes_from_credential_not_body() {
    let api = api().await;
    // The body names bob as the sender; the credential is alice's, so
    // alice pays.
    let request = post(
        "/transfer",
        Some("Bearer tok-alice"),
        json!({ "from_account_id": "bob", "to_account_id": "bob", "amount": 30 }),
    );
    let response = api.app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["amount"], 30);
    assert_eq!(body["from_balance"], 70);
    assert_eq!(body["to_balance"], 40);
    assert_eq!(balance(&api.store, "alice").await, 70);
    assert_eq!(balance(&api.store, "bob").await, 40);
}

#[tokio::test]
async fn transfer_insufficient_balance_maps_to_conflict() {
    let api = api().await;
    let request = post(
        "/transfer",
        Some("Bearer tok-alice"),
        json!({ "to_account_id": "bob", "amount": 1000 }),
    );
    let response = api.app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(json_body(response).await["code"], "insufficient_balance");
    assert_eq!(balance(&api.store, "alice").await, 100);
}

#[tokio::test]
async fn settlement_accepts_a_signed_event() {
    let api = api().await;
    let sig = signature::sign(SECRET, "evt-1", &id("alice"), Coins::new(75));
    let request = post(
        "/settlement",
        None,
        json!({ "account_id": "alice", "coins": 75, "event_id": "evt-1", "signature": sig }),
    );
    let response = api.app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["coins"], 75);
    assert_eq!(body["balance"], 175);
    assert_eq!(body["replayed"], false);
}

#[tokio::test]
async fn settlement_rejects_a_forged_signature() {
    let api = api().await;
    let request = post(
        "/settlement",
        None,
        json!({ "account_id": "alice", "coins": 75, "event_id": "evt-1", "signature": "deadbeef" }),
    );
    let response = api.app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["code"], "invalid_signature");
    assert_eq!(balance(&api.store, "alice").await, 100);
}

#[tokio::test]
async fn voucher_redeems_a_known_code() {
    let api = api().await;
    api.vouchers.add_code("WELCOME50", 50).await;
    let request = post(
        "/voucher",
        None,
        json!({ "code": "WELCOME50", "account_id": "bob" }),
    );
    let response = api.app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["coins"], 50);
    assert_eq!(body["balance"], 60);
}

#[tokio::test]
async fn adjust_requires_the_admin_role() {
    let api = api().await;
    let body = json!({ "account_id": "bob", "amount": 5, "operation": "add" });

    let response = api
        .app
        .clone()
        .oneshot(post("/admin/adjust", Some("Bearer tok-staff"), body.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(response).await["code"], "forbidden");

    let response = api
        .app
        .clone()
        .oneshot(post("/admin/adjust", Some("Bearer tok-admin"), body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["previous_balance"], 10);
    assert_eq!(body["new_balance"], 15);
}
