mod common;

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode},
};
use common::{AutoSettle, MockBroker, MockInference, PROVIDER, count, fee};
use compute_kit::{client::ComputeClient, gateway};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

fn app(broker: Arc<MockBroker>, inference: MockInference) -> Router {
    gateway::router(ComputeClient::new(broker, inference), None)
}

async fn call(app: Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    let request = match body {
        Some(body) => request.body(Body::from(body.to_string())).unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn test_list_services() {
    let broker = Arc::new(MockBroker::new());
    let (status, body) = call(
        app(broker, MockInference::answering("Hi there", "chat-1")),
        Method::GET,
        "/services/list",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["serviceType"], "chatbot");
    assert_eq!(body[0]["model"], "llama-3.3-70b-instruct");
}

#[tokio::test]
async fn test_query_verified() {
    let broker = Arc::new(MockBroker::new());
    let (status, body) = call(
        app(broker, MockInference::answering("Hi there", "chat-1")),
        Method::POST,
        "/services/query",
        Some(json!({ "providerAddress": PROVIDER, "query": "Hello, AI!" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "content": "Hi there",
            "correlationId": "chat-1",
            "paymentStatus": "verified"
        })
    );
}

#[tokio::test]
async fn test_query_fallback_settled() {
    let broker = Arc::new(
        MockBroker::new().with_auto_settle(AutoSettle::Fail("stale fee".into())),
    );
    let (status, body) = call(
        app(broker.clone(), MockInference::answering("Hi there", "chat-1")),
        Method::POST,
        "/services/query",
        Some(json!({
            "providerAddress": PROVIDER,
            "query": "Hello, AI!",
            "fallbackFee": "0.01"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["paymentStatus"], "fallback_settled");
    assert_eq!(body["settledFee"], "0.01");
    assert_eq!(*broker.settled_fees.lock().unwrap(), vec![fee("0.01")]);
}

#[tokio::test]
async fn test_query_unsettled_still_returns_content() {
    let broker = Arc::new(
        MockBroker::new()
            .with_auto_settle(AutoSettle::Fail("stale fee".into()))
            .with_fallback_error("insufficient ledger balance"),
    );
    let (status, body) = call(
        app(broker, MockInference::answering("Hi there", "chat-1")),
        Method::POST,
        "/services/query",
        Some(json!({
            "providerAddress": PROVIDER,
            "query": "Hello, AI!",
            "fallbackFee": "0.01"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content"], "Hi there");
    assert_eq!(body["paymentStatus"], "unsettled");
    assert!(body["settlementError"].as_str().unwrap().contains("stale fee"));
    assert!(
        body["fallbackError"]
            .as_str()
            .unwrap()
            .contains("insufficient ledger balance")
    );
}

#[tokio::test]
async fn test_default_fallback_fee_applies() {
    let broker = Arc::new(
        MockBroker::new().with_auto_settle(AutoSettle::Fail("stale fee".into())),
    );
    let router = gateway::router(
        ComputeClient::new(broker.clone(), MockInference::answering("Hi there", "chat-1")),
        Some(fee("0.02")),
    );
    let (_, body) = call(
        router,
        Method::POST,
        "/services/query",
        Some(json!({ "providerAddress": PROVIDER, "query": "Hello, AI!" })),
    )
    .await;

    assert_eq!(body["paymentStatus"], "fallback_settled");
    assert_eq!(*broker.settled_fees.lock().unwrap(), vec![fee("0.02")]);
}

#[tokio::test]
async fn test_error_status_mapping() {
    let broker = Arc::new(MockBroker::new());
    let (status, body) = call(
        app(broker.clone(), MockInference::answering("Hi there", "chat-1")),
        Method::POST,
        "/services/query",
        Some(json!({ "providerAddress": "0xAAA", "query": "Hello, AI!" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_address");
    assert_eq!(broker.calls.total(), 0);

    let (status, body) = call(
        app(
            Arc::new(MockBroker::new()),
            MockInference::failing("connection reset"),
        ),
        Method::POST,
        "/services/query",
        Some(json!({ "providerAddress": PROVIDER, "query": "Hello, AI!" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "transport_error");

    let (status, body) = call(
        app(
            Arc::new(MockBroker::new().with_headers_error("no ledger")),
            MockInference::answering("Hi there", "chat-1"),
        ),
        Method::POST,
        "/services/query",
        Some(json!({ "providerAddress": PROVIDER, "query": "Hello, AI!" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "authentication_failed");
}

#[tokio::test]
async fn test_account_routes() {
    let broker = Arc::new(MockBroker::new());
    let router = app(broker.clone(), MockInference::answering("Hi there", "chat-1"));

    let (status, body) = call(router.clone(), Method::GET, "/account/info", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "balance": "10", "locked": "2", "available": "8" })
    );

    let (status, body) = call(
        router.clone(),
        Method::POST,
        "/account/deposit",
        Some(json!({ "amount": "0" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_amount");
    assert_eq!(count(&broker.calls.deposit_fund), 0);

    let (status, _) = call(
        router.clone(),
        Method::POST,
        "/account/add-ledger",
        Some(json!({ "amount": "1.5" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(count(&broker.calls.add_ledger), 1);

    let (status, body) = call(
        router,
        Method::POST,
        "/services/settle-fee",
        Some(json!({ "providerAddress": PROVIDER, "fee": "0.012" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["transaction"], "0xfee");
}

#[tokio::test]
async fn test_resubmitted_query_keeps_verified_status() {
    let broker = Arc::new(MockBroker::new());
    let router = app(broker.clone(), MockInference::answering("Hi there", "chat-1"));
    let request = json!({
        "providerAddress": PROVIDER,
        "query": "Hello, AI!",
        "fallbackFee": "0.01"
    });

    let (_, first) = call(
        router.clone(),
        Method::POST,
        "/services/query",
        Some(request.clone()),
    )
    .await;
    let (status, second) = call(router, Method::POST, "/services/query", Some(request)).await;

    assert_eq!(first["paymentStatus"], "verified");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["paymentStatus"], "verified");
    assert_eq!(count(&broker.calls.verify_and_settle), 1);
    assert_eq!(count(&broker.calls.settle_fee_manually), 0);
}
