//! Router-level tests for the /api/alfa endpoints

use alfalah_gateway::api::alfalah::AlfalahState;
use alfalah_gateway::build_app;
use alfalah_gateway::config::AlfalahConfig;
use alfalah_gateway::ledger::{InMemoryLedger, TransactionLedger};
use alfalah_gateway::payments::envelope;
use alfalah_gateway::payments::error::{PaymentError, PaymentResult};
use alfalah_gateway::payments::types::{
    Amount, HandshakeResponse, PaymentRequest, PaymentResponse, RedirectForm, StatusResponse,
    TransactionType,
};
use alfalah_gateway::payments::{AlfalahGateway, PaymentGateway};
use async_trait::async_trait;
use axum::{body::Body, Router};
use http::{header, Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt;

const KEY1: &str = "0123456789abcdef";
const KEY2: &str = "fedcba9876543210";

fn test_config(base_url: &str) -> AlfalahConfig {
    AlfalahConfig {
        base_url: base_url.to_string(),
        payment_url: format!("{}/SSO/SSO/SSO", base_url),
        channel_id: "1001".to_string(),
        merchant_id: "12345".to_string(),
        store_id: "67890".to_string(),
        merchant_hash: "merchant-hash".to_string(),
        merchant_username: "merchant".to_string(),
        merchant_password: "merchant-password".to_string(),
        currency: "PKR".to_string(),
        key1: KEY1.to_string(),
        key2: KEY2.to_string(),
        return_url: "https://shop.pk/api/alfa/return".to_string(),
        listener_url: "https://shop.pk/api/alfa/listener".to_string(),
        frontend_url: "http://localhost:5173".to_string(),
        request_timeout: 5,
    }
}

struct TestApp {
    router: Router,
    ledger: Arc<InMemoryLedger>,
}

fn app_with_gateway(gateway: Arc<dyn PaymentGateway>, config: AlfalahConfig) -> TestApp {
    let ledger = Arc::new(InMemoryLedger::default());
    let state = AlfalahState::new(gateway, ledger.clone(), config);
    TestApp {
        router: build_app(state),
        ledger,
    }
}

fn app_for(base_url: &str) -> TestApp {
    let config = test_config(base_url);
    let gateway = Arc::new(AlfalahGateway::new(config.clone()).unwrap());
    app_with_gateway(gateway, config)
}

fn offline_app() -> TestApp {
    // nothing listens here; only routes without gateway calls use it
    app_for("http://127.0.0.1:9")
}

/// Gateway whose network calls always fail
struct UnreachableGateway;

#[async_trait]
impl PaymentGateway for UnreachableGateway {
    fn initiate_payment(&self, _request: &PaymentRequest) -> PaymentResult<PaymentResponse> {
        Err(PaymentError::EncryptionError {
            message: "key1 must be at least 16 bytes, got 3".to_string(),
        })
    }

    async fn handshake(&self, _order_id: &str) -> PaymentResult<HandshakeResponse> {
        Err(PaymentError::NetworkError {
            message: "connection refused".to_string(),
        })
    }

    fn build_redirect_form(
        &self,
        _auth_token: &str,
        _order_id: &str,
        _amount: &Amount,
        _payment_type: TransactionType,
    ) -> PaymentResult<RedirectForm> {
        unreachable!("handshake never succeeds")
    }

    async fn query_status(&self, _order_id: &str) -> PaymentResult<StatusResponse> {
        Err(PaymentError::NetworkError {
            message: "connection refused".to_string(),
        })
    }

    fn decrypt_callback(&self, _request_hash: &str) -> PaymentResult<String> {
        Err(PaymentError::DecryptionError {
            message: "bad ciphertext".to_string(),
        })
    }

    fn name(&self) -> &'static str {
        "unreachable"
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, http::HeaderMap, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, headers, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_form(uri: &str, pairs: &[(&str, &str)]) -> Request<Body> {
    let body = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish();
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn initiate(app: &TestApp, transaction_id: &str, amount: Value) -> Value {
    let (status, _, body) = send(
        &app.router,
        post_json(
            "/api/alfa/pay",
            json!({
                "transactionId": transaction_id,
                "amount": amount,
                "customerEmail": "buyer@shop.pk",
                "customerName": "Buyer",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "pay failed: {}", body);
    body
}

async fn status_of(app: &TestApp, order_id: &str) -> (StatusCode, Value) {
    let (status, _, body) = send(
        &app.router,
        post_json("/api/alfa/check-payment-status", json!({ "orderId": order_id })),
    )
    .await;
    (status, body)
}

#[tokio::test]
async fn pay_rounds_amount_half_up_and_records_pending_transaction() {
    let app = offline_app();
    let body = initiate(&app, "TXN-1", json!(100.005)).await;

    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Payment initiated successfully");
    let fields = &body["data"]["paymentFields"];
    assert_eq!(fields["HS_TransactionAmount"], "100.01");
    assert_eq!(fields["HS_TransactionReferenceNumber"], "TXN-1");
    assert_eq!(fields["HS_TransactionTypeId"], "3");
    assert_eq!(
        body["data"]["paymentUrl"],
        "http://127.0.0.1:9/SSO/SSO/SSO"
    );

    let hash = fields["HS_RequestHash"].as_str().unwrap();
    assert_eq!(
        envelope::decode(hash, KEY1, KEY2).unwrap(),
        "1001|PKR|100.01|TXN-1|Order Payment|buyer@shop.pk||https://shop.pk/api/alfa/return"
    );

    let (status, body) = status_of(&app, "TXN-1").await;
    assert_eq!(status, StatusCode::OK);
    let view = &body["transactionStatus"];
    assert_eq!(view["TransactionAmount"], "100.01");
    assert_eq!(view["Status"], "PENDING");
    assert_eq!(view["CustomerName"], "Buyer");
}

#[tokio::test]
async fn pay_rejects_missing_fields_and_bad_amounts() {
    let app = offline_app();

    let (status, _, body) = send(
        &app.router,
        post_json("/api/alfa/pay", json!({ "amount": "10" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "VALIDATION_ERROR");
    assert_eq!(
        body["message"],
        "Missing required fields: transactionId and amount"
    );

    for amount in [json!("-5"), json!(0), json!("abc")] {
        let (status, _, body) = send(
            &app.router,
            post_json(
                "/api/alfa/pay",
                json!({ "transactionId": "TXN-2", "amount": amount }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "amount {}", amount);
        assert_eq!(body["error"], "INVALID_AMOUNT");
    }

    assert_eq!(app.ledger.len().await.unwrap(), 0);
}

#[tokio::test]
async fn pay_surfaces_encryption_failures_as_server_errors() {
    let app = app_with_gateway(Arc::new(UnreachableGateway), test_config("http://127.0.0.1:9"));
    let (status, _, body) = send(
        &app.router,
        post_json(
            "/api/alfa/pay",
            json!({ "transactionId": "TXN-3", "amount": 10 }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "ENCRYPTION_ERROR");
    assert!(app.ledger.get("TXN-3").await.unwrap().is_none());
}

#[tokio::test]
async fn listener_always_acknowledges() {
    let app = offline_app();

    let requests = vec![
        post_form("/api/alfa/listener", &[]),
        post_form("/api/alfa/listener", &[("garbage", "!!")]),
        post_form(
            "/api/alfa/listener",
            &[
                ("RequestHash", "not base64 at all"),
                ("ResponseCode", "00"),
                ("HS_TransactionReferenceNumber", "TXN-X"),
            ],
        ),
        post_json("/api/alfa/listener", json!({ "RequestHash": "AAAA" })),
        Request::builder()
            .method("POST")
            .uri("/api/alfa/listener")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{broken"))
            .unwrap(),
    ];

    for request in requests {
        let (status, _, body) = send(&app.router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "message": "Received" }));
    }
}

#[tokio::test]
async fn listener_records_success_and_failure() {
    let app = offline_app();
    initiate(&app, "TXN-OK", json!("25")).await;
    initiate(&app, "TXN-KO", json!("25")).await;

    let ok_hash = envelope::encode("1001|PKR|25.00|TXN-OK|Order Payment", KEY1, KEY2).unwrap();
    let (status, _, _) = send(
        &app.router,
        post_form(
            "/api/alfa/listener",
            &[
                ("RequestHash", ok_hash.as_str()),
                ("ResponseCode", "000"),
                ("ResponseMessage", "Approved"),
                ("HS_TransactionReferenceNumber", "TXN-OK"),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let ko_hash = envelope::encode("1001|PKR|25.00|TXN-KO|Order Payment", KEY1, KEY2).unwrap();
    send(
        &app.router,
        post_json(
            "/api/alfa/listener",
            json!({
                "RequestHash": ko_hash,
                "ResponseCode": "01",
                "ResponseMessage": "Declined",
                "HS_TransactionReferenceNumber": "TXN-KO",
            }),
        ),
    )
    .await;

    let ok = app.ledger.get("TXN-OK").await.unwrap().unwrap();
    assert_eq!(ok.status.as_str(), "success");
    assert_eq!(ok.response_message.as_deref(), Some("Approved"));
    assert!(ok.paid_at.is_some());
    assert_eq!(
        ok.decrypted_data.as_deref(),
        Some("1001|PKR|25.00|TXN-OK|Order Payment")
    );

    let ko = app.ledger.get("TXN-KO").await.unwrap().unwrap();
    assert_eq!(ko.status.as_str(), "failed");
    assert!(ko.failed_at.is_some());
}

#[tokio::test]
async fn listener_ignores_undecryptable_payloads() {
    let app = offline_app();
    initiate(&app, "TXN-5", json!("10")).await;

    let foreign = envelope::encode("1001|PKR|10.00|TXN-5", "aaaaaaaaaaaaaaaa", KEY2).unwrap();
    send(
        &app.router,
        post_form(
            "/api/alfa/listener",
            &[
                ("RequestHash", foreign.as_str()),
                ("ResponseCode", "00"),
                ("HS_TransactionReferenceNumber", "TXN-5"),
            ],
        ),
    )
    .await;

    let record = app.ledger.get("TXN-5").await.unwrap().unwrap();
    assert_eq!(record.status.as_str(), "pending");
}

#[tokio::test]
async fn return_redirects_success_to_frontend() {
    let app = offline_app();
    initiate(&app, "TXN-6", json!("10")).await;

    let response = app
        .router
        .clone()
        .oneshot(get(
            "/api/alfa/return?success=true&AuthToken=tok-1&TransactionId=TXN-6",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers()[header::LOCATION],
        "http://localhost:5173/payment-return?status=success&O=TXN-6&token=tok-1"
    );

    let record = app.ledger.get("TXN-6").await.unwrap().unwrap();
    assert_eq!(record.status.as_str(), "success");
    assert_eq!(record.auth_token.as_deref(), Some("tok-1"));
    assert!(record.returned_at.is_some());
}

#[tokio::test]
async fn return_post_takes_order_id_from_request_hash() {
    let app = offline_app();
    initiate(&app, "TXN-7", json!("10")).await;

    let hash = envelope::encode("1001|PKR|10.00|TXN-7|Order Payment", KEY1, KEY2).unwrap();
    let response = app
        .router
        .clone()
        .oneshot(post_form(
            "/api/alfa/return",
            &[
                ("RequestHash", hash.as_str()),
                ("ResponseCode", "05"),
                ("ErrorMessage", "Card declined"),
            ],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers()[header::LOCATION],
        "http://localhost:5173/payment-return?status=failed&O=TXN-7&msg=Card+declined"
    );

    let record = app.ledger.get("TXN-7").await.unwrap().unwrap();
    assert_eq!(record.status.as_str(), "failed");
    assert_eq!(record.response_message.as_deref(), Some("Card declined"));
}

#[tokio::test]
async fn return_with_bad_hash_still_redirects() {
    let app = offline_app();
    let response = app
        .router
        .clone()
        .oneshot(get("/api/alfa/return?RequestHash=not-a-token"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers()[header::LOCATION],
        "http://localhost:5173/payment-return?status=failed&O=&msg=Payment+failed"
    );
}

#[tokio::test]
async fn check_status_handles_missing_and_unknown_ids() {
    let app = offline_app();

    let (status, body) = status_of(&app, "never-created").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "TRANSACTION_NOT_FOUND");

    let (status, _, body) = send(
        &app.router,
        post_json("/api/alfa/check-payment-status", json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Missing required fields: orderId");

    let (status, _, _) = send(&app.router, get("/api/alfa/cache/never-created")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cache_view_returns_full_record() {
    let app = offline_app();
    initiate(&app, "TXN-8", json!(12.5)).await;

    let (status, _, body) = send(&app.router, get("/api/alfa/cache/TXN-8")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["transactionId"], "TXN-8");
    assert_eq!(body["data"]["amount"], "12.50");
    assert_eq!(body["data"]["status"], "pending");
    assert_eq!(body["data"]["customerEmail"], "buyer@shop.pk");
}

#[tokio::test]
async fn probe_reports_config_presence_and_cache_size() {
    let mut config = test_config("http://127.0.0.1:9");
    config.key2 = "short".to_string();
    config.listener_url = String::new();
    let gateway = Arc::new(AlfalahGateway::new(config.clone()).unwrap());
    let app = app_with_gateway(gateway, config);
    app.ledger
        .create("TXN-9", Default::default())
        .await
        .unwrap();

    let (status, _, body) = send(&app.router, get("/api/alfa/test")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Bank Alfalah API Running");
    assert_eq!(body["config"]["key1"], "✓");
    assert_eq!(body["config"]["key2"], "✗");
    assert_eq!(body["config"]["listenerUrl"], "✗");
    assert_eq!(body["cacheSize"], 1);

    let (status, _, body) = send(&app.router, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Degraded");
}

#[tokio::test]
async fn create_payment_runs_handshake_and_builds_sso_form() {
    let mut server = mockito::Server::new_async().await;
    let handshake = server
        .mock("POST", "/HS/HS/HS")
        .with_status(200)
        .with_body(r#""{\"success\":\"true\",\"AuthToken\":\"auth-xyz\"}""#)
        .create_async()
        .await;

    let app = app_for(&server.url());
    let (status, _, body) = send(
        &app.router,
        post_json("/api/alfa/create-payment", json!({ "amount": 1500, "type": "1" })),
    )
    .await;

    handshake.assert_async().await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["success"], true);
    assert_eq!(body["paymentType"], "wallet");
    let order_id = body["orderId"].as_str().unwrap().to_string();
    assert!(order_id.starts_with("ORD-"));

    let form = &body["redirectForm"];
    assert_eq!(form["action"], format!("{}/SSO/SSO/SSO", server.url()));
    assert_eq!(form["fields"]["AuthToken"], "auth-xyz");
    assert_eq!(form["fields"]["TransactionAmount"], "1500.00");
    assert_eq!(form["fields"]["TransactionReferenceNumber"], order_id.as_str());

    let record = app.ledger.get(&order_id).await.unwrap().unwrap();
    assert_eq!(record.auth_token.as_deref(), Some("auth-xyz"));
    assert_eq!(record.payment_type.as_deref(), Some("1"));
}

#[tokio::test]
async fn create_payment_reports_handshake_rejection() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/HS/HS/HS")
        .with_status(200)
        .with_body(r#"{"success":"false","ErrorMessage":"Invalid merchant"}"#)
        .create_async()
        .await;

    let app = app_for(&server.url());
    let (status, _, body) = send(
        &app.router,
        post_json("/api/alfa/create-payment", json!({ "amount": "10", "type": "3" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "GATEWAY_ERROR");
    assert_eq!(body["message"], "Handshake failed: Invalid merchant");
    assert_eq!(app.ledger.len().await.unwrap(), 0);
}

#[tokio::test]
async fn create_payment_validates_input_and_unreachable_gateway() {
    let app = offline_app();
    let (status, _, body) = send(
        &app.router,
        post_json("/api/alfa/create-payment", json!({ "amount": "10" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Missing required fields: amount and type");

    let (status, _, _) = send(
        &app.router,
        post_json("/api/alfa/create-payment", json!({ "amount": "10", "type": "9" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let app = app_with_gateway(Arc::new(UnreachableGateway), test_config("http://127.0.0.1:9"));
    let (status, _, body) = send(
        &app.router,
        post_json("/api/alfa/create-payment", json!({ "amount": "10", "type": "3" })),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "GATEWAY_UNAVAILABLE");
    assert_eq!(body["retryable"], true);
}

#[tokio::test]
async fn ipn_status_applies_gateway_answer() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/HS/api/IPN/OrderStatus/12345/67890/TXN-10")
        .with_status(200)
        .with_body(r#"{"ResponseCode":"00","TransactionStatus":"Paid","Description":"ok"}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/HS/api/IPN/OrderStatus/12345/67890/TXN-11")
        .with_status(200)
        .with_body(r#"{"ResponseCode":"00","TransactionStatus":"Pending","Description":"Awaiting payment"}"#)
        .create_async()
        .await;

    let app = app_for(&server.url());
    initiate(&app, "TXN-10", json!("10")).await;

    let (status, _, body) = send(
        &app.router,
        post_json("/api/alfa/ipn-status", json!({ "orderId": "TXN-10" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Transaction Successful");
    assert_eq!(body["transactionStatus"]["TransactionStatus"], "Paid");
    let record = app.ledger.get("TXN-10").await.unwrap().unwrap();
    assert_eq!(record.status.as_str(), "success");

    // unknown to the ledger: answered, nothing recorded
    let (status, _, body) = send(
        &app.router,
        post_json("/api/alfa/ipn-status", json!({ "orderId": "TXN-11" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Awaiting payment");
    assert!(app.ledger.get("TXN-11").await.unwrap().is_none());
}

#[tokio::test]
async fn error_bodies_carry_request_id() {
    let app = offline_app();
    let mut request = post_json("/api/alfa/check-payment-status", json!({ "orderId": "nope" }));
    request
        .headers_mut()
        .insert("x-request-id", "req-42".parse().unwrap());

    let (status, headers, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(headers["x-request-id"], "req-42");
    assert_eq!(body["request_id"], "req-42");
}

#[tokio::test]
async fn form_encoded_pay_and_status_check_are_accepted() {
    let app = offline_app();

    let (status, _, body) = send(
        &app.router,
        post_form(
            "/api/alfa/pay",
            &[
                ("transactionId", "TXN-FORM"),
                ("amount", "100"),
                ("customerEmail", "buyer@shop.pk"),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "pay failed: {}", body);
    assert_eq!(body["data"]["paymentFields"]["HS_TransactionAmount"], "100.00");

    let (status, _, body) = send(
        &app.router,
        post_form("/api/alfa/check-payment-status", &[("orderId", "TXN-FORM")]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["transactionStatus"]["Status"], "PENDING");
    assert_eq!(body["transactionStatus"]["CustomerEmail"], "buyer@shop.pk");

    let (status, _, body) = send(
        &app.router,
        post_form("/api/alfa/check-payment-status", &[]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Missing required fields: orderId");
}
