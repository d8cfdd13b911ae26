//! HTTP-level tests against the real router

use axum::Router;
use axum::body::Body;
use dispatch_server::api::build_app;
use dispatch_server::{Config, ServerState};
use hmac::{Hmac, Mac};
use http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use serde_json::{Value, json};
use sha2::Sha256;
use shared::order::Role;
use std::io::Cursor;
use tempfile::TempDir;
use tower::ServiceExt;

const WEBHOOK_SECRET: &str = "whsec_http_api_tests";
const BOUNDARY: &str = "dispatch-test-boundary";

struct TestApp {
    app: Router,
    state: ServerState,
    _dir: TempDir,
}

impl TestApp {
    async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = Config::with_overrides(dir.path().to_string_lossy(), 0).unwrap();
        config.stripe_secret_key = None;
        config.stripe_webhook_secret = Some(WEBHOOK_SECRET.to_string());

        let state = ServerState::initialize(&config).await.unwrap();
        let app = build_app(state.clone());
        Self {
            app,
            state,
            _dir: dir,
        }
    }

    fn token(&self, id: &str, role: Role) -> String {
        self.state
            .jwt_service()
            .generate_token(id, id, role)
            .unwrap()
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    async fn call(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    async fn webhook(&self, event: &Value) -> (StatusCode, Value) {
        let payload = event.to_string();
        let request = Request::builder()
            .method("POST")
            .uri("/api/payments/webhook")
            .header("Stripe-Signature", sign(&payload))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload))
            .unwrap();
        self.send(request).await
    }
}

fn sign(payload: &str) -> String {
    let timestamp = chrono::Utc::now().timestamp();
    let mut mac = Hmac::<Sha256>::new_from_slice(WEBHOOK_SECRET.as_bytes()).unwrap();
    mac.update(format!("{timestamp}.{payload}").as_bytes());
    format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
}

fn place_body() -> Value {
    json!({
        "items": [
            {"product_id": "p-adobo", "name": "Adobo", "unit_price": "60", "quantity": 1},
            {"product_id": "p-rice", "name": "Garlic Rice", "unit_price": "20", "quantity": 2}
        ],
        "address": {
            "first_name": "Ana",
            "last_name": "Cruz",
            "email": "ana@example.com",
            "phone": "0917 000 0000",
            "street": "12 Mabini St",
            "city": "Iloilo"
        },
        "location": {"lat": 10.72, "lng": 122.56, "label": "Gate 2"},
        "distance_km": 2.5,
        "delivery_fee": "15",
        "discount": "0"
    })
}

fn completed_event(order_id: &str) -> Value {
    json!({
        "type": "checkout.session.completed",
        "data": {"object": {"metadata": {"order_id": order_id}}}
    })
}

fn png_bytes() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(8, 8, image::Rgb([200, 40, 40]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

fn multipart_request(uri: &str, token: &str, field: &str, bytes: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"proof.png\"\r\nContent-Type: image/png\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => s.parse().unwrap(),
        other => other.to_string().parse().unwrap(),
    }
}

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::new().await;
    let (status, body) = app.call("GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["orders"], 0);
}

#[tokio::test]
async fn test_missing_token_is_rejected_with_envelope() {
    let app = TestApp::new().await;
    let (status, body) = app.call("GET", "/api/orders", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_ne!(body["code"], 0);
}

#[tokio::test]
async fn test_invalid_token_is_rejected() {
    let app = TestApp::new().await;
    let (status, _) = app
        .call("GET", "/api/orders/mine", Some("not-a-jwt"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_place_computes_amount_without_gateway() {
    let app = TestApp::new().await;
    let customer = app.token("C1", Role::Customer);

    let (status, body) = app
        .call("POST", "/api/orders/place", Some(&customer), Some(place_body()))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&body["data"]["amount"]), Decimal::from(115));
    assert_eq!(body["data"]["order_number"], 1);
    assert!(body["data"]["session_url"].is_null());

    let (status, mine) = app.call("GET", "/api/orders/mine", Some(&customer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine["data"].as_array().unwrap().len(), 1);
    assert_eq!(mine["data"][0]["status"], "PendingPayment");
}

#[tokio::test]
async fn test_admin_cannot_place() {
    let app = TestApp::new().await;
    let admin = app.token("A1", Role::Admin);

    let (status, body) = app
        .call("POST", "/api/orders/place", Some(&admin), Some(place_body()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_customer_cannot_read_foreign_order() {
    let app = TestApp::new().await;
    let owner = app.token("C1", Role::Customer);
    let other = app.token("C2", Role::Customer);

    let (_, placed) = app
        .call("POST", "/api/orders/place", Some(&owner), Some(place_body()))
        .await;
    let order_id = placed["data"]["order_id"].as_str().unwrap().to_string();

    let (status, _) = app
        .call("GET", &format!("/api/orders/{order_id}"), Some(&other), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .call("GET", &format!("/api/orders/{order_id}"), Some(&owner), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["order_id"], order_id.as_str());
}

#[tokio::test]
async fn test_webhook_rejects_bad_signature() {
    let app = TestApp::new().await;
    let request = Request::builder()
        .method("POST")
        .uri("/api/payments/webhook")
        .header("Stripe-Signature", "t=1,v1=deadbeef")
        .body(Body::from(completed_event("whatever").to_string()))
        .unwrap();

    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_webhook_ignores_unrelated_events() {
    let app = TestApp::new().await;
    let (status, body) = app
        .webhook(&json!({"type": "customer.created", "data": {"object": {}}}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["order_id"].is_null());
}

#[tokio::test]
async fn test_failed_payment_removes_order_and_redelivery_is_acknowledged() {
    let app = TestApp::new().await;
    let customer = app.token("C1", Role::Customer);
    let admin = app.token("A1", Role::Admin);

    let (_, placed) = app
        .call("POST", "/api/orders/place", Some(&customer), Some(place_body()))
        .await;
    let order_id = placed["data"]["order_id"].as_str().unwrap().to_string();

    let expired = json!({
        "type": "checkout.session.expired",
        "data": {"object": {"metadata": {"order_id": order_id}}}
    });
    let (status, _) = app.webhook(&expired).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .call("GET", &format!("/api/orders/{order_id}"), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Provider retries are acknowledged
    let (status, _) = app.webhook(&expired).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_failure_after_settlement_is_acknowledged() {
    let app = TestApp::new().await;
    let customer = app.token("C1", Role::Customer);
    let admin = app.token("A1", Role::Admin);

    let (_, placed) = app
        .call("POST", "/api/orders/place", Some(&customer), Some(place_body()))
        .await;
    let order_id = placed["data"]["order_id"].as_str().unwrap().to_string();

    let (status, _) = app.webhook(&completed_event(&order_id)).await;
    assert_eq!(status, StatusCode::OK);

    let failed = json!({
        "type": "checkout.session.async_payment_failed",
        "data": {"object": {"metadata": {"order_id": order_id}}}
    });
    let (status, body) = app.webhook(&failed).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["received"], true);

    let (status, body) = app
        .call("GET", &format!("/api/orders/{order_id}"), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "Processing");
}

#[tokio::test]
async fn test_full_delivery_over_http() {
    let app = TestApp::new().await;
    let customer = app.token("C1", Role::Customer);
    let admin = app.token("A1", Role::Admin);
    let rider = app.token("R1", Role::Rider);

    // Rider record
    let (status, _) = app
        .call(
            "PUT",
            "/api/riders/R1",
            Some(&admin),
            Some(json!({"name": "Ben Reyes", "phone": "0917 111 1111"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    // Place + pay
    let (_, placed) = app
        .call("POST", "/api/orders/place", Some(&customer), Some(place_body()))
        .await;
    let order_id = placed["data"]["order_id"].as_str().unwrap().to_string();

    let (status, _) = app.webhook(&completed_event(&order_id)).await;
    assert_eq!(status, StatusCode::OK);

    // Assign
    let (status, body) = app
        .call(
            "POST",
            &format!("/api/orders/{order_id}/assign"),
            Some(&admin),
            Some(json!({"rider_id": "R1"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "RiderAssigned");
    assert_eq!(body["data"]["rider"]["name"], "Ben Reyes");

    // Rider work list
    let (_, work) = app.call("GET", "/api/riders/me/orders", Some(&rider), None).await;
    assert_eq!(work["data"].as_array().unwrap().len(), 1);

    // Pickup
    let (status, body) = app
        .call(
            "PUT",
            &format!("/api/orders/{order_id}/status"),
            Some(&rider),
            Some(json!({"status": "PickedUp"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "PickedUp");

    // Delivered without evidence is refused
    let (status, _) = app
        .call(
            "PUT",
            &format!("/api/orders/{order_id}/status"),
            Some(&rider),
            Some(json!({"status": "Delivered"})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Upload proof
    let request = multipart_request(
        &format!("/api/orders/{order_id}/delivery"),
        &rider,
        "deliveryProof",
        &png_bytes(),
    );
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "Delivered");
    let reference = body["data"]["delivery_proof"].as_str().unwrap().to_string();
    assert!(reference.ends_with(".jpg"));
    assert!(body["data"]["timeline"]["delivered_at"].is_i64());

    // Proof is served to staff only
    let response = app
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/proofs/{reference}"))
                .header(header::AUTHORIZATION, format!("Bearer {admin}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");

    let (status, _) = app
        .call("GET", &format!("/api/proofs/{reference}"), Some(&customer), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Customer sees the delivered order
    let (_, mine) = app.call("GET", "/api/orders/mine", Some(&customer), None).await;
    assert_eq!(mine["data"][0]["status"], "Delivered");
}

#[tokio::test]
async fn test_delivery_without_file_is_rejected() {
    let app = TestApp::new().await;
    let rider = app.token("R1", Role::Rider);

    let request = multipart_request("/api/orders/missing/delivery", &rider, "other", b"x");
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_rider_profile_endpoints() {
    let app = TestApp::new().await;
    let admin = app.token("A1", Role::Admin);
    let rider = app.token("R1", Role::Rider);

    let (status, _) = app.call("GET", "/api/riders/me", Some(&rider), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    app.call(
        "PUT",
        "/api/riders/R1",
        Some(&admin),
        Some(json!({"name": "Ben Reyes", "phone": "0917 111 1111"})),
    )
    .await;

    let (status, body) = app
        .call(
            "PUT",
            "/api/riders/me",
            Some(&rider),
            Some(json!({"name": "Ben R.", "phone": "0917 999 9999"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Ben R.");

    let (status, _) = app.call("GET", "/api/riders", Some(&rider), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, list) = app.call("GET", "/api/riders", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["data"][0]["phone"], "0917 999 9999");
}
