// libs/payment-cell/tests/handlers_test.rs

use std::sync::Arc;

use assert_matches::assert_matches;
use axum::{
    extract::{Extension, Query, State},
    http::HeaderMap,
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;
use wiremock::matchers::{
    body_partial_json, body_string_contains, header, method, path, query_param,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

use payment_cell::handlers::*;
use payment_cell::models::*;
use shared_config::AppConfig;
use shared_models::{auth::User, error::AppError};
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};

fn mock_config(mock_server: &MockServer) -> Arc<AppConfig> {
    let mut test_config = TestConfig::default();
    test_config.supabase_url = mock_server.uri();
    test_config.stripe_base_url = mock_server.uri();
    test_config.to_arc()
}

fn create_test_user_extension(user: &TestUser) -> Extension<User> {
    Extension(user.to_user())
}

fn create_auth_header(token: &str) -> TypedHeader<Authorization<Bearer>> {
    let auth = Authorization::bearer(token).unwrap();
    TypedHeader(auth)
}

fn token_for(user: &TestUser, config: &AppConfig) -> String {
    JwtTestUtils::create_test_token(user, &config.supabase_jwt_secret, Some(24))
}

fn sign_header(payload: &str, secret: &str) -> String {
    let timestamp = "1712000000";
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("{}.{}", timestamp, payload).as_bytes());
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}

fn webhook_headers(signature: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("stripe-signature", signature.parse().unwrap());
    headers
}

#[tokio::test]
async fn test_checkout_charges_unpaid_deposit() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    let customer = TestUser::customer("customer@example.com");
    let token = token_for(&customer, &config);
    let appointment_id = Uuid::new_v4();

    let mut appointment = MockSupabaseResponses::appointment_response(
        &customer.id,
        &Uuid::new_v4().to_string(),
        &Uuid::new_v4().to_string(),
        "2030-06-03",
        "10:00:00",
        "11:00:00",
        "scheduled",
    );
    appointment["id"] = json!(appointment_id);
    appointment["amount"] = json!(150.0);
    appointment["deposit_required"] = json!(true);
    appointment["deposit_amount"] = json!(30.0);

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([appointment])))
        .mount(&mock_server)
        .await;

    // The vendor sees the deposit in cents, tagged for the webhook
    Mock::given(method("POST"))
        .and(path("/checkout/sessions"))
        .and(body_string_contains("metadata%5Bpurpose%5D=deposit"))
        .and(body_string_contains("unit_amount%5D=3000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cs_test_123",
            "url": "https://checkout.example.com/c/pay/cs_test_123"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = create_checkout_session(
        State(config.clone()),
        create_auth_header(&token),
        create_test_user_extension(&customer),
        Json(CheckoutRequest {
            appointment_id,
            tip_amount: None,
        }),
    )
    .await;

    let response = result.unwrap();
    assert_eq!(response.0["session_id"], "cs_test_123");
    assert_eq!(
        response.0["url"],
        "https://checkout.example.com/c/pay/cs_test_123"
    );
    assert_eq!(response.0["purpose"], "deposit");
}

#[tokio::test]
async fn test_checkout_balance_includes_tip() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    let customer = TestUser::customer("customer@example.com");
    let token = token_for(&customer, &config);
    let appointment_id = Uuid::new_v4();

    let mut appointment = MockSupabaseResponses::appointment_response(
        &customer.id,
        &Uuid::new_v4().to_string(),
        &Uuid::new_v4().to_string(),
        "2030-06-03",
        "10:00:00",
        "11:00:00",
        "confirmed",
    );
    appointment["id"] = json!(appointment_id);

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([appointment])))
        .mount(&mock_server)
        .await;

    // 60.00 service plus a 10.00 tip, with the tip echoed in metadata
    Mock::given(method("POST"))
        .and(path("/checkout/sessions"))
        .and(body_string_contains("metadata%5Bpurpose%5D=balance"))
        .and(body_string_contains("unit_amount%5D=7000"))
        .and(body_string_contains("metadata%5Btip_amount%5D=10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cs_test_456",
            "url": "https://checkout.example.com/c/pay/cs_test_456"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = create_checkout_session(
        State(config.clone()),
        create_auth_header(&token),
        create_test_user_extension(&customer),
        Json(CheckoutRequest {
            appointment_id,
            tip_amount: Some(10.0),
        }),
    )
    .await;

    let response = result.unwrap();
    assert_eq!(response.0["purpose"], "balance");
}

#[tokio::test]
async fn test_checkout_rejects_already_paid_appointment() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    let customer = TestUser::customer("customer@example.com");
    let token = token_for(&customer, &config);
    let appointment_id = Uuid::new_v4();

    let mut appointment = MockSupabaseResponses::appointment_response(
        &customer.id,
        &Uuid::new_v4().to_string(),
        &Uuid::new_v4().to_string(),
        "2030-06-03",
        "10:00:00",
        "11:00:00",
        "confirmed",
    );
    appointment["id"] = json!(appointment_id);
    appointment["payment_status"] = json!("paid");

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([appointment])))
        .mount(&mock_server)
        .await;

    let result = create_checkout_session(
        State(config.clone()),
        create_auth_header(&token),
        create_test_user_extension(&customer),
        Json(CheckoutRequest {
            appointment_id,
            tip_amount: None,
        }),
    )
    .await;

    assert_matches!(result, Err(AppError::Conflict(_)));
}

#[tokio::test]
async fn test_checkout_denies_other_customers() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    let customer = TestUser::customer("customer@example.com");
    let stranger = TestUser::customer("stranger@example.com");
    let token = token_for(&stranger, &config);
    let appointment_id = Uuid::new_v4();

    let mut appointment = MockSupabaseResponses::appointment_response(
        &customer.id,
        &Uuid::new_v4().to_string(),
        &Uuid::new_v4().to_string(),
        "2030-06-03",
        "10:00:00",
        "11:00:00",
        "scheduled",
    );
    appointment["id"] = json!(appointment_id);

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([appointment])))
        .mount(&mock_server)
        .await;

    let result = create_checkout_session(
        State(config.clone()),
        create_auth_header(&token),
        create_test_user_extension(&stranger),
        Json(CheckoutRequest {
            appointment_id,
            tip_amount: None,
        }),
    )
    .await;

    assert_matches!(result, Err(AppError::Forbidden(_)));
}

#[tokio::test]
async fn test_webhook_marks_deposit_paid() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    let appointment_id = Uuid::new_v4();
    let payload = json!({
        "type": "checkout.session.completed",
        "data": {
            "object": {
                "id": "cs_test_123",
                "metadata": {
                    "appointment_id": appointment_id.to_string(),
                    "purpose": "deposit"
                }
            }
        }
    })
    .to_string();
    let signature = sign_header(&payload, &config.stripe_webhook_secret);

    let mut updated = MockSupabaseResponses::appointment_response(
        &Uuid::new_v4().to_string(),
        &Uuid::new_v4().to_string(),
        &Uuid::new_v4().to_string(),
        "2030-06-03",
        "10:00:00",
        "11:00:00",
        "scheduled",
    );
    updated["id"] = json!(appointment_id);
    updated["deposit_paid"] = json!(true);

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .and(header("Prefer", "return=representation"))
        .and(body_partial_json(json!({"deposit_paid": true})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([updated])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = stripe_webhook(State(config.clone()), webhook_headers(&signature), payload).await;

    let response = result.unwrap();
    assert_eq!(response.0["received"], true);
}

#[tokio::test]
async fn test_webhook_marks_balance_paid_and_records_tip() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    let appointment_id = Uuid::new_v4();
    let payload = json!({
        "type": "checkout.session.completed",
        "data": {
            "object": {
                "id": "cs_test_456",
                "metadata": {
                    "appointment_id": appointment_id.to_string(),
                    "purpose": "balance",
                    "tip_amount": "12.5"
                }
            }
        }
    })
    .to_string();
    let signature = sign_header(&payload, &config.stripe_webhook_secret);

    let mut updated = MockSupabaseResponses::appointment_response(
        &Uuid::new_v4().to_string(),
        &Uuid::new_v4().to_string(),
        &Uuid::new_v4().to_string(),
        "2030-06-03",
        "10:00:00",
        "11:00:00",
        "completed",
    );
    updated["id"] = json!(appointment_id);
    updated["payment_status"] = json!("paid");
    updated["tip_amount"] = json!(12.5);

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .and(body_partial_json(
            json!({"payment_status": "paid", "tip_amount": 12.5}),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([updated])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = stripe_webhook(State(config.clone()), webhook_headers(&signature), payload).await;

    let response = result.unwrap();
    assert_eq!(response.0["received"], true);
}

#[tokio::test]
async fn test_webhook_rejects_bad_signature() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    let payload = json!({
        "type": "checkout.session.completed",
        "data": {"object": {"metadata": {}}}
    })
    .to_string();
    let signature = sign_header(&payload, "whsec_someone_elses_secret");

    let result = stripe_webhook(State(config.clone()), webhook_headers(&signature), payload).await;

    assert_matches!(result, Err(AppError::BadRequest(_)));
}

#[tokio::test]
async fn test_webhook_requires_signature_header() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    let payload = json!({"type": "checkout.session.completed"}).to_string();

    let result = stripe_webhook(State(config.clone()), HeaderMap::new(), payload).await;

    assert_matches!(result, Err(AppError::BadRequest(_)));
}

#[tokio::test]
async fn test_webhook_ignores_unrelated_events() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    let payload = json!({
        "type": "invoice.paid",
        "data": {"object": {"id": "in_test_1"}}
    })
    .to_string();
    let signature = sign_header(&payload, &config.stripe_webhook_secret);

    // No appointment mocks mounted: an ignored event must not touch the database
    let result = stripe_webhook(State(config.clone()), webhook_headers(&signature), payload).await;

    let response = result.unwrap();
    assert_eq!(response.0["received"], true);
}

#[tokio::test]
async fn test_quote_combines_deposit_and_coupon() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    let customer = TestUser::customer("customer@example.com");
    let token = token_for(&customer, &config);

    let provider_id = Uuid::new_v4();
    let service_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/services"))
        .and(query_param("id", format!("eq.{}", service_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::service_response(
                &service_id.to_string(),
                &provider_id.to_string(),
                150.0,
                60,
            )
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/coupons"))
        .and(query_param("provider_id", format!("eq.{}", provider_id)))
        .and(query_param("code", "eq.GLOW15"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": Uuid::new_v4(),
            "provider_id": provider_id,
            "code": "GLOW15",
            "discount_type": "fixed",
            "discount_value": 15.0,
            "min_amount": null,
            "max_uses": null,
            "times_used": 0,
            "valid_from": null,
            "valid_until": null,
            "is_active": true
        }])))
        .mount(&mock_server)
        .await;

    let result = get_payment_quote(
        State(config.clone()),
        Query(QuoteQuery {
            service_id,
            coupon_code: Some("GLOW15".to_string()),
        }),
        create_auth_header(&token),
        create_test_user_extension(&customer),
    )
    .await;

    let response = result.unwrap();
    assert_eq!(response.0["list_price"], json!(150.0));
    assert_eq!(response.0["amount_due"], json!(135.0));
    assert_eq!(response.0["coupon_code"], "GLOW15");
    assert_eq!(response.0["deposit_required"], true);
    assert_eq!(response.0["deposit_amount"], json!(30.0));
}

#[tokio::test]
async fn test_quote_unknown_service_returns_not_found() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    let customer = TestUser::customer("customer@example.com");
    let token = token_for(&customer, &config);

    Mock::given(method("GET"))
        .and(path("/rest/v1/services"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let result = get_payment_quote(
        State(config.clone()),
        Query(QuoteQuery {
            service_id: Uuid::new_v4(),
            coupon_code: None,
        }),
        create_auth_header(&token),
        create_test_user_extension(&customer),
    )
    .await;

    assert_matches!(result, Err(AppError::NotFound(_)));
}
