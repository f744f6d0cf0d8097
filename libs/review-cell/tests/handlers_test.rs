// libs/review-cell/tests/handlers_test.rs

use std::sync::Arc;

use assert_matches::assert_matches;
use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use review_cell::handlers::*;
use review_cell::models::*;
use shared_config::AppConfig;
use shared_models::{auth::User, error::AppError};
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};

fn mock_config(mock_server: &MockServer) -> Arc<AppConfig> {
    let mut test_config = TestConfig::default();
    test_config.supabase_url = mock_server.uri();
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

#[tokio::test]
async fn test_create_review_success_updates_provider_aggregate() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    let customer = TestUser::customer("customer@example.com");
    let token = token_for(&customer, &config);

    let provider_id = Uuid::new_v4();
    let appointment_id = Uuid::new_v4();

    let appointment = MockSupabaseResponses::appointment_response(
        &customer.id,
        &provider_id.to_string(),
        &Uuid::new_v4().to_string(),
        "2024-02-01",
        "10:00:00",
        "11:00:00",
        "completed",
    );

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([appointment])))
        .mount(&mock_server)
        .await;

    // No review yet for this appointment
    Mock::given(method("GET"))
        .and(path("/rest/v1/reviews"))
        .and(query_param("appointment_id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/reviews"))
        .and(header("Prefer", "return=representation"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::review_response(
                &customer.id,
                &provider_id.to_string(),
                &appointment_id.to_string(),
                5,
            )
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    // Aggregate recompute reads every rating back
    Mock::given(method("GET"))
        .and(path("/rest/v1/reviews"))
        .and(query_param("provider_id", format!("eq.{}", provider_id)))
        .and(query_param("select", "rating"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"rating": 5},
            {"rating": 4},
            {"rating": 3}
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/providers"))
        .and(query_param("id", format!("eq.{}", provider_id)))
        .and(body_partial_json(json!({
            "average_rating": 4.0,
            "review_count": 3
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::provider_response(
                &provider_id.to_string(),
                &Uuid::new_v4().to_string(),
            )
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = create_review(
        State(config),
        create_auth_header(&token),
        create_test_user_extension(&customer),
        Json(CreateReviewRequest {
            provider_id,
            appointment_id,
            rating: 5,
            comment: Some("Lovely experience".to_string()),
        }),
    )
    .await;

    assert!(result.is_ok(), "Expected review creation to succeed, got: {:?}", result.err());
    let response = result.unwrap().0;
    assert_eq!(response["success"], true);
    assert_eq!(response["review"]["rating"], 5);
    assert_eq!(response["message"], "Review submitted");
}

#[tokio::test]
async fn test_create_review_rejects_unfinished_appointment() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    let customer = TestUser::customer("customer@example.com");
    let token = token_for(&customer, &config);

    let provider_id = Uuid::new_v4();
    let appointment_id = Uuid::new_v4();

    let appointment = MockSupabaseResponses::appointment_response(
        &customer.id,
        &provider_id.to_string(),
        &Uuid::new_v4().to_string(),
        "2030-06-03",
        "10:00:00",
        "11:00:00",
        "scheduled",
    );

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([appointment])))
        .mount(&mock_server)
        .await;

    let result = create_review(
        State(config),
        create_auth_header(&token),
        create_test_user_extension(&customer),
        Json(CreateReviewRequest {
            provider_id,
            appointment_id,
            rating: 5,
            comment: None,
        }),
    )
    .await;

    assert_matches!(result, Err(AppError::BadRequest(_)));
}

#[tokio::test]
async fn test_create_review_rejects_duplicate() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    let customer = TestUser::customer("customer@example.com");
    let token = token_for(&customer, &config);

    let provider_id = Uuid::new_v4();
    let appointment_id = Uuid::new_v4();

    let appointment = MockSupabaseResponses::appointment_response(
        &customer.id,
        &provider_id.to_string(),
        &Uuid::new_v4().to_string(),
        "2024-02-01",
        "10:00:00",
        "11:00:00",
        "completed",
    );

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([appointment])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/reviews"))
        .and(query_param("appointment_id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::review_response(
                &customer.id,
                &provider_id.to_string(),
                &appointment_id.to_string(),
                4,
            )
        ])))
        .mount(&mock_server)
        .await;

    let result = create_review(
        State(config),
        create_auth_header(&token),
        create_test_user_extension(&customer),
        Json(CreateReviewRequest {
            provider_id,
            appointment_id,
            rating: 5,
            comment: None,
        }),
    )
    .await;

    assert_matches!(result, Err(AppError::Conflict(_)));
}

#[tokio::test]
async fn test_create_review_rejects_out_of_range_rating() {
    let config = TestConfig::default().to_arc();
    let customer = TestUser::customer("customer@example.com");
    let token = token_for(&customer, &config);

    let result = create_review(
        State(config),
        create_auth_header(&token),
        create_test_user_extension(&customer),
        Json(CreateReviewRequest {
            provider_id: Uuid::new_v4(),
            appointment_id: Uuid::new_v4(),
            rating: 6,
            comment: None,
        }),
    )
    .await;

    assert_matches!(result, Err(AppError::BadRequest(_)));
}

#[tokio::test]
async fn test_update_review_denies_non_owner() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    let stranger = TestUser::customer("stranger@example.com");
    let token = token_for(&stranger, &config);
    let review_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/reviews"))
        .and(query_param("id", format!("eq.{}", review_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::review_response(
                &Uuid::new_v4().to_string(),
                &Uuid::new_v4().to_string(),
                &Uuid::new_v4().to_string(),
                4,
            )
        ])))
        .mount(&mock_server)
        .await;

    let result = update_review(
        State(config),
        Path(review_id),
        create_auth_header(&token),
        create_test_user_extension(&stranger),
        Json(UpdateReviewRequest {
            rating: Some(1),
            comment: None,
        }),
    )
    .await;

    assert_matches!(result, Err(AppError::Forbidden(_)));
}

#[tokio::test]
async fn test_update_review_by_owner_refreshes_aggregate() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    let customer = TestUser::customer("customer@example.com");
    let token = token_for(&customer, &config);

    let review_id = Uuid::new_v4();
    let provider_id = Uuid::new_v4();

    let row = MockSupabaseResponses::review_response(
        &customer.id,
        &provider_id.to_string(),
        &Uuid::new_v4().to_string(),
        5,
    );

    Mock::given(method("GET"))
        .and(path("/rest/v1/reviews"))
        .and(query_param("id", format!("eq.{}", review_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row.clone()])))
        .mount(&mock_server)
        .await;

    let mut updated = row;
    updated["rating"] = json!(4);

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/reviews"))
        .and(query_param("id", format!("eq.{}", review_id)))
        .and(body_partial_json(json!({"rating": 4})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([updated])))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/reviews"))
        .and(query_param("provider_id", format!("eq.{}", provider_id)))
        .and(query_param("select", "rating"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"rating": 4}])))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/providers"))
        .and(query_param("id", format!("eq.{}", provider_id)))
        .and(body_partial_json(json!({
            "average_rating": 4.0,
            "review_count": 1
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::provider_response(
                &provider_id.to_string(),
                &Uuid::new_v4().to_string(),
            )
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = update_review(
        State(config),
        Path(review_id),
        create_auth_header(&token),
        create_test_user_extension(&customer),
        Json(UpdateReviewRequest {
            rating: Some(4),
            comment: None,
        }),
    )
    .await;

    assert!(result.is_ok(), "Expected update to succeed, got: {:?}", result.err());
    let response = result.unwrap().0;
    assert_eq!(response["success"], true);
    assert_eq!(response["review"]["rating"], 4);
}

#[tokio::test]
async fn test_delete_review_recomputes_to_zero() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    let customer = TestUser::customer("customer@example.com");
    let token = token_for(&customer, &config);

    let review_id = Uuid::new_v4();
    let provider_id = Uuid::new_v4();

    let row = MockSupabaseResponses::review_response(
        &customer.id,
        &provider_id.to_string(),
        &Uuid::new_v4().to_string(),
        5,
    );

    Mock::given(method("GET"))
        .and(path("/rest/v1/reviews"))
        .and(query_param("id", format!("eq.{}", review_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row.clone()])))
        .mount(&mock_server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/reviews"))
        .and(query_param("id", format!("eq.{}", review_id)))
        .and(header("Prefer", "return=representation"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .expect(1)
        .mount(&mock_server)
        .await;

    // Last review gone, provider reads as unrated again
    Mock::given(method("GET"))
        .and(path("/rest/v1/reviews"))
        .and(query_param("provider_id", format!("eq.{}", provider_id)))
        .and(query_param("select", "rating"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/providers"))
        .and(query_param("id", format!("eq.{}", provider_id)))
        .and(body_partial_json(json!({
            "average_rating": 0.0,
            "review_count": 0
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::provider_response(
                &provider_id.to_string(),
                &Uuid::new_v4().to_string(),
            )
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = delete_review(
        State(config),
        Path(review_id),
        create_auth_header(&token),
        create_test_user_extension(&customer),
    )
    .await;

    assert!(result.is_ok(), "Expected delete to succeed, got: {:?}", result.err());
    let response = result.unwrap().0;
    assert_eq!(response["success"], true);
    assert_eq!(response["message"], "Review deleted");
}

#[tokio::test]
async fn test_list_reviews_public_returns_provider_reviews() {
    let mock_server = MockServer::start().await;
    let config = mock_config(&mock_server);

    let provider_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/reviews"))
        .and(query_param("provider_id", format!("eq.{}", provider_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::review_response(
                &Uuid::new_v4().to_string(),
                &provider_id.to_string(),
                &Uuid::new_v4().to_string(),
                5,
            ),
            MockSupabaseResponses::review_response(
                &Uuid::new_v4().to_string(),
                &provider_id.to_string(),
                &Uuid::new_v4().to_string(),
                3,
            ),
        ])))
        .mount(&mock_server)
        .await;

    let result = list_reviews_public(
        State(config),
        Query(ReviewListQuery {
            provider_id,
            limit: None,
            offset: None,
        }),
    )
    .await;

    assert!(result.is_ok(), "Expected list to succeed, got: {:?}", result.err());
    let response = result.unwrap().0;
    assert_eq!(response["total"], 2);
    assert_eq!(response["reviews"][0]["rating"], 5);
}
