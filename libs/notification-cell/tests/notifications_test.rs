// libs/notification-cell/tests/notifications_test.rs
use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use std::sync::Arc;

use notification_cell::{
    AppointmentNotificationContext, CalendarSyncAction, EmailSender, NotificationService,
    ReminderScheduler, SmsSender,
};
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_utils::test_utils::TestConfig;

fn config_with_mock(mock_server: &MockServer) -> AppConfig {
    let mut test_config = TestConfig::default();
    test_config.supabase_url = mock_server.uri();
    test_config.email_api_url = mock_server.uri();
    test_config.twilio_base_url = mock_server.uri();
    test_config.calendar_api_url = mock_server.uri();
    test_config.to_app_config()
}

fn test_context(email: Option<&str>, phone: Option<&str>) -> AppointmentNotificationContext {
    AppointmentNotificationContext {
        appointment_id: Uuid::new_v4(),
        customer_id: Uuid::new_v4(),
        customer_email: email.map(str::to_string),
        customer_phone: phone.map(str::to_string),
        provider_name: "Glow Studio".to_string(),
        service_name: "Classic Manicure".to_string(),
        date: NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
        start_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        end_time: NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
    }
}

#[tokio::test]
async fn test_email_sender_posts_to_api() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/send"))
        .and(header("Authorization", "Bearer test-email-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "msg_1"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let sender = EmailSender::new(&config_with_mock(&mock_server));
    let outcome = sender
        .send("customer@example.com", "Booking confirmed", "See you soon")
        .await;

    assert!(outcome.success);
    assert!(outcome.error.is_none());
}

#[tokio::test]
async fn test_email_sender_reports_api_rejection() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/send"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let sender = EmailSender::new(&config_with_mock(&mock_server));
    let outcome = sender.send("customer@example.com", "Hi", "Body").await;

    assert!(!outcome.success);
    assert!(outcome.error.unwrap().contains("HTTP 500"));
}

#[tokio::test]
async fn test_sms_sender_uses_basic_auth_form_post() {
    let mock_server = MockServer::start().await;

    let expected_credentials = general_purpose::STANDARD.encode("ACtest:test-twilio-token");

    Mock::given(method("POST"))
        .and(path("/2010-04-01/Accounts/ACtest/Messages.json"))
        .and(header(
            "Authorization",
            format!("Basic {}", expected_credentials).as_str(),
        ))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"sid": "SM1"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let sender = SmsSender::new(&config_with_mock(&mock_server));
    let outcome = sender.send("+15551230000", "Confirmed for Monday").await;

    assert!(outcome.success);
}

#[tokio::test]
async fn test_reminder_scheduler_inserts_future_offsets_only() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointment_reminders"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{}, {}])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = config_with_mock(&mock_server);
    let scheduler = ReminderScheduler::new(Arc::new(SupabaseClient::new(&config)));

    let now = Utc::now().naive_utc();
    // 30 hours out: both the 24h and the 2h reminder are still ahead.
    let start = now + Duration::hours(30);

    let outcome = scheduler
        .schedule_for_appointment(Uuid::new_v4(), Uuid::new_v4(), start, now, "token")
        .await;

    assert!(outcome.success);
}

#[tokio::test]
async fn test_reminder_scheduler_skips_entirely_past_offsets() {
    let mock_server = MockServer::start().await;

    // No insert should happen for a booking starting within 2 hours.
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointment_reminders"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = config_with_mock(&mock_server);
    let scheduler = ReminderScheduler::new(Arc::new(SupabaseClient::new(&config)));

    let now = Utc::now().naive_utc();
    let start = now + Duration::minutes(90);

    let outcome = scheduler
        .schedule_for_appointment(Uuid::new_v4(), Uuid::new_v4(), start, now, "token")
        .await;

    assert!(outcome.success);
}

#[tokio::test]
async fn test_facade_reports_missing_contact_channels() {
    let mock_server = MockServer::start().await;
    let service = NotificationService::new(&config_with_mock(&mock_server));

    let ctx = test_context(None, None);
    let outcomes = service.send_booking_confirmation(&ctx).await;

    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|o| !o.success));
    assert!(outcomes[0].error.as_deref().unwrap().contains("email"));
    assert!(outcomes[1].error.as_deref().unwrap().contains("phone"));
}

#[tokio::test]
async fn test_facade_sends_both_channels_when_reachable() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/send"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "msg_1"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/2010-04-01/Accounts/ACtest/Messages.json"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"sid": "SM1"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = NotificationService::new(&config_with_mock(&mock_server));

    let ctx = test_context(Some("customer@example.com"), Some("+15551230000"));
    let outcomes = service.send_booking_confirmation(&ctx).await;

    assert!(outcomes.iter().all(|o| o.success));
}

#[tokio::test]
async fn test_calendar_sync_creates_event() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/events"))
        .and(header("Authorization", "Bearer test-calendar-token"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "evt_1"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = NotificationService::new(&config_with_mock(&mock_server));

    let ctx = test_context(Some("customer@example.com"), None);
    let outcome = service
        .sync_calendar_event(&ctx, CalendarSyncAction::Create)
        .await;

    assert!(outcome.success);
}
