//! Mailtrap adapter tests.

use mailbridge::providers::MailtrapAdapter;
use mailbridge::{
    Adapter, Address, Attachment, CapabilityPolicy, EndpointMode, Feature, MailError, Message,
    ProviderConfig, SendStatus,
};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Helper Functions
// ============================================================================

fn config(server: &MockServer) -> ProviderConfig {
    ProviderConfig::new("test-api-key").api_url(format!("{}/api", server.uri()))
}

fn adapter(server: &MockServer) -> MailtrapAdapter {
    MailtrapAdapter::new(config(server)).unwrap()
}

fn valid_message() -> Message {
    Message::new()
        .from("tony.stark@example.com")
        .to("steve.rogers@example.com")
        .subject("Hello, Avengers!")
        .html_body("<h1>Hello</h1>")
        .text_body("Hello")
}

fn success_response() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "success": true,
        "message_ids": ["0c7fd939-02cf-11ed-88c2-0a58a9feac02"]
    }))
}

// ============================================================================
// Basic Delivery Tests
// ============================================================================

#[tokio::test]
async fn successful_delivery_returns_sent() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/send"))
        .and(header("Authorization", "Bearer test-api-key"))
        .and(header("Content-Type", "application/json"))
        .and(header(
            "User-Agent",
            format!("mailbridge/{}", mailbridge::VERSION).as_str(),
        ))
        .and(body_json(json!({
            "from": {"email": "tony.stark@example.com"},
            "to": [{"email": "steve.rogers@example.com"}],
            "text": "Hello",
            "html": "<h1>Hello</h1>",
            "subject": "Hello, Avengers!"
        })))
        .respond_with(success_response())
        .expect(1)
        .mount(&server)
        .await;

    let response = adapter(&server).send(&valid_message()).await.unwrap();
    assert_eq!(response.provider, "mailtrap");
    assert_eq!(response.results.len(), 1);

    let result = &response.results[0];
    assert_eq!(result.recipient, "steve.rogers@example.com");
    assert_eq!(result.status, SendStatus::Sent);
    assert_eq!(
        result.message_id.as_deref(),
        Some("0c7fd939-02cf-11ed-88c2-0a58a9feac02")
    );
    assert!(response.diagnostics.is_empty());
}

#[tokio::test]
async fn deliver_with_all_fields() {
    let server = MockServer::start().await;

    let message = Message::new()
        .from(("T Stark", "tony.stark@example.com"))
        .to("wasp.avengers@example.com")
        .to(("Steve Rogers", "steve.rogers@example.com"))
        .cc(("Bruce Banner", "hulk.smash@example.com"))
        .cc("thor.odinson@example.com")
        .bcc(("Clinton Francis Barton", "hawk.eye@example.com"))
        .reply_to("office.avengers@example.com")
        .subject("Hello, Avengers!")
        .html_body("<h1>Hello</h1>")
        .text_body("Hello")
        .header("X-Priority", "1")
        .tag("avengers")
        .metadata("user_id", 42)
        .metadata("team", "blue");

    Mock::given(method("POST"))
        .and(path("/api/send"))
        .and(body_json(json!({
            "from": {"name": "T Stark", "email": "tony.stark@example.com"},
            "to": [
                {"email": "wasp.avengers@example.com"},
                {"name": "Steve Rogers", "email": "steve.rogers@example.com"}
            ],
            "cc": [
                {"name": "Bruce Banner", "email": "hulk.smash@example.com"},
                {"email": "thor.odinson@example.com"}
            ],
            "bcc": [{"name": "Clinton Francis Barton", "email": "hawk.eye@example.com"}],
            "subject": "Hello, Avengers!",
            "text": "Hello",
            "html": "<h1>Hello</h1>",
            "headers": {
                "Reply-To": "office.avengers@example.com",
                "X-Priority": "1"
            },
            "category": "avengers",
            "custom_variables": {"user_id": "42", "team": "blue"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "message_ids": ["id-1", "id-2", "id-3", "id-4", "id-5"]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = adapter(&server).send(&message).await.unwrap();
    let recipients: Vec<_> = response.results.iter().map(|r| r.recipient.as_str()).collect();
    assert_eq!(
        recipients,
        vec![
            "wasp.avengers@example.com",
            "steve.rogers@example.com",
            "hulk.smash@example.com",
            "thor.odinson@example.com",
            "hawk.eye@example.com"
        ]
    );
    assert_eq!(
        response.get("hawk.eye@example.com").unwrap().message_id.as_deref(),
        Some("id-5")
    );
    assert!(response.all_accepted());
}

#[tokio::test]
async fn explicit_reply_to_header_wins() {
    let server = MockServer::start().await;
    let message = valid_message()
        .reply_to("ignored@example.com")
        .header("reply-to", "Support <support@example.com>");

    Mock::given(method("POST"))
        .and(path("/api/send"))
        .and(body_json(json!({
            "from": {"email": "tony.stark@example.com"},
            "to": [{"email": "steve.rogers@example.com"}],
            "text": "Hello",
            "html": "<h1>Hello</h1>",
            "subject": "Hello, Avengers!",
            "headers": {"reply-to": "Support <support@example.com>"}
        })))
        .respond_with(success_response())
        .expect(1)
        .mount(&server)
        .await;

    adapter(&server).send(&message).await.unwrap();
}

#[tokio::test]
async fn deliver_with_template() {
    let server = MockServer::start().await;
    let message = Message::new()
        .from("tony.stark@example.com")
        .to("steve.rogers@example.com")
        .template_id("8b3c4c85-aa60-4a83-91b4-1b1f7a9e2b3a")
        .merge_global("name", "Steve")
        .merge_global("order", json!({"id": 7}));

    Mock::given(method("POST"))
        .and(path("/api/send"))
        .and(body_json(json!({
            "from": {"email": "tony.stark@example.com"},
            "to": [{"email": "steve.rogers@example.com"}],
            "template_uuid": "8b3c4c85-aa60-4a83-91b4-1b1f7a9e2b3a",
            "template_variables": {"name": "Steve", "order": {"id": 7}}
        })))
        .respond_with(success_response())
        .expect(1)
        .mount(&server)
        .await;

    let response = adapter(&server).send(&message).await.unwrap();
    assert_eq!(response.results[0].status, SendStatus::Sent);
}

#[tokio::test]
async fn deliver_with_attachments() {
    let server = MockServer::start().await;
    let message = valid_message()
        .attachment(Attachment::from_bytes("notes.txt", b"hello".to_vec()))
        .attachment(
            Attachment::from_bytes("logo.png", vec![0x89, 0x50, 0x4e, 0x47])
                .inline()
                .content_id("<logo>"),
        );

    Mock::given(method("POST"))
        .and(path("/api/send"))
        .and(body_json(json!({
            "from": {"email": "tony.stark@example.com"},
            "to": [{"email": "steve.rogers@example.com"}],
            "text": "Hello",
            "html": "<h1>Hello</h1>",
            "subject": "Hello, Avengers!",
            "attachments": [
                {
                    "filename": "notes.txt",
                    "type": "text/plain",
                    "content": "aGVsbG8=",
                    "disposition": "attachment"
                },
                {
                    "filename": "logo.png",
                    "type": "image/png",
                    "content": "iVBORw==",
                    "disposition": "inline",
                    "content_id": "logo"
                }
            ]
        })))
        .respond_with(success_response())
        .expect(1)
        .mount(&server)
        .await;

    adapter(&server).send(&message).await.unwrap();
}

#[tokio::test]
async fn esp_extra_is_deep_merged() {
    let server = MockServer::start().await;
    let message = valid_message()
        .header("X-Priority", "1")
        .esp_extra("headers", json!({"X-Campaign": "launch"}))
        .esp_extra("subject", "Overridden");

    Mock::given(method("POST"))
        .and(path("/api/send"))
        .and(body_json(json!({
            "from": {"email": "tony.stark@example.com"},
            "to": [{"email": "steve.rogers@example.com"}],
            "text": "Hello",
            "html": "<h1>Hello</h1>",
            "subject": "Overridden",
            "headers": {"X-Priority": "1", "X-Campaign": "launch"}
        })))
        .respond_with(success_response())
        .expect(1)
        .mount(&server)
        .await;

    adapter(&server).send(&message).await.unwrap();
}

// ============================================================================
// Endpoint Mode Tests
// ============================================================================

#[tokio::test]
async fn sandbox_sends_to_inbox_path() {
    let server = MockServer::start().await;
    let config = config(&server).testing(true).test_inbox_id("11111");
    let adapter = MailtrapAdapter::new(config).unwrap();

    Mock::given(method("POST"))
        .and(path("/api/send/11111"))
        .respond_with(success_response())
        .expect(1)
        .mount(&server)
        .await;

    assert!(adapter.endpoint().unwrap().is_sandbox());
    let response = adapter.send(&valid_message()).await.unwrap();
    assert_eq!(response.results[0].status, SendStatus::Sent);
}

#[test]
fn default_hosts_per_mode() {
    let transactional = MailtrapAdapter::new(ProviderConfig::new("key")).unwrap();
    assert_eq!(
        transactional.send_url(),
        "https://send.api.mailtrap.io/api/send"
    );
    assert_eq!(
        transactional.endpoint().unwrap().mode,
        Some(EndpointMode::Transactional)
    );

    let bulk = MailtrapAdapter::new(ProviderConfig::new("key").bulk(true)).unwrap();
    assert_eq!(bulk.send_url(), "https://bulk.api.mailtrap.io/api/send");

    let sandbox = MailtrapAdapter::new(
        ProviderConfig::new("key").testing(true).test_inbox_id("12 34"),
    )
    .unwrap();
    assert_eq!(
        sandbox.send_url(),
        "https://sandbox.api.mailtrap.io/api/send/12%2034"
    );
    assert_eq!(sandbox.endpoint().unwrap().mode, Some(EndpointMode::Sandbox));
}

#[test]
fn override_is_used_verbatim() {
    let adapter = MailtrapAdapter::new(
        ProviderConfig::new("key")
            .bulk(true)
            .api_url("https://mailtrap.internal/custom/"),
    )
    .unwrap();
    assert_eq!(adapter.send_url(), "https://mailtrap.internal/custom/send");
    assert_eq!(adapter.endpoint().unwrap().mode, None);
}

#[test]
fn construction_errors() {
    let err = MailtrapAdapter::new(ProviderConfig::default()).err().unwrap();
    assert!(matches!(err, MailError::Configuration(_)));

    let err = MailtrapAdapter::new(ProviderConfig::new("key").testing(true))
        .err()
        .unwrap();
    assert!(matches!(err, MailError::Configuration(ref m) if m.contains("MAILTRAP_TEST_INBOX_ID")));

    let err = MailtrapAdapter::new(
        ProviderConfig::new("key")
            .testing(true)
            .bulk(true)
            .test_inbox_id("1"),
    )
    .err()
    .unwrap();
    assert!(matches!(err, MailError::Configuration(_)));
}

// ============================================================================
// Capability Policy Tests
// ============================================================================

#[test]
fn strict_policy_rejects_unsupported_features() {
    let adapter = MailtrapAdapter::new(ProviderConfig::new("key")).unwrap();

    let message = valid_message().merge_metadata("steve.rogers@example.com", "order", 1);
    let err = adapter
        .serialize(&message, CapabilityPolicy::Strict)
        .unwrap_err();
    assert!(matches!(
        err,
        MailError::UnsupportedFeature {
            provider: "mailtrap",
            feature: Feature::MergeMetadata
        }
    ));

    let message = valid_message().tag("one").tag("two");
    let err = adapter
        .serialize(&message, CapabilityPolicy::Strict)
        .unwrap_err();
    assert!(matches!(
        err,
        MailError::UnsupportedFeature {
            feature: Feature::MultipleTags,
            ..
        }
    ));

    let message = valid_message().send_at(chrono::Utc::now());
    assert!(adapter.serialize(&message, CapabilityPolicy::Strict).is_err());

    let message = valid_message().envelope_sender("bounces@example.com");
    assert!(adapter.serialize(&message, CapabilityPolicy::Strict).is_err());

    let message = valid_message().merge_data("steve.rogers@example.com", "name", "Steve");
    assert!(adapter.serialize(&message, CapabilityPolicy::Strict).is_err());

    // Explicitly disabling tracking is still a per-message override.
    let message = valid_message().track_opens(false).track_clicks(false);
    let err = adapter
        .serialize(&message, CapabilityPolicy::Strict)
        .unwrap_err();
    assert!(matches!(
        err,
        MailError::UnsupportedFeature {
            feature: Feature::TrackingOverrides,
            ..
        }
    ));

    let message = valid_message().header("Subject", "sneaky");
    let err = adapter
        .serialize(&message, CapabilityPolicy::Strict)
        .unwrap_err();
    assert!(matches!(
        err,
        MailError::UnsupportedFeature {
            feature: Feature::ReservedHeader(ref name),
            ..
        } if name == "Subject"
    ));
}

#[test]
fn best_effort_policy_omits_and_reports() {
    let adapter = MailtrapAdapter::new(ProviderConfig::new("key")).unwrap();
    let message = valid_message()
        .merge_metadata("steve.rogers@example.com", "order", 1)
        .tag("one")
        .tag("two")
        .header("Subject", "sneaky")
        .track_opens(true);

    let request = adapter
        .serialize(&message, CapabilityPolicy::BestEffort)
        .unwrap();

    assert_eq!(request.body["category"], json!("one"));
    assert!(request.body.get("headers").is_none());
    assert_eq!(request.recipients, vec!["steve.rogers@example.com"]);

    let features: Vec<_> = request.diagnostics.iter().map(|d| d.feature.clone()).collect();
    assert_eq!(
        features,
        vec![
            Feature::MergeMetadata,
            Feature::MultipleTags,
            Feature::TrackingOverrides,
            Feature::ReservedHeader("Subject".to_string())
        ]
    );
    assert!(request.body.get("track_opens").is_none());
}

#[tokio::test]
async fn configured_policy_applies_to_send() {
    let server = MockServer::start().await;
    let adapter =
        MailtrapAdapter::new(config(&server).policy(CapabilityPolicy::BestEffort)).unwrap();

    Mock::given(method("POST"))
        .and(path("/api/send"))
        .respond_with(success_response())
        .expect(1)
        .mount(&server)
        .await;

    let message = valid_message().envelope_sender("bounces@example.com");
    let response = adapter.send(&message).await.unwrap();
    assert_eq!(response.diagnostics.len(), 1);
    assert_eq!(response.diagnostics[0].feature, Feature::EnvelopeSender);
}

#[tokio::test]
async fn strict_send_makes_no_request() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(success_response())
        .expect(0)
        .mount(&server)
        .await;

    let message = valid_message().tag("one").tag("two");
    let result = adapter(&server).send(&message).await;
    assert!(matches!(result, Err(MailError::UnsupportedFeature { .. })));
}

#[tokio::test]
async fn invalid_message_makes_no_request() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(success_response())
        .expect(0)
        .mount(&server)
        .await;

    let message = Message::new().from("tony.stark@example.com").subject("No one");
    let result = adapter(&server).send(&message).await;
    assert!(matches!(result, Err(MailError::MissingField("to"))));
}

// ============================================================================
// Response Normalization Tests
// ============================================================================

#[tokio::test]
async fn validation_error_is_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/send"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "success": false,
            "errors": ["'to' address is invalid"]
        })))
        .mount(&server)
        .await;

    let response = adapter(&server).send(&valid_message()).await.unwrap();
    let result = &response.results[0];
    assert_eq!(result.status, SendStatus::Rejected);
    assert_eq!(result.detail.as_deref(), Some("'to' address is invalid"));
    assert!(result.message_id.is_none());
}

#[tokio::test]
async fn auth_error_is_failed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/send"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "errors": ["Unauthorized"]
        })))
        .mount(&server)
        .await;

    let response = adapter(&server).send(&valid_message()).await.unwrap();
    assert_eq!(response.results[0].status, SendStatus::Failed);
    assert_eq!(response.results[0].detail.as_deref(), Some("Unauthorized"));
}

#[tokio::test]
async fn server_error_with_json_is_failed() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/send"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": "Internal server error"
        })))
        .mount(&server)
        .await;

    let response = adapter(&server).send(&valid_message()).await.unwrap();
    assert_eq!(response.statuses(), vec![SendStatus::Failed]);
}

#[tokio::test]
async fn empty_body_is_provider_unavailable() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/send"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = adapter(&server).send(&valid_message()).await.unwrap_err();
    assert!(matches!(
        err,
        MailError::ProviderUnavailable {
            provider: "mailtrap",
            ..
        }
    ));
    assert!(err.is_retryable());
    assert!(!err.is_timeout());
}

#[tokio::test]
async fn per_recipient_results() {
    let server = MockServer::start().await;
    let message = valid_message()
        .to("bad@example.com")
        .cc("thor.odinson@example.com");

    Mock::given(method("POST"))
        .and(path("/api/send"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "responses": [
                {"success": true, "message_ids": ["m-1"]},
                {"success": false, "errors": ["mailbox does not exist"]},
                {"success": true, "message_ids": ["m-3"]}
            ]
        })))
        .mount(&server)
        .await;

    let response = adapter(&server).send(&message).await.unwrap();
    assert_eq!(
        response.statuses(),
        vec![SendStatus::Sent, SendStatus::Rejected, SendStatus::Sent]
    );
    let bad = response.get("BAD@example.com").unwrap();
    assert_eq!(bad.detail.as_deref(), Some("mailbox does not exist"));
    assert_eq!(
        response.get("thor.odinson@example.com").unwrap().message_id.as_deref(),
        Some("m-3")
    );
    assert_eq!(response.count(SendStatus::Sent), 2);
}

#[tokio::test]
async fn timeout_is_provider_unavailable() {
    let server = MockServer::start().await;
    let adapter =
        MailtrapAdapter::new(config(&server).timeout(Duration::from_millis(100))).unwrap();

    Mock::given(method("POST"))
        .and(path("/api/send"))
        .respond_with(success_response().set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let err = adapter.send(&valid_message()).await.unwrap_err();
    assert!(err.is_timeout());
    assert!(err.is_retryable());
}

#[tokio::test]
async fn send_many_results_are_independent() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/send"))
        .respond_with(success_response())
        .expect(2)
        .mount(&server)
        .await;

    let messages = vec![
        valid_message(),
        Message::new().to("nobody@example.com").text_body("no sender"),
        valid_message().to(Address::with_name("Natasha", "natasha@example.com")),
    ];

    let results = adapter(&server).send_many(&messages).await;
    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(MailError::MissingField("from"))));
    assert_eq!(results[2].as_ref().unwrap().results.len(), 2);
}
