//! Logger adapter tests.

use mailbridge::providers::LoggerAdapter;
use mailbridge::{Adapter, CapabilityPolicy, Message, SendStatus};

// ============================================================================
// Basic Delivery Tests
// ============================================================================

#[tokio::test]
async fn send_queues_every_recipient() {
    let adapter = LoggerAdapter::new();

    let message = Message::new()
        .from("tony.stark@example.com")
        .to("steve.rogers@example.com")
        .bcc("hawk.eye@example.com")
        .subject("Hello, Avengers!")
        .text_body("Hello!");

    let response = adapter.send(&message).await.unwrap();
    assert_eq!(response.provider, "logger");
    assert_eq!(response.statuses(), vec![SendStatus::Queued, SendStatus::Queued]);

    // One send, one message id shared by its recipients
    let ids: Vec<_> = response.results.iter().map(|r| r.message_id.clone()).collect();
    assert!(ids[0].is_some());
    assert_eq!(ids[0], ids[1]);
}

#[tokio::test]
async fn send_with_full_logging() {
    let adapter = LoggerAdapter::full();

    let message = Message::new()
        .from("tony.stark@example.com")
        .to("steve.rogers@example.com")
        .subject("Hello, Avengers!")
        .html_body("<h1>Hello!</h1>")
        .text_body("Hello!");

    let response = adapter.send(&message).await.unwrap();
    assert!(response.all_accepted());
}

#[tokio::test]
async fn every_feature_is_accepted() {
    let adapter = LoggerAdapter::new();

    let message = Message::new()
        .from("tony.stark@example.com")
        .to("steve.rogers@example.com")
        .template_id("welcome")
        .tag("one")
        .tag("two")
        .merge_data("steve.rogers@example.com", "name", "Steve")
        .send_at(chrono::Utc::now());

    let response = adapter
        .send_with_policy(&message, CapabilityPolicy::Strict)
        .await
        .unwrap();
    assert!(response.diagnostics.is_empty());
}

#[tokio::test]
async fn separate_sends_get_separate_ids() {
    let adapter = LoggerAdapter::new();
    let message = Message::new()
        .from("tony.stark@example.com")
        .to("steve.rogers@example.com")
        .text_body("Hello!");

    let first = adapter.send(&message).await.unwrap();
    let second = adapter.send(&message).await.unwrap();
    assert_ne!(first.results[0].message_id, second.results[0].message_id);
}
