mod common;

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use common::TestHarness;
use peekai_backend::provider::MockProvider;
use peekai_backend::usage::tier::Tier;
use serde_json::json;

#[tokio::test]
async fn test_ask_requires_bearer_token() {
    let harness = TestHarness::new().await;
    let (status, body) = harness
        .send_json(Method::POST, "/ask", None, Some(json!({"question": "hi"})))
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Authentication failed");
    assert_eq!(harness.provider.call_count(), 0);
}

#[tokio::test]
async fn test_ask_returns_answer_and_records_call() {
    let harness = TestHarness::with_provider(MockProvider::with_answer("Forty-two")).await;
    harness.create_profile("alice", Tier::Free).await;

    let (status, body) = harness
        .send_json(
            Method::POST,
            "/ask",
            Some("alice"),
            Some(json!({
                "question": "What is the answer?",
                "context": {"pageTitle": "Guide", "selectedText": "life"}
            })),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["answer"], "Forty-two");
    assert_eq!(body["model"], "openai/gpt-3.5-turbo");
    assert_eq!(body["tokensUsed"], 15);
    assert!(body["responseTimeMs"].as_i64().unwrap() >= 0);

    let profile = harness.profile("alice").await;
    assert_eq!(profile.daily_usage, 1);
    assert_eq!(profile.monthly_usage, 1);
    assert_eq!(harness.history_count("alice").await, 1);

    let prompt = &harness.provider.last_request().unwrap().messages[1].content;
    assert!(prompt.contains("Page: Guide"));
    assert!(prompt.contains("Selected text: \"life\""));
    assert!(prompt.ends_with("Question: What is the answer?"));
}

#[tokio::test]
async fn test_ask_at_daily_limit_is_rejected_with_429() {
    let harness = TestHarness::new().await;
    let today = Utc::now().date_naive();
    harness
        .create_profile_with_usage("alice", Tier::Free, 9, 9, today)
        .await;

    let request = Some(json!({"question": "one more"}));
    let (status, _) = harness
        .send_json(Method::POST, "/ask", Some("alice"), request.clone())
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = harness
        .send_json(Method::POST, "/ask", Some("alice"), request)
        .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "Quota exceeded");

    let profile = harness.profile("alice").await;
    assert_eq!(profile.daily_usage, 10);
    assert_eq!(harness.provider.call_count(), 1);
    assert_eq!(harness.history_count("alice").await, 1);
}

#[tokio::test]
async fn test_new_day_resets_counter_before_gating() {
    let harness = TestHarness::new().await;
    let yesterday = Utc::now().date_naive() - Duration::days(1);
    harness
        .create_profile_with_usage("alice", Tier::Free, 10, 40, yesterday)
        .await;

    let (status, _) = harness
        .send_json(Method::POST, "/ask", Some("alice"), Some(json!({"question": "q"})))
        .await;
    assert_eq!(status, StatusCode::OK);

    let profile = harness.profile("alice").await;
    assert_eq!(profile.daily_usage, 1);
    assert_eq!(profile.monthly_usage, 41);
    assert_eq!(profile.last_reset_date, Utc::now().date_naive());
}

#[tokio::test]
async fn test_provider_failure_is_internal_error_without_commit() {
    let harness = TestHarness::with_provider(MockProvider::with_status(502)).await;
    harness.create_profile("alice", Tier::Premium).await;

    let (status, body) = harness
        .send_json(Method::POST, "/ask", Some("alice"), Some(json!({"question": "q"})))
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Internal server error");
    assert_eq!(harness.profile("alice").await.daily_usage, 0);
    assert_eq!(harness.history_count("alice").await, 0);
}

#[tokio::test]
async fn test_ask_without_profile_is_not_found() {
    let harness = TestHarness::new().await;
    let (status, _) = harness
        .send_json(Method::POST, "/ask", Some("ghost"), Some(json!({"question": "q"})))
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(harness.provider.call_count(), 0);
}

#[tokio::test]
async fn test_model_override_and_tier_default() {
    let harness = TestHarness::new().await;
    harness.create_profile("premium", Tier::Premium).await;

    let (_, body) = harness
        .send_json(Method::POST, "/ask", Some("premium"), Some(json!({"question": "q"})))
        .await;
    assert_eq!(body["model"], "anthropic/claude-3-opus");

    let (_, body) = harness
        .send_json(
            Method::POST,
            "/ask",
            Some("premium"),
            Some(json!({"question": "q", "model": "mistralai/mistral-7b"})),
        )
        .await;
    assert_eq!(body["model"], "mistralai/mistral-7b");
    assert_eq!(
        harness.provider.last_request().unwrap().model,
        "mistralai/mistral-7b"
    );
}
