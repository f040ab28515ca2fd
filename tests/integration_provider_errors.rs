#![allow(clippy::unwrap_used, clippy::panic, clippy::missing_panics_doc, clippy::must_use_candidate, unreachable_pub)]
use axum::http::StatusCode;
use courier_server::config::{MailBackendKind, SmtpTls};
use serde_json::{Value, json};
use std::net::SocketAddr;
mod common;

fn api_config(endpoint: &str) -> courier_server::config::Config {
    let mut config = common::get_test_config();
    config.api.endpoint = endpoint.to_string();
    config.api.api_key = Some("xkeysib-test".to_string());
    config
}

fn widget_config(endpoint: &str) -> courier_server::config::Config {
    let mut config = common::get_test_config();
    config.mail.backend = MailBackendKind::Widget;
    config.widget.endpoint = endpoint.to_string();
    config.widget.service_id = Some("service_x".to_string());
    config.widget.template_id = Some("template_y".to_string());
    config.widget.public_key = Some("pub_z".to_string());
    config
}

fn smtp_config(relay: SocketAddr) -> courier_server::config::Config {
    let mut config = common::get_test_config();
    config.mail.backend = MailBackendKind::Smtp;
    config.smtp.host = Some(relay.ip().to_string());
    config.smtp.port = Some(relay.port());
    config.smtp.tls = SmtpTls::None;
    config
}

async fn closed_port() -> SocketAddr {
    // Bind then drop to get a port with nothing listening.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

#[tokio::test]
async fn test_transactional_api_receives_rendered_email() {
    let provider = common::MockProvider::spawn(StatusCode::CREATED, json!({"messageId": "<abc@smtp-relay>"})).await;
    let url = common::spawn_server(api_config(&provider.url), None).await;

    let form = common::valid_form().part("images", common::image_part("bin.png", 3));
    let resp = reqwest::Client::new().post(format!("{url}/send-email")).multipart(form).send().await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(provider.request_count(), 1);

    let (headers, payload) = provider.requests.lock().unwrap()[0].clone();
    assert_eq!(headers.get("api-key").unwrap(), "xkeysib-test");
    assert_eq!(payload["sender"], json!({"name": "Form Bot", "email": "bot@example.com"}));
    assert_eq!(payload["to"], json!([{"email": "ops@example.com"}]));
    assert_eq!(payload["subject"], "New Waste Collection Request");
    assert!(payload["htmlContent"].as_str().unwrap().contains("View on map"));
    assert!(payload["textContent"].as_str().unwrap().contains("Name: Asha"));
    assert_eq!(payload["attachment"], json!([{"name": "bin.png", "content": "AAAA"}]));
}

#[tokio::test]
async fn test_provider_rejection_preserves_detail() {
    let detail = json!({"code": "unauthorized", "message": "Key not found"});
    let provider = common::MockProvider::spawn(StatusCode::UNAUTHORIZED, detail.clone()).await;
    let url = common::spawn_server(api_config(&provider.url), None).await;

    let resp = reqwest::Client::new()
        .post(format!("{url}/send-email"))
        .multipart(common::valid_form())
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["reason"], "ProviderError");
    assert_eq!(body["error"], detail);
    assert!(body["message"].as_str().unwrap().contains("401"));
}

#[tokio::test]
async fn test_missing_api_key_never_calls_provider() {
    let provider = common::MockProvider::spawn(StatusCode::CREATED, json!({})).await;
    let mut config = api_config(&provider.url);
    config.api.api_key = None;
    let url = common::spawn_server(config, None).await;

    let resp = reqwest::Client::new()
        .post(format!("{url}/send-email"))
        .multipart(common::valid_form())
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["reason"], "Misconfigured");
    assert_eq!(provider.request_count(), 0);
}

#[tokio::test]
async fn test_unreachable_provider_is_provider_error() {
    let addr = closed_port().await;
    let url = common::spawn_server(api_config(&format!("http://{addr}/v3/smtp/email")), None).await;

    let resp = reqwest::Client::new()
        .post(format!("{url}/send-email"))
        .multipart(common::valid_form())
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["reason"], "ProviderError");
}

#[tokio::test]
async fn test_unreadable_rejection_body_is_provider_error() {
    let endpoint = common::spawn_truncated_http(StatusCode::BAD_GATEWAY).await;
    let url = common::spawn_server(api_config(&endpoint), None).await;

    let resp = reqwest::Client::new()
        .post(format!("{url}/send-email"))
        .multipart(common::valid_form())
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["reason"], "ProviderError");
    assert!(body["message"].as_str().unwrap().contains("502"));
    assert!(!body["error"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_widget_receives_template_params() {
    let provider = common::MockProvider::spawn_widget(StatusCode::OK, "OK").await;
    let url = common::spawn_server(widget_config(&provider.url), None).await;

    let form = common::valid_form().part("images", common::image_part("bin.png", 3));
    let resp = reqwest::Client::new().post(format!("{url}/send-email")).multipart(form).send().await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(provider.request_count(), 1);

    let (_, payload) = provider.requests.lock().unwrap()[0].clone();
    assert_eq!(payload["service_id"], "service_x");
    assert_eq!(payload["template_id"], "template_y");
    assert_eq!(payload["user_id"], "pub_z");
    assert!(payload.get("accessToken").is_none());
    assert_eq!(payload["template_params"]["location"], "12.9716, 77.5946");
    assert_eq!(payload["template_params"]["to_email"], "ops@example.com");
    assert_eq!(payload["template_params"]["attachments"], "bin.png");
}

#[tokio::test]
async fn test_widget_rejection_preserves_text_detail() {
    let provider = common::MockProvider::spawn_widget(StatusCode::BAD_REQUEST, "The Public Key is invalid").await;
    let url = common::spawn_server(widget_config(&provider.url), None).await;

    let resp = reqwest::Client::new()
        .post(format!("{url}/send-email"))
        .multipart(common::valid_form())
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["reason"], "ProviderError");
    assert_eq!(body["error"], "The Public Key is invalid");
    assert!(body["message"].as_str().unwrap().contains("400"));
    assert_eq!(provider.request_count(), 1);
}

#[tokio::test]
async fn test_smtp_relay_delivers_message() {
    let relay = common::MockRelay::spawn().await;
    let url = common::spawn_server(smtp_config(relay.addr), None).await;

    let form = common::valid_form().part("images", common::image_part("bin.png", 3));
    let resp = reqwest::Client::new().post(format!("{url}/send-email")).multipart(form).send().await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(relay.message_count(), 1);
    let raw = relay.messages.lock().unwrap()[0].clone();
    assert!(raw.contains("Subject: New Waste Collection Request"));
    assert!(raw.contains("To: ops@example.com"));
    assert!(raw.contains("bin.png"));
}

#[tokio::test]
async fn test_smtp_relay_rejection_is_provider_error() {
    let relay = common::MockRelay::spawn_with_data_reply("554 5.7.1 Message rejected").await;
    let url = common::spawn_server(smtp_config(relay.addr), None).await;

    let resp = reqwest::Client::new()
        .post(format!("{url}/send-email"))
        .multipart(common::valid_form())
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["reason"], "ProviderError");
    assert_eq!(relay.message_count(), 0);
}

#[tokio::test]
async fn test_smtp_health_checks_relay() {
    let relay = common::MockRelay::spawn().await;
    let url = common::spawn_server(smtp_config(relay.addr), None).await;

    let resp = reqwest::get(format!("{url}/health")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["ok"], true);
    assert_eq!(body["backend"], "smtp");
}

#[tokio::test]
async fn test_smtp_health_fails_when_relay_is_down() {
    let url = common::spawn_server(smtp_config(closed_port().await), None).await;

    let resp = reqwest::get(format!("{url}/health")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["ok"], false);
}
