#![allow(dead_code, clippy::unwrap_used, clippy::missing_panics_doc, clippy::must_use_candidate, unreachable_pub)]
use async_trait::async_trait;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use clap::Parser;
use courier_server::AppBuilder;
use courier_server::api::app_router;
use courier_server::config::{Config, MailBackendKind};
use courier_server::domain::message::DeliveryMessage;
use courier_server::services::delivery::{DeliveryError, DeliveryResult, MailBackend};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, Once};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

static INIT: Once = Once::new();

pub fn setup_tracing() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "warn".into())
            .add_directive("courier_server=debug".parse().unwrap())
            .add_directive("tower=warn".parse().unwrap())
            .add_directive("hyper=warn".parse().unwrap())
            .add_directive("reqwest=warn".parse().unwrap());

        tracing_subscriber::fmt().with_env_filter(filter).init();
    });
}

pub fn get_test_config() -> Config {
    let mut config = Config::try_parse_from(["courier-server"]).unwrap();
    config.server.host = "127.0.0.1".to_string();
    config.server.port = 0;
    config.server.trusted_proxies = vec!["127.0.0.1/32".parse().unwrap(), "::1/128".parse().unwrap()];
    config.rate_limit.per_second = 10_000;
    config.rate_limit.burst = 10_000;
    config.mail.from_address = Some("bot@example.com".to_string());
    config.mail.to_address = Some("ops@example.com".to_string());
    config.mail.verify_on_startup = false;
    config
}

/// Captures every message instead of sending it.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    pub sent: Mutex<Vec<DeliveryMessage>>,
    pub health_error: Option<String>,
}

impl RecordingBackend {
    pub fn unhealthy(reason: &str) -> Self {
        Self { health_error: Some(reason.to_string()), ..Self::default() }
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn last_sent(&self) -> DeliveryMessage {
        self.sent.lock().unwrap().last().cloned().expect("no message was delivered")
    }
}

#[async_trait]
impl MailBackend for RecordingBackend {
    fn kind(&self) -> MailBackendKind {
        MailBackendKind::Api
    }

    async fn health_check(&self) -> DeliveryResult {
        match &self.health_error {
            Some(reason) => Err(DeliveryError::provider("Mail backend unreachable", reason.clone())),
            None => Ok(()),
        }
    }

    async fn deliver(&self, message: &DeliveryMessage) -> DeliveryResult {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

pub struct TestApp {
    pub server_url: String,
    pub client: reqwest::Client,
    pub config: Config,
    pub backend: Arc<RecordingBackend>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_config(get_test_config()).await
    }

    pub async fn spawn_with_config(config: Config) -> Self {
        Self::spawn_with(config, RecordingBackend::default()).await
    }

    pub async fn spawn_with(config: Config, backend: RecordingBackend) -> Self {
        let backend = Arc::new(backend);
        let server_url = spawn_server(config.clone(), Some(Arc::clone(&backend) as Arc<dyn MailBackend>)).await;
        Self { server_url, client: reqwest::Client::new(), config, backend }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.server_url)
    }
}

/// Serves the real router on an ephemeral port. Without an override the configured backend is built.
pub async fn spawn_server(config: Config, backend: Option<Arc<dyn MailBackend>>) -> String {
    setup_tracing();

    let mut builder = AppBuilder::new(config.clone());
    if let Some(backend) = backend {
        builder = builder.with_mail_backend(backend);
    }
    let app = builder.build().unwrap();
    let router = app_router(config, app.services).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>()).await.unwrap();
    });

    format!("http://{addr}")
}

/// A stand-in for an HTTP mail provider that answers every send with a fixed response.
pub struct MockProvider {
    pub url: String,
    pub requests: Arc<Mutex<Vec<(HeaderMap, Value)>>>,
}

impl MockProvider {
    /// Transactional API endpoint replying with a JSON body.
    pub async fn spawn(status: StatusCode, body: Value) -> Self {
        Self::spawn_at("/v3/smtp/email", status, "application/json", body.to_string()).await
    }

    /// Widget endpoint replying with a plain text body.
    pub async fn spawn_widget(status: StatusCode, body: &str) -> Self {
        Self::spawn_at("/api/v1.0/email/send", status, "text/plain", body.to_string()).await
    }

    async fn spawn_at(path: &str, status: StatusCode, content_type: &'static str, body: String) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&requests);

        let router = Router::new().route(
            path,
            post(move |headers: HeaderMap, Json(payload): Json<Value>| {
                let captured = Arc::clone(&captured);
                let body = body.clone();
                async move {
                    captured.lock().unwrap().push((headers, payload));
                    (status, [(CONTENT_TYPE, content_type)], body)
                }
            }),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self { url: format!("http://{addr}{path}"), requests }
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

pub fn valid_fields() -> Vec<(&'static str, &'static str)> {
    vec![
        ("name", "Asha"),
        ("contactNumber", "9876543210"),
        ("area", "Indiranagar"),
        ("locality", "12th Main"),
        ("wasteType", "Plastic"),
        ("wasteAmount", "2 bags"),
        ("location", r#"{"lat":12.9716,"lng":77.5946}"#),
    ]
}

pub fn valid_form() -> reqwest::multipart::Form {
    valid_fields().into_iter().fold(reqwest::multipart::Form::new(), |form, (k, v)| form.text(k, v))
}

pub fn image_part(name: &str, size: usize) -> reqwest::multipart::Part {
    reqwest::multipart::Part::bytes(vec![0u8; size]).file_name(name.to_string()).mime_str("image/png").unwrap()
}

/// An HTTP endpoint that reads the request, then sends a status line and a body shorter than
/// its declared length before closing the connection.
pub async fn spawn_truncated_http(status: StatusCode) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            read_http_request(&mut stream).await;
            let head = format!(
                "HTTP/1.1 {} {}\r\ncontent-type: text/plain\r\ncontent-length: 100\r\n\r\npartial",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Error")
            );
            let _ = stream.write_all(head.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
    });
    format!("http://{addr}/v3/smtp/email")
}

async fn read_http_request(stream: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&chunk[..n]);
        let Some(head_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else { continue };
        let head = String::from_utf8_lossy(&buf[..head_end]).to_ascii_lowercase();
        let length = head
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if buf.len() >= head_end + 4 + length {
            return;
        }
    }
}

/// A minimal SMTP relay speaking just enough of the protocol for lettre's plaintext transport.
pub struct MockRelay {
    pub addr: SocketAddr,
    pub messages: Arc<Mutex<Vec<String>>>,
}

impl MockRelay {
    /// Accepts every message.
    pub async fn spawn() -> Self {
        Self::spawn_with_data_reply("250 2.0.0 Ok: queued").await
    }

    /// Answers the end of DATA with `reply`, e.g. a 5xx rejection.
    pub async fn spawn_with_data_reply(reply: &'static str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let messages = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&messages);

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve_smtp(stream, reply, Arc::clone(&captured)));
            }
        });

        Self { addr, messages }
    }

    pub fn message_count(&self) -> usize {
        self.messages.lock().unwrap().len()
    }
}

async fn serve_smtp(stream: TcpStream, data_reply: &'static str, messages: Arc<Mutex<Vec<String>>>) {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();
    if write.write_all(b"220 relay.test ESMTP\r\n").await.is_err() {
        return;
    }

    let mut data: Option<String> = None;
    while let Ok(Some(line)) = lines.next_line().await {
        let reply = if let Some(body) = data.as_mut() {
            if line != "." {
                body.push_str(&line);
                body.push('\n');
                continue;
            }
            let body = data.take().unwrap_or_default();
            if data_reply.starts_with('2') {
                messages.lock().unwrap().push(body);
            }
            format!("{data_reply}\r\n")
        } else {
            let command = line.to_ascii_uppercase();
            if command.starts_with("EHLO") || command.starts_with("HELO") {
                "250-relay.test\r\n250 8BITMIME\r\n".to_string()
            } else if command.starts_with("DATA") {
                data = Some(String::new());
                "354 End data with <CR><LF>.<CR><LF>\r\n".to_string()
            } else if command.starts_with("QUIT") {
                let _ = write.write_all(b"221 2.0.0 Bye\r\n").await;
                return;
            } else {
                "250 2.0.0 Ok\r\n".to_string()
            }
        };
        if write.write_all(reply.as_bytes()).await.is_err() {
            return;
        }
    }
}
