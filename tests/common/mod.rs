//! Shared harness: the full router over the in-memory store, a manual clock
//! and a mailer that records what it was asked to send.
#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use bytes::Bytes;
use http_body_util::BodyExt;
use incident_desk::app::{self, Stores};
use incident_desk::clock::ManualClock;
use incident_desk::config::Config;
use incident_desk::db::MemoryStore;
use incident_desk::notify::{EmailMessage, Mailer};
use incident_desk::{AppError, Result};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

pub const ADMIN_EMAIL: &str = "ceo@example.com";
pub const PASSWORD: &str = "correct horse battery";

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<EmailMessage>>,
    attempts: AtomicUsize,
    fail: bool,
}

impl RecordingMailer {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub async fn wait_for_attempts(&self, count: usize) {
        for _ in 0..400 {
            if self.attempts() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("expected {} send attempts, saw {}", count, self.attempts());
    }

    /// Wait for `count` attempts, then give stragglers a chance to show up
    pub async fn settle(&self, count: usize) {
        self.wait_for_attempts(count).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().unwrap().push(message.clone());
        if self.fail {
            return Err(AppError::DeliveryFailed("mail API unavailable".to_string()));
        }
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub clock: ManualClock,
    pub mailer: Arc<RecordingMailer>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.auth.jwt_secret = "integration-test-secret-at-least-32-chars".to_string();
    config.auth.admin_emails = vec![ADMIN_EMAIL.to_string()];
    config.notifications.alert_recipients = vec!["ops@example.com".to_string()];
    config.notifications.contact_recipient = "support@example.com".to_string();
    config.notifications.max_attempts = 1;
    config.notifications.retry_backoff_ms = 1;
    config
}

impl TestApp {
    pub fn new() -> Self {
        Self::with(test_config(), RecordingMailer::default())
    }

    pub fn with(config: Config, mailer: RecordingMailer) -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = ManualClock::default();
        let mailer = Arc::new(mailer);

        let application = app::build(
            &config,
            Stores::from_shared(store.clone()),
            mailer.clone(),
            Arc::new(clock.clone()),
        )
        .unwrap();

        Self {
            router: application.router,
            store,
            clock,
            mailer,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
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

    pub async fn register(&self, email: &str) -> Value {
        let response = self
            .request(
                Method::POST,
                "/users/create-user",
                None,
                Some(json!({
                    "email": email,
                    "name": email.split('@').next().unwrap(),
                    "password": PASSWORD,
                    "company": "Acme",
                })),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.text());
        response.json()
    }

    pub async fn login_with(&self, email: &str, password: &str) -> TestResponse {
        let form = format!(
            "username={}&password={}",
            email.replace('@', "%40"),
            password.replace(' ', "+")
        );
        self.send(
            Request::builder()
                .method(Method::POST)
                .uri("/auth/login")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form))
                .unwrap(),
        )
        .await
    }

    /// Register and log in, returning the user id and bearer token
    pub async fn signed_in(&self, email: &str) -> (String, String) {
        let user = self.register(email).await;
        let response = self.login_with(email, PASSWORD).await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.text());
        (
            user["id"].as_str().unwrap().to_string(),
            response.json()["access_token"].as_str().unwrap().to_string(),
        )
    }

    pub async fn create_incident(&self, token: &str, title: &str) -> Value {
        let response = self
            .request(
                Method::POST,
                "/incidents/create-incident",
                Some(token),
                Some(json!({
                    "title": title,
                    "description": "Details of the problem",
                    "priority": "CRITICAL",
                    "category": "SECURITY",
                })),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.text());
        response.json()
    }
}

/// Pull the six-digit code out of the last reset email
pub fn last_code(mailer: &RecordingMailer) -> String {
    let body = mailer.sent().last().unwrap().html_body.clone();
    body.split("<h3>")
        .nth(1)
        .and_then(|rest| rest.split("</h3>").next())
        .unwrap()
        .to_string()
}
