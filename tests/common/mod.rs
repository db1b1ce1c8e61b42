#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;
use usermanager::{
    build_app,
    config::{AppConfig, JwtConfig, RateLimitConfig},
    mailer::Mailer,
    store::{InMemoryUserStore, UserStore},
    users::model::Role,
    AppState,
};
use uuid::Uuid;

pub const PASSWORD: &str = "Passw0rd!";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Activation { email: String, link: String },
    PasswordReset { email: String, link: String },
}

/// Keeps every message so tests can follow emailed links.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<Sent>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    /// Waits for mail sent from background tasks, up to two seconds.
    pub async fn wait_for(&self, count: usize) -> Vec<Sent> {
        for _ in 0..200 {
            let sent = self.sent();
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.sent()
    }

    pub fn last_reset_token(&self) -> Option<String> {
        self.sent().into_iter().rev().find_map(|m| match m {
            Sent::PasswordReset { link, .. } => link.rsplit('/').next().map(String::from),
            _ => None,
        })
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_activation(&self, email: &str, link: &str) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(Sent::Activation {
            email: email.into(),
            link: link.into(),
        });
        Ok(())
    }

    async fn send_password_reset(&self, email: &str, link: &str) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(Sent::PasswordReset {
            email: email.into(),
            link: link.into(),
        });
        Ok(())
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://unused".into(),
        db_max_connections: 1,
        db_timeout_secs: 1,
        jwt: JwtConfig {
            secret: "integration-test-secret".into(),
            ttl_minutes: 60 * 24,
        },
        reset_ttl_minutes: 60,
        require_activation: false,
        public_base_url: "http://localhost:8080".into(),
        cors_origins: vec![],
        static_dir: None,
        login_rate_limit: RateLimitConfig {
            max_requests: 50,
            window_secs: 60,
        },
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryUserStore>,
    pub mailer: Arc<RecordingMailer>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: AppConfig) -> Self {
        let store = Arc::new(InMemoryUserStore::new());
        let mailer = Arc::new(RecordingMailer::default());
        let state = AppState::from_parts(config, store.clone(), mailer.clone());
        Self {
            router: build_app(state),
            store,
            mailer,
        }
    }

    pub async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(req).await
    }

    /// Registers and returns the created user's id.
    pub async fn register(&self, email: &str, name: &str) -> Uuid {
        let (status, body) = self
            .request(
                Method::POST,
                "/api/auth/register",
                None,
                Some(serde_json::json!({ "email": email, "password": PASSWORD, "name": name })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["user"]["id"].as_str().unwrap().parse().unwrap()
    }

    pub async fn login(&self, email: &str, password: &str) -> (StatusCode, Value) {
        self.request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(serde_json::json!({ "email": email, "password": password })),
        )
        .await
    }

    pub async fn token_for(&self, email: &str) -> String {
        let (status, body) = self.login(email, PASSWORD).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["token"].as_str().unwrap().to_string()
    }

    /// Registers an account, promotes it to admin and logs it in.
    pub async fn admin(&self, email: &str) -> (Uuid, String) {
        let id = self.register(email, "Admin").await;
        self.store.set_role(id, Role::Admin).await.unwrap();
        (id, self.token_for(email).await)
    }
}
