#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use chrono::{TimeZone, Utc};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use dreamvault_server::auth::{
    ManualClock, MemoryRefreshStore, ProviderError, ProviderIdentity, RefreshStore,
    SocialProvider,
};
use dreamvault_server::config::AuthConfig;
use dreamvault_server::models::NewUser;
use dreamvault_server::services::{MemoryUserDirectory, UserDirectory};
use dreamvault_server::{app, AppState};

pub const SECRET: &str = "integration-test-secret-0123456789abcdef";
pub const PASSWORD: &str = "correct horse battery";

/// Provider that knows a fixed set of live tokens.
pub struct FakeProvider;

#[async_trait]
impl SocialProvider for FakeProvider {
    async fn verify(&self, provider_token: &str) -> Result<ProviderIdentity, ProviderError> {
        match provider_token {
            "live-token" => Ok(ProviderIdentity {
                subject: "provider-sub-1".into(),
                email: "newcomer@example.com".into(),
                name: Some("New Dreamer".into()),
            }),
            _ => Err(ProviderError::Rejected),
        }
    }
}

pub struct TestApp {
    pub router: Router,
    pub clock: Arc<ManualClock>,
    pub users: Arc<MemoryUserDirectory>,
    pub store: Arc<MemoryRefreshStore>,
}

/// A parsed response: status, body JSON and the raw `set-cookie` values.
pub struct Reply {
    pub status: StatusCode,
    pub body: Value,
    pub cookies: Vec<String>,
}

impl Reply {
    /// Value of the named cookie as set by the response, if any.
    pub fn cookie(&self, name: &str) -> Option<String> {
        let prefix = format!("{name}=");
        self.cookies.iter().find_map(|c| {
            c.strip_prefix(&prefix)
                .map(|rest| rest.split(';').next().unwrap_or("").to_string())
        })
    }

    pub fn raw_cookie(&self, name: &str) -> Option<&str> {
        let prefix = format!("{name}=");
        self.cookies
            .iter()
            .find(|c| c.starts_with(&prefix))
            .map(String::as_str)
    }

    pub fn data(&self, field: &str) -> &Value {
        &self.body["data"][field]
    }

    pub fn data_str(&self, field: &str) -> String {
        self.data(field).as_str().unwrap_or_default().to_string()
    }

    pub fn code(&self) -> &str {
        self.body["code"].as_str().unwrap_or_default()
    }
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_refresh_store(|memory| memory as Arc<dyn RefreshStore>)
    }

    /// Builds the app over a refresh store derived from the in-memory one,
    /// e.g. a wrapper that injects failures.
    pub fn with_refresh_store<F>(wrap: F) -> Self
    where
        F: FnOnce(Arc<MemoryRefreshStore>) -> Arc<dyn RefreshStore>,
    {
        let mut config = AuthConfig::new(SECRET);
        config.cookie_secure = false;

        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap(),
        ));
        let users = Arc::new(MemoryUserDirectory::new());
        let store = Arc::new(MemoryRefreshStore::new());

        let state = AppState::new(
            &config,
            clock.clone(),
            wrap(store.clone()),
            users.clone(),
            Arc::new(FakeProvider),
        );

        Self {
            router: app(state),
            clock,
            users,
            store,
        }
    }

    pub async fn call(&self, request: Request<Body>) -> Reply {
        let response = self.router.clone().oneshot(request).await.unwrap();
        read(response).await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> Reply {
        self.call(json_request("POST", uri, body)).await
    }

    pub async fn signup(&self, email: &str, name: &str) -> Reply {
        let reply = self
            .post_json(
                "/api/auth/signup",
                serde_json::json!({ "email": email, "password": PASSWORD, "displayName": name }),
            )
            .await;
        assert_eq!(reply.status, StatusCode::OK, "signup failed: {}", reply.body);
        reply
    }

    pub async fn login(&self, email: &str) -> Reply {
        self.post_json(
            "/api/auth/login",
            serde_json::json!({ "email": email, "password": PASSWORD }),
        )
        .await
    }

    /// Creates an account directly in the directory, optionally as admin.
    pub async fn seed_user(&self, email: &str, is_admin: bool) -> Uuid {
        let user = self
            .users
            .create(NewUser {
                email: email.into(),
                display_name: email.split('@').next().unwrap().into(),
                password: Some(PASSWORD.into()),
            })
            .await
            .unwrap();
        if is_admin {
            assert!(self.users.set_admin(user.id, true).await.unwrap());
        }
        user.id
    }
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get_with_bearer(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

pub async fn read(response: Response<Body>) -> Reply {
    let status = response.status();
    let cookies = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };

    Reply {
        status,
        body,
        cookies,
    }
}
