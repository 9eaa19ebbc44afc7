mod common;

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use common::{get_with_bearer, json_request, TestApp};
use dreamvault_server::auth::{MemoryRefreshStore, RefreshStore, TokenDigest};
use dreamvault_server::error::StoreError;

/// Refresh store whose rotation always hits a database failure.
struct FailingRotation(Arc<MemoryRefreshStore>);

#[async_trait]
impl RefreshStore for FailingRotation {
    async fn put(
        &self,
        user_id: Uuid,
        digest: &TokenDigest,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.0.put(user_id, digest, expires_at).await
    }

    async fn get(&self, user_id: Uuid) -> Result<Option<TokenDigest>, StoreError> {
        self.0.get(user_id).await
    }

    async fn clear(&self, user_id: Uuid) -> Result<(), StoreError> {
        self.0.clear(user_id).await
    }

    async fn clear_if_current(
        &self,
        user_id: Uuid,
        current: &TokenDigest,
    ) -> Result<bool, StoreError> {
        self.0.clear_if_current(user_id, current).await
    }

    async fn rotate(
        &self,
        _user_id: Uuid,
        _current: &TokenDigest,
        _next: &TokenDigest,
        _expires_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }
}

fn post_with_cookie(uri: &str, cookie: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let app = TestApp::new();
    let reply = app
        .call(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await;
    assert_eq!(reply.status, StatusCode::OK);
}

#[tokio::test]
async fn signup_sets_session_cookies() {
    let app = TestApp::new();
    let reply = app.signup("dreamer@example.com", "Dreamer").await;

    let refresh = reply.data_str("refreshToken");
    let access = reply.data_str("accessToken");
    assert!(!refresh.is_empty());
    assert!(!access.is_empty());
    assert_eq!(reply.cookie("refreshToken"), Some(refresh));
    assert_eq!(reply.cookie("accessToken"), Some(access));

    let raw = reply.raw_cookie("refreshToken").unwrap();
    assert!(raw.contains("HttpOnly"));
    assert!(raw.contains("SameSite=Lax"));
    assert!(raw.contains("Path=/"));
    assert!(!reply.raw_cookie("accessToken").unwrap().contains("HttpOnly"));
}

#[tokio::test]
async fn signup_rejects_invalid_and_duplicate() {
    let app = TestApp::new();

    let invalid = app
        .post_json(
            "/api/auth/signup",
            json!({ "email": "nope", "password": "short", "displayName": "" }),
        )
        .await;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);
    assert_eq!(invalid.code(), "validation_error");

    app.signup("dreamer@example.com", "Dreamer").await;
    let duplicate = app
        .post_json(
            "/api/auth/signup",
            json!({
                "email": "Dreamer@Example.com",
                "password": common::PASSWORD,
                "displayName": "Again"
            }),
        )
        .await;
    assert_eq!(duplicate.status, StatusCode::BAD_REQUEST);
    assert_eq!(duplicate.code(), "duplicate_account");
}

#[tokio::test]
async fn login_failures_look_the_same() {
    let app = TestApp::new();
    app.seed_user("dreamer@example.com", false).await;

    let wrong_password = app
        .post_json(
            "/api/auth/login",
            json!({ "email": "dreamer@example.com", "password": "not it at all" }),
        )
        .await;
    let unknown_email = app.login("ghost@example.com").await;

    assert_eq!(wrong_password.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password.body, unknown_email.body);
    assert!(wrong_password.cookies.is_empty());
}

#[tokio::test]
async fn expired_access_token_recovers_through_refresh() {
    let app = TestApp::new();
    app.seed_user("a@example.com", false).await;

    let login = app.login("a@example.com").await;
    assert_eq!(login.status, StatusCode::OK);
    let at1 = login.data_str("accessToken");
    let rt1 = login.data_str("refreshToken");

    app.clock.advance(Duration::seconds(901));

    let expired = app.call(get_with_bearer("/api/users/me", &at1)).await;
    assert_eq!(expired.status, StatusCode::UNAUTHORIZED);
    assert_eq!(expired.code(), "expired_token");

    let refreshed = app
        .call(
            Request::builder()
                .method("POST")
                .uri("/api/auth/refresh")
                .header(header::COOKIE, format!("refreshToken={rt1}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(refreshed.status, StatusCode::OK);
    let at2 = refreshed.data_str("accessToken");
    let rt2 = refreshed.data_str("refreshToken");
    assert_ne!(rt1, rt2);
    assert_eq!(refreshed.cookie("refreshToken"), Some(rt2.clone()));

    let replay = app
        .post_json("/api/auth/refresh", json!({ "refreshToken": rt1 }))
        .await;
    assert_eq!(replay.status, StatusCode::UNAUTHORIZED);
    assert_eq!(replay.code(), "invalid_refresh_token");
    assert_eq!(replay.cookie("refreshToken"), Some(String::new()));

    let retried = app.call(get_with_bearer("/api/users/me", &at2)).await;
    assert_eq!(retried.status, StatusCode::OK);
    assert_eq!(retried.data_str("email"), "a@example.com");
}

#[tokio::test]
async fn refresh_without_credential_is_unauthenticated() {
    let app = TestApp::new();
    let reply = app
        .call(
            Request::builder()
                .method("POST")
                .uri("/api/auth/refresh")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.code(), "unauthenticated");
}

#[tokio::test]
async fn logout_invalidates_refresh_token() {
    let app = TestApp::new();
    let session = app.signup("dreamer@example.com", "Dreamer").await;
    let access = session.data_str("accessToken");
    let refresh = session.data_str("refreshToken");

    let logout = app
        .call(
            Request::builder()
                .method("POST")
                .uri("/api/auth/logout")
                .header(header::AUTHORIZATION, format!("Bearer {access}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(logout.status, StatusCode::OK);
    assert_eq!(logout.cookie("refreshToken"), Some(String::new()));
    assert!(app.store.is_empty());

    let reply = app
        .post_json("/api/auth/refresh", json!({ "refreshToken": refresh }))
        .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.code(), "invalid_refresh_token");
}

#[tokio::test]
async fn logout_with_expired_access_uses_refresh_cookie() {
    let app = TestApp::new();
    let session = app.signup("dreamer@example.com", "Dreamer").await;
    let access = session.data_str("accessToken");
    let refresh = session.data_str("refreshToken");

    app.clock.advance(Duration::seconds(901));

    let mut logout = post_with_cookie("/api/auth/logout", format!("refreshToken={refresh}"));
    logout.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Bearer {access}").parse().unwrap(),
    );
    let reply = app.call(logout).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(app.store.is_empty());

    let after = app
        .call(post_with_cookie("/api/auth/refresh", format!("refreshToken={refresh}")))
        .await;
    assert_eq!(after.status, StatusCode::UNAUTHORIZED);
    assert_eq!(after.code(), "invalid_refresh_token");
}

#[tokio::test]
async fn logout_by_body_token_for_mobile_clients() {
    let app = TestApp::new();
    let session = app.signup("dreamer@example.com", "Dreamer").await;
    let refresh = session.data_str("refreshToken");

    let reply = app
        .post_json("/api/auth/logout", json!({ "refreshToken": refresh }))
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(app.store.is_empty());
}

#[tokio::test]
async fn stale_cookie_logout_keeps_newer_session() {
    let app = TestApp::new();
    let first = app.signup("dreamer@example.com", "Dreamer").await;
    let second = app.login("dreamer@example.com").await;

    let reply = app
        .call(post_with_cookie(
            "/api/auth/logout",
            format!("refreshToken={}", first.data_str("refreshToken")),
        ))
        .await;
    assert_eq!(reply.status, StatusCode::OK);

    let refreshed = app
        .post_json(
            "/api/auth/refresh",
            json!({ "refreshToken": second.data_str("refreshToken") }),
        )
        .await;
    assert_eq!(refreshed.status, StatusCode::OK);
}

#[tokio::test]
async fn refresh_outage_keeps_session_cookies() {
    let app = TestApp::with_refresh_store(|memory| {
        Arc::new(FailingRotation(memory)) as Arc<dyn RefreshStore>
    });
    let session = app.signup("dreamer@example.com", "Dreamer").await;
    let refresh = session.data_str("refreshToken");

    let reply = app
        .call(post_with_cookie("/api/auth/refresh", format!("refreshToken={refresh}")))
        .await;

    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(reply.code(), "internal_error");
    assert!(reply.cookies.is_empty());
    assert!(!app.store.is_empty());
}

#[tokio::test]
async fn logout_without_session_still_succeeds() {
    let app = TestApp::new();
    let reply = app
        .call(
            Request::builder()
                .method("POST")
                .uri("/api/auth/logout")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["success"], true);
}

#[tokio::test]
async fn bearer_takes_precedence_over_cookie() {
    let app = TestApp::new();
    let alice = app.signup("alice@example.com", "Alice").await;
    let bob = app.signup("bob@example.com", "Bob").await;

    let reply = app
        .call(
            Request::builder()
                .uri("/api/users/me")
                .header(
                    header::AUTHORIZATION,
                    format!("Bearer {}", alice.data_str("accessToken")),
                )
                .header(
                    header::COOKIE,
                    format!("refreshToken={}", bob.data_str("refreshToken")),
                )
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.data_str("email"), "alice@example.com");
}

#[tokio::test]
async fn refresh_cookie_authenticates_profile_read() {
    let app = TestApp::new();
    let session = app.signup("dreamer@example.com", "Dreamer").await;

    let reply = app
        .call(
            Request::builder()
                .uri("/api/users/me")
                .header(
                    header::COOKIE,
                    format!("refreshToken={}", session.data_str("refreshToken")),
                )
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.data_str("displayName"), "Dreamer");
}

#[tokio::test]
async fn access_token_is_not_a_refresh_token() {
    let app = TestApp::new();
    let session = app.signup("dreamer@example.com", "Dreamer").await;

    let reply = app
        .post_json(
            "/api/auth/refresh",
            json!({ "refreshToken": session.data_str("accessToken") }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.code(), "invalid_refresh_token");
}

#[tokio::test]
async fn admin_flag_applies_on_next_request() {
    let app = TestApp::new();
    let admin_id = app.seed_user("root@example.com", true).await;
    let member_id = app.seed_user("member@example.com", false).await;

    let admin = app.login("root@example.com").await.data_str("accessToken");
    let member = app.login("member@example.com").await.data_str("accessToken");
    let target = format!("/api/admin/users/{admin_id}");

    let denied = app.call(get_with_bearer(&target, &member)).await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);
    assert_eq!(denied.code(), "forbidden");

    let mut promote = json_request(
        "PUT",
        &format!("/api/admin/users/{member_id}/admin"),
        json!({ "isAdmin": true }),
    );
    promote.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Bearer {admin}").parse().unwrap(),
    );
    let promoted = app.call(promote).await;
    assert_eq!(promoted.status, StatusCode::OK);
    assert_eq!(promoted.data("isAdmin"), true);

    // Same token as before; only the directory changed.
    let allowed = app.call(get_with_bearer(&target, &member)).await;
    assert_eq!(allowed.status, StatusCode::OK);
    assert_eq!(allowed.data_str("email"), "root@example.com");
}

#[tokio::test]
async fn admin_revoke_ends_refresh() {
    let app = TestApp::new();
    app.seed_user("root@example.com", true).await;
    let member_id = app.seed_user("member@example.com", false).await;

    let admin = app.login("root@example.com").await.data_str("accessToken");
    let member = app.login("member@example.com").await;

    let mut revoke = Request::builder()
        .method("POST")
        .uri(format!("/api/admin/users/{member_id}/revoke"))
        .body(Body::empty())
        .unwrap();
    revoke.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Bearer {admin}").parse().unwrap(),
    );
    assert_eq!(app.call(revoke).await.status, StatusCode::OK);

    let reply = app
        .post_json(
            "/api/auth/refresh",
            json!({ "refreshToken": member.data_str("refreshToken") }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unauthenticated_admin_call_is_rejected() {
    let app = TestApp::new();
    let id = app.seed_user("member@example.com", false).await;
    let reply = app
        .call(
            Request::builder()
                .uri(format!("/api/admin/users/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.code(), "unauthenticated");
}

#[tokio::test]
async fn social_exchange_onboards_then_signs_in() {
    let app = TestApp::new();

    let first = app
        .post_json("/api/auth/social", json!({ "providerToken": "live-token" }))
        .await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.data("needsOnboarding"), true);
    assert_eq!(first.data_str("email"), "newcomer@example.com");
    assert_eq!(first.data_str("displayName"), "New Dreamer");
    assert!(first.data("accessToken").is_null());
    assert!(first.cookies.is_empty());
    assert!(app.store.is_empty());

    let completed = app
        .post_json(
            "/api/auth/social/complete",
            json!({ "providerToken": "live-token", "displayName": "Newcomer" }),
        )
        .await;
    assert_eq!(completed.status, StatusCode::OK);
    assert!(!completed.data_str("accessToken").is_empty());

    let replay = app
        .post_json("/api/auth/social", json!({ "providerToken": "live-token" }))
        .await;
    assert_eq!(replay.status, StatusCode::OK);
    assert_eq!(replay.data("needsOnboarding"), false);
    assert!(!replay.data_str("refreshToken").is_empty());
    assert!(replay.cookie("refreshToken").is_some());
}

#[tokio::test]
async fn social_exchange_rejects_dead_provider_token() {
    let app = TestApp::new();
    let reply = app
        .post_json("/api/auth/social", json!({ "providerToken": "expired-token" }))
        .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.code(), "invalid_provider_token");
}
