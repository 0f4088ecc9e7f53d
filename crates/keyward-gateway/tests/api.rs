//! End-to-end tests of the HTTP API against the in-memory store.

use std::sync::Arc;

use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderValue, StatusCode};
use axum_test::{TestResponse, TestServer};
use serde_json::{json, Value};
use url::Url;

use keyward_accounts::{AccountManager, AccountsConfig, RecordingMailer};
use keyward_auth::{
    JwtConfig, JwtService, OAuthConfig, OAuthManager, ProviderCredentials,
};
use keyward_gateway::{create_router, GatewayConfig, GatewayState};
use keyward_store::MemoryStore;

const SECRET: &str = "0123456789abcdef0123456789abcdef";

struct Harness {
    server: TestServer,
    mailer: Arc<RecordingMailer>,
}

fn setup(accounts: AccountsConfig) -> Harness {
    setup_with(accounts, GatewayConfig::default())
}

fn setup_with(accounts: AccountsConfig, gateway: GatewayConfig) -> Harness {
    let jwt = Arc::new(
        JwtService::new(JwtConfig {
            secret: Some(SECRET.to_string()),
            ..JwtConfig::default()
        })
        .unwrap(),
    );
    let mailer = Arc::new(RecordingMailer::new());
    let manager = Arc::new(AccountManager::new(
        Arc::new(MemoryStore::new()),
        Arc::clone(&mailer),
        Arc::clone(&jwt),
        accounts,
    ));
    let oauth = Arc::new(
        OAuthManager::new(OAuthConfig {
            github: Some(ProviderCredentials {
                client_id: "github-client".to_string(),
                client_secret: "github-secret".to_string(),
                endpoints: None,
                scopes: None,
            }),
            ..OAuthConfig::default()
        })
        .unwrap(),
    );

    let jwks = jwt.jwks();
    let state = GatewayState::new(manager, jwt, oauth, jwks, gateway);
    Harness {
        server: TestServer::new(create_router(state)).unwrap(),
        mailer,
    }
}

fn auto_activate() -> AccountsConfig {
    AccountsConfig {
        auto_activate_new_users: true,
        ..AccountsConfig::default()
    }
}

fn bearer(token: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {token}")).unwrap()
}

fn query_param(link: &str, key: &str) -> Option<String> {
    Url::parse(link)
        .unwrap()
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

fn location(response: &TestResponse) -> String {
    response.header("location").to_str().unwrap().to_string()
}

/// The query parameter `key` of the last link mailed to `to`.
fn mailed_param(h: &Harness, to: &str, key: &str) -> String {
    let mail = h.mailer.last_to(to).unwrap();
    query_param(mail.template.link().unwrap(), key).unwrap()
}

async fn register(h: &Harness, email: &str, password: &str) -> Value {
    let response = h
        .server
        .post("/auth/register")
        .json(&json!({ "email": email, "password": password }))
        .await;
    response.assert_status_ok();
    response.json::<Value>()
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn health_check() {
    let h = setup(AccountsConfig::default());
    let response = h.server.get("/healthz").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "healthy");
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let h = setup_with(
        auto_activate(),
        GatewayConfig {
            max_body_bytes: 64,
            ..GatewayConfig::default()
        },
    );
    let response = h
        .server
        .post("/auth/register")
        .json(&json!({ "email": "ada@example.com", "password": "x".repeat(256) }))
        .await;
    response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
    assert!(h.mailer.sent().is_empty());
}

#[tokio::test]
async fn cors_headers_are_applied() {
    let h = setup(AccountsConfig::default());
    let response = h
        .server
        .get("/healthz")
        .add_header(
            axum::http::header::ORIGIN,
            HeaderValue::from_static("https://app.example.com"),
        )
        .await;
    response.assert_status_ok();
    assert_eq!(response.header("access-control-allow-origin"), "*");
}

// =============================================================================
// Registration and sign-in
// =============================================================================

#[tokio::test]
async fn register_login_and_read_user() {
    let h = setup(auto_activate());
    let session = register(&h, "ada@example.com", "correct horse").await;
    assert!(session["jwt_token"].is_string());
    assert!(session["refresh_token"].is_string());

    let response = h
        .server
        .post("/auth/login")
        .json(&json!({ "email": "ada@example.com", "password": "correct horse" }))
        .await;
    response.assert_status_ok();
    let session = response.json::<Value>();

    let response = h
        .server
        .get("/auth/user")
        .add_header(AUTHORIZATION, bearer(session["jwt_token"].as_str().unwrap()))
        .await;
    response.assert_status_ok();
    let info = response.json::<Value>();
    assert_eq!(info["email"], "ada@example.com");
    assert_eq!(info["default_role"], "user");
    assert_eq!(info["has_password"], true);
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let h = setup(auto_activate());
    register(&h, "ada@example.com", "correct horse").await;

    let response = h
        .server
        .post("/auth/register")
        .json(&json!({ "email": "ADA@example.com", "password": "another" }))
        .await;
    response.assert_status(StatusCode::CONFLICT);
    assert_eq!(response.json::<Value>()["error"]["code"], "conflict");
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let h = setup(auto_activate());
    register(&h, "ada@example.com", "correct horse").await;

    let response = h
        .server
        .post("/auth/login")
        .json(&json!({ "email": "ada@example.com", "password": "wrong" }))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["error"]["code"], "unauthorized");
}

#[tokio::test]
async fn pending_registration_activates_once() {
    let h = setup(AccountsConfig::default());
    let response = h
        .server
        .post("/auth/register")
        .json(&json!({ "email": "ada@example.com", "password": "correct horse" }))
        .await;
    response.assert_status(StatusCode::NO_CONTENT);

    let response = h
        .server
        .post("/auth/login")
        .json(&json!({ "email": "ada@example.com", "password": "correct horse" }))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    let ticket = mailed_param(&h, "ada@example.com", "ticket");
    let response = h
        .server
        .get("/auth/activate")
        .add_query_param("ticket", &ticket)
        .await;
    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "http://localhost:3001/");

    let response = h
        .server
        .get("/auth/activate")
        .add_query_param("ticket", &ticket)
        .await;
    response.assert_status(StatusCode::SEE_OTHER);
    let target = location(&response);
    assert!(target.starts_with("http://localhost:3001/login-fail?"));
    assert_eq!(query_param(&target, "error").as_deref(), Some("unauthorized"));

    h.server
        .post("/auth/login")
        .json(&json!({ "email": "ada@example.com", "password": "correct horse" }))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn magic_link_login_redirects_with_refresh_token() {
    let h = setup(AccountsConfig {
        auto_activate_new_users: true,
        magic_link_enabled: true,
        ..AccountsConfig::default()
    });
    register(&h, "ada@example.com", "correct horse").await;

    let response = h
        .server
        .post("/auth/login")
        .json(&json!({ "email": "ada@example.com" }))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>(), json!({ "magic_link": true }));

    let token = mailed_param(&h, "ada@example.com", "token");
    let action = mailed_param(&h, "ada@example.com", "action");
    assert_eq!(action, "login");

    let response = h
        .server
        .get("/auth/magic-link")
        .add_query_param("action", &action)
        .add_query_param("token", &token)
        .await;
    response.assert_status(StatusCode::SEE_OTHER);
    let refresh_token = query_param(&location(&response), "refresh_token").unwrap();

    h.server
        .post("/auth/token/refresh")
        .json(&json!({ "refresh_token": refresh_token }))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn magic_link_with_unknown_action_fails() {
    let h = setup(AccountsConfig::default());
    let response = h
        .server
        .get("/auth/magic-link")
        .add_query_param("action", "delete")
        .add_query_param("token", "magicLink:00000000-0000-0000-0000-000000000000")
        .await;
    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(
        query_param(&location(&response), "error").as_deref(),
        Some("bad_request")
    );
}

// =============================================================================
// Sessions
// =============================================================================

#[tokio::test]
async fn refresh_token_rotates_once() {
    let h = setup(auto_activate());
    let session = register(&h, "ada@example.com", "correct horse").await;
    let refresh_token = session["refresh_token"].as_str().unwrap();

    let response = h
        .server
        .post("/auth/token/refresh")
        .json(&json!({ "refresh_token": refresh_token }))
        .await;
    response.assert_status_ok();
    assert_ne!(response.json::<Value>()["refresh_token"], refresh_token);

    h.server
        .post("/auth/token/refresh")
        .json(&json!({ "refresh_token": refresh_token }))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_all_revokes_every_session() {
    let h = setup(auto_activate());
    let first = register(&h, "ada@example.com", "correct horse").await;
    let second = h
        .server
        .post("/auth/login")
        .json(&json!({ "email": "ada@example.com", "password": "correct horse" }))
        .await
        .json::<Value>();

    h.server
        .post("/auth/logout")
        .json(&json!({ "refresh_token": first["refresh_token"], "all": true }))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    h.server
        .post("/auth/token/refresh")
        .json(&json!({ "refresh_token": second["refresh_token"] }))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn jwks_is_empty_for_hmac() {
    let h = setup(AccountsConfig::default());
    let response = h.server.get("/auth/jwks").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>(), json!({ "keys": [] }));
}

#[tokio::test]
async fn user_endpoints_require_a_token() {
    let h = setup(AccountsConfig::default());
    h.server
        .get("/auth/user")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    h.server
        .get("/auth/user")
        .add_header(AUTHORIZATION, bearer("not-a-jwt"))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Email and password
// =============================================================================

#[tokio::test]
async fn confirmed_email_change() {
    let h = setup(AccountsConfig {
        auto_activate_new_users: true,
        verify_emails: true,
        ..AccountsConfig::default()
    });
    let session = register(&h, "ada@example.com", "correct horse").await;
    let jwt = session["jwt_token"].as_str().unwrap();

    h.server
        .post("/auth/change-email/direct-change")
        .add_header(AUTHORIZATION, bearer(jwt))
        .json(&json!({ "new_email": "lovelace@example.com" }))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    h.server
        .post("/auth/change-email/request")
        .add_header(AUTHORIZATION, bearer(jwt))
        .json(&json!({ "new_email": "lovelace@example.com" }))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let ticket = mailed_param(&h, "lovelace@example.com", "ticket");
    h.server
        .post("/auth/change-email/change")
        .json(&json!({ "ticket": ticket }))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    h.server
        .post("/auth/login")
        .json(&json!({ "email": "lovelace@example.com", "password": "correct horse" }))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn password_reset_flow() {
    let h = setup(auto_activate());
    let session = register(&h, "ada@example.com", "correct horse").await;

    h.server
        .post("/auth/change-password/request")
        .json(&json!({ "email": "nobody@example.com" }))
        .await
        .assert_status(StatusCode::NO_CONTENT);
    h.server
        .post("/auth/change-password/request")
        .json(&json!({ "email": "ada@example.com" }))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let ticket = mailed_param(&h, "ada@example.com", "ticket");
    h.server
        .post("/auth/change-password/change")
        .json(&json!({ "ticket": ticket, "new_password": "battery staple" }))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    // Reset ends every session.
    h.server
        .post("/auth/token/refresh")
        .json(&json!({ "refresh_token": session["refresh_token"] }))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    h.server
        .post("/auth/login")
        .json(&json!({ "email": "ada@example.com", "password": "battery staple" }))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn authenticated_password_change() {
    let h = setup(auto_activate());
    let session = register(&h, "ada@example.com", "correct horse").await;
    let jwt = session["jwt_token"].as_str().unwrap();

    h.server
        .post("/auth/change-password")
        .add_header(AUTHORIZATION, bearer(jwt))
        .json(&json!({ "old_password": "wrong", "new_password": "battery staple" }))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    h.server
        .post("/auth/change-password")
        .add_header(AUTHORIZATION, bearer(jwt))
        .json(&json!({ "old_password": "correct horse", "new_password": "battery staple" }))
        .await
        .assert_status(StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn self_delete_is_gated() {
    let h = setup(auto_activate());
    let session = register(&h, "ada@example.com", "correct horse").await;
    let jwt = session["jwt_token"].as_str().unwrap();

    h.server
        .post("/auth/delete")
        .add_header(AUTHORIZATION, bearer(jwt))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let h = setup(AccountsConfig {
        auto_activate_new_users: true,
        allow_self_delete: true,
        ..AccountsConfig::default()
    });
    let session = register(&h, "ada@example.com", "correct horse").await;
    let jwt = session["jwt_token"].as_str().unwrap();

    h.server
        .post("/auth/delete")
        .add_header(AUTHORIZATION, bearer(jwt))
        .await
        .assert_status(StatusCode::NO_CONTENT);
    h.server
        .get("/auth/user")
        .add_header(AUTHORIZATION, bearer(jwt))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

// =============================================================================
// Providers
// =============================================================================

#[tokio::test]
async fn providers_list_and_redirect() {
    let h = setup(AccountsConfig::default());

    let response = h.server.get("/auth/providers").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>(), json!({ "providers": ["github"] }));

    let response = h.server.get("/auth/providers/github").await;
    response.assert_status(StatusCode::SEE_OTHER);
    let target = location(&response);
    assert!(target.starts_with("https://github.com/login/oauth/authorize?"));
    assert_eq!(query_param(&target, "client_id").as_deref(), Some("github-client"));
    assert!(query_param(&target, "state").is_some());

    h.server
        .get("/auth/providers/google")
        .await
        .assert_status(StatusCode::NOT_FOUND);
    h.server
        .get("/auth/providers/myspace")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn provider_callback_failures_redirect_to_error_page() {
    let h = setup(AccountsConfig::default());

    let response = h
        .server
        .get("/auth/providers/github/callback")
        .add_query_param("error", "access_denied")
        .await;
    response.assert_status(StatusCode::SEE_OTHER);
    assert!(location(&response).starts_with("http://localhost:3001/login-fail?"));

    let response = h
        .server
        .get("/auth/providers/github/callback")
        .add_query_param("code", "abc")
        .add_query_param("state", "never-issued")
        .await;
    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(
        query_param(&location(&response), "error").as_deref(),
        Some("unauthorized")
    );
}
