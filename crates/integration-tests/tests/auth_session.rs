//! Login, registration, and current-user resolution against a stub backend.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::{
    Json, Router,
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use nature_core::UserId;
use nature_integration_tests::StubBackend;
use nature_storefront::auth::{
    ACCESS_TOKEN_COOKIE, AuthError, CookieMirror, INVALID_LOGIN_MESSAGE, RegisterFields,
};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;

fn profile_json() -> serde_json::Value {
    json!({
        "id": 12,
        "email": "ana@example.com",
        "first_name": "Ana",
        "last_name": "Ruiz",
        "avatar_url": null,
        "created_at": "2025-03-01T10:00:00Z"
    })
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

// ============================================================================
// Login
// ============================================================================

#[tokio::test]
async fn test_login_rejected_stores_nothing() {
    let backend = StubBackend::start(Router::new().route(
        "/api/auth/login/",
        post(|| async { (StatusCode::BAD_REQUEST, Json(json!({}))) }),
    ))
    .await;
    let t = backend.storefront();

    let err = t
        .storefront
        .auth()
        .login("bad@x.com", "wrong")
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::InvalidCredentials { .. }));
    assert_eq!(err.user_message(), INVALID_LOGIN_MESSAGE);
    assert!(!err.is_retryable());
    assert!(!t.storefront.auth().is_authenticated());
    assert!(t.storage.is_empty());
    assert!(t.cookies.read(ACCESS_TOKEN_COOKIE).is_none());

    let requests = backend.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].body, json!({"email": "bad@x.com", "password": "wrong"}));
    assert!(requests[0].authorization.is_none());
}

#[tokio::test]
async fn test_login_passes_backend_detail_through() {
    let backend = StubBackend::start(Router::new().route(
        "/api/auth/login/",
        post(|| async {
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({"detail": "Account disabled."})),
            )
        }),
    ))
    .await;
    let t = backend.storefront();

    let err = t
        .storefront
        .auth()
        .login("ana@example.com", "pw")
        .await
        .unwrap_err();
    assert_eq!(err.user_message(), "Account disabled.");
}

#[tokio::test]
async fn test_login_server_error_is_retryable() {
    let backend = StubBackend::start(Router::new().route(
        "/api/auth/login/",
        post(|| async { StatusCode::BAD_GATEWAY }),
    ))
    .await;
    let t = backend.storefront();

    let err = t
        .storefront
        .auth()
        .login("ana@example.com", "pw")
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert!(!t.storefront.auth().is_authenticated());
}

#[tokio::test]
async fn test_login_with_user_payload() {
    let backend = StubBackend::start(Router::new().route(
        "/api/auth/login/",
        post(|| async {
            Json(json!({
                "access": "acc-1",
                "refresh": "ref-1",
                "user": {"pk": 12, "email": "ana@example.com", "first_name": "Ana"}
            }))
        }),
    ))
    .await;
    let t = backend.storefront();

    let session = t
        .storefront
        .auth()
        .login("ana@example.com", "pw")
        .await
        .unwrap();

    assert_eq!(session.access_token.expose_secret(), "acc-1");
    assert_eq!(session.refresh_token.expose_secret(), "ref-1");
    assert_eq!(session.user.unwrap().id, UserId::new(12));
    assert!(t.storefront.auth().is_authenticated());
    assert_eq!(t.cookies.read(ACCESS_TOKEN_COOKIE).as_deref(), Some("acc-1"));
    assert_eq!(
        t.storefront.auth().cached_user().map(|u| u.display_name()),
        Some("Ana".to_string())
    );
    // User came with the response, no profile fetch
    assert_eq!(backend.requests().len(), 1);
}

#[tokio::test]
async fn test_login_without_user_fetches_profile() {
    let backend = StubBackend::start(
        Router::new()
            .route(
                "/api/auth/login/",
                post(|| async { Json(json!({"access": "acc-1", "refresh": "ref-1"})) }),
            )
            .route(
                "/api/users/profile/",
                get(|| async { Json(profile_json()) }),
            ),
    )
    .await;
    let t = backend.storefront();

    let session = t
        .storefront
        .auth()
        .login("ana@example.com", "pw")
        .await
        .unwrap();
    assert_eq!(session.user.unwrap().last_name, "Ruiz");

    let requests = backend.requests();
    assert_eq!(
        backend.request_lines(),
        vec!["POST /api/auth/login/", "GET /api/users/profile/"]
    );
    assert_eq!(requests[1].authorization.as_deref(), Some("Bearer acc-1"));
}

// ============================================================================
// Registration
// ============================================================================

#[tokio::test]
async fn test_register_sends_password_twice() {
    let backend = StubBackend::start(Router::new().route(
        "/api/auth/registration/",
        post(|| async {
            (
                StatusCode::CREATED,
                Json(json!({
                    "access": "acc",
                    "refresh": "ref",
                    "user": {"pk": 3, "email": "leo@example.com"}
                })),
            )
        }),
    ))
    .await;
    let t = backend.storefront();

    let fields = RegisterFields {
        email: "leo@example.com".to_string(),
        password: "s3cret-pass".to_string(),
        first_name: "Leo".to_string(),
        last_name: String::new(),
    };
    t.storefront.auth().register(&fields).await.unwrap();

    let body = &backend.requests()[0].body;
    assert_eq!(body["password1"], "s3cret-pass");
    assert_eq!(body["password2"], "s3cret-pass");
    assert_eq!(body["first_name"], "Leo");
    assert_eq!(body["last_name"], "");
    assert!(t.storefront.auth().is_authenticated());
}

#[tokio::test]
async fn test_register_surfaces_field_error() {
    let backend = StubBackend::start(Router::new().route(
        "/api/auth/registration/",
        post(|| async {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({"email": ["A user is already registered with this e-mail address."]})),
            )
        }),
    ))
    .await;
    let t = backend.storefront();

    let fields = RegisterFields {
        email: "taken@example.com".to_string(),
        password: "pw".to_string(),
        ..RegisterFields::default()
    };
    let err = t.storefront.auth().register(&fields).await.unwrap_err();
    assert_eq!(
        err.user_message(),
        "A user is already registered with this e-mail address."
    );
}

#[tokio::test]
async fn test_register_without_tokens() {
    let backend = StubBackend::start(Router::new().route(
        "/api/auth/registration/",
        post(|| async {
            (
                StatusCode::CREATED,
                Json(json!({"detail": "Verification e-mail sent."})),
            )
        }),
    ))
    .await;
    let t = backend.storefront();

    let fields = RegisterFields {
        email: "new@example.com".to_string(),
        password: "pw".to_string(),
        ..RegisterFields::default()
    };
    let err = t.storefront.auth().register(&fields).await.unwrap_err();
    assert!(matches!(err, AuthError::SessionNotIssued));
    assert!(!t.storefront.auth().is_authenticated());
}

// ============================================================================
// Current user
// ============================================================================

#[tokio::test]
async fn test_current_user_without_token_makes_no_request() {
    let backend = StubBackend::start(Router::new()).await;
    let t = backend.storefront();

    assert!(t.storefront.auth().current_user().await.is_none());
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn test_expired_token_is_refreshed_transparently() {
    let backend = StubBackend::start(
        Router::new()
            .route(
                "/api/users/profile/",
                get(|headers: HeaderMap| async move {
                    if bearer(&headers) == Some("fresh") {
                        Json(profile_json()).into_response()
                    } else {
                        (
                            StatusCode::UNAUTHORIZED,
                            Json(json!({"detail": "Token is invalid or expired"})),
                        )
                            .into_response()
                    }
                }),
            )
            .route(
                "/api/auth/token/refresh/",
                post(|| async { Json(json!({"access": "fresh"})) }),
            ),
    )
    .await;
    let t = backend.storefront();
    let tokens = t.storefront.auth().tokens();
    tokens.store_session(&SecretString::from("stale"), &SecretString::from("ref-1"));

    let user = t.storefront.auth().current_user().await.unwrap();
    assert_eq!(user.email, "ana@example.com");

    assert_eq!(
        backend.request_lines(),
        vec![
            "GET /api/users/profile/",
            "POST /api/auth/token/refresh/",
            "GET /api/users/profile/"
        ]
    );
    let requests = backend.requests();
    assert_eq!(requests[1].body, json!({"refresh": "ref-1"}));
    assert!(requests[1].authorization.is_none());

    // Both the stored token and the cookie mirror moved to the new token
    assert_eq!(
        tokens.access_token().unwrap().expose_secret(),
        "fresh"
    );
    assert_eq!(tokens.refresh_token().unwrap().expose_secret(), "ref-1");
    assert_eq!(t.cookies.read(ACCESS_TOKEN_COOKIE).as_deref(), Some("fresh"));
}

#[tokio::test]
async fn test_rotated_refresh_token_replaces_both_tokens() {
    let backend = StubBackend::start(
        Router::new()
            .route(
                "/api/users/profile/",
                get(|headers: HeaderMap| async move {
                    if bearer(&headers) == Some("a2") {
                        Json(profile_json()).into_response()
                    } else {
                        StatusCode::UNAUTHORIZED.into_response()
                    }
                }),
            )
            .route(
                "/api/auth/token/refresh/",
                post(|| async { Json(json!({"access": "a2", "refresh": "r2"})) }),
            ),
    )
    .await;
    let t = backend.storefront();
    let tokens = t.storefront.auth().tokens();
    tokens.store_session(&SecretString::from("a1"), &SecretString::from("r1"));

    assert!(t.storefront.auth().current_user().await.is_some());

    assert_eq!(tokens.access_token().unwrap().expose_secret(), "a2");
    assert_eq!(tokens.refresh_token().unwrap().expose_secret(), "r2");
    assert_eq!(t.cookies.read(ACCESS_TOKEN_COOKIE).as_deref(), Some("a2"));
    assert_eq!(backend.requests()[1].body, json!({"refresh": "r1"}));
}

#[tokio::test]
async fn test_refresh_user_replaces_cached_profile() {
    let fetches = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fetches);
    let backend = StubBackend::start(Router::new().route(
        "/api/users/profile/",
        get(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                let mut profile = profile_json();
                if n > 0 {
                    profile["first_name"] = json!("Ana María");
                }
                Json(profile)
            }
        }),
    ))
    .await;
    let t = backend.storefront();
    t.storefront
        .auth()
        .tokens()
        .store_session(&SecretString::from("acc"), &SecretString::from("ref"));

    let first = t.storefront.auth().current_user().await.unwrap();
    assert_eq!(first.first_name, "Ana");

    let refreshed = t.storefront.auth().refresh_user().await.unwrap();
    assert_eq!(refreshed.first_name, "Ana María");
    assert_eq!(
        t.storefront.auth().cached_user().map(|u| u.first_name),
        Some("Ana María".to_string())
    );
    assert_eq!(fetches.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_failed_refresh_ends_session_silently() {
    let backend = StubBackend::start(
        Router::new()
            .route(
                "/api/users/profile/",
                get(|| async { StatusCode::UNAUTHORIZED }),
            )
            .route(
                "/api/auth/token/refresh/",
                post(|| async { StatusCode::UNAUTHORIZED }),
            ),
    )
    .await;
    let t = backend.storefront();
    t.storefront
        .auth()
        .tokens()
        .store_session(&SecretString::from("stale"), &SecretString::from("revoked"));

    assert!(t.storefront.auth().current_user().await.is_none());
    assert!(!t.storefront.auth().is_authenticated());
    assert!(t.storefront.auth().tokens().refresh_token().is_none());
    assert!(t.cookies.read(ACCESS_TOKEN_COOKIE).is_none());
}

#[tokio::test]
async fn test_refresh_attempted_only_once() {
    let refreshes = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&refreshes);
    let backend = StubBackend::start(
        Router::new()
            .route(
                "/api/users/profile/",
                get(|| async { StatusCode::UNAUTHORIZED }),
            )
            .route(
                "/api/auth/token/refresh/",
                post(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async { Json(json!({"access": "still-bad"})) }
                }),
            ),
    )
    .await;
    let t = backend.storefront();
    t.storefront
        .auth()
        .tokens()
        .store_session(&SecretString::from("stale"), &SecretString::from("ref"));

    assert!(t.storefront.auth().current_user().await.is_none());
    assert_eq!(refreshes.load(Ordering::SeqCst), 1);
    assert_eq!(backend.requests().len(), 3);
    assert!(!t.storefront.auth().is_authenticated());
}

#[tokio::test]
async fn test_backend_outage_keeps_session() {
    let backend = StubBackend::start(Router::new().route(
        "/api/users/profile/",
        get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
    ))
    .await;
    let t = backend.storefront();
    t.storefront
        .auth()
        .tokens()
        .store_session(&SecretString::from("acc"), &SecretString::from("ref"));

    assert!(t.storefront.auth().current_user().await.is_none());
    assert!(t.storefront.auth().is_authenticated());
    assert_eq!(backend.request_lines(), vec!["GET /api/users/profile/"]);
}

// ============================================================================
// Logout
// ============================================================================

#[tokio::test]
async fn test_logout_clears_session_even_if_backend_fails() {
    let backend = StubBackend::start(Router::new().route(
        "/api/auth/logout/",
        post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
    ))
    .await;
    let t = backend.storefront();
    t.storefront
        .auth()
        .tokens()
        .store_session(&SecretString::from("acc"), &SecretString::from("ref"));

    t.storefront.logout().await;

    assert!(!t.storefront.auth().is_authenticated());
    assert!(t.cookies.read(ACCESS_TOKEN_COOKIE).is_none());
    assert_eq!(
        backend.requests()[0].authorization.as_deref(),
        Some("Bearer acc")
    );
}
