//! In-process fake of the API and identity provider for client tests.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use serde_json::json;
use tollgate_identity::{ProfileResponse, ProviderConfig, decode_claims};
use url::Url;

/// Builds an unsigned JWT carrying `claims`.
pub(crate) fn jwt_with(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.unsigned")
}

#[derive(Default)]
struct FakeState {
    base: String,
    redirect_uri: Option<String>,
    fail_config_once: AtomicBool,
    config_calls: AtomicUsize,
    token_requests: Mutex<Vec<HashMap<String, String>>>,
    bearers: Mutex<Vec<String>>,
}

pub(crate) struct FakeProvider {
    addr: SocketAddr,
    state: Arc<FakeState>,
}

#[derive(Default)]
pub(crate) struct FakeProviderBuilder {
    redirect_uri: Option<String>,
    fail_config_once: bool,
}

impl FakeProviderBuilder {
    pub(crate) fn redirect_uri(mut self, uri: &str) -> Self {
        self.redirect_uri = Some(uri.to_string());
        self
    }

    pub(crate) fn fail_config_once(mut self) -> Self {
        self.fail_config_once = true;
        self
    }

    pub(crate) async fn spawn(self) -> FakeProvider {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake provider");
        let addr = listener.local_addr().expect("local addr");

        let state = Arc::new(FakeState {
            base: format!("http://{addr}"),
            redirect_uri: self.redirect_uri,
            fail_config_once: AtomicBool::new(self.fail_config_once),
            ..FakeState::default()
        });

        let app = Router::new()
            .route("/v1/config", get(config))
            .route("/v1/profile", get(profile))
            .route("/oauth2/token", post(token))
            .route("/echo-auth", get(echo_auth))
            .with_state(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve fake provider");
        });

        FakeProvider { addr, state }
    }
}

impl FakeProvider {
    /// Authorization code the token endpoint rejects with `invalid_grant`.
    pub(crate) const REJECTED_CODE: &'static str = "rejected-code";
    /// Answered with a non-OAuth2 error body, as a throttling proxy would.
    pub(crate) const THROTTLED_CODE: &'static str = "throttled-code";

    pub(crate) fn builder() -> FakeProviderBuilder {
        FakeProviderBuilder::default()
    }

    pub(crate) async fn spawn() -> Self {
        Self::builder().spawn().await
    }

    pub(crate) fn base_url(&self) -> Url {
        Url::parse(&format!("http://{}/", self.addr)).expect("base url")
    }

    pub(crate) fn config_calls(&self) -> usize {
        self.state.config_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn last_token_request(&self) -> Option<HashMap<String, String>> {
        self.state
            .token_requests
            .lock()
            .expect("token requests lock")
            .last()
            .cloned()
    }

    pub(crate) fn last_bearer(&self) -> Option<String> {
        self.state
            .bearers
            .lock()
            .expect("bearers lock")
            .last()
            .cloned()
    }
}

async fn config(State(state): State<Arc<FakeState>>) -> Response {
    state.config_calls.fetch_add(1, Ordering::SeqCst);
    if state.fail_config_once.swap(false, Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": "boom"}))).into_response();
    }

    let config = ProviderConfig::new(state.base.clone(), "test-client".to_string())
        .with_redirect_uri(state.redirect_uri.clone());
    Json(config).into_response()
}

async fn token(
    State(state): State<Arc<FakeState>>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let code = form.get("code").cloned().unwrap_or_default();
    state
        .token_requests
        .lock()
        .expect("token requests lock")
        .push(form);

    if code == FakeProvider::REJECTED_CODE {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "invalid_grant", "error_description": "code expired"})),
        )
            .into_response();
    }

    if code == FakeProvider::THROTTLED_CODE {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({"message": "Too many requests"})),
        )
            .into_response();
    }

    let exp = Utc::now().timestamp() + 3600;
    Json(json!({
        "access_token": jwt_with(&json!({"sub": "user-1", "exp": exp, "token_use": "access"})),
        "id_token": jwt_with(&json!({
            "sub": "user-1",
            "email": "user@example.com",
            "cognito:groups": ["users"],
            "exp": exp,
            "token_use": "id",
        })),
        "token_type": "Bearer",
        "expires_in": 3600,
    }))
    .into_response()
}

async fn profile(State(state): State<Arc<FakeState>>, headers: HeaderMap) -> Response {
    let Some(bearer) = record_bearer(&state, &headers) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };

    let identity = bearer
        .strip_prefix("Bearer ")
        .and_then(|token| decode_claims(token).ok())
        .and_then(|claims| claims.identity().ok());

    match identity {
        Some(identity) => Json(ProfileResponse::for_identity(identity)).into_response(),
        None => (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "Authentication required"})),
        )
            .into_response(),
    }
}

async fn echo_auth(State(state): State<Arc<FakeState>>, headers: HeaderMap) -> Response {
    record_bearer(&state, &headers)
        .unwrap_or_default()
        .into_response()
}

fn record_bearer(state: &FakeState, headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?.to_string();
    state
        .bearers
        .lock()
        .expect("bearers lock")
        .push(value.clone());
    Some(value)
}
