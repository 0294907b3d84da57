//! Application state and router assembly.

use std::sync::Arc;

use axum::Router;
use axum::http::{HeaderName, HeaderValue, Method, header};
use axum::middleware;
use axum::routing::get;
use tollgate_core::Result;
use tollgate_identity::ProviderConfig;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{RequiredGroup, attach_auth, require_auth, require_group};
use crate::config::ServerConfig;
use crate::parameters::{ParameterError, ParameterStore, ProviderConfigCache};
use crate::routes;

/// Methods advertised on every response.
const ALLOWED_METHODS: &str = "GET,POST,PUT,DELETE,OPTIONS";

/// Request headers advertised on every response.
const ALLOWED_HEADERS: &str =
    "Content-Type,Authorization,X-Amz-Date,X-Api-Key,X-Amz-Security-Token";

/// Shared application state.
pub struct AppState {
    service_name: String,
    context_header: HeaderName,
    admin_group: String,
    provider: ProviderConfigCache,
}

impl AppState {
    /// Creates a new application state.
    #[must_use]
    pub fn new(
        service_name: String,
        context_header: HeaderName,
        admin_group: String,
        parameters: Arc<dyn ParameterStore>,
    ) -> Self {
        Self {
            service_name,
            context_header,
            admin_group,
            provider: ProviderConfigCache::new(parameters),
        }
    }

    /// Creates application state from server configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured context header is invalid.
    pub fn from_config(
        config: &ServerConfig,
        parameters: Arc<dyn ParameterStore>,
    ) -> std::result::Result<Self, config::ConfigError> {
        Ok(Self::new(
            config.service_name.clone(),
            config.context_header_name()?,
            config.admin_group.clone(),
            parameters,
        ))
    }

    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    #[must_use]
    pub fn context_header(&self) -> &HeaderName {
        &self.context_header
    }

    #[must_use]
    pub fn admin_group(&self) -> &str {
        &self.admin_group
    }

    /// Returns the identity provider configuration, loading it on first demand.
    ///
    /// # Errors
    ///
    /// Returns the parameter load error. Failures are not cached.
    pub async fn provider_config(&self) -> Result<&ProviderConfig, ParameterError> {
        self.provider.get().await
    }
}

/// Builds the service router.
///
/// CORS headers are applied outside every other layer so that 401, 403, 404
/// and 500 responses carry them too.
pub fn router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/v1/profile", get(routes::profile))
        .route_layer(middleware::from_fn(require_auth));

    // Layers run outermost-last: authentication is checked before the group.
    let admin = Router::new()
        .route("/ping", get(routes::admin_ping))
        .route_layer(middleware::from_fn_with_state(
            RequiredGroup::new(state.admin_group()),
            require_group,
        ))
        .route_layer(middleware::from_fn(require_auth));

    Router::new()
        .route("/health", get(routes::health))
        .route("/v1/config", get(routes::config))
        .merge(protected)
        .nest("/v1/admin", admin)
        .fallback(routes::not_found)
        .layer(middleware::from_fn_with_state(
            state.context_header().clone(),
            attach_auth,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::if_not_present(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOWED_HEADERS),
        ))
        .layer(cors_layer())
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-amz-date"),
            HeaderName::from_static("x-api-key"),
            HeaderName::from_static("x-amz-security-token"),
        ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::{StaticParameterStore, keys};
    use axum::body::Body;
    use axum::http::{HeaderMap, Request, StatusCode};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    const CONTEXT_HEADER: &str = "x-apigateway-context";

    fn complete_parameters() -> StaticParameterStore {
        StaticParameterStore::new()
            .with(keys::COGNITO_DOMAIN, Some("auth.example.com".to_string()))
            .with(keys::COGNITO_CLIENT_ID, Some("client-1".to_string()))
            .with(keys::COGNITO_REGION, Some("eu-west-1".to_string()))
            .with(
                keys::REDIRECT_URI,
                Some("https://app.example.com/callback".to_string()),
            )
    }

    fn app_with(parameters: StaticParameterStore) -> Router {
        router(Arc::new(AppState::new(
            "tollgate-user-service".to_string(),
            HeaderName::from_static(CONTEXT_HEADER),
            "administrators".to_string(),
            Arc::new(parameters),
        )))
    }

    fn app() -> Router {
        app_with(complete_parameters())
    }

    fn context_for(sub: &str, groups: Value) -> String {
        json!({
            "authorizer": {
                "claims": {
                    "sub": sub,
                    "email": format!("{sub}@example.com"),
                    "cognito:groups": groups,
                }
            }
        })
        .to_string()
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
        let response = app.oneshot(request).await.expect("router is infallible");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, headers, body)
    }

    fn get_request(uri: &str, context: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(Method::GET).uri(uri);
        if let Some(context) = context {
            builder = builder.header(CONTEXT_HEADER, context);
        }
        builder.body(Body::empty()).expect("request")
    }

    fn assert_cors(headers: &HeaderMap) {
        assert_eq!(
            headers
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .and_then(|v| v.to_str().ok()),
            Some("*")
        );
        assert!(headers.contains_key(header::ACCESS_CONTROL_ALLOW_METHODS));
        assert!(headers.contains_key(header::ACCESS_CONTROL_ALLOW_HEADERS));
    }

    #[tokio::test]
    async fn health_is_public() {
        let (status, headers, body) = send(app(), get_request("/health", None)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok", "service": "tollgate-user-service"}));
        assert_cors(&headers);
    }

    #[tokio::test]
    async fn config_serves_provider_parameters() {
        let (status, headers, body) = send(app(), get_request("/v1/config", None)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "cognitoDomain": "auth.example.com",
                "cognitoClientId": "client-1",
                "cognitoRegion": "eu-west-1",
                "redirectUri": "https://app.example.com/callback",
            })
        );
        assert_cors(&headers);
    }

    #[tokio::test]
    async fn config_failure_is_generic_500_with_cors() {
        let app = app_with(StaticParameterStore::new());

        let (status, headers, body) = send(app, get_request("/v1/config", None)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": "Failed to load configuration"}));
        assert_cors(&headers);
    }

    #[tokio::test]
    async fn profile_requires_forwarded_identity() {
        let (status, headers, body) = send(app(), get_request("/v1/profile", None)).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({"error": "Authentication required"}));
        assert_cors(&headers);
    }

    #[tokio::test]
    async fn malformed_context_header_is_unauthenticated() {
        let (status, _, body) = send(
            app(),
            get_request("/v1/profile", Some(r#"{"authorizer": {"claims": "#)),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({"error": "Authentication required"}));
    }

    #[tokio::test]
    async fn profile_returns_forwarded_identity() {
        let context = context_for("user-1", json!(["users"]));

        let (status, _, body) = send(app(), get_request("/v1/profile", Some(&context))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["authenticated"], true);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["user"]["sub"], "user-1");
        assert_eq!(body["user"]["email"], "user-1@example.com");
        assert_eq!(body["user"]["groups"], json!(["users"]));
        assert!(body["timestamp"].is_string());
        assert!(body["message"].is_string());
    }

    #[tokio::test]
    async fn percent_encoded_context_is_accepted() {
        let context = context_for("user-1", json!("users"));
        let encoded = urlencoding::encode(&context).into_owned();

        let (status, _, body) = send(app(), get_request("/v1/profile", Some(&encoded))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["groups"], json!(["users"]));
    }

    #[tokio::test]
    async fn raw_context_with_utf8_claims_is_accepted() {
        let context = json!({
            "authorizer": {"claims": {"sub": "user-1", "email": "jürgen@example.com"}}
        })
        .to_string();
        let request = Request::builder()
            .method(Method::GET)
            .uri("/v1/profile")
            .header(
                CONTEXT_HEADER,
                HeaderValue::from_bytes(context.as_bytes()).expect("header value"),
            )
            .body(Body::empty())
            .expect("request");

        let (status, _, body) = send(app(), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["email"], "jürgen@example.com");
    }

    #[tokio::test]
    async fn admin_rejects_users_without_group() {
        let context = context_for("user-1", json!(["users"]));

        let (status, headers, body) =
            send(app(), get_request("/v1/admin/ping", Some(&context))).await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Forbidden");
        assert_cors(&headers);
    }

    #[tokio::test]
    async fn admin_accepts_group_members() {
        let context = context_for("admin-1", json!(["users", "administrators"]));

        let (status, _, body) = send(app(), get_request("/v1/admin/ping", Some(&context))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert!(body["message"].is_string());
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn admin_accepts_flattened_group_string() {
        let context = context_for("admin-1", json!("users,administrators"));

        let (status, _, _) = send(app(), get_request("/v1/admin/ping", Some(&context))).await;

        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn admin_without_identity_is_unauthenticated() {
        let (status, headers, _) = send(app(), get_request("/v1/admin/ping", None)).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_cors(&headers);
    }

    #[tokio::test]
    async fn unknown_route_is_json_404_with_cors() {
        let (status, headers, body) = send(app(), get_request("/v2/nothing", None)).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"error": "Not found"}));
        assert_cors(&headers);
    }

    #[tokio::test]
    async fn preflight_is_answered() {
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/v1/profile")
            .header(header::ORIGIN, "https://app.example.com")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "authorization")
            .body(Body::empty())
            .expect("request");

        let (status, headers, _) = send(app(), request).await;

        assert!(status.is_success());
        assert_cors(&headers);
    }

    mod login_flow {
        //! A login driven by the real client through a fake identity
        //! provider and a fake gateway in front of the real router.

        use super::*;
        use axum::extract::{Form, State};
        use axum::response::{IntoResponse, Response};
        use axum::routing::post;
        use base64::Engine;
        use base64::engine::general_purpose::URL_SAFE_NO_PAD;
        use std::collections::HashMap;
        use tollgate_client::{ClientConfig, MemoryStorage, PkceClient, RecordingNavigator};
        use tollgate_identity::decode_claims;
        use url::Url;

        fn jwt_with(claims: &Value) -> String {
            let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none"}"#);
            let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
            format!("{header}.{payload}.unsigned")
        }

        async fn token_endpoint(Form(form): Form<HashMap<String, String>>) -> Response {
            let verifier_ok = form
                .get("code_verifier")
                .is_some_and(|v| v.len() >= 43);
            if form.get("code").map(String::as_str) != Some("abc") || !verifier_ok {
                return (StatusCode::BAD_REQUEST, axum::Json(json!({"error": "invalid_grant"})))
                    .into_response();
            }

            let exp = chrono::Utc::now().timestamp() + 3600;
            axum::Json(json!({
                "access_token": jwt_with(&json!({"sub": "e2e-user", "exp": exp})),
                "id_token": jwt_with(&json!({
                    "sub": "e2e-user",
                    "email": "e2e@example.com",
                    "cognito:groups": ["users", "administrators"],
                    "exp": exp,
                })),
                "token_type": "Bearer",
                "expires_in": 3600,
            }))
            .into_response()
        }

        /// Verifies the bearer token's expiry and forwards its claims the way
        /// a gateway authorizer does, as a flattened and percent-encoded context.
        async fn gateway(State(upstream): State<Router>, request: Request<Body>) -> Response {
            let (mut parts, body) = request.into_parts();
            parts.headers.remove(CONTEXT_HEADER);

            let claims = parts
                .headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .and_then(|token| decode_claims(token).ok())
                .filter(|claims| !claims.is_expired_at(chrono::Utc::now()));

            if let Some(claims) = claims {
                let groups: Vec<&str> = claims
                    .groups
                    .as_ref()
                    .map(|g| g.iter().collect())
                    .unwrap_or_default();
                let context = json!({
                    "authorizer": {"claims": {
                        "sub": claims.sub,
                        "email": claims.email,
                        "cognito:groups": groups.join(","),
                    }}
                });
                let encoded = urlencoding::encode(&context.to_string()).into_owned();
                parts.headers.insert(
                    CONTEXT_HEADER,
                    HeaderValue::from_str(&encoded).expect("header value"),
                );
            }

            upstream
                .oneshot(Request::from_parts(parts, body))
                .await
                .into_response()
        }

        async fn spawn(app: Router) -> Url {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                .await
                .expect("bind");
            let addr = listener.local_addr().expect("addr");
            tokio::spawn(async move {
                axum::serve(listener, app).await.expect("serve");
            });
            Url::parse(&format!("http://{addr}/")).expect("url")
        }

        #[tokio::test]
        async fn login_exchange_and_profile_agree_on_subject() {
            let provider = spawn(Router::new().route("/oauth2/token", post(token_endpoint))).await;

            let service = app_with(
                StaticParameterStore::new()
                    .with(keys::COGNITO_DOMAIN, Some(provider.to_string()))
                    .with(keys::COGNITO_CLIENT_ID, Some("e2e-client".to_string())),
            );
            let gateway_url = spawn(Router::new().fallback(gateway).with_state(service)).await;

            let navigator = Arc::new(RecordingNavigator::new());
            let client = PkceClient::new(
                ClientConfig::new(
                    gateway_url.clone(),
                    Url::parse("http://app.test").expect("origin"),
                ),
                Arc::new(MemoryStorage::new()),
                navigator.clone(),
            );

            let authorize = client.start_login().await.expect("start login");
            assert_eq!(navigator.last(), Some(authorize.clone()));
            let state = authorize
                .query_pairs()
                .find(|(k, _)| k == "state")
                .map(|(_, v)| v.into_owned())
                .expect("state");

            let tokens = client
                .handle_callback(&format!("http://app.test/callback?code=abc&state={state}"))
                .await
                .expect("exchange");
            let id_sub = decode_claims(tokens.id_token.as_deref().expect("id token"))
                .expect("claims")
                .sub;

            let user = client.get_current_user().await.expect("profile");
            assert_eq!(Some(user.sub.clone()), id_sub);
            assert!(user.has_group("administrators"));

            let ping = reqwest::Request::new(
                reqwest::Method::GET,
                gateway_url.join("v1/admin/ping").expect("url"),
            );
            let response = client.authenticated_fetch(ping).await.expect("ping");
            assert_eq!(response.status(), reqwest::StatusCode::OK);
            assert_eq!(
                response
                    .headers()
                    .get("access-control-allow-origin")
                    .and_then(|v| v.to_str().ok()),
                Some("*")
            );
        }
    }
}
