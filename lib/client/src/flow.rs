//! Authorization code flow with PKCE against the identity provider.
//!
//! One login attempt moves through [`LoginState`]:
//! `Idle -> Pending -> {Exchanged | Failed}`. Only `start_login` enters
//! `Pending`, and a later `start_login` overwrites the stored attempt so only
//! the most recent one can complete.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use oauth2::basic::{BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse};
use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, ClientId, CsrfToken, EndpointNotSet, EndpointSet,
    PkceCodeVerifier, RedirectUrl, RequestTokenError, Scope, StandardRevocableToken, TokenUrl,
};
use reqwest::header::{AUTHORIZATION, HeaderValue};
use tollgate_core::{RacyOnceCell, Result};
use tollgate_identity::{DEFAULT_SCOPES, ProfileResponse, ProviderConfig, UserProfile};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::error::ClientError;
use crate::navigator::Navigator;
use crate::pkce::{PkceMaterial, constant_time_eq};
use crate::storage::{SessionStorage, keys};
use crate::tokens::{ProviderTokenResponse, TokenSet, TokenStore};

/// Where the client finds its API and where the application is served from.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    api_base: Url,
    app_origin: Url,
}

impl ClientConfig {
    /// Creates a configuration. `api_base` may carry a path prefix.
    #[must_use]
    pub fn new(mut api_base: Url, app_origin: Url) -> Self {
        if !api_base.path().ends_with('/') {
            let path = format!("{}/", api_base.path());
            api_base.set_path(&path);
        }
        Self {
            api_base,
            app_origin,
        }
    }

    #[must_use]
    pub fn api_base(&self) -> &Url {
        &self.api_base
    }

    /// The application origin without a trailing slash, e.g. `https://app.example.com`.
    #[must_use]
    pub fn app_origin(&self) -> String {
        self.app_origin.origin().ascii_serialization()
    }

    /// Callback URL used when the provider configuration names none.
    #[must_use]
    pub fn default_callback_url(&self) -> String {
        format!("{}/callback", self.app_origin())
    }

    fn api_url(&self, path: &str) -> Result<Url, ClientError> {
        self.api_base.join(path).map_err(|e| {
            ClientError::ConfigUnavailable {
                reason: format!("invalid API URL for {path}: {e}"),
            }
            .into()
        })
    }
}

/// OAuth2 client for the provider's authorize and token endpoints.
type ProviderClient = oauth2::Client<
    BasicErrorResponse,
    ProviderTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;

/// Builds the OAuth2 client for one login attempt.
///
/// The provider issues public clients only, so `client_id` travels in the
/// request body and no secret is sent.
fn oauth_client(
    provider: &ProviderConfig,
    redirect_uri: &str,
) -> Result<ProviderClient, ClientError> {
    let auth_url = provider.authorize_endpoint().map_err(config_unavailable)?;
    let token_url = provider.token_endpoint().map_err(config_unavailable)?;
    let redirect_url = RedirectUrl::new(redirect_uri.to_string()).map_err(config_unavailable)?;

    Ok(oauth2::Client::new(ClientId::new(provider.client_id().to_string()))
        .set_auth_uri(AuthUrl::from_url(auth_url))
        .set_token_uri(TokenUrl::from_url(token_url))
        .set_redirect_uri(redirect_url)
        .set_auth_type(AuthType::RequestBody))
}

fn config_unavailable(err: impl fmt::Display) -> ClientError {
    ClientError::ConfigUnavailable {
        reason: err.to_string(),
    }
}

/// Reduces a failed token request to the body reported to the caller.
fn rejection_body<RE>(err: RequestTokenError<RE, BasicErrorResponse>) -> String
where
    RE: std::error::Error + 'static,
{
    match err {
        RequestTokenError::ServerResponse(response) => {
            serde_json::to_string(&response).unwrap_or_else(|_| response.to_string())
        }
        RequestTokenError::Parse(_, body) => String::from_utf8_lossy(&body).into_owned(),
        RequestTokenError::Request(e) => e.to_string(),
        RequestTokenError::Other(message) => message,
    }
}

/// Progress of the current login attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    Idle,
    Pending,
    Exchanged,
    Failed,
}

/// Code verifier and redirect URI captured at login start.
struct PkceSession {
    code_verifier: String,
    redirect_uri: String,
}

/// Parameters the identity provider appends to the callback URL.
#[derive(Debug, Default)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl CallbackParams {
    /// Parses a callback query string or a full callback URL.
    fn parse(input: &str) -> Self {
        let query = input.split_once('?').map_or(input, |(_, query)| query);
        let query = query.split_once('#').map_or(query, |(query, _)| query);

        let mut params = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let slot = match key.as_ref() {
                "code" => &mut params.code,
                "state" => &mut params.state,
                "error" => &mut params.error,
                "error_description" => &mut params.error_description,
                _ => continue,
            };
            *slot = Some(value.into_owned());
        }
        params
    }
}

/// Browser-side OAuth2 client.
pub struct PkceClient {
    config: ClientConfig,
    http: reqwest::Client,
    storage: Arc<dyn SessionStorage>,
    tokens: TokenStore,
    navigator: Arc<dyn Navigator>,
    provider: RacyOnceCell<ProviderConfig>,
    login_state: Mutex<LoginState>,
}

impl PkceClient {
    #[must_use]
    pub fn new(
        config: ClientConfig,
        storage: Arc<dyn SessionStorage>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            tokens: TokenStore::new(storage.clone()),
            storage,
            navigator,
            provider: RacyOnceCell::new(),
            login_state: Mutex::new(LoginState::Idle),
        }
    }

    /// Replaces the HTTP client.
    #[must_use]
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Token persistence accessors.
    #[must_use]
    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    #[must_use]
    pub fn login_state(&self) -> LoginState {
        *self
            .login_state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn set_login_state(&self, state: LoginState) {
        *self
            .login_state
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Returns the identity provider configuration, fetching it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ConfigUnavailable`] if the config endpoint cannot
    /// be reached or returns an unusable payload. Failures are not cached.
    pub async fn provider_config(&self) -> Result<&ProviderConfig, ClientError> {
        self.provider
            .get_or_try_init(|| self.fetch_provider_config())
            .await
    }

    #[instrument(skip(self))]
    async fn fetch_provider_config(&self) -> Result<ProviderConfig, ClientError> {
        let url = self.config.api_url("v1/config")?;
        debug!(%url, "fetching identity provider configuration");

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ClientError::ConfigUnavailable {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "config endpoint returned an error");
            return Err(ClientError::ConfigUnavailable {
                reason: format!("config endpoint returned {status}"),
            }
            .into());
        }

        let provider: ProviderConfig =
            response
                .json()
                .await
                .map_err(|e| ClientError::ConfigUnavailable {
                    reason: format!("invalid config payload: {e}"),
                })?;

        info!(
            domain = provider.cognito_domain(),
            region = provider.region(),
            "identity provider configuration loaded"
        );
        Ok(provider)
    }

    /// Prepares a login attempt and returns the authorize URL.
    ///
    /// Stores the code verifier, state and callback URL, replacing any earlier
    /// pending attempt.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ConfigUnavailable`] if the provider configuration
    /// cannot be loaded.
    pub async fn authorization_request(&self) -> Result<Url, ClientError> {
        let provider = self.provider_config().await?;
        let redirect_uri = provider
            .redirect_uri()
            .map_or_else(|| self.config.default_callback_url(), str::to_string);
        let client = oauth_client(provider, &redirect_uri)?;
        let material = PkceMaterial::generate();

        let state = material.state().to_string();
        let (url, _) = client
            .authorize_url(move || CsrfToken::new(state))
            .add_scopes(DEFAULT_SCOPES.iter().map(|scope| Scope::new((*scope).to_string())))
            .set_pkce_challenge(material.code_challenge())
            .url();

        self.storage
            .set(keys::PKCE_CODE_VERIFIER, material.verifier());
        self.storage.set(keys::OAUTH_STATE, material.state());
        self.storage.set(keys::OAUTH_REDIRECT_URI, &redirect_uri);
        self.set_login_state(LoginState::Pending);

        debug!(%redirect_uri, "login attempt prepared");
        Ok(url)
    }

    /// Starts a login attempt and navigates to the identity provider.
    ///
    /// The navigation ends the current page lifecycle; the returned URL is
    /// what was navigated to.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ConfigUnavailable`] if the provider configuration
    /// cannot be loaded. Nothing is stored or navigated in that case.
    #[instrument(skip(self))]
    pub async fn start_login(&self) -> Result<Url, ClientError> {
        let url = self.authorization_request().await?;
        info!("redirecting to identity provider");
        self.navigator.navigate(&url);
        Ok(url)
    }

    /// Exchanges an authorization code for tokens.
    ///
    /// The stored login attempt is consumed whether or not the exchange
    /// succeeds.
    ///
    /// # Errors
    ///
    /// - [`ClientError::InvalidState`] if no login attempt is pending or
    ///   `state` does not match it
    /// - [`ClientError::TokenExchangeFailed`] if the provider rejects the code
    /// - [`ClientError::ConfigUnavailable`] if the provider configuration
    ///   cannot be loaded
    #[instrument(skip(self, code, state))]
    pub async fn exchange_code_for_tokens(
        &self,
        code: &str,
        state: &str,
    ) -> Result<TokenSet, ClientError> {
        let Some(session) = self.take_pkce_session(state) else {
            self.set_login_state(LoginState::Failed);
            return Err(ClientError::InvalidState.into());
        };

        match self.request_tokens(code, &session).await {
            Ok(tokens) => {
                self.set_login_state(LoginState::Exchanged);
                Ok(tokens)
            }
            Err(report) => {
                self.set_login_state(LoginState::Failed);
                Err(report)
            }
        }
    }

    /// Removes the stored login attempt and returns it if `state` matches.
    fn take_pkce_session(&self, state: &str) -> Option<PkceSession> {
        let stored_state = self.storage.get(keys::OAUTH_STATE);
        let code_verifier = self.storage.get(keys::PKCE_CODE_VERIFIER);
        let redirect_uri = self.storage.get(keys::OAUTH_REDIRECT_URI);
        self.clear_pkce_session();

        match (stored_state, code_verifier, redirect_uri) {
            (Some(stored), Some(code_verifier), Some(redirect_uri))
                if constant_time_eq(&stored, state) =>
            {
                Some(PkceSession {
                    code_verifier,
                    redirect_uri,
                })
            }
            (stored, code_verifier, redirect_uri) => {
                let cause = if stored.is_none() {
                    "no stored state"
                } else if code_verifier.is_none() {
                    "no stored code verifier"
                } else if redirect_uri.is_none() {
                    "no stored redirect URI"
                } else {
                    "state mismatch"
                };
                warn!(cause, "rejecting authorization callback");
                None
            }
        }
    }

    fn clear_pkce_session(&self) {
        for key in keys::PKCE_SESSION {
            self.storage.remove(key);
        }
    }

    async fn request_tokens(
        &self,
        code: &str,
        session: &PkceSession,
    ) -> Result<TokenSet, ClientError> {
        let provider = self.provider_config().await?;
        let client = oauth_client(provider, &session.redirect_uri)?;

        let response: ProviderTokenResponse = client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_pkce_verifier(PkceCodeVerifier::new(session.code_verifier.clone()))
            .request_async(&self.http)
            .await
            .map_err(|e| {
                let body = rejection_body(e);
                error!(%body, "identity provider rejected authorization code");
                ClientError::TokenExchangeFailed { body }
            })?;

        let tokens = TokenSet::from_response(&response, Utc::now());
        info!(
            has_id_token = tokens.id_token.is_some(),
            expires_in = tokens.expires_in,
            "authorization code exchanged"
        );
        Ok(tokens)
    }

    /// Completes a login from the callback query (or full callback URL) and
    /// stores the resulting tokens.
    ///
    /// # Errors
    ///
    /// - [`ClientError::TokenExchangeFailed`] if the provider reported an
    ///   error or no code, or rejected the code
    /// - [`ClientError::InvalidState`] if the state does not match the
    ///   pending login attempt
    #[instrument(skip_all)]
    pub async fn handle_callback(&self, callback: &str) -> Result<TokenSet, ClientError> {
        let params = CallbackParams::parse(callback);

        if let Some(error) = params.error {
            self.clear_pkce_session();
            self.set_login_state(LoginState::Failed);
            let body = match params.error_description {
                Some(description) => format!("{error}: {description}"),
                None => error,
            };
            warn!(%body, "identity provider returned an error to the callback");
            return Err(ClientError::TokenExchangeFailed { body }.into());
        }

        let Some(code) = params.code else {
            self.clear_pkce_session();
            self.set_login_state(LoginState::Failed);
            warn!("callback carried no authorization code");
            return Err(ClientError::TokenExchangeFailed {
                body: "callback is missing the authorization code".to_string(),
            }
            .into());
        };

        let tokens = self
            .exchange_code_for_tokens(&code, params.state.as_deref().unwrap_or_default())
            .await?;
        self.tokens.store_tokens(&tokens);
        Ok(tokens)
    }

    /// Resolves the signed-in user through the profile endpoint.
    ///
    /// Returns `None` when no token is usable or the lookup fails for any
    /// reason. Failures are logged, not returned.
    #[instrument(skip(self))]
    pub async fn get_current_user(&self) -> Option<UserProfile> {
        let Some(token) = self.tokens.usable_bearer(Utc::now()) else {
            debug!("no usable token; skipping profile lookup");
            return None;
        };

        match self.fetch_profile(&token).await {
            Ok(user) => Some(user),
            Err(report) => {
                warn!(error = %report, "profile lookup failed");
                None
            }
        }
    }

    async fn fetch_profile(&self, token: &str) -> Result<UserProfile, ClientError> {
        let url = self.config.api_url("v1/profile")?;
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ClientError::Request {
                details: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Request {
                details: format!("profile endpoint returned {status}"),
            }
            .into());
        }

        let profile: ProfileResponse =
            response.json().await.map_err(|e| ClientError::Request {
                details: format!("invalid profile payload: {e}"),
            })?;
        Ok(profile.user)
    }

    /// Sends `request` with the current bearer token attached.
    ///
    /// The request is otherwise sent unchanged.
    ///
    /// # Errors
    ///
    /// - [`ClientError::NoCredential`] if no token is usable
    /// - [`ClientError::Request`] if sending fails
    pub async fn authenticated_fetch(
        &self,
        mut request: reqwest::Request,
    ) -> Result<reqwest::Response, ClientError> {
        let token = self
            .tokens
            .usable_bearer(Utc::now())
            .ok_or(ClientError::NoCredential)?;
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| ClientError::NoCredential)?;
        request.headers_mut().insert(AUTHORIZATION, value);

        self.http
            .execute(request)
            .await
            .map_err(|e| {
                ClientError::Request {
                    details: e.to_string(),
                }
                .into()
            })
    }

    /// Clears all local tokens and login state, then navigates to the
    /// provider's logout endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ConfigUnavailable`] if the provider configuration
    /// cannot be loaded. Local state is cleared regardless.
    #[instrument(skip(self))]
    pub async fn do_logout(&self) -> Result<Url, ClientError> {
        self.tokens.clear_tokens();
        self.set_login_state(LoginState::Idle);

        let provider = self.provider_config().await?;
        let mut url = provider
            .logout_endpoint()
            .map_err(|e| ClientError::ConfigUnavailable {
                reason: e.to_string(),
            })?;
        url.query_pairs_mut()
            .append_pair("client_id", provider.client_id())
            .append_pair("logout_uri", &self.config.app_origin());

        info!("signing out at identity provider");
        self.navigator.navigate(&url);
        Ok(url)
    }
}
