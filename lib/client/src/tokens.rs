//! Token pair persistence and usability checks.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use oauth2::basic::BasicTokenType;
use oauth2::{ExtraTokenFields, StandardTokenResponse, TokenResponse};
use serde::{Deserialize, Serialize};
use tollgate_identity::decode_claims;
use tracing::{debug, info};

use crate::storage::{SessionStorage, keys};

/// Tokens returned by a successful code exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSet {
    pub access_token: String,
    pub id_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    /// Absolute expiry computed from `expires_in` at exchange time.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Token endpoint fields beyond the standard OAuth2 ones.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct IdTokenFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id_token: Option<String>,
}

impl ExtraTokenFields for IdTokenFields {}

/// Token endpoint response body.
pub(crate) type ProviderTokenResponse = StandardTokenResponse<IdTokenFields, BasicTokenType>;

impl TokenSet {
    /// Builds a token set from a token endpoint response received at `received_at`.
    pub(crate) fn from_response(
        response: &ProviderTokenResponse,
        received_at: DateTime<Utc>,
    ) -> Self {
        let expires_in = response
            .expires_in()
            .and_then(|lifetime| i64::try_from(lifetime.as_secs()).ok());
        Self {
            access_token: response.access_token().secret().clone(),
            id_token: response.extra_fields().id_token.clone(),
            refresh_token: response.refresh_token().map(|token| token.secret().clone()),
            expires_in,
            expires_at: expires_in.map(|seconds| received_at + Duration::seconds(seconds)),
        }
    }
}

/// Reads and writes the token pair in session storage.
///
/// A token is usable only while its expiry lies in the future. The expiry
/// comes from the token's own `exp` claim, or for opaque tokens from the
/// expiry recorded at exchange time. A token with no known expiry is not
/// usable. Unusable tokens are purged when they are looked up.
#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<dyn SessionStorage>,
}

impl TokenStore {
    #[must_use]
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        Self { storage }
    }

    /// Stores an access token on its own.
    ///
    /// Drops any recorded expiry, which belonged to the previous pair. The
    /// token is then dated by its own `exp` claim or not at all.
    pub fn store_access_token(&self, token: &str) {
        self.storage.remove(keys::TOKEN_EXPIRES_AT);
        self.storage.set(keys::ACCESS_TOKEN, token);
    }

    /// Stores an ID token on its own. Drops any recorded expiry.
    pub fn store_id_token(&self, token: &str) {
        self.storage.remove(keys::TOKEN_EXPIRES_AT);
        self.storage.set(keys::ID_TOKEN, token);
    }

    /// Stores a whole token set, replacing any previous pair.
    pub fn store_tokens(&self, tokens: &TokenSet) {
        self.purge_tokens();
        self.store_access_token(&tokens.access_token);
        if let Some(id_token) = &tokens.id_token {
            self.store_id_token(id_token);
        }
        if let Some(expires_at) = tokens.expires_at {
            self.storage
                .set(keys::TOKEN_EXPIRES_AT, &expires_at.to_rfc3339());
        }
    }

    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.storage.get(keys::ACCESS_TOKEN)
    }

    #[must_use]
    pub fn id_token(&self) -> Option<String> {
        self.storage.get(keys::ID_TOKEN)
    }

    /// Expiry recorded when the tokens were stored.
    #[must_use]
    pub fn stored_expiry(&self) -> Option<DateTime<Utc>> {
        self.storage
            .get(keys::TOKEN_EXPIRES_AT)
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|at| at.with_timezone(&Utc))
    }

    /// Removes the token pair and any leftover login attempt state.
    pub fn clear_tokens(&self) {
        self.purge_tokens();
        for key in keys::PKCE_SESSION {
            self.storage.remove(key);
        }
    }

    /// Removes the token pair only.
    pub fn purge_tokens(&self) {
        for key in keys::TOKENS {
            self.storage.remove(key);
        }
    }

    /// Returns the expiry of `token`.
    #[must_use]
    pub fn expiry_of(&self, token: &str) -> Option<DateTime<Utc>> {
        decode_claims(token)
            .ok()
            .and_then(|claims| claims.expires_at())
            .or_else(|| self.stored_expiry())
    }

    /// Returns the ID token if it is usable at `now`.
    ///
    /// An unusable ID token purges the whole pair; both were issued together.
    #[must_use]
    pub fn usable_id_token(&self, now: DateTime<Utc>) -> Option<String> {
        self.usable(keys::ID_TOKEN, now)
    }

    /// Returns the access token if it is usable at `now`.
    #[must_use]
    pub fn usable_access_token(&self, now: DateTime<Utc>) -> Option<String> {
        self.usable(keys::ACCESS_TOKEN, now)
    }

    /// Returns the token to present as a bearer credential, preferring the ID
    /// token since the gateway authorizer validates ID tokens.
    #[must_use]
    pub fn usable_bearer(&self, now: DateTime<Utc>) -> Option<String> {
        self.usable_id_token(now)
            .or_else(|| self.usable_access_token(now))
    }

    fn usable(&self, key: &str, now: DateTime<Utc>) -> Option<String> {
        let token = self.storage.get(key)?;
        match self.expiry_of(&token) {
            Some(expires_at) if expires_at > now => Some(token),
            Some(expires_at) => {
                info!(%key, %expires_at, "stored token expired; purging tokens");
                self.purge_tokens();
                None
            }
            None => {
                debug!(%key, "stored token has no known expiry; purging tokens");
                self.purge_tokens();
                None
            }
        }
    }
}
