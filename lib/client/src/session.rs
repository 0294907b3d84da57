//! Local session bootstrap from persisted tokens.
//!
//! On start the client rebuilds a provisional identity from its stored ID
//! token without a network round trip, then reconciles with the profile
//! endpoint. A failed reconciliation keeps the provisional identity; a
//! transient API failure never signs out a user holding a valid token.

use chrono::{DateTime, Utc};
use tollgate_identity::{UserProfile, decode_claims};
use tracing::{debug, info, warn};

use crate::flow::PkceClient;
use crate::tokens::TokenStore;

/// What the client currently knows about the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    /// No usable token.
    SignedOut,
    /// A usable access token but no local identity; waiting on the profile call.
    Resolving,
    /// Identity decoded from the local ID token, not yet confirmed.
    Provisional(UserProfile),
    /// Identity returned by the profile endpoint.
    Verified(UserProfile),
}

/// Client-side authentication session.
#[derive(Debug, Clone)]
pub struct AuthSession {
    status: SessionStatus,
}

impl AuthSession {
    /// Restores the session from stored tokens at the current time.
    #[must_use]
    pub fn restore(tokens: &TokenStore) -> Self {
        Self::restore_at(tokens, Utc::now())
    }

    /// Restores the session from stored tokens as of `now`.
    ///
    /// Expired tokens are purged.
    #[must_use]
    pub fn restore_at(tokens: &TokenStore, now: DateTime<Utc>) -> Self {
        if let Some(id_token) = tokens.usable_id_token(now) {
            let profile = decode_claims(&id_token)
                .ok()
                .and_then(|claims| UserProfile::from_claims(&claims).ok());

            return match profile {
                Some(user) => {
                    debug!(sub = %user.sub, "restored provisional identity from ID token");
                    Self {
                        status: SessionStatus::Provisional(user),
                    }
                }
                None => {
                    warn!("stored ID token has no subject; resolving through profile");
                    Self {
                        status: SessionStatus::Resolving,
                    }
                }
            };
        }

        let status = if tokens.usable_access_token(now).is_some() {
            SessionStatus::Resolving
        } else {
            SessionStatus::SignedOut
        };
        Self { status }
    }

    /// Confirms the identity with the profile endpoint.
    ///
    /// A returned user replaces the current identity. On failure the current
    /// identity is kept.
    pub async fn reconcile(&mut self, client: &PkceClient) {
        if self.status == SessionStatus::SignedOut {
            return;
        }

        match client.get_current_user().await {
            Some(user) => {
                info!(sub = %user.sub, "identity confirmed by profile endpoint");
                self.status = SessionStatus::Verified(user);
            }
            None => {
                debug!("profile lookup returned nothing; keeping current identity");
            }
        }
    }

    #[must_use]
    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    /// Returns the best known user, provisional or verified.
    #[must_use]
    pub fn user(&self) -> Option<&UserProfile> {
        match &self.status {
            SessionStatus::Provisional(user) | SessionStatus::Verified(user) => Some(user),
            SessionStatus::SignedOut | SessionStatus::Resolving => None,
        }
    }

    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.status != SessionStatus::SignedOut
    }
}
