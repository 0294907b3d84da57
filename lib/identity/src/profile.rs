//! Profile payloads shared by the profile endpoint and the client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::claims::Claims;
use crate::error::TokenError;
use crate::groups::GroupSet;
use crate::identity::Identity;

/// A user as displayed by the client.
///
/// The profile endpoint fills `sub`, `email` and `groups`; a profile decoded
/// locally from an ID token also carries `name` and `email_verified`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub groups: GroupSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
}

impl UserProfile {
    /// Builds a provisional profile from decoded token claims.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::MissingClaim`] if the claims carry no subject.
    pub fn from_claims(claims: &Claims) -> Result<Self, TokenError> {
        let identity = claims.identity()?;
        Ok(Self {
            name: claims.display_name().map(str::to_string),
            email_verified: claims.email_verified,
            ..Self::from(identity)
        })
    }

    /// Returns true if the user belongs to `group`.
    #[must_use]
    pub fn has_group(&self, group: &str) -> bool {
        self.groups.contains(group)
    }
}

impl From<Identity> for UserProfile {
    fn from(identity: Identity) -> Self {
        Self {
            sub: identity.sub,
            email: identity.email,
            name: None,
            groups: identity.groups,
            email_verified: None,
        }
    }
}

/// Body of a successful `GET /v1/profile`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub authenticated: bool,
    pub user: UserProfile,
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ProfileResponse {
    /// Creates an authenticated profile response stamped with the current time.
    #[must_use]
    pub fn for_identity(identity: Identity) -> Self {
        Self {
            authenticated: true,
            user: identity.into(),
            status: "ok".to_string(),
            message: "Profile retrieved".to_string(),
            timestamp: Utc::now(),
        }
    }
}
