//! Unverified decoding of JWT claims.
//!
//! Signatures are not checked here. The identity provider signs the tokens and
//! the gateway authorizer verifies them on every API call; decoded claims are
//! only good for optimistic local state and expiry bookkeeping.

use base64::Engine;
use base64::alphabet;
use base64::engine::general_purpose::GeneralPurpose;
use base64::engine::{DecodePaddingMode, GeneralPurposeConfig};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

use crate::error::TokenError;
use crate::groups::GroupSet;
use crate::identity::Identity;

/// base64url decoding that tolerates both padded and unpadded input.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Claims carried in an ID or access token payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Claims {
    pub sub: Option<String>,
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub email_verified: Option<bool>,
    pub name: Option<String>,
    pub preferred_username: Option<String>,
    #[serde(rename = "cognito:username")]
    pub cognito_username: Option<String>,
    pub username: Option<String>,
    #[serde(rename = "cognito:groups")]
    pub groups: Option<GroupSet>,
    /// Expiry as seconds since the Unix epoch.
    pub exp: Option<i64>,
    /// `"id"` or `"access"` for Cognito-issued tokens.
    pub token_use: Option<String>,
}

impl Claims {
    /// Returns the expiry instant, if the token carries a valid `exp`.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| DateTime::from_timestamp(exp, 0))
    }

    /// Returns true unless the token carries an expiry later than `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_none_or(|expires_at| expires_at <= now)
    }

    /// Returns the best available display name.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .or(self.preferred_username.as_deref())
            .or(self.cognito_username.as_deref())
            .or(self.username.as_deref())
    }

    /// Returns the group memberships, empty when the claim is absent.
    #[must_use]
    pub fn groups(&self) -> GroupSet {
        self.groups.clone().unwrap_or_default()
    }

    /// Reduces the claims to an [`Identity`].
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::MissingClaim`] if `sub` is absent or blank.
    pub fn identity(&self) -> Result<Identity, TokenError> {
        let sub = self
            .sub
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| TokenError::MissingClaim {
                claim: "sub".to_string(),
            })?;

        Ok(Identity::new(sub.to_string())
            .with_email(self.email.clone())
            .with_groups(self.groups()))
    }
}

/// Decodes the payload segment of a JWT without verifying its signature.
///
/// # Errors
///
/// Returns [`TokenError::Malformed`] if the token does not have three
/// segments or the payload is not base64-encoded JSON.
pub fn decode_claims(token: &str) -> Result<Claims, TokenError> {
    let mut segments = token.trim().split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(TokenError::Malformed {
            reason: "expected three dot-separated segments".to_string(),
        });
    };

    // Accept the standard alphabet too; some encoders do not use base64url.
    let payload = payload.replace('+', "-").replace('/', "_");
    let bytes = PAYLOAD_ENGINE
        .decode(payload)
        .map_err(|e| TokenError::Malformed {
            reason: format!("payload is not base64: {e}"),
        })?;

    serde_json::from_slice(&bytes).map_err(|e| TokenError::Malformed {
        reason: format!("payload is not a JSON claims object: {e}"),
    })
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrText {
        Bool(bool),
        Text(String),
    }

    Ok(match Option::<BoolOrText>::deserialize(deserializer)? {
        Some(BoolOrText::Bool(value)) => Some(value),
        Some(BoolOrText::Text(text)) if text.eq_ignore_ascii_case("true") => Some(true),
        Some(BoolOrText::Text(text)) if text.eq_ignore_ascii_case("false") => Some(false),
        Some(BoolOrText::Text(_)) | None => None,
    })
}
