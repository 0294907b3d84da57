//! Gateway request context decoding.
//!
//! The gateway authorizer verifies the bearer token and forwards the claims
//! as a JSON request context in a header, sometimes percent-encoded:
//!
//! ```json
//! {"authorizer": {"claims": {"sub": "...", "email": "...", "cognito:groups": "..."}}}
//! ```
//!
//! JWT authorizers nest the claims one level deeper, under `authorizer.jwt.claims`.

use std::borrow::Cow;
use std::fmt;

use serde::Deserialize;
use tollgate_identity::{GroupSet, Identity};

/// Reasons a forwarded context yields no identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    /// The header is not valid percent-encoded UTF-8.
    Undecodable { details: String },
    /// The header is not a JSON request context.
    Malformed { details: String },
    /// The context carries no authorizer claims.
    MissingClaims,
    /// The claims carry no subject.
    MissingSubject,
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undecodable { details } => {
                write!(f, "request context is not decodable: {details}")
            }
            Self::Malformed { details } => write!(f, "request context is malformed: {details}"),
            Self::MissingClaims => write!(f, "request context has no authorizer claims"),
            Self::MissingSubject => write!(f, "authorizer claims have no subject"),
        }
    }
}

impl std::error::Error for ContextError {}

#[derive(Debug, Deserialize)]
struct RequestContext {
    #[serde(default)]
    authorizer: Option<Authorizer>,
}

#[derive(Debug, Deserialize)]
struct Authorizer {
    #[serde(default)]
    claims: Option<ForwardedClaims>,
    #[serde(default)]
    jwt: Option<JwtAuthorizer>,
}

#[derive(Debug, Deserialize)]
struct JwtAuthorizer {
    #[serde(default)]
    claims: Option<ForwardedClaims>,
}

#[derive(Debug, Deserialize)]
struct ForwardedClaims {
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default, rename = "cognito:groups")]
    groups: Option<GroupSet>,
}

/// Reduces a forwarded request context header to an [`Identity`].
///
/// # Errors
///
/// Returns a [`ContextError`] describing why no identity could be built.
pub fn identity_from_context(raw: &str) -> Result<Identity, ContextError> {
    let json = decode(raw.trim())?;
    let context: RequestContext =
        serde_json::from_str(&json).map_err(|e| ContextError::Malformed {
            details: e.to_string(),
        })?;

    let claims = context
        .authorizer
        .and_then(|authorizer| {
            authorizer
                .claims
                .or_else(|| authorizer.jwt.and_then(|jwt| jwt.claims))
        })
        .ok_or(ContextError::MissingClaims)?;

    let sub = claims
        .sub
        .filter(|s| !s.trim().is_empty())
        .ok_or(ContextError::MissingSubject)?;

    Ok(Identity::new(sub)
        .with_email(claims.email.filter(|e| !e.is_empty()))
        .with_groups(claims.groups.unwrap_or_default()))
}

fn decode(raw: &str) -> Result<Cow<'_, str>, ContextError> {
    if raw.starts_with('{') {
        return Ok(Cow::Borrowed(raw));
    }
    urlencoding::decode(raw).map_err(|e| ContextError::Undecodable {
        details: e.to_string(),
    })
}
