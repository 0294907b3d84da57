//! Authorization middleware and extractors for Axum.
//!
//! Composed in sequence: [`attach_auth`] runs on every request and places the
//! forwarded [`Identity`] in request extensions; [`require_auth`] and
//! [`require_group`] gate the routes they are layered on.

use axum::extract::{FromRequestParts, Request, State};
use axum::http::HeaderName;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use tollgate_identity::Identity;
use tracing::{debug, warn};

use super::context::identity_from_context;
use crate::error::ApiError;

/// Group a route requires, as middleware state.
#[derive(Debug, Clone)]
pub struct RequiredGroup(String);

impl RequiredGroup {
    #[must_use]
    pub fn new(group: impl Into<String>) -> Self {
        Self(group.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Reads the gateway context header and attaches the identity it carries.
///
/// Never rejects; a missing or malformed header leaves the request
/// unauthenticated.
pub async fn attach_auth(
    State(context_header): State<HeaderName>,
    mut request: Request,
    next: Next,
) -> Response {
    // Never trust an identity placed by anything upstream of this layer.
    request.extensions_mut().remove::<Identity>();

    if let Some(value) = request.headers().get(&context_header) {
        // Raw contexts may carry UTF-8 claim values, which `to_str` rejects.
        let identity = std::str::from_utf8(value.as_bytes())
            .map_err(|e| e.to_string())
            .and_then(|raw| identity_from_context(raw).map_err(|e| e.to_string()));

        match identity {
            Ok(identity) => {
                debug!(sub = %identity.sub, groups = identity.groups.len(), "attached forwarded identity");
                request.extensions_mut().insert(identity);
            }
            Err(reason) => {
                warn!(header = %context_header, %reason, "ignoring unusable request context");
            }
        }
    }

    next.run(request).await
}

/// Rejects requests without an attached identity.
///
/// # Errors
///
/// Returns [`ApiError::Unauthenticated`] (401).
pub async fn require_auth(request: Request, next: Next) -> Result<Response, ApiError> {
    if request.extensions().get::<Identity>().is_none() {
        debug!(path = %request.uri().path(), "rejecting unauthenticated request");
        return Err(ApiError::Unauthenticated);
    }
    Ok(next.run(request).await)
}

/// Rejects requests whose identity is not a member of the required group.
///
/// # Errors
///
/// Returns [`ApiError::Unauthenticated`] (401) without an identity, or
/// [`ApiError::Forbidden`] (403) without the group.
pub async fn require_group(
    State(group): State<RequiredGroup>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let identity = request
        .extensions()
        .get::<Identity>()
        .ok_or(ApiError::Unauthenticated)?;

    identity.require_group(group.as_str()).map_err(|e| {
        warn!(error = %e, path = %request.uri().path(), "group check failed");
        ApiError::Forbidden {
            group: group.as_str().to_string(),
        }
    })?;

    Ok(next.run(request).await)
}

/// Extractor for the identity attached by [`attach_auth`].
pub struct CurrentIdentity(pub Identity);

impl<S> FromRequestParts<S> for CurrentIdentity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(CurrentIdentity)
            .ok_or(ApiError::Unauthenticated)
    }
}
