//! Error types for the client flow.
//!
//! Errors are designed for layered context using rootcause. Callers see a
//! generic message for security-sensitive failures; the cause is logged where
//! the failure is detected.

use std::fmt;

/// Errors from the PKCE client flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The identity provider configuration could not be fetched or used.
    ConfigUnavailable { reason: String },
    /// The callback did not match a pending login attempt.
    ///
    /// Carries no detail on purpose: a wrong state, a missing state and a
    /// missing verifier all look the same to the caller.
    InvalidState,
    /// The identity provider rejected the authorization code.
    ///
    /// `body` is the provider's error response, or the transport failure.
    TokenExchangeFailed { body: String },
    /// No usable token is available to authenticate a request.
    NoCredential,
    /// An authenticated request could not be sent.
    Request { details: String },
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigUnavailable { reason } => {
                write!(f, "identity provider configuration unavailable: {reason}")
            }
            Self::InvalidState => {
                write!(f, "invalid or expired login attempt")
            }
            Self::TokenExchangeFailed { body } => {
                write!(f, "token exchange failed: {body}")
            }
            Self::NoCredential => {
                write!(f, "no usable credential; sign in first")
            }
            Self::Request { details } => {
                write!(f, "request failed: {details}")
            }
        }
    }
}

impl std::error::Error for ClientError {}
