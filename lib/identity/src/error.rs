//! Error types for the identity crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `TokenError`: a token could not be decoded into claims
//! - `AuthorizationError`: an identity failed a group check
//! - `ProviderConfigError`: identity provider endpoints could not be derived

use std::fmt;

/// Errors from decoding a token's claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// The token is not a three-segment JWT with a JSON payload.
    Malformed { reason: String },
    /// A claim required to build an identity is absent.
    MissingClaim { claim: String },
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed { reason } => {
                write!(f, "malformed token: {reason}")
            }
            Self::MissingClaim { claim } => {
                write!(f, "missing required claim: {claim}")
            }
        }
    }
}

impl std::error::Error for TokenError {}

/// Errors from authorization checks against an identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationError {
    /// No identity was established for the request.
    NotAuthenticated,
    /// The identity is not a member of the required group.
    MissingGroup { subject: String, group: String },
}

impl fmt::Display for AuthorizationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAuthenticated => {
                write!(f, "user is not authenticated")
            }
            Self::MissingGroup { subject, group } => {
                write!(f, "user {subject} is not a member of group '{group}'")
            }
        }
    }
}

impl std::error::Error for AuthorizationError {}

/// Errors from interpreting identity provider configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderConfigError {
    /// The configured domain does not form a valid base URL.
    InvalidDomain { domain: String, reason: String },
}

impl fmt::Display for ProviderConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDomain { domain, reason } => {
                write!(f, "invalid identity provider domain '{domain}': {reason}")
            }
        }
    }
}

impl std::error::Error for ProviderConfigError {}
