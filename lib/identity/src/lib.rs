//! Identity types shared by the tollgate browser client and HTTP services.
//!
//! This crate provides:
//! - Identity provider configuration and endpoint derivation (`ProviderConfig`)
//! - Unverified JWT claims decoding (`decode_claims`, `Claims`)
//! - Group claim normalization (`GroupSet`)
//! - The request-scoped `Identity` and the profile payloads built from it
//! - Authentication and authorization error types
//!
//! # Authorization Model
//!
//! Tokens are verified by the identity provider and by the gateway authorizer,
//! never here. The client decodes its own tokens only for optimistic display,
//! and services trust the claims the gateway forwards. Both sides reduce those
//! claims to the same `Identity` shape so that UI and API agree.
//!
//! # Example
//!
//! ```
//! use tollgate_identity::{GroupSet, Identity};
//!
//! let groups: GroupSet = serde_json::from_str(r#""administrators""#).unwrap();
//! let identity = Identity::new("user-123".to_string())
//!     .with_email(Some("alice@example.com".to_string()))
//!     .with_groups(groups);
//!
//! assert!(identity.has_group("administrators"));
//! assert!(identity.require_group("auditors").is_err());
//! ```

pub mod claims;
pub mod error;
pub mod groups;
pub mod identity;
pub mod profile;
pub mod provider;

// Re-export main types at crate root
pub use claims::{Claims, decode_claims};
pub use error::{AuthorizationError, ProviderConfigError, TokenError};
pub use groups::GroupSet;
pub use identity::Identity;
pub use profile::{ProfileResponse, UserProfile};
pub use provider::{DEFAULT_SCOPES, ProviderConfig};
