//! Authorization for the tollgate services.
//!
//! This module provides:
//! - Decoding of the gateway-forwarded request context
//! - Middleware that attaches the forwarded identity and gates routes
//! - An extractor for the attached identity
//!
//! # Authorization Model
//!
//! Services never verify tokens. The gateway authorizer validates the bearer
//! token on every call and forwards its claims; this module trusts those
//! claims and enforces group membership on administrative routes. The
//! identity lives in request extensions and nowhere else.

pub mod context;
pub mod middleware;

pub use context::{ContextError, identity_from_context};
pub use middleware::{CurrentIdentity, RequiredGroup, attach_auth, require_auth, require_group};
