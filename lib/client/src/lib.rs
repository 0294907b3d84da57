//! Browser-side OAuth2 authorization code flow with PKCE.
//!
//! This crate provides:
//! - The login, callback, token exchange and logout operations (`PkceClient`)
//! - Tab-scoped storage and navigation seams (`SessionStorage`, `Navigator`)
//! - Token persistence with expiry checks (`TokenStore`)
//! - Session bootstrap from persisted tokens (`AuthSession`)
//!
//! Tokens are never verified here. They are decoded only for optimistic
//! display and expiry bookkeeping; the gateway authorizer verifies them on
//! every API call.

pub mod error;
pub mod flow;
pub mod navigator;
pub mod pkce;
pub mod session;
pub mod storage;
pub mod tokens;

#[cfg(test)]
mod test_support;

pub use error::ClientError;
pub use flow::{ClientConfig, LoginState, PkceClient};
pub use navigator::{Navigator, RecordingNavigator};
pub use pkce::PkceMaterial;
pub use session::{AuthSession, SessionStatus};
pub use storage::{MemoryStorage, SessionStorage};
pub use tokens::{TokenSet, TokenStore};
