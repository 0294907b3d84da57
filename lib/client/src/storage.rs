//! Tab-scoped key/value storage for tokens and login attempt state.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Storage keys used by the client.
pub mod keys {
    pub const ACCESS_TOKEN: &str = "tollgate.access_token";
    pub const ID_TOKEN: &str = "tollgate.id_token";
    pub const TOKEN_EXPIRES_AT: &str = "tollgate.token_expires_at";
    pub const PKCE_CODE_VERIFIER: &str = "tollgate.pkce_code_verifier";
    pub const OAUTH_STATE: &str = "tollgate.oauth_state";
    pub const OAUTH_REDIRECT_URI: &str = "tollgate.oauth_redirect_uri";

    /// Keys holding the token pair.
    pub const TOKENS: [&str; 3] = [ACCESS_TOKEN, ID_TOKEN, TOKEN_EXPIRES_AT];

    /// Keys holding the state of one login attempt.
    pub const PKCE_SESSION: [&str; 3] = [PKCE_CODE_VERIFIER, OAUTH_STATE, OAUTH_REDIRECT_URI];
}

/// String key/value store scoped to one browser tab (or one client instance).
pub trait SessionStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// In-memory [`SessionStorage`].
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if `key` holds a value.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries().contains_key(key)
    }

    // A panic while holding the lock cannot leave a HashMap half-written.
    fn entries(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries().insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.entries().remove(key);
    }
}
