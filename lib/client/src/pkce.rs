//! Proof-key and state material for one login attempt.

use oauth2::PkceCodeChallenge;

/// Verifier, challenge and CSRF state generated together at login start.
#[derive(Debug, Clone)]
pub struct PkceMaterial {
    verifier: String,
    challenge: PkceCodeChallenge,
    state: String,
}

impl PkceMaterial {
    /// Generates a fresh verifier (43 characters of the base64url alphabet),
    /// its S256 challenge, and a 16-byte hex-encoded state nonce.
    #[must_use]
    pub fn generate() -> Self {
        let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();
        Self {
            verifier: verifier.secret().clone(),
            challenge,
            state: generate_state(),
        }
    }

    #[must_use]
    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    #[must_use]
    pub fn challenge(&self) -> &str {
        self.challenge.as_str()
    }

    /// The challenge as sent on the authorize request (S256).
    pub(crate) fn code_challenge(&self) -> PkceCodeChallenge {
        self.challenge.clone()
    }

    #[must_use]
    pub fn state(&self) -> &str {
        &self.state
    }
}

fn generate_state() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}

/// Compares two strings without short-circuiting on the first differing byte.
pub(crate) fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}
