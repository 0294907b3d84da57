//! Request-scoped authenticated identity.

use serde::{Deserialize, Serialize};

use crate::error::AuthorizationError;
use crate::groups::GroupSet;

/// The identity behind a request, reduced from verified or forwarded claims.
///
/// Services build it from the claims the gateway authorizer forwards; the
/// client builds the same shape from its own ID token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable user identifier (the `sub` claim).
    pub sub: String,
    /// Email address, when the provider supplies one.
    #[serde(default)]
    pub email: Option<String>,
    /// Group memberships.
    #[serde(default)]
    pub groups: GroupSet,
}

impl Identity {
    /// Creates an identity with no email and no groups.
    #[must_use]
    pub fn new(sub: String) -> Self {
        Self {
            sub,
            email: None,
            groups: GroupSet::new(),
        }
    }

    /// Sets the email.
    #[must_use]
    pub fn with_email(mut self, email: Option<String>) -> Self {
        self.email = email;
        self
    }

    /// Sets the groups.
    #[must_use]
    pub fn with_groups(mut self, groups: GroupSet) -> Self {
        self.groups = groups;
        self
    }

    /// Returns true if the identity belongs to `group`.
    #[must_use]
    pub fn has_group(&self, group: &str) -> bool {
        self.groups.contains(group)
    }

    /// Checks group membership.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorizationError::MissingGroup`] if the identity is not a member.
    pub fn require_group(&self, group: &str) -> Result<(), AuthorizationError> {
        if self.has_group(group) {
            Ok(())
        } else {
            Err(AuthorizationError::MissingGroup {
                subject: self.sub.clone(),
                group: group.to_string(),
            })
        }
    }
}
