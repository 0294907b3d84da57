//! Identity provider configuration and endpoint derivation.
//!
//! This is the payload served by the config endpoint and consumed by the
//! browser client. Field names follow the JSON wire format (`cognitoDomain`,
//! `cognitoClientId`, ...).

use serde::{Deserialize, Deserializer, Serialize};
use url::Url;

use crate::error::ProviderConfigError;

/// Scopes requested at the authorize endpoint.
pub const DEFAULT_SCOPES: [&str; 3] = ["openid", "email", "profile"];

/// Public identity provider settings needed to run the PKCE flow.
///
/// Nothing here is secret; PKCE replaces the client secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    /// Hosted UI domain, with or without scheme (e.g. "auth.example.com").
    cognito_domain: String,
    /// OAuth2 public client ID.
    cognito_client_id: String,
    /// Region of the user pool.
    #[serde(default = "default_region")]
    cognito_region: String,
    /// Callback URL override. Empty values are treated as absent.
    #[serde(default, deserialize_with = "non_empty")]
    redirect_uri: Option<String>,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn non_empty<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

impl ProviderConfig {
    /// Creates a configuration with the default region and no redirect override.
    #[must_use]
    pub fn new(cognito_domain: String, cognito_client_id: String) -> Self {
        Self {
            cognito_domain,
            cognito_client_id,
            cognito_region: default_region(),
            redirect_uri: None,
        }
    }

    /// Sets the region.
    #[must_use]
    pub fn with_region(mut self, region: String) -> Self {
        self.cognito_region = region;
        self
    }

    /// Sets the callback URL override. Blank values clear it.
    #[must_use]
    pub fn with_redirect_uri(mut self, redirect_uri: Option<String>) -> Self {
        self.redirect_uri = redirect_uri.filter(|s| !s.trim().is_empty());
        self
    }

    #[must_use]
    pub fn cognito_domain(&self) -> &str {
        &self.cognito_domain
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.cognito_client_id
    }

    #[must_use]
    pub fn region(&self) -> &str {
        &self.cognito_region
    }

    #[must_use]
    pub fn redirect_uri(&self) -> Option<&str> {
        self.redirect_uri.as_deref()
    }

    /// Returns the hosted UI base URL, always ending in `/`.
    ///
    /// A bare domain gets an `https://` scheme.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderConfigError::InvalidDomain`] if the domain is blank
    /// or does not parse as a URL.
    pub fn base_url(&self) -> Result<Url, ProviderConfigError> {
        let domain = self.cognito_domain.trim();
        if domain.is_empty() {
            return Err(ProviderConfigError::InvalidDomain {
                domain: self.cognito_domain.clone(),
                reason: "domain is empty".to_string(),
            });
        }

        let with_scheme = if domain.starts_with("http://") || domain.starts_with("https://") {
            domain.to_string()
        } else {
            format!("https://{domain}")
        };

        let mut url = Url::parse(&with_scheme).map_err(|e| ProviderConfigError::InvalidDomain {
            domain: self.cognito_domain.clone(),
            reason: e.to_string(),
        })?;

        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        url.set_query(None);
        url.set_fragment(None);
        Ok(url)
    }

    /// `{domain}/oauth2/authorize`
    ///
    /// # Errors
    ///
    /// See [`ProviderConfig::base_url`].
    pub fn authorize_endpoint(&self) -> Result<Url, ProviderConfigError> {
        self.endpoint("oauth2/authorize")
    }

    /// `{domain}/oauth2/token`
    ///
    /// # Errors
    ///
    /// See [`ProviderConfig::base_url`].
    pub fn token_endpoint(&self) -> Result<Url, ProviderConfigError> {
        self.endpoint("oauth2/token")
    }

    /// `{domain}/logout`
    ///
    /// # Errors
    ///
    /// See [`ProviderConfig::base_url`].
    pub fn logout_endpoint(&self) -> Result<Url, ProviderConfigError> {
        self.endpoint("logout")
    }

    fn endpoint(&self, path: &str) -> Result<Url, ProviderConfigError> {
        self.base_url()?
            .join(path)
            .map_err(|e| ProviderConfigError::InvalidDomain {
                domain: self.cognito_domain.clone(),
                reason: e.to_string(),
            })
    }
}
