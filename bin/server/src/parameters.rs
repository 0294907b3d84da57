//! Identity provider parameters behind `/v1/config`.
//!
//! Parameters come either from server configuration or from the AWS
//! Parameters and Secrets extension. They are operationally static, so the
//! assembled [`ProviderConfig`] is fetched on first demand and kept for the
//! life of the process.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tollgate_core::{RacyOnceCell, Result};
use tollgate_identity::ProviderConfig;
use tracing::{debug, info, instrument};
use url::Url;

use crate::config::{IdentityParameters, ParameterSource};

/// Parameter names, relative to the configured prefix.
pub mod keys {
    pub const COGNITO_DOMAIN: &str = "cognito-domain";
    pub const COGNITO_CLIENT_ID: &str = "cognito-client-id";
    pub const COGNITO_REGION: &str = "cognito-region";
    pub const REDIRECT_URI: &str = "redirect-uri";
}

/// Header carrying the session token expected by the extension.
const EXTENSION_TOKEN_HEADER: &str = "X-Aws-Parameters-Secrets-Token";

/// Errors from loading parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterError {
    /// A required parameter has no value.
    Missing { name: String },
    /// The parameter source could not be reached.
    FetchFailed { name: String, details: String },
    /// The parameter source answered with something unusable.
    InvalidResponse { name: String, details: String },
    /// The parameter source itself is misconfigured.
    Misconfigured { details: String },
}

impl fmt::Display for ParameterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing { name } => write!(f, "parameter '{name}' is not set"),
            Self::FetchFailed { name, details } => {
                write!(f, "failed to fetch parameter '{name}': {details}")
            }
            Self::InvalidResponse { name, details } => {
                write!(f, "invalid value for parameter '{name}': {details}")
            }
            Self::Misconfigured { details } => {
                write!(f, "parameter source misconfigured: {details}")
            }
        }
    }
}

impl std::error::Error for ParameterError {}

/// Source of named string parameters.
#[async_trait]
pub trait ParameterStore: Send + Sync {
    /// Returns the value of `key`, or `None` if it is not set.
    async fn get(&self, key: &str) -> Result<Option<String>, ParameterError>;
}

/// Parameters held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticParameterStore {
    values: HashMap<String, String>,
}

impl StaticParameterStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key`. Blank values are ignored.
    #[must_use]
    pub fn with(mut self, key: &str, value: Option<String>) -> Self {
        if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
            self.values.insert(key.to_string(), value);
        }
        self
    }

    /// Builds a store from statically configured values.
    #[must_use]
    pub fn from_config(identity: &IdentityParameters) -> Self {
        Self::new()
            .with(keys::COGNITO_DOMAIN, identity.cognito_domain.clone())
            .with(keys::COGNITO_CLIENT_ID, identity.cognito_client_id.clone())
            .with(keys::COGNITO_REGION, identity.cognito_region.clone())
            .with(keys::REDIRECT_URI, identity.redirect_uri.clone())
    }
}

#[async_trait]
impl ParameterStore for StaticParameterStore {
    async fn get(&self, key: &str) -> Result<Option<String>, ParameterError> {
        Ok(self.values.get(key).cloned())
    }
}

/// Parameters fetched through the AWS Parameters and Secrets extension.
#[derive(Debug, Clone)]
pub struct ExtensionParameterStore {
    http: reqwest::Client,
    endpoint: Url,
    prefix: String,
    session_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GetParameterResponse {
    #[serde(rename = "Parameter")]
    parameter: ParameterValue,
}

#[derive(Debug, Deserialize)]
struct ParameterValue {
    #[serde(rename = "Value")]
    value: String,
}

impl ExtensionParameterStore {
    /// Creates a store for the extension listening at `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`ParameterError::Misconfigured`] if `endpoint` is not a URL.
    pub fn new(
        endpoint: &str,
        prefix: &str,
        session_token: Option<String>,
    ) -> Result<Self, ParameterError> {
        let endpoint = Url::parse(endpoint).map_err(|e| ParameterError::Misconfigured {
            details: format!("invalid extension endpoint '{endpoint}': {e}"),
        })?;

        Ok(Self {
            http: reqwest::Client::new(),
            endpoint,
            prefix: prefix.trim_end_matches('/').to_string(),
            session_token,
        })
    }

    fn parameter_name(&self, key: &str) -> String {
        format!("{}/{key}", self.prefix)
    }
}

#[async_trait]
impl ParameterStore for ExtensionParameterStore {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Option<String>, ParameterError> {
        let name = self.parameter_name(key);
        let mut url = self
            .endpoint
            .join("systemsmanager/parameters/get")
            .map_err(|e| ParameterError::Misconfigured {
                details: e.to_string(),
            })?;
        url.query_pairs_mut().append_pair("name", &name);

        let mut request = self.http.get(url);
        if let Some(token) = &self.session_token {
            request = request.header(EXTENSION_TOKEN_HEADER, token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ParameterError::FetchFailed {
                name: name.clone(),
                details: e.to_string(),
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(%name, "parameter not found");
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ParameterError::FetchFailed {
                name,
                details: format!("extension returned {status}: {body}"),
            }
            .into());
        }

        let body: GetParameterResponse =
            response
                .json()
                .await
                .map_err(|e| ParameterError::InvalidResponse {
                    name: name.clone(),
                    details: e.to_string(),
                })?;

        Ok(Some(body.parameter.value).filter(|v| !v.trim().is_empty()))
    }
}

/// Builds the parameter store named by configuration.
///
/// # Errors
///
/// Returns [`ParameterError::Misconfigured`] if the extension endpoint is invalid.
pub fn store_from_config(
    identity: &IdentityParameters,
    session_token: Option<String>,
) -> Result<Arc<dyn ParameterStore>, ParameterError> {
    Ok(match identity.source {
        ParameterSource::Static => Arc::new(StaticParameterStore::from_config(identity)),
        ParameterSource::Extension => Arc::new(ExtensionParameterStore::new(
            &identity.extension_endpoint,
            &identity.parameter_prefix,
            session_token,
        )?),
    })
}

async fn require(store: &dyn ParameterStore, key: &str) -> Result<String, ParameterError> {
    store.get(key).await?.ok_or_else(|| {
        ParameterError::Missing {
            name: key.to_string(),
        }
        .into()
    })
}

/// Assembles the identity provider configuration from `store`.
///
/// # Errors
///
/// Returns an error if the domain or client ID is missing, the domain is not
/// usable, or the store fails.
pub async fn load_provider_config(
    store: &dyn ParameterStore,
) -> Result<ProviderConfig, ParameterError> {
    let domain = require(store, keys::COGNITO_DOMAIN).await?;
    let client_id = require(store, keys::COGNITO_CLIENT_ID).await?;
    let region = store.get(keys::COGNITO_REGION).await?;
    let redirect_uri = store.get(keys::REDIRECT_URI).await?;

    let mut config = ProviderConfig::new(domain, client_id).with_redirect_uri(redirect_uri);
    if let Some(region) = region {
        config = config.with_region(region);
    }

    config
        .base_url()
        .map_err(|e| ParameterError::InvalidResponse {
            name: keys::COGNITO_DOMAIN.to_string(),
            details: e.to_string(),
        })?;

    Ok(config)
}

/// Process-wide cache of the identity provider configuration.
pub struct ProviderConfigCache {
    store: Arc<dyn ParameterStore>,
    cell: RacyOnceCell<ProviderConfig>,
}

impl ProviderConfigCache {
    #[must_use]
    pub fn new(store: Arc<dyn ParameterStore>) -> Self {
        Self {
            store,
            cell: RacyOnceCell::new(),
        }
    }

    /// Returns the configuration, loading it on first demand.
    ///
    /// # Errors
    ///
    /// Returns the load error. Failures are not cached.
    pub async fn get(&self) -> Result<&ProviderConfig, ParameterError> {
        self.cell.get_or_try_init(|| self.load()).await
    }

    async fn load(&self) -> Result<ProviderConfig, ParameterError> {
        let config = load_provider_config(self.store.as_ref()).await?;
        info!(
            domain = config.cognito_domain(),
            region = config.region(),
            "identity provider parameters loaded"
        );
        Ok(config)
    }
}
