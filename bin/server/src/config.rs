//! Centralized server configuration.
//!
//! This module provides strongly-typed configuration for the server,
//! loaded via the `config` crate from environment variables. Nested keys use
//! `__` as separator, e.g. `IDENTITY__SOURCE=extension`.

use axum::http::HeaderName;
use serde::Deserialize;

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address to listen on.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Name reported by the health endpoint.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Header carrying the gateway's request context.
    #[serde(default = "default_context_header")]
    pub context_header: String,

    /// Group required for `/v1/admin/*`.
    #[serde(default = "default_admin_group")]
    pub admin_group: String,

    /// Where the identity provider parameters come from.
    #[serde(default)]
    pub identity: IdentityParameters,

    /// Session token presented to the parameters extension.
    #[serde(default)]
    pub aws_session_token: Option<String>,
}

/// Source of the identity provider parameters served by `/v1/config`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterSource {
    /// Values from this configuration.
    #[default]
    Static,
    /// The AWS Parameters and Secrets extension.
    Extension,
}

/// Identity provider parameter configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityParameters {
    #[serde(default)]
    pub source: ParameterSource,

    // Static values.
    #[serde(default)]
    pub cognito_domain: Option<String>,
    #[serde(default)]
    pub cognito_client_id: Option<String>,
    #[serde(default)]
    pub cognito_region: Option<String>,
    #[serde(default)]
    pub redirect_uri: Option<String>,

    /// Parameter path prefix, e.g. `/tollgate/prod`.
    #[serde(default = "default_parameter_prefix")]
    pub parameter_prefix: String,

    /// Base URL of the parameters extension.
    #[serde(default = "default_extension_endpoint")]
    pub extension_endpoint: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_service_name() -> String {
    "tollgate-user-service".to_string()
}

fn default_context_header() -> String {
    "x-apigateway-context".to_string()
}

fn default_admin_group() -> String {
    "administrators".to_string()
}

fn default_parameter_prefix() -> String {
    "/tollgate".to_string()
}

fn default_extension_endpoint() -> String {
    "http://localhost:2773".to_string()
}

impl Default for IdentityParameters {
    fn default() -> Self {
        Self {
            source: ParameterSource::default(),
            cognito_domain: None,
            cognito_client_id: None,
            cognito_region: None,
            redirect_uri: None,
            parameter_prefix: default_parameter_prefix(),
            extension_endpoint: default_extension_endpoint(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_environment(config::Environment::default())
    }

    fn from_environment(environment: config::Environment) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(environment.separator("__").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    /// Returns the context header as an HTTP header name.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured name is not a valid header name.
    pub fn context_header_name(&self) -> Result<HeaderName, config::ConfigError> {
        HeaderName::from_bytes(self.context_header.trim().as_bytes()).map_err(|e| {
            config::ConfigError::Message(format!(
                "invalid context_header '{}': {e}",
                self.context_header
            ))
        })
    }
}
