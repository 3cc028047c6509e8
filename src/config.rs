//! Configuration management

use std::{path::Path, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use sso_core::{AuthEndpointDetector, DEFAULT_AUTH_PATH_PREFIX};

use crate::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Auth endpoint detection
    pub detector: DetectorConfig,
    /// Cookie that asks the gateway for certificate logon
    pub autologon_cookie: AutologonCookieConfig,
    /// Field names of the username/password login form
    pub password_form: PasswordFormConfig,
    /// HTTP transport settings
    pub transport: TransportConfig,
}

/// Auth endpoint detection configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Path prefix of the identity provider's login endpoint
    pub auth_path_prefix: String,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            auth_path_prefix: DEFAULT_AUTH_PATH_PREFIX.to_string(),
        }
    }
}

impl DetectorConfig {
    /// Build the detector for this prefix
    #[must_use]
    pub fn detector(&self) -> AuthEndpointDetector {
        AuthEndpointDetector::new(self.auth_path_prefix.clone())
    }
}

/// Auto-logon cookie set when a certificate credential is loaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutologonCookieConfig {
    /// Cookie name
    pub name: String,
    /// Cookie value
    pub value: String,
    /// Domain the cookie is scoped to
    pub domain: String,
    /// Login host inside `domain`, used to anchor the cookie in the jar
    pub host: String,
}

impl Default for AutologonCookieConfig {
    fn default() -> Self {
        Self {
            name: "SSOAutologonCertificate".to_string(),
            value: "true".to_string(),
            domain: ".cern.ch".to_string(),
            host: "login.cern.ch".to_string(),
        }
    }
}

/// Logical roles of the password login form mapped to the provider's field names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordFormConfig {
    /// Username text box
    pub username: String,
    /// Password box
    pub password: String,
    /// Submit button
    pub submit: String,
    /// Value sent for the submit button
    pub submit_value: String,
    /// Fields the gateway rejects when echoed back with their default value
    pub remove: Vec<String>,
}

impl Default for PasswordFormConfig {
    fn default() -> Self {
        const PREFIX: &str = "ctl00$ctl00$NestedMasterPageContent$ContentPlaceHolder1$";
        Self {
            username: format!("{PREFIX}TextBoxUsername"),
            password: format!("{PREFIX}TextBoxPassword"),
            submit: format!("{PREFIX}ButtonLogin"),
            submit_value: "Sign In".to_string(),
            remove: vec![format!("{PREFIX}DropDownListIdP")],
        }
    }
}

/// HTTP transport configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Per-request timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Redirect hops followed before giving up
    pub max_redirects: usize,
    /// User agent sent with every request
    pub user_agent: Option<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_redirects: 10,
            user_agent: None,
        }
    }
}

impl Config {
    /// Load configuration from an optional YAML file and `CERN_SSO_` environment variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        figment = figment.merge(Env::prefixed("CERN_SSO_").split("__"));

        let config: Self = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the negotiation cannot work with
    pub fn validate(&self) -> Result<()> {
        let prefix = &self.detector.auth_path_prefix;
        if prefix.is_empty() || !prefix.starts_with('/') {
            return Err(Error::Config(format!(
                "detector.auth_path_prefix must be an absolute path, got '{prefix}'"
            )));
        }
        if self.autologon_cookie.name.is_empty() {
            return Err(Error::Config(
                "autologon_cookie.name must not be empty".to_string(),
            ));
        }
        if self.transport.max_redirects == 0 {
            return Err(Error::Config(
                "transport.max_redirects must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
