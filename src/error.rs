//! Error types for CERN SSO

use std::io;

use thiserror::Error;

/// Result type alias for CERN SSO
pub type Result<T> = std::result::Result<T, Error>;

/// Why an authentication-family error was raised
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailureReason {
    /// The resource is protected and no credential was loaded
    Required,
    /// A credential was loaded but the gateway presented the login form again
    Rejected,
}

/// CERN SSO errors
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error (bad config file, missing credential argument)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The SSO endpoint answered with something other than a login form
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Protected resource requested without a credential
    #[error("URI {uri} requires CERN authentication. None given!")]
    AuthRequired {
        /// The originally requested URI
        uri: String,
    },

    /// Credential did not get past the login form
    #[error("Credentials given didn't allow access to {uri}.")]
    AuthRejected {
        /// The originally requested URI
        uri: String,
    },

    /// Transport error
    #[error("Transport error: {0}")]
    Transport(String),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Reason code for the unauthorized-access family, `None` for everything else
    #[must_use]
    pub fn reason(&self) -> Option<AuthFailureReason> {
        match self {
            Self::AuthRequired { .. } => Some(AuthFailureReason::Required),
            Self::AuthRejected { .. } => Some(AuthFailureReason::Rejected),
            _ => None,
        }
    }

    /// True for [`Error::AuthRequired`] and [`Error::AuthRejected`]
    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        self.reason().is_some()
    }
}

impl From<sso_core::FormError> for Error {
    fn from(e: sso_core::FormError) -> Self {
        Self::Protocol(e.to_string())
    }
}
