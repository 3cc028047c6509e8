//! CERN SSO client library
//!
//! Fetch resources that sit behind CERN's forms-based single sign-on, with a
//! client certificate or a username/password, completing the login when the
//! request is diverted to the gateway.
//!
//! # Example
//!
//! ```no_run
//! # async fn run() -> cern_sso::Result<()> {
//! use cern_sso::{SsoClient, config::Config};
//!
//! let mut sso = SsoClient::new(Config::default());
//! sso.load_username_password("alice", "secret")?;
//! let url = url::Url::parse("https://cds.cern.ch/record/1512932/").expect("valid URL");
//! let response = sso.get(&url).await?;
//! println!("{}", response.text());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod certificate;
pub mod cli;
pub mod config;
pub mod credential;
pub mod error;
pub mod session;
pub mod transport;

pub use certificate::ClientCertificate;
pub use credential::{CertificateCredential, Credential, CredentialProvider, PasswordCredential};
pub use error::{AuthFailureReason, Error, Result};
pub use session::SsoClient;
pub use transport::{
    LogonScope, ResourceRequest, ResourceResponse, SessionCookie, Transport, TransportFactory,
};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    let result = match format {
        Some("json") => subscriber.with(fmt::layer().json().with_writer(std::io::stderr)).try_init(),
        _ => subscriber.with(fmt::layer().with_writer(std::io::stderr)).try_init(),
    };

    result.map_err(|e| Error::Config(format!("Failed to install tracing subscriber: {e}")))
}
