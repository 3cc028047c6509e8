//! Auth endpoint detection
//!
//! Transports surface the post-redirect location differently: some hand back an
//! absolute URL, others keep the relative redirect target. The detector accepts both.

use url::Url;

/// Path prefix of the ADFS login endpoint
pub const DEFAULT_AUTH_PATH_PREFIX: &str = "/adfs/ls/";

/// Recognizes URIs that belong to the SSO login endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEndpointDetector {
    prefix: String,
}

impl Default for AuthEndpointDetector {
    fn default() -> Self {
        Self::new(DEFAULT_AUTH_PATH_PREFIX)
    }
}

impl AuthEndpointDetector {
    /// Create a detector for the given login path prefix
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// The login path prefix this detector matches
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Check a raw URI string.
    ///
    /// Absolute URIs are matched on their path; anything that does not parse as an
    /// absolute URL is treated as a relative reference and matched on the raw string.
    pub fn is_auth_uri(&self, uri: &str) -> bool {
        match Url::parse(uri) {
            Ok(url) => self.is_auth_url(&url),
            Err(_) => uri.starts_with(&self.prefix),
        }
    }

    /// Check an absolute URL
    pub fn is_auth_url(&self, url: &Url) -> bool {
        url.path().starts_with(&self.prefix)
    }
}

/// Resolve `reference` against `base` unless it is already absolute.
///
/// A reference counts as absolute when it starts with `http`, which is how
/// login pages write their cross-host form actions.
pub fn make_absolute(base: &Url, reference: &str) -> Result<Url, url::ParseError> {
    if reference.starts_with("http") {
        Url::parse(reference)
    } else {
        base.join(reference)
    }
}
