//! Transport layer for SSO requests
//!
//! The session only needs a small capability from the HTTP stack: send one
//! request without following redirects, keep cookies between requests, and
//! present a client certificate on demand. [`HttpTransport`] provides it on top
//! of reqwest; tests substitute their own implementation through
//! [`TransportFactory`].

mod http;
#[cfg(test)]
pub(crate) mod mock;

pub use self::http::{HttpTransport, HttpTransportFactory};

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, LOCATION};
use reqwest::{Method, StatusCode};
use tracing::{debug, warn};
use url::Url;

use crate::Result;
use crate::certificate::ClientCertificate;
use crate::config::{AutologonCookieConfig, TransportConfig};

/// Transport trait for SSO communication
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a single request. Redirects are returned as-is, never followed.
    async fn send(&self, request: &ResourceRequest) -> Result<ResourceResponse>;

    /// Store a cookie in the transport's jar
    fn set_cookie(&self, cookie: &SessionCookie) -> Result<()>;

    /// Expire a cookie previously stored with [`Transport::set_cookie`]
    fn remove_cookie(&self, cookie: &SessionCookie) -> Result<()>;

    /// Present `certificate` on subsequent requests
    fn attach_certificate(&self, certificate: &ClientCertificate) -> Result<()>;

    /// Stop presenting the client certificate
    fn detach_certificate(&self);
}

/// Creates the transport backing a fresh session
pub trait TransportFactory: Send + Sync {
    /// Build a new transport with an empty cookie jar
    fn create(&self, config: &TransportConfig) -> Result<Arc<dyn Transport>>;
}

/// A request issued by the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRequest {
    /// HTTP method
    pub method: Method,
    /// Target URI
    pub uri: Url,
    /// Form fields, sent as `application/x-www-form-urlencoded`
    pub form: Option<Vec<(String, String)>>,
}

impl ResourceRequest {
    /// Request without a body
    #[must_use]
    pub fn new(method: Method, uri: Url) -> Self {
        Self {
            method,
            uri,
            form: None,
        }
    }

    /// Form POST
    #[must_use]
    pub fn form_post(uri: Url, fields: Vec<(String, String)>) -> Self {
        Self {
            method: Method::POST,
            uri,
            form: Some(fields),
        }
    }

    /// Value of a form field, if this request carries one
    pub fn form_field(&self, name: &str) -> Option<&str> {
        self.form
            .as_ref()?
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// The request to issue after a redirect to `location`.
    ///
    /// 307/308 keep method and body. 301/302/303 turn everything but HEAD into
    /// GET, as reqwest's own policy does; the body is dropped whenever the method changes.
    #[must_use]
    pub fn redirected(&self, status: StatusCode, location: Url) -> Self {
        let method = match status {
            StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND | StatusCode::SEE_OTHER
                if self.method != Method::HEAD =>
            {
                Method::GET
            }
            _ => self.method.clone(),
        };
        let form = if method == self.method {
            self.form.clone()
        } else {
            None
        };
        Self {
            method,
            uri: location,
            form,
        }
    }
}

/// A fully buffered response
#[derive(Debug, Clone)]
pub struct ResourceResponse {
    /// Status code
    pub status: StatusCode,
    /// URI of the request that produced this response
    pub uri: Url,
    /// Response headers
    pub headers: HeaderMap,
    /// Response body
    pub body: Bytes,
}

impl ResourceResponse {
    /// Body as text, replacing invalid UTF-8
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// `Location` header of a redirect response
    pub fn redirect_location(&self) -> Option<&str> {
        if !self.status.is_redirection() || self.status == StatusCode::NOT_MODIFIED {
            return None;
        }
        self.headers.get(LOCATION)?.to_str().ok()
    }
}

/// A cookie preloaded into the session's jar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    /// Cookie name
    pub name: String,
    /// Cookie value
    pub value: String,
    /// `Domain` attribute; empty for a host-only cookie
    pub domain: String,
    /// Host the cookie is stored against
    pub host: String,
}

impl SessionCookie {
    /// `Set-Cookie` style representation
    pub fn header_value(&self) -> String {
        if self.domain.is_empty() {
            format!("{}={}; Path=/", self.name, self.value)
        } else {
            format!("{}={}; Domain={}; Path=/", self.name, self.value, self.domain)
        }
    }

    /// `Set-Cookie` representation that expires the cookie
    pub fn expired_header_value(&self) -> String {
        if self.domain.is_empty() {
            format!("{}=; Path=/; Max-Age=0", self.name)
        } else {
            format!("{}=; Domain={}; Path=/; Max-Age=0", self.name, self.domain)
        }
    }

    /// URL the cookie is registered under
    pub fn origin(&self) -> Result<Url> {
        Url::parse(&format!("https://{}/", self.host)).map_err(|e| {
            crate::Error::Config(format!("Invalid cookie host '{}': {e}", self.host))
        })
    }
}

impl From<&AutologonCookieConfig> for SessionCookie {
    fn from(config: &AutologonCookieConfig) -> Self {
        Self {
            name: config.name.clone(),
            value: config.value.clone(),
            domain: config.domain.clone(),
            host: config.host.clone(),
        }
    }
}

/// Keeps the logon material (client certificate, auto-logon cookie) on the
/// transport for as long as the guard lives
pub struct LogonScope<'a> {
    transport: &'a dyn Transport,
    certificate_attached: bool,
    cookie: Option<SessionCookie>,
}

impl<'a> LogonScope<'a> {
    /// A scope that holds nothing
    pub fn empty(transport: &'a dyn Transport) -> Self {
        Self {
            transport,
            certificate_attached: false,
            cookie: None,
        }
    }

    /// Attach `certificate` and store `cookie` (either may be absent)
    pub fn attach(
        transport: &'a dyn Transport,
        certificate: Option<&ClientCertificate>,
        cookie: Option<&SessionCookie>,
    ) -> Result<Self> {
        let mut scope = Self::empty(transport);
        if let Some(cert) = certificate {
            transport.attach_certificate(cert)?;
            scope.certificate_attached = true;
            debug!(certificate = %cert.display_name(), "Client certificate attached");
        }
        if let Some(cookie) = cookie {
            transport.set_cookie(cookie)?;
            scope.cookie = Some(cookie.clone());
            debug!(cookie = %cookie.name, "Auto-logon cookie set");
        }
        Ok(scope)
    }
}

impl Drop for LogonScope<'_> {
    fn drop(&mut self) {
        if self.certificate_attached {
            self.transport.detach_certificate();
            debug!("Client certificate released");
        }
        if let Some(cookie) = self.cookie.take() {
            if let Err(e) = self.transport.remove_cookie(&cookie) {
                warn!(cookie = %cookie.name, error = %e, "Failed to expire auto-logon cookie");
            }
        }
    }
}
