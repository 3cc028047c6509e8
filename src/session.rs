//! SSO client and the login negotiation
//!
//! [`SsoClient::get_web_response`] fetches a resource and, when the request is
//! diverted to the login endpoint, completes the login on the caller's behalf:
//!
//! 1. Send the original request, following redirects by hand
//! 2. Landed on the requested URI, or somewhere that is not the login
//!    endpoint: done
//! 3. Otherwise a credential is needed. A password credential answers the
//!    login form when the gateway shows one; a certificate has already
//!    authenticated at the TLS layer
//! 4. The page we now hold carries a form relaying the signed token to the
//!    protected site. Repost it and return what comes back
//!
//! The gateway never signals a failed login through the status code. It shows
//! the login form again, so a repost action that still points at the login
//! endpoint is the rejection signal.
//!
//! The transport and its cookie jar stay cached until the credential changes
//! or [`SsoClient::reset_credentials`] is called, so later fetches reuse the
//! established session without another form exchange.

use std::sync::Arc;

use reqwest::Method;
use sso_core::{AuthEndpointDetector, extract_form, make_absolute};
use tracing::{debug, info, warn};
use url::Url;

use crate::certificate::ClientCertificate;
use crate::config::Config;
use crate::credential::{CertificateCredential, Credential, PasswordCredential};
use crate::transport::{
    HttpTransportFactory, LogonScope, ResourceRequest, ResourceResponse, SessionCookie,
    Transport, TransportFactory,
};
use crate::{Error, Result};

/// Client for resources behind the SSO gateway.
///
/// Holds one credential and one cached transport at a time. Every method that
/// touches them takes `&mut self`, so a client cannot run two negotiations at once.
pub struct SsoClient {
    config: Config,
    detector: AuthEndpointDetector,
    factory: Arc<dyn TransportFactory>,
    credential: Credential,
    session: Option<Arc<dyn Transport>>,
    user_agent: Option<String>,
}

impl SsoClient {
    /// Create a client using the HTTP transport
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self::with_transport_factory(config, Arc::new(HttpTransportFactory))
    }

    /// Create a client with a custom transport factory
    #[must_use]
    pub fn with_transport_factory(config: Config, factory: Arc<dyn TransportFactory>) -> Self {
        let detector = config.detector.detector();
        Self {
            config,
            detector,
            factory,
            credential: Credential::None,
            session: None,
            user_agent: None,
        }
    }

    /// Use a client certificate from now on, dropping any previous login
    pub fn load_certificate(&mut self, certificate: ClientCertificate) {
        info!(certificate = %certificate.display_name(), "Loading certificate credential");
        let cookie = SessionCookie::from(&self.config.autologon_cookie);
        self.replace_credential(Credential::Certificate(CertificateCredential::new(
            certificate,
            cookie,
        )));
    }

    /// Use a username and password from now on, dropping any previous login.
    ///
    /// Fails before any network I/O if either part is empty; the current
    /// credential is left untouched in that case.
    pub fn load_username_password(
        &mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<()> {
        let credential =
            PasswordCredential::new(username, password, self.config.password_form.clone())?;
        info!(username = %credential.username(), "Loading password credential");
        self.replace_credential(Credential::UsernamePassword(credential));
        Ok(())
    }

    /// Forget the credential, the cached session and any user agent override
    pub fn reset_credentials(&mut self) {
        debug!(credential = self.credential.kind(), "Resetting credentials");
        self.credential = Credential::None;
        self.session = None;
        self.user_agent = None;
    }

    /// Override the configured user agent. Takes effect with the next session.
    pub fn set_user_agent(&mut self, user_agent: impl Into<String>) {
        self.user_agent = Some(user_agent.into());
        self.session = None;
    }

    /// Active credential
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// True while a transport (and its cookies) is cached
    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// The detector used to recognize the login endpoint
    pub fn detector(&self) -> &AuthEndpointDetector {
        &self.detector
    }

    /// GET `uri`, logging in if needed
    pub async fn get(&mut self, uri: &Url) -> Result<ResourceResponse> {
        self.get_web_response(uri, Method::GET).await
    }

    /// Fetch `uri` with `method`, logging in if the request lands on the login endpoint.
    ///
    /// Public resources pass through untouched, whatever the method.
    ///
    /// # Errors
    ///
    /// - `Error::AuthRequired` if the resource is protected and no credential is loaded
    /// - `Error::AuthRejected` if the gateway still shows its login form after the credential
    /// - `Error::Protocol` if a login page has no form
    /// - transport errors as they come
    pub async fn get_web_response(
        &mut self,
        uri: &Url,
        method: Method,
    ) -> Result<ResourceResponse> {
        let transport = self.session()?;
        let provider = self.credential.provider();

        let response = {
            let _logon = match provider {
                Some(p) => p.prepare_session(transport.as_ref())?,
                None => LogonScope::empty(transport.as_ref()),
            };
            self.send_following_redirects(transport.as_ref(), ResourceRequest::new(method, uri.clone()))
                .await?
        };

        if response.uri == *uri {
            return Ok(response);
        }
        if !self.detector.is_auth_url(&response.uri) {
            debug!(uri = %uri, final_uri = %response.uri, "Redirected outside the login endpoint");
            return Ok(response);
        }

        let Some(provider) = provider else {
            warn!(uri = %uri, "Login required but no credential loaded");
            return Err(Error::AuthRequired {
                uri: uri.to_string(),
            });
        };

        info!(
            uri = %uri,
            login = %response.uri,
            credential = self.credential.kind(),
            "SSO login required"
        );

        let challenge = match provider.authorize(&response)? {
            Some(answer) => {
                self.send_following_redirects(transport.as_ref(), answer)
                    .await?
            }
            None => response,
        };

        let form = extract_form(&challenge.text(), &challenge.uri)?;
        if self.detector.is_auth_url(&form.action) {
            warn!(uri = %uri, action = %form.action, "Login form presented again, credential rejected");
            return Err(Error::AuthRejected {
                uri: uri.to_string(),
            });
        }

        debug!(action = %form.action, fields = form.repost_fields.len(), "Reposting token form");
        let repost = ResourceRequest::form_post(form.action.clone(), form.to_pairs());
        let response = self
            .send_following_redirects(transport.as_ref(), repost)
            .await?;

        info!(uri = %uri, final_uri = %response.uri, status = response.status.as_u16(), "SSO login complete");
        Ok(response)
    }

    /// The cached transport, creating one if needed
    fn session(&mut self) -> Result<Arc<dyn Transport>> {
        if let Some(transport) = &self.session {
            return Ok(Arc::clone(transport));
        }

        let mut transport_config = self.config.transport.clone();
        if let Some(user_agent) = &self.user_agent {
            transport_config.user_agent = Some(user_agent.clone());
        }

        let transport = self.factory.create(&transport_config)?;
        debug!(credential = self.credential.kind(), "New SSO session");

        self.session = Some(Arc::clone(&transport));
        Ok(transport)
    }

    fn replace_credential(&mut self, credential: Credential) {
        self.credential = credential;
        self.session = None;
    }

    async fn send_following_redirects(
        &self,
        transport: &dyn Transport,
        mut request: ResourceRequest,
    ) -> Result<ResourceResponse> {
        let max_redirects = self.config.transport.max_redirects;
        let start = request.uri.clone();

        for hop in 0..=max_redirects {
            let response = transport.send(&request).await?;
            debug!(
                method = %request.method,
                uri = %request.uri,
                status = response.status.as_u16(),
                hop,
                "SSO round-trip"
            );

            let Some(location) = response.redirect_location().map(str::to_owned) else {
                return Ok(response);
            };
            let next = make_absolute(&response.uri, &location).map_err(|e| {
                Error::Protocol(format!("Invalid redirect location '{location}': {e}"))
            })?;
            request = request.redirected(response.status, next);
        }

        Err(Error::Transport(format!(
            "More than {max_redirects} redirects starting from {start}"
        )))
    }
}
