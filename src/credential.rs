//! Credentials presented to the SSO gateway
//!
//! Each variant implements [`CredentialProvider`]:
//!
//! - [`CertificateCredential`] authenticates at the TLS layer and asks the
//!   gateway for certificate logon through the auto-logon cookie
//! - [`PasswordCredential`] fills in the gateway's login form

use std::fmt;

use sso_core::extract_form;
use tracing::debug;

use crate::certificate::ClientCertificate;
use crate::config::PasswordFormConfig;
use crate::transport::{LogonScope, ResourceRequest, ResourceResponse, SessionCookie, Transport};
use crate::{Error, Result};

/// Hooks a credential provides to the negotiation
pub trait CredentialProvider: Send + Sync {
    /// Put the logon material on `transport` for the original request.
    ///
    /// Everything attached is released when the returned scope drops, so it never
    /// rides along on the authorize step, the repost or later fetches.
    fn prepare_session<'a>(&self, transport: &'a dyn Transport) -> Result<LogonScope<'a>> {
        Ok(LogonScope::empty(transport))
    }

    /// Turn the login challenge into the request answering it.
    ///
    /// `None` means the credential has nothing to submit and the challenge
    /// itself is the page to repost.
    fn authorize(&self, challenge: &ResourceResponse) -> Result<Option<ResourceRequest>>;
}

/// The single active credential
#[derive(Debug, Clone, Default)]
pub enum Credential {
    /// Nothing loaded
    #[default]
    None,
    /// Client certificate
    Certificate(CertificateCredential),
    /// Username and password
    UsernamePassword(PasswordCredential),
}

impl Credential {
    /// The provider behind this credential, `None` when nothing is loaded
    pub fn provider(&self) -> Option<&dyn CredentialProvider> {
        match self {
            Self::None => None,
            Self::Certificate(c) => Some(c),
            Self::UsernamePassword(p) => Some(p),
        }
    }

    /// True when a credential is loaded
    pub fn is_loaded(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// Short label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Certificate(_) => "certificate",
            Self::UsernamePassword(_) => "password",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Certificate
// ─────────────────────────────────────────────────────────────────────────────

/// Client certificate plus the auto-logon cookie
#[derive(Debug, Clone)]
pub struct CertificateCredential {
    certificate: ClientCertificate,
    autologon_cookie: SessionCookie,
}

impl CertificateCredential {
    /// Create a certificate credential
    #[must_use]
    pub fn new(certificate: ClientCertificate, autologon_cookie: SessionCookie) -> Self {
        Self {
            certificate,
            autologon_cookie,
        }
    }

    /// The certificate
    pub fn certificate(&self) -> &ClientCertificate {
        &self.certificate
    }

    /// The auto-logon cookie
    pub fn autologon_cookie(&self) -> &SessionCookie {
        &self.autologon_cookie
    }
}

impl CredentialProvider for CertificateCredential {
    fn prepare_session<'a>(&self, transport: &'a dyn Transport) -> Result<LogonScope<'a>> {
        LogonScope::attach(
            transport,
            Some(&self.certificate),
            Some(&self.autologon_cookie),
        )
    }

    fn authorize(&self, _challenge: &ResourceResponse) -> Result<Option<ResourceRequest>> {
        Ok(None)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Username / password
// ─────────────────────────────────────────────────────────────────────────────

/// Username and password typed into the gateway's login form
#[derive(Clone)]
pub struct PasswordCredential {
    username: String,
    password: String,
    fields: PasswordFormConfig,
}

impl PasswordCredential {
    /// Create a password credential.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the username or password is empty.
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        fields: PasswordFormConfig,
    ) -> Result<Self> {
        let username = username.into();
        let password = password.into();
        if username.is_empty() {
            return Err(Error::Config("username must not be empty".to_string()));
        }
        if password.is_empty() {
            return Err(Error::Config("password must not be empty".to_string()));
        }
        Ok(Self {
            username,
            password,
            fields,
        })
    }

    /// The username
    pub fn username(&self) -> &str {
        &self.username
    }
}

impl fmt::Debug for PasswordCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordCredential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl CredentialProvider for PasswordCredential {
    fn authorize(&self, challenge: &ResourceResponse) -> Result<Option<ResourceRequest>> {
        let mut form = extract_form(&challenge.text(), &challenge.uri)?;
        if form.field(&self.fields.username).is_none() {
            // Gateway already knows this user and answered with the token form
            debug!(action = %form.action, "Challenge is not the login form, nothing to fill in");
            return Ok(None);
        }

        form.set_field(self.fields.username.as_str(), self.username.as_str());
        form.set_field(self.fields.password.as_str(), self.password.as_str());
        form.set_field(self.fields.submit.as_str(), self.fields.submit_value.as_str());
        for name in &self.fields.remove {
            form.remove_field(name);
        }

        debug!(
            action = %form.action,
            username = %self.username,
            fields = form.repost_fields.len(),
            "Login form filled"
        );
        Ok(Some(ResourceRequest::form_post(form.action.clone(), form.to_pairs())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certificate::tests::test_certificate;
    use crate::config::AutologonCookieConfig;
    use crate::transport::mock::ScriptedTransport;
    use bytes::Bytes;
    use reqwest::header::HeaderMap;
    use reqwest::{Method, StatusCode};
    use url::Url;

    const LOGIN_PAGE: &str = r#"<html><body>
<form method="post" action="/adfs/ls/?wa=wsignin1.0&amp;wctx=rm%3d0" id="aspnetForm">
  <input type="hidden" name="__VIEWSTATE" value="vs&amp;1" />
  <input type="hidden" name="ctl00$ctl00$NestedMasterPageContent$ContentPlaceHolder1$DropDownListIdP" value="CERN" />
  <input type="text" name="ctl00$ctl00$NestedMasterPageContent$ContentPlaceHolder1$TextBoxUsername" />
  <input type="password" name="ctl00$ctl00$NestedMasterPageContent$ContentPlaceHolder1$TextBoxPassword" />
  <input type="submit" name="ctl00$ctl00$NestedMasterPageContent$ContentPlaceHolder1$ButtonLogin" value="Sign In" />
</form></body></html>"#;

    fn challenge(body: &str) -> ResourceResponse {
        ResourceResponse {
            status: StatusCode::OK,
            uri: Url::parse("https://login.cern.ch/adfs/ls/?wa=wsignin1.0").unwrap(),
            headers: HeaderMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    #[test]
    fn test_password_authorize_fills_form() {
        let fields = PasswordFormConfig::default();
        let credential = PasswordCredential::new("alice", "secret", fields.clone()).unwrap();

        let request = credential
            .authorize(&challenge(LOGIN_PAGE))
            .unwrap()
            .expect("password credential always answers the challenge");

        assert_eq!(request.method, Method::POST);
        assert_eq!(
            request.uri.as_str(),
            "https://login.cern.ch/adfs/ls/?wa=wsignin1.0&wctx=rm%3d0"
        );
        assert_eq!(request.form_field(&fields.username), Some("alice"));
        assert_eq!(request.form_field(&fields.password), Some("secret"));
        assert_eq!(request.form_field(&fields.submit), Some("Sign In"));
        assert_eq!(request.form_field("__VIEWSTATE"), Some("vs&1"));
        assert_eq!(request.form_field(&fields.remove[0]), None);
    }

    #[test]
    fn test_password_authorize_leaves_token_form_alone() {
        let token_page = r#"<html><body onload="document.forms[0].submit()">
<form method="POST" name="hiddenform" action="https://cds.cern.ch/Shibboleth.sso/ADFS">
  <input type="hidden" name="wa" value="wsignin1.0" />
  <input type="hidden" name="wresult" value="&lt;t:RequestSecurityTokenResponse&gt;" />
</form></body></html>"#;
        let credential =
            PasswordCredential::new("alice", "secret", PasswordFormConfig::default()).unwrap();

        assert!(credential.authorize(&challenge(token_page)).unwrap().is_none());
    }

    #[test]
    fn test_password_authorize_without_form_is_protocol_error() {
        let credential =
            PasswordCredential::new("alice", "secret", PasswordFormConfig::default()).unwrap();
        let err = credential
            .authorize(&challenge("<html><body>Down for maintenance</body></html>"))
            .unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn test_password_field_table_is_configurable() {
        let fields = PasswordFormConfig {
            username: "j_username".to_string(),
            password: "j_password".to_string(),
            submit: "_eventId_proceed".to_string(),
            submit_value: String::new(),
            remove: vec!["idp_selector".to_string()],
        };
        let page = r#"<form action="/idp/profile/SAML2/POST/SSO?execution=e1s1" method="post">
            <input type="text" name="j_username"><input type="password" name="j_password">
            <input type="hidden" name="idp_selector" value="default">
            <input type="submit" name="_eventId_proceed" value="Login"></form>"#;
        let credential = PasswordCredential::new("bob", "hunter2", fields).unwrap();

        let request = credential.authorize(&challenge(page)).unwrap().unwrap();
        assert_eq!(request.form_field("j_username"), Some("bob"));
        assert_eq!(request.form_field("j_password"), Some("hunter2"));
        assert_eq!(request.form_field("_eventId_proceed"), Some(""));
        assert_eq!(request.form_field("idp_selector"), None);
    }

    #[test]
    fn test_password_requires_both_parts() {
        assert!(matches!(
            PasswordCredential::new("", "secret", PasswordFormConfig::default()),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            PasswordCredential::new("alice", "", PasswordFormConfig::default()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_password_debug_is_redacted() {
        let credential =
            PasswordCredential::new("alice", "secret", PasswordFormConfig::default()).unwrap();
        let debug = format!("{credential:?}");
        assert!(debug.contains("alice"));
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn test_certificate_prepare_session_is_scoped() {
        let transport = ScriptedTransport::default();
        let credential = CertificateCredential::new(
            test_certificate("gwatts"),
            SessionCookie::from(&AutologonCookieConfig::default()),
        );

        let scope = credential.prepare_session(&transport).unwrap();
        let cookies = transport.cookies();
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies[0].name, "SSOAutologonCertificate");
        assert_eq!(cookies[0].value, "true");
        assert_eq!(cookies[0].domain, ".cern.ch");
        assert_eq!(transport.attached_certificate().as_deref(), Some("gwatts"));

        drop(scope);
        assert!(transport.cookies().is_empty());
        assert_eq!(transport.attached_certificate(), None);
    }

    #[test]
    fn test_password_prepare_session_touches_nothing() {
        let transport = ScriptedTransport::default();
        let credential =
            PasswordCredential::new("alice", "secret", PasswordFormConfig::default()).unwrap();

        drop(credential.prepare_session(&transport).unwrap());
        assert!(transport.cookies().is_empty());
        assert_eq!(transport.detach_count(), 0);
        assert_eq!(transport.cookie_removals(), 0);
    }

    #[test]
    fn test_certificate_authorize_has_nothing_to_send() {
        let credential = CertificateCredential::new(
            test_certificate("gwatts"),
            SessionCookie::from(&AutologonCookieConfig::default()),
        );
        assert!(credential.authorize(&challenge(LOGIN_PAGE)).unwrap().is_none());
        assert_eq!(credential.certificate().display_name(), "gwatts");
    }

    #[test]
    fn test_credential_union() {
        let none = Credential::default();
        assert!(!none.is_loaded());
        assert!(none.provider().is_none());
        assert_eq!(none.kind(), "none");

        let password = Credential::UsernamePassword(
            PasswordCredential::new("alice", "secret", PasswordFormConfig::default()).unwrap(),
        );
        assert!(password.is_loaded());
        assert_eq!(password.kind(), "password");
        assert!(password.provider().is_some());
    }
}
