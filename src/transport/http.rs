//! HTTP transport implementation
//!
//! reqwest client with redirects disabled (the session drives them so it can
//! see every hop) and a cookie jar that lives as long as the transport.
//! A second client carrying the TLS identity is built on the first certificate
//! attach; both share the jar, so cookies set during certificate logon are
//! visible to later plain requests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::cookie::Jar;
use reqwest::{Client, ClientBuilder};
use tracing::debug;

use super::{ResourceRequest, ResourceResponse, SessionCookie, Transport, TransportFactory};
use crate::certificate::ClientCertificate;
use crate::config::TransportConfig;
use crate::{Error, Result};

/// reqwest-backed transport
pub struct HttpTransport {
    /// Client without a TLS identity
    client: Client,
    /// Cookie jar shared by both clients
    jar: Arc<Jar>,
    /// Settings used to build clients
    config: TransportConfig,
    /// Client presenting the certificate, keyed by the certificate it was built for
    certified: Mutex<Option<(ClientCertificate, Client)>>,
    /// Whether requests currently go through the certified client
    certificate_attached: AtomicBool,
}

impl HttpTransport {
    /// Create a new HTTP transport with an empty cookie jar
    pub fn new(config: &TransportConfig) -> Result<Arc<Self>> {
        let jar = Arc::new(Jar::default());
        let client = client_builder(config, &jar)
            .build()
            .map_err(|e| Error::Transport(e.to_string()))?;

        Ok(Arc::new(Self {
            client,
            jar,
            config: config.clone(),
            certified: Mutex::new(None),
            certificate_attached: AtomicBool::new(false),
        }))
    }

    fn active_client(&self) -> Client {
        if self.certificate_attached.load(Ordering::Acquire) {
            if let Some((_, client)) = self.certified.lock().as_ref() {
                return client.clone();
            }
        }
        self.client.clone()
    }
}

fn client_builder(config: &TransportConfig, jar: &Arc<Jar>) -> ClientBuilder {
    let mut builder = Client::builder()
        .cookie_provider(Arc::clone(jar))
        .redirect(reqwest::redirect::Policy::none())
        .timeout(config.timeout)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_nodelay(true);
    if let Some(user_agent) = &config.user_agent {
        builder = builder.user_agent(user_agent.clone());
    }
    builder
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &ResourceRequest) -> Result<ResourceResponse> {
        let client = self.active_client();

        let mut builder = client.request(request.method.clone(), request.uri.clone());
        if let Some(form) = &request.form {
            builder = builder.form(form);
        }

        let response = builder.send().await?;
        let status = response.status();
        let uri = response.url().clone();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        debug!(
            method = %request.method,
            uri = %uri,
            status = status.as_u16(),
            bytes = body.len(),
            "HTTP round-trip"
        );

        Ok(ResourceResponse {
            status,
            uri,
            headers,
            body,
        })
    }

    fn set_cookie(&self, cookie: &SessionCookie) -> Result<()> {
        let origin = cookie.origin()?;
        self.jar.add_cookie_str(&cookie.header_value(), &origin);
        debug!(name = %cookie.name, domain = %cookie.domain, "Cookie stored");
        Ok(())
    }

    fn remove_cookie(&self, cookie: &SessionCookie) -> Result<()> {
        let origin = cookie.origin()?;
        self.jar.add_cookie_str(&cookie.expired_header_value(), &origin);
        debug!(name = %cookie.name, domain = %cookie.domain, "Cookie expired");
        Ok(())
    }

    fn attach_certificate(&self, certificate: &ClientCertificate) -> Result<()> {
        let mut certified = self.certified.lock();
        let stale = certified
            .as_ref()
            .is_none_or(|(built_for, _)| built_for != certificate);
        if stale {
            let client = client_builder(&self.config, &self.jar)
                .identity(certificate.identity()?)
                .build()
                .map_err(|e| Error::Transport(e.to_string()))?;
            *certified = Some((certificate.clone(), client));
        }
        self.certificate_attached.store(true, Ordering::Release);
        Ok(())
    }

    fn detach_certificate(&self) {
        self.certificate_attached.store(false, Ordering::Release);
    }
}

/// Builds [`HttpTransport`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpTransportFactory;

impl TransportFactory for HttpTransportFactory {
    fn create(&self, config: &TransportConfig) -> Result<Arc<dyn Transport>> {
        Ok(HttpTransport::new(config)?)
    }
}
