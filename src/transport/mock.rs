//! Scripted in-memory transport for state machine tests

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue, LOCATION};

use super::{ResourceRequest, ResourceResponse, SessionCookie, Transport, TransportFactory};
use crate::certificate::ClientCertificate;
use crate::config::TransportConfig;
use crate::{Error, Result};

/// Canned answer for the next request
#[derive(Debug, Clone)]
pub(crate) struct ScriptedResponse {
    status: StatusCode,
    location: Option<String>,
    body: String,
}

impl ScriptedResponse {
    pub(crate) fn ok(body: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            location: None,
            body: body.into(),
        }
    }

    pub(crate) fn redirect(location: impl Into<String>) -> Self {
        Self {
            status: StatusCode::FOUND,
            location: Some(location.into()),
            body: String::new(),
        }
    }
}

/// What the transport looked like when a request went out
#[derive(Debug, Clone)]
pub(crate) struct SentRequest {
    pub(crate) request: ResourceRequest,
    pub(crate) cookies: Vec<SessionCookie>,
    pub(crate) certificate: Option<String>,
}

#[derive(Default)]
struct State {
    cookies: Vec<SessionCookie>,
    certificate: Option<String>,
    detach_count: usize,
    cookie_removals: usize,
    sent: Vec<SentRequest>,
}

/// Answers requests from a shared script and records everything it sees
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    script: Arc<Mutex<VecDeque<ScriptedResponse>>>,
    state: Mutex<State>,
}

impl ScriptedTransport {
    pub(crate) fn sent(&self) -> Vec<SentRequest> {
        self.state.lock().sent.clone()
    }

    pub(crate) fn attached_certificate(&self) -> Option<String> {
        self.state.lock().certificate.clone()
    }

    pub(crate) fn detach_count(&self) -> usize {
        self.state.lock().detach_count
    }

    pub(crate) fn cookies(&self) -> Vec<SessionCookie> {
        self.state.lock().cookies.clone()
    }

    pub(crate) fn cookie_removals(&self) -> usize {
        self.state.lock().cookie_removals
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &ResourceRequest) -> Result<ResourceResponse> {
        {
            let mut state = self.state.lock();
            let entry = SentRequest {
                request: request.clone(),
                cookies: state.cookies.clone(),
                certificate: state.certificate.clone(),
            };
            state.sent.push(entry);
        }

        let scripted = self.script.lock().pop_front().ok_or_else(|| {
            Error::Transport(format!("unscripted request: {} {}", request.method, request.uri))
        })?;

        let mut headers = HeaderMap::new();
        if let Some(location) = &scripted.location {
            headers.insert(
                LOCATION,
                HeaderValue::from_str(location).map_err(|e| Error::Transport(e.to_string()))?,
            );
        }

        Ok(ResourceResponse {
            status: scripted.status,
            uri: request.uri.clone(),
            headers,
            body: Bytes::from(scripted.body),
        })
    }

    fn set_cookie(&self, cookie: &SessionCookie) -> Result<()> {
        self.state.lock().cookies.push(cookie.clone());
        Ok(())
    }

    fn remove_cookie(&self, cookie: &SessionCookie) -> Result<()> {
        let mut state = self.state.lock();
        state
            .cookies
            .retain(|c| !(c.name == cookie.name && c.domain == cookie.domain));
        state.cookie_removals += 1;
        Ok(())
    }

    fn attach_certificate(&self, certificate: &ClientCertificate) -> Result<()> {
        self.state.lock().certificate = Some(certificate.display_name().to_string());
        Ok(())
    }

    fn detach_certificate(&self) {
        let mut state = self.state.lock();
        state.certificate = None;
        state.detach_count += 1;
    }
}

/// Hands out scripted transports that share one response queue
#[derive(Default)]
pub(crate) struct ScriptedFactory {
    script: Arc<Mutex<VecDeque<ScriptedResponse>>>,
    created: Mutex<Vec<Arc<ScriptedTransport>>>,
    configs: Mutex<Vec<TransportConfig>>,
}

impl ScriptedFactory {
    pub(crate) fn new(responses: impl IntoIterator<Item = ScriptedResponse>) -> Arc<Self> {
        let factory = Self::default();
        factory.script.lock().extend(responses);
        Arc::new(factory)
    }

    pub(crate) fn push(&self, response: ScriptedResponse) {
        self.script.lock().push_back(response);
    }

    pub(crate) fn transports(&self) -> Vec<Arc<ScriptedTransport>> {
        self.created.lock().clone()
    }

    pub(crate) fn configs(&self) -> Vec<TransportConfig> {
        self.configs.lock().clone()
    }

    /// Every request across all transports, in order
    pub(crate) fn sent(&self) -> Vec<SentRequest> {
        self.created.lock().iter().flat_map(|t| t.sent()).collect()
    }

    pub(crate) fn remaining(&self) -> usize {
        self.script.lock().len()
    }
}

impl TransportFactory for ScriptedFactory {
    fn create(&self, config: &TransportConfig) -> Result<Arc<dyn Transport>> {
        let transport = Arc::new(ScriptedTransport {
            script: Arc::clone(&self.script),
            state: Mutex::new(State::default()),
        });
        self.created.lock().push(Arc::clone(&transport));
        self.configs.lock().push(config.clone());
        Ok(transport)
    }
}
