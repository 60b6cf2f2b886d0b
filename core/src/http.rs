//! HTTP transport types and the blocking form-POST transport.
//!
//! # Design
//! Requests and responses are plain data. The gateway builds an `HttpRequest`
//! and hands it to a `Transport`; the response comes back as an
//! `HttpResponse` that is also what the cache stores and replays. Keeping the
//! network behind a trait lets unit tests drive the gateway with a scripted
//! transport while integration tests use `UreqTransport` against the mock
//! server.
//!
//! Every PUMAPI call is a POST with a form-encoded body, so there is no
//! method or header modelling here.

use std::collections::BTreeMap;
use std::time::Duration;

use tracing::debug;

use crate::error::{PpmsError, Result};

/// Form fields of a request. A `BTreeMap` keeps keys sorted, which the cache
/// signature relies on.
pub type Params = BTreeMap<String, String>;

/// Build a `Params` map from string-ish pairs.
pub fn params<I, K, V>(pairs: I) -> Params
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// A form POST described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub form: Params,
}

/// A response described as plain data, either fresh from the wire or
/// replayed from the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    /// A 200 response with the given body.
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Executes a request against the network.
///
/// Implementations must return non-2xx responses as data; only failures to
/// complete the round-trip are errors.
pub trait Transport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse>;
}

/// Blocking transport backed by a `ureq` agent with a global timeout.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(timeout: Duration) -> Self {
        // Status codes are data for PUMAPI, the session decides what they mean.
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let action = request.form.get("action").map(String::as_str).unwrap_or("");
        debug!(url = %request.url, action, "posting request to PUMAPI");

        let mut response = self
            .agent
            .post(&request.url)
            .send_form(request.form.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .map_err(|e| {
                PpmsError::Connectivity(format!("request `{action}` to {} failed: {e}", request.url))
            })?;

        let status = response.status().as_u16();
        let body = response.body_mut().read_to_string().map_err(|e| {
            PpmsError::Connectivity(format!("reading response to `{action}` failed: {e}"))
        })?;

        Ok(HttpResponse { status, body })
    }
}
