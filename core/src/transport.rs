//! The network collaborator: one request out, one buffered response back.
//!
//! # Design
//! `Transport` is the only seam that performs I/O. Non-2xx statuses are
//! successful sends here; deciding what a status means is the executor's job.
//! Closures implement `Transport` too, which keeps test doubles one line long.

use std::io;
use std::time::Duration;

use tracing::trace;
use ureq::http;

use crate::error::TransportError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Sends a single request attempt.
pub trait Transport: Send + Sync {
    /// `timeout` bounds the whole attempt, body read included. `None` means
    /// no limit.
    fn send(
        &self,
        request: &HttpRequest,
        timeout: Option<Duration>,
    ) -> Result<HttpResponse, TransportError>;
}

impl<F> Transport for F
where
    F: Fn(&HttpRequest, Option<Duration>) -> Result<HttpResponse, TransportError> + Send + Sync,
{
    fn send(
        &self,
        request: &HttpRequest,
        timeout: Option<Duration>,
    ) -> Result<HttpResponse, TransportError> {
        self(request, timeout)
    }
}

/// Blocking transport backed by a shared `ureq::Agent`.
///
/// The agent pools connections and is safe to use from many threads.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl UreqTransport {
    pub fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }

    fn run<S: ureq::AsSendBody>(
        &self,
        request: http::Request<S>,
        timeout: Option<Duration>,
    ) -> Result<HttpResponse, TransportError> {
        let request = self
            .agent
            .configure_request(request)
            .timeout_global(timeout)
            .build();

        let mut response = self.agent.run(request).map_err(classify)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.body_mut().read_to_vec().map_err(classify)?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

impl Transport for UreqTransport {
    fn send(
        &self,
        request: &HttpRequest,
        timeout: Option<Duration>,
    ) -> Result<HttpResponse, TransportError> {
        trace!(method = %request.method, path = %request.path, ?timeout, "sending request");

        let method = match request.method {
            HttpMethod::Get => http::Method::GET,
            HttpMethod::Post => http::Method::POST,
            HttpMethod::Delete => http::Method::DELETE,
        };
        let mut builder = http::Request::builder()
            .method(method)
            .uri(request.path.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        match &request.body {
            Some(body) => {
                let request = builder
                    .body(body.clone())
                    .map_err(|e| TransportError::Failure(e.to_string()))?;
                self.run(request, timeout)
            }
            None => {
                let request = builder
                    .body(())
                    .map_err(|e| TransportError::Failure(e.to_string()))?;
                self.run(request, timeout)
            }
        }
    }
}

fn classify(err: ureq::Error) -> TransportError {
    match err {
        ureq::Error::Timeout(_) => TransportError::Timeout,
        ureq::Error::Io(ref io_err) if io_err.kind() == io::ErrorKind::TimedOut => {
            TransportError::Timeout
        }
        other => TransportError::Failure(other.to_string()),
    }
}
