//! Request dispatch for the lexoffice API.
//!
//! # Design
//! `LexofficeClient` holds an immutable `ClientConfig` and a transport, and
//! carries no other state between calls. Every typed operation is split into
//! a `build_*` method that produces an `HttpRequest` and a `parse_*` method
//! that consumes an `HttpResponse`; the executing method in between hands the
//! request to [`LexofficeClient::dispatch`], which applies the retry policy
//! and classifies error responses.
//!
//! The client is `Sync` whenever its transport is. Whether one client is
//! shared across threads is up to the caller; the default `UreqTransport`
//! pools connections and is safe to share.

use std::thread;

use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn, Span};

use crate::config::ClientConfig;
use crate::error::{ApiError, Result};
use crate::error_response::{classify, ErrorSchema};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, JSON_CONTENT_TYPE};
use crate::transport::{Transport, UreqTransport};

/// Synchronous client for the lexoffice REST API.
#[derive(Debug, Clone)]
pub struct LexofficeClient<T = UreqTransport> {
    config: ClientConfig,
    transport: T,
}

impl LexofficeClient {
    /// Client for the lexoffice host using the default transport.
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_config(ClientConfig::new(token))
    }

    pub fn with_config(config: ClientConfig) -> Self {
        Self::with_transport(config, UreqTransport::default())
    }

    /// See [`ClientConfig::from_env`].
    pub fn from_env() -> Result<Self> {
        ClientConfig::from_env().map(Self::with_config)
    }
}

impl<T: Transport> LexofficeClient<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Absolute request for `path` carrying the auth, content and accept headers.
    pub fn request(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<Vec<u8>>,
        content_type: &str,
    ) -> HttpRequest {
        let request = HttpRequest::new(method, self.config.url(path))
            .with_header("authorization", format!("Bearer {}", self.config.token()))
            .with_header("content-type", content_type)
            .with_header("accept", JSON_CONTENT_TYPE);
        match body {
            Some(body) => request.with_body(body),
            None => request,
        }
    }

    /// Send a request to an arbitrary endpoint.
    ///
    /// The error schema is taken from the resource named by the path's first
    /// segment; see [`ErrorSchema::for_path`].
    pub fn send(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<Vec<u8>>,
        content_type: &str,
    ) -> Result<HttpResponse> {
        let request = self.request(method, path, body, content_type);
        self.dispatch(&request, ErrorSchema::for_path(path))
    }

    /// Execute `request`, retrying per the configured policy.
    ///
    /// Responses below 400 are returned unmodified. Anything else that is not
    /// retried is decoded with `schema` into an `ApiError`. A POST is never
    /// sent twice unless the first attempt was rate limited or never left the
    /// client.
    #[instrument(
        name = "lexoffice_request",
        skip_all,
        fields(
            http.method = %request.method,
            http.url = %request.url,
            http.status_code = tracing::field::Empty,
        )
    )]
    pub(crate) fn dispatch(&self, request: &HttpRequest, schema: ErrorSchema) -> Result<HttpResponse> {
        let retry = self.config.retry();
        let mut attempt = 0;

        loop {
            match self.transport.execute(request) {
                Ok(response) => {
                    Span::current().record("http.status_code", response.status);
                    if response.is_success() {
                        debug!(status = response.status, attempts = attempt + 1, "request succeeded");
                        return Ok(response);
                    }
                    if retry.allows(attempt) && retry.should_retry_status(request.method, response.status) {
                        let delay = retry.delay_for_attempt(attempt);
                        warn!(status = response.status, retry = attempt + 1, ?delay, "retrying request");
                        thread::sleep(delay);
                        attempt += 1;
                        continue;
                    }
                    let err = classify(&response, schema);
                    debug!(status = response.status, error = %err, "request rejected");
                    return Err(err);
                }
                Err(err) if retry.allows(attempt) && retry.should_retry_transport(request.method, &err) => {
                    let delay = retry.delay_for_attempt(attempt);
                    warn!(error = %err, retry = attempt + 1, ?delay, "retrying request");
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(err) => {
                    debug!(error = %err, "transport failed");
                    return Err(err.into());
                }
            }
        }
    }
}

/// Decode a JSON response, classifying it first if it is an error response.
pub(crate) fn parse_json<R: DeserializeOwned>(response: &HttpResponse, schema: ErrorSchema) -> Result<R> {
    if !response.is_success() {
        return Err(classify(response, schema));
    }
    serde_json::from_str(&response.body).map_err(ApiError::DeserializationError)
}

pub(crate) fn to_json<B: serde::Serialize>(body: &B) -> Result<Vec<u8>> {
    serde_json::to_vec(body).map_err(ApiError::SerializationError)
}
