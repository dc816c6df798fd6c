//! Pluggable HTTP transport.
//!
//! # Design
//! The client never talks to the network directly; it hands an `HttpRequest`
//! to a `Transport` and gets an `HttpResponse` back. Non-2xx statuses are
//! data, not errors: a transport only fails when no response was received.
//! `UreqTransport` is the default and is safe to share across threads.

use std::time::Duration;

use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Failure to obtain any HTTP response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    message: String,
    retryable: bool,
    sent: bool,
}

impl TransportError {
    /// Retryable failure after the request may have reached the server.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
            sent: true,
        }
    }

    /// Retryable failure before any request byte was written.
    pub fn unsent(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
            sent: false,
        }
    }

    pub fn non_retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
            sent: false,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether sending the same request again may succeed.
    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    /// Whether the server may have received, and acted on, the request.
    pub const fn may_have_been_sent(&self) -> bool {
        self.sent
    }
}

impl From<ureq::Error> for TransportError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Timeout(ureq::Timeout::Resolve | ureq::Timeout::Connect) => {
                Self::unsent(format!("connect timeout: {err}"))
            }
            ureq::Error::Timeout(_) => Self::new(format!("request timeout: {err}")),
            ureq::Error::ConnectionFailed | ureq::Error::HostNotFound => {
                Self::unsent(format!("connection failed: {err}"))
            }
            ureq::Error::Io(ref io) if io.kind() == std::io::ErrorKind::ConnectionRefused => {
                Self::unsent(format!("connection refused: {err}"))
            }
            ureq::Error::Io(_) => Self::new(format!("connection failed: {err}")),
            other => Self::non_retryable(format!("request failed: {other}")),
        }
    }
}

/// Executes one HTTP round trip.
pub trait Transport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).execute(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).execute(request)
    }
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).execute(request)
    }
}

/// Blocking transport backed by a pooled `ureq::Agent`.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    /// Agent without a global timeout.
    pub fn new() -> Self {
        Self::from_agent(
            ureq::Agent::config_builder()
                .http_status_as_error(false)
                .build()
                .new_agent(),
        )
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::from_agent(
            ureq::Agent::config_builder()
                .http_status_as_error(false)
                .timeout_global(Some(timeout))
                .build()
                .new_agent(),
        )
    }

    /// The agent must be configured with `http_status_as_error(false)`,
    /// otherwise error responses surface as transport failures.
    pub fn from_agent(agent: ureq::Agent) -> Self {
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_headers<B>(
    mut builder: ureq::RequestBuilder<B>,
    headers: &[(String, String)],
) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = request.url.as_str();
        let body = request.body.as_deref();

        let result = match request.method {
            HttpMethod::Get => apply_headers(self.agent.get(url), &request.headers).call(),
            HttpMethod::Post => send(apply_headers(self.agent.post(url), &request.headers), body),
            HttpMethod::Put => send(apply_headers(self.agent.put(url), &request.headers), body),
        };
        let mut response = result?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        // Undecodable bytes are left for the JSON decoder to reject.
        let bytes = response
            .body_mut()
            .read_to_vec()
            .map_err(|e| TransportError::new(format!("failed to read response body: {e}")))?;
        let body = String::from_utf8_lossy(&bytes).into_owned();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn send(
    builder: ureq::RequestBuilder<ureq::typestate::WithBody>,
    body: Option<&[u8]>,
) -> Result<ureq::http::Response<ureq::Body>, ureq::Error> {
    match body {
        Some(bytes) => builder.send(bytes),
        None => builder.send_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_host_is_a_retryable_transport_error() {
        // Bind then drop to get a port with nothing listening on it.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let transport = UreqTransport::with_timeout(Duration::from_secs(2));
        let request = HttpRequest::new(HttpMethod::Get, format!("http://127.0.0.1:{port}/v1/contacts"));

        let err = transport.execute(&request).unwrap_err();
        assert!(err.retryable(), "unexpected error: {err}");
        assert!(!err.may_have_been_sent(), "unexpected error: {err}");
    }

    #[test]
    fn invalid_utf8_body_is_a_response_not_a_failure() {
        use std::io::{Read, Write};

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 512];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }
            stream
                .write_all(b"HTTP/1.1 400 Bad Request\r\ncontent-length: 4\r\nconnection: close\r\n\r\n\xff\xfe{}")
                .unwrap();
        });

        let request = HttpRequest::new(HttpMethod::Get, format!("http://{addr}/v1/invoices/x"));
        let response = UreqTransport::with_timeout(Duration::from_secs(5))
            .execute(&request)
            .unwrap();
        assert_eq!(response.status, 400);
        assert_eq!(response.body, "\u{fffd}\u{fffd}{}");
    }

    #[test]
    fn sent_and_unsent_failures_are_told_apart() {
        let sent = TransportError::new("connection reset");
        assert!(sent.retryable());
        assert!(sent.may_have_been_sent());
        assert_eq!(sent.message(), "connection reset");

        let unsent = TransportError::unsent("host not found");
        assert!(unsent.retryable());
        assert!(!unsent.may_have_been_sent());
    }

    #[test]
    fn malformed_url_is_not_retryable() {
        let transport = UreqTransport::new();
        let request = HttpRequest::new(HttpMethod::Get, "not a url");

        let err = transport.execute(&request).unwrap_err();
        assert!(!err.retryable(), "unexpected error: {err}");
    }
}
