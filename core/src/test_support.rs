//! In-memory transport for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::http::{HttpRequest, HttpResponse};
use crate::transport::{Transport, TransportError};

/// Replays queued outcomes in order and records every request it receives.
#[derive(Debug, Default)]
pub(crate) struct ScriptedTransport {
    outcomes: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new(outcomes: impl IntoIterator<Item = Result<HttpResponse, TransportError>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn json(responses: impl IntoIterator<Item = (u16, &'static str)>) -> Self {
        Self::new(
            responses
                .into_iter()
                .map(|(status, body)| Ok(HttpResponse::new(status, body))),
        )
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Transport for ScriptedTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::non_retryable("no scripted response left")))
    }
}
