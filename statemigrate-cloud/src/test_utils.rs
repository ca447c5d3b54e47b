//! In-memory [`ApiTransport`] for tests.
//!
//! Responses are keyed by `(method, path)`; every request is recorded so
//! tests can assert on exactly which calls were made and in what order.
//! Unscripted requests fail with HTTP 404.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::client::{ApiTransport, Method};
use crate::error::{CloudError, RequestFailure};

/// One recorded request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub operation: &'static str,
    pub method: Method,
    pub path: String,
    pub body: Option<String>,
}

#[derive(Debug, Clone)]
enum Scripted {
    Body(String),
    Status(u16),
}

#[derive(Debug, Default)]
pub struct RecordingTransport {
    responses: HashMap<(Method, String), Scripted>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `GET path` with `body`.
    pub fn respond(self, path: &str, body: &str) -> Self {
        self.respond_to(Method::Get, path, body)
    }

    /// Answer `POST path` with `body`.
    pub fn respond_post(self, path: &str, body: &str) -> Self {
        self.respond_to(Method::Post, path, body)
    }

    pub fn respond_to(mut self, method: Method, path: &str, body: &str) -> Self {
        self.responses
            .insert((method, path.to_owned()), Scripted::Body(body.to_owned()));
        self
    }

    /// Answer `method path` with a non-success status.
    pub fn fail(mut self, method: Method, path: &str, status: u16) -> Self {
        self.responses
            .insert((method, path.to_owned()), Scripted::Status(status));
        self
    }

    /// Every request made so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Paths of the requests made with `method`, in order.
    pub fn paths(&self, method: Method) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.method == method)
            .map(|c| c.path)
            .collect()
    }
}

impl ApiTransport for RecordingTransport {
    fn execute(
        &self,
        operation: &'static str,
        method: Method,
        path: &str,
        body: Option<&str>,
    ) -> Result<String, CloudError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                operation,
                method,
                path: path.to_owned(),
                body: body.map(str::to_owned),
            });
        }

        match self.responses.get(&(method, path.to_owned())) {
            Some(Scripted::Body(body)) => Ok(body.clone()),
            Some(Scripted::Status(code)) => Err(CloudError::RemoteRequest {
                operation,
                failure: RequestFailure::Status(*code),
            }),
            None => Err(CloudError::RemoteRequest {
                operation,
                failure: RequestFailure::Status(404),
            }),
        }
    }
}
