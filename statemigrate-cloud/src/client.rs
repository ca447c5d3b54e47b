//! Remote API client.
//!
//! [`ApiTransport`] is the seam every remote operation goes through: it takes
//! an operation name, a method, an API path, and an optional JSON body, and
//! returns the raw response body. [`HttpTransport`] is the `ureq`
//! implementation; tests substitute an in-memory transport.
//!
//! Every request carries `Authorization: Bearer <token>` and
//! `Content-Type: application/vnd.api+json`. Nothing is retried.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use statemigrate_core::{Config, WorkspaceName};

use crate::error::{parse_json, CloudError, RequestFailure};
use crate::schema::WorkspaceDocument;

pub const CONTENT_TYPE: &str = "application/vnd.api+json";

/// HTTP verbs used against the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Executes one authenticated API request and returns the raw body.
///
/// Implementations must fail with [`CloudError::RemoteRequest`] on transport
/// failure or any status above 299.
pub trait ApiTransport {
    fn execute(
        &self,
        operation: &'static str,
        method: Method,
        path: &str,
        body: Option<&str>,
    ) -> Result<String, CloudError>;
}

impl<T: ApiTransport + ?Sized> ApiTransport for &T {
    fn execute(
        &self,
        operation: &'static str,
        method: Method,
        path: &str,
        body: Option<&str>,
    ) -> Result<String, CloudError> {
        (**self).execute(operation, method, path, body)
    }
}

// ---------------------------------------------------------------------------
// HttpTransport
// ---------------------------------------------------------------------------

/// `ureq`-backed transport. `path` is appended to the configured base URL.
pub struct HttpTransport {
    agent: ureq::Agent,
    base_url: String,
    token: String,
}

impl HttpTransport {
    /// `timeout` of `None` keeps `ureq`'s defaults.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>, timeout: Option<Duration>) -> Self {
        let mut builder = ureq::AgentBuilder::new();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Self {
            agent: builder.build(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            token: token.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.api_url, &config.token, config.request_timeout)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn build_request(&self, method: Method, path: &str) -> ureq::Request {
        self.agent
            .request(method.as_str(), &self.url(path))
            .set("Authorization", &format!("Bearer {}", self.token))
            .set("Content-Type", CONTENT_TYPE)
    }
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ApiTransport for HttpTransport {
    fn execute(
        &self,
        operation: &'static str,
        method: Method,
        path: &str,
        body: Option<&str>,
    ) -> Result<String, CloudError> {
        tracing::debug!(operation, %method, path, "remote request");
        let request = self.build_request(method, path);
        let result = match body {
            Some(body) => request.send_string(body),
            None => request.call(),
        };

        let response = match result {
            Ok(response) => response,
            Err(ureq::Error::Status(code, _)) => {
                return Err(CloudError::request(operation, RequestFailure::Status(code)));
            }
            Err(ureq::Error::Transport(transport)) => {
                return Err(CloudError::request(
                    operation,
                    RequestFailure::Transport(transport.to_string()),
                ));
            }
        };

        // ureq follows redirects and reports 4xx/5xx as errors; anything else
        // outside 2xx still has to be rejected here.
        let status = response.status();
        if !(200..=299).contains(&status) {
            return Err(CloudError::request(operation, RequestFailure::Status(status)));
        }

        response
            .into_string()
            .map_err(|e| CloudError::request(operation, RequestFailure::Body(e)))
    }
}

// ---------------------------------------------------------------------------
// CloudClient
// ---------------------------------------------------------------------------

/// Organization-scoped API client. Workspace ids are resolved on first use
/// and remembered for the rest of the job.
pub struct CloudClient<T> {
    transport: T,
    organization: String,
    workspace_ids: Mutex<HashMap<WorkspaceName, String>>,
}

impl<T: ApiTransport> CloudClient<T> {
    pub fn new(transport: T, organization: impl Into<String>) -> Self {
        Self {
            transport,
            organization: organization.into(),
            workspace_ids: Mutex::new(HashMap::new()),
        }
    }

    pub fn organization(&self) -> &str {
        &self.organization
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Issue a request through the transport.
    pub fn execute(
        &self,
        operation: &'static str,
        method: Method,
        path: &str,
        body: Option<&str>,
    ) -> Result<String, CloudError> {
        self.transport.execute(operation, method, path, body)
    }

    /// Resolve a workspace name to its remote id.
    pub fn workspace_id(&self, workspace: &WorkspaceName) -> Result<String, CloudError> {
        if let Some(id) = self.cached_id(workspace) {
            return Ok(id);
        }

        const OP: &str = "getWorkspaceID";
        let path = format!(
            "/organizations/{}/workspaces/{}",
            self.organization, workspace.0
        );
        let body = self.execute(OP, Method::Get, &path, None)?;
        let doc: WorkspaceDocument = parse_json(OP, &body)?;
        let id = doc.data.id;

        tracing::debug!(workspace = %workspace, workspace_id = %id, "resolved workspace id");
        if let Ok(mut ids) = self.workspace_ids.lock() {
            ids.insert(workspace.clone(), id.clone());
        }
        Ok(id)
    }

    fn cached_id(&self, workspace: &WorkspaceName) -> Option<String> {
        self.workspace_ids
            .lock()
            .ok()
            .and_then(|ids| ids.get(workspace).cloned())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread;

    use super::*;
    use crate::test_utils::RecordingTransport;

    /// Serve exactly one HTTP response on a local port and hand back the raw
    /// request head plus body that was received.
    fn one_shot_server(status_line: &'static str, body: &'static str) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept");
            let mut reader = BufReader::new(stream.try_clone().expect("clone"));
            let mut head = String::new();
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).expect("read line");
                if line == "\r\n" || line.is_empty() {
                    break;
                }
                if let Some(v) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                    content_length = v.trim().parse().unwrap_or(0);
                }
                head.push_str(&line);
            }
            let mut payload = vec![0u8; content_length];
            reader.read_exact(&mut payload).expect("read body");
            head.push_str(&String::from_utf8_lossy(&payload));

            let mut stream = stream;
            write!(
                stream,
                "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            )
            .expect("write response");
            head
        });
        (format!("http://{addr}/api/v2"), handle)
    }

    #[test]
    fn http_transport_sends_auth_and_content_type() {
        let (base, server) = one_shot_server("HTTP/1.1 200 OK", r#"{"data":[]}"#);
        let transport = HttpTransport::new(base, "example_token", None);

        let body = transport
            .execute("listRuns", Method::Get, "/workspaces/ws-1/runs", None)
            .expect("request");
        assert_eq!(body, r#"{"data":[]}"#);

        let request = server.join().expect("server").to_ascii_lowercase();
        assert!(request.starts_with("get /api/v2/workspaces/ws-1/runs "), "{request}");
        assert!(request.contains("authorization: bearer example_token"));
        assert!(request.contains("content-type: application/vnd.api+json"));
    }

    #[test]
    fn http_transport_posts_body() {
        let (base, server) = one_shot_server("HTTP/1.1 201 Created", r#"{"data":{"id":"run-9"}}"#);
        let transport = HttpTransport::new(base, "t", None);

        transport
            .execute("createRun", Method::Post, "/runs", Some(r#"{"data":{}}"#))
            .expect("request");

        let request = server.join().expect("server");
        assert!(request.starts_with("POST /api/v2/runs "), "{request}");
        assert!(request.ends_with(r#"{"data":{}}"#), "{request}");
    }

    #[test]
    fn http_transport_rejects_non_success_status() {
        let (base, server) = one_shot_server("HTTP/1.1 404 Not Found", r#"{"errors":[]}"#);
        let transport = HttpTransport::new(base, "t", None);

        let err = transport
            .execute("getWorkspaceID", Method::Get, "/organizations/o/workspaces/w", None)
            .unwrap_err();
        server.join().expect("server");

        assert_eq!(err.status(), Some(404));
        assert!(err.to_string().contains("getWorkspaceID"), "{err}");
    }

    #[test]
    fn http_transport_reports_transport_failure() {
        // Bind then drop to get a port nothing is listening on.
        let port = TcpListener::bind("127.0.0.1:0")
            .and_then(|l| l.local_addr())
            .expect("addr")
            .port();
        let transport = HttpTransport::new(format!("http://127.0.0.1:{port}"), "t", None);

        let err = transport
            .execute("listRuns", Method::Get, "/workspaces/ws/runs", None)
            .unwrap_err();
        assert!(matches!(
            err,
            CloudError::RemoteRequest {
                failure: RequestFailure::Transport(_),
                ..
            }
        ));
    }

    #[test]
    fn workspace_id_is_resolved_once() {
        let transport = RecordingTransport::new().respond(
            "/organizations/acme/workspaces/w1",
            r#"{"data":{"id":"ws-abc","attributes":{}}}"#,
        );
        let client = CloudClient::new(&transport, "acme");
        let name = WorkspaceName::from("w1");

        assert_eq!(client.workspace_id(&name).unwrap(), "ws-abc");
        assert_eq!(client.workspace_id(&name).unwrap(), "ws-abc");
        assert_eq!(transport.calls().len(), 1);
    }

    #[test]
    fn workspace_id_parse_failure() {
        let transport =
            RecordingTransport::new().respond("/organizations/acme/workspaces/w1", "not json");
        let client = CloudClient::new(&transport, "acme");

        let err = client.workspace_id(&WorkspaceName::from("w1")).unwrap_err();
        assert!(matches!(err, CloudError::Parse { operation: "getWorkspaceID", .. }));
    }
}
