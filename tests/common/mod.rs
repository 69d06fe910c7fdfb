//! In-process stand-in for the platform API.
//!
//! Every request is recorded. Responses are queued per (method, path); the last
//! queued response keeps answering once the queue is drained. Unknown routes get
//! a 404 with a JSON `message`.
#![allow(dead_code)]

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use serde_json::Value;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

pub const API_PREFIX: &str = "/api/v2/";

#[derive(Debug, Clone)]
pub struct Canned {
    status: u16,
    body: String,
    headers: Vec<(String, String)>,
}

impl Canned {
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            body: body.to_string(),
            headers: vec![("content-type".to_string(), "application/json".to_string())],
        }
    }

    pub fn ok(body: Value) -> Self {
        Self::json(200, body)
    }

    pub fn empty(status: u16) -> Self {
        Self {
            status,
            body: String::new(),
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// One part of a multipart/form-data body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormPart {
    pub name: String,
    pub file_name: Option<String>,
    pub content: String,
}

impl Recorded {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("request body is not JSON")
    }

    pub fn query_param(&self, key: &str) -> Option<String> {
        let query = self.query.as_deref()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.to_string())
    }

    pub fn is_multipart(&self) -> bool {
        self.content_type().starts_with("multipart/form-data")
    }

    fn content_type(&self) -> String {
        self.headers
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    }

    pub fn form_parts(&self) -> Vec<FormPart> {
        let content_type = self.content_type();
        let boundary = content_type
            .split("boundary=")
            .nth(1)
            .expect("multipart request without boundary")
            .trim_matches('"')
            .to_string();
        let body = String::from_utf8_lossy(&self.body).to_string();
        let delimiter = format!("--{}", boundary);

        body.split(delimiter.as_str())
            .filter_map(|section| {
                let section = section.strip_prefix("\r\n")?;
                let (head, content) = section.split_once("\r\n\r\n")?;
                let disposition = head
                    .lines()
                    .find(|l| l.to_ascii_lowercase().starts_with("content-disposition"))?;
                let name = attribute(disposition, "name")?;
                let file_name = attribute(disposition, "filename");
                Some(FormPart {
                    name,
                    file_name,
                    content: content.strip_suffix("\r\n").unwrap_or(content).to_string(),
                })
            })
            .collect()
    }

    pub fn form_values(&self, name: &str) -> Vec<String> {
        self.form_parts()
            .into_iter()
            .filter(|p| p.name == name)
            .map(|p| p.content)
            .collect()
    }
}

fn attribute(disposition: &str, key: &str) -> Option<String> {
    disposition.split(';').map(str::trim).find_map(|item| {
        item.strip_prefix(&format!("{}=", key))
            .map(|v| v.trim_matches('"').to_string())
    })
}

struct Route {
    method: String,
    path: String,
    responses: VecDeque<Canned>,
}

#[derive(Default)]
struct Inner {
    requests: Vec<Recorded>,
    routes: Vec<Route>,
}

#[derive(Clone)]
pub struct MockBackend {
    addr: SocketAddr,
    inner: Arc<Mutex<Inner>>,
}

impl MockBackend {
    /// Serve on an ephemeral port from a dedicated thread and runtime, so both
    /// async tests and spawned binaries can talk to it
    pub fn start() -> Self {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let addr = listener.local_addr().unwrap();
        let inner = Arc::new(Mutex::new(Inner::default()));

        let router = Router::new()
            .fallback(handle)
            .with_state(inner.clone());

        std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::from_std(listener).unwrap();
                axum::serve(listener, router).await.unwrap();
            });
        });

        Self { addr, inner }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn endpoint(&self) -> String {
        format!("http://{}/api/v2", self.addr)
    }

    /// Queue a response for `method` on an API path such as `customApplications/`
    pub fn on(&self, method: &str, api_path: &str, response: Canned) -> &Self {
        let path = format!("{}{}", API_PREFIX, api_path.trim_start_matches('/'));
        let mut inner = self.inner.lock().unwrap();
        match inner
            .routes
            .iter_mut()
            .find(|r| r.method == method && r.path == path)
        {
            Some(route) => route.responses.push_back(response),
            None => inner.routes.push(Route {
                method: method.to_string(),
                path,
                responses: VecDeque::from([response]),
            }),
        }
        self
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.inner.lock().unwrap().requests.clone()
    }

    pub fn requests_to(&self, method: &str, api_path: &str) -> Vec<Recorded> {
        let path = format!("{}{}", API_PREFIX, api_path.trim_start_matches('/'));
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path == path)
            .collect()
    }

    pub fn count(&self, method: &str) -> usize {
        self.requests().iter().filter(|r| r.method == method).count()
    }
}

async fn handle(
    State(inner): State<Arc<Mutex<Inner>>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut inner = inner.lock().unwrap();
    inner.requests.push(Recorded {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        headers,
        body,
    });

    let canned = inner
        .routes
        .iter_mut()
        .find(|r| r.method == method.as_str() && r.path == uri.path())
        .and_then(|route| {
            if route.responses.len() > 1 {
                route.responses.pop_front()
            } else {
                route.responses.front().cloned()
            }
        });

    match canned {
        Some(canned) => {
            let mut headers = HeaderMap::new();
            for (name, value) in &canned.headers {
                headers.insert(
                    HeaderName::from_bytes(name.as_bytes()).unwrap(),
                    HeaderValue::from_str(value).unwrap(),
                );
            }
            let status = StatusCode::from_u16(canned.status).unwrap();
            (status, headers, canned.body).into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            [("content-type", "application/json")],
            r#"{"message": "Not found"}"#,
        )
            .into_response(),
    }
}

/// 24-hex object ID for tests
pub fn object_id(n: u8) -> String {
    format!("65980d79eea4fd0eddd59b{:02x}", n)
}
