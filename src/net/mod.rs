//! Network bridge.
//!
//! The runtime runs inside a sandbox whose HTTP primitive differs between
//! hosts. [`NetworkBridge`] hides that difference behind one async call that
//! either yields a [`Response`] or a [`TransportError`]; status codes,
//! redirects and retries are the bridge's business.

mod credential;

use std::fmt;

use async_trait::async_trait;

use crate::error::TransportError;

pub use credential::ApiKeyFetcher;

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
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

/// Outgoing request, relative to the host site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub body: Option<String>,
    pub headers: Vec<(String, String)>,
}

impl Request {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            body: None,
            headers: Vec::new(),
        }
    }

    pub fn post(path: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            body: Some(body.into()),
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Successful response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    pub body: String,
    pub headers: Vec<(String, String)>,
}

impl Response {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            headers: Vec::new(),
        }
    }

    /// First header named `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Sandbox-independent HTTP access to the host site.
#[async_trait]
pub trait NetworkBridge: Send + Sync + 'static {
    /// Performs `request`; any non-success outcome is a [`TransportError`].
    async fn request(&self, request: Request) -> Result<Response, TransportError>;
}
