//! Inbound HTTP request type.

use bytes::Bytes;
use http::{HeaderMap, Method};
use uuid::Uuid;

/// An inbound HTTP request as seen by the filter pipeline.
///
/// Built once per request by the server from the hyper request parts. The
/// identifier is generated at construction and never changes; it is what the
/// tracking filter logs to correlate pre and post events.
pub struct Request {
    method: Method,
    path: String,
    query: Option<String>,
    headers: HeaderMap,
    body: Bytes,
    id: Uuid,
}

impl Request {
    pub fn new(
        method: Method,
        path: impl Into<String>,
        query: Option<String>,
        headers: HeaderMap,
        body: Bytes,
    ) -> Self {
        Self {
            method,
            path: path.into(),
            query,
            headers,
            body,
            id: Uuid::new_v4(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// The per-request identifier, generated once at construction.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Case-insensitive header lookup. Returns the first value if the header
    /// appears more than once, `None` if it is absent or not valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}
