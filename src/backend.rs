//! Backend dispatch.
//!
//! [`Backend`] is the seam between the gateway and the services behind it:
//! the router only sees the trait, so tests substitute a scripted
//! implementation and production wires in [`HttpBackend`], a thin wrapper
//! over hyper-util's pooled client.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use http::header::HOST;
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use thiserror::Error;

use crate::request::Request;
use crate::response::Response;

pub type BoxBackendFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Response, BackendError>> + Send + 'a>>;

/// A backend call that produced no usable response. Recorded as a failure
/// outcome by the breaker; the caller receives the fallback instead.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("invalid backend uri: {0}")]
    Uri(#[from] http::uri::InvalidUri),

    #[error("failed to build backend request: {0}")]
    Request(#[from] http::Error),

    #[error("backend call failed: {0}")]
    Transport(#[from] hyper_util::client::legacy::Error),

    #[error("failed to read backend response body: {0}")]
    Body(#[source] hyper::Error),
}

/// Dispatches a request to the backend at `target`.
pub trait Backend: Send + Sync + 'static {
    fn dispatch<'a>(&'a self, target: &'a str, request: &'a Request) -> BoxBackendFuture<'a>;
}

/// Production backend client. Connections are pooled and shared across all
/// request tasks; the client itself is cheap to clone and thread-safe.
pub struct HttpBackend {
    client: Client<HttpConnector, Full<Bytes>>,
}

impl HttpBackend {
    pub fn new() -> Self {
        Self { client: Client::builder(TokioExecutor::new()).build_http() }
    }
}

impl Default for HttpBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for HttpBackend {
    fn dispatch<'a>(&'a self, target: &'a str, request: &'a Request) -> BoxBackendFuture<'a> {
        Box::pin(async move {
            let uri: http::Uri = match request.query() {
                Some(query) => format!("{target}{}?{query}", request.path()).parse()?,
                None => format!("{target}{}", request.path()).parse()?,
            };

            let mut builder = http::Request::builder().method(request.method().clone()).uri(uri);
            for (name, value) in request.headers() {
                // Host belongs to the backend authority, not the gateway's.
                if name != HOST {
                    builder = builder.header(name, value);
                }
            }
            let outbound = builder.body(Full::new(request.body().clone()))?;

            let reply = self.client.request(outbound).await?;
            let (parts, body) = reply.into_parts();
            let bytes = body.collect().await.map_err(BackendError::Body)?.to_bytes();
            Ok(Response::from_backend(parts.status, &parts.headers, bytes))
        })
    }
}
