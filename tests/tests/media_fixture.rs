//! Local HTTP fixture serving media payloads with scripted delivery.
//!
//! No external network: each test starts one server on `127.0.0.1:0` and
//! points loaders at it. Delivery is controlled per resource: chunk size,
//! inter-chunk delay, declared vs. undeclared length, non-success status,
//! and mid-body aborts. Request counters expose how often each resource
//! was fetched, which is how cache-warmup tests verify a second open never
//! dials out.

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, Response, StatusCode};
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use futures_util::StreamExt;
use url::Url;

/// One scripted resource.
#[derive(Clone)]
pub struct ServedResource {
    body: Bytes,
    chunk_size: usize,
    chunk_delay: Duration,
    declare_length: bool,
    abort_after: Option<usize>,
    status: StatusCode,
    content_type: &'static str,
}

impl ServedResource {
    /// Resource served with defaults: 16 KiB chunks, no delay, declared
    /// length, `video/mp4`.
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self {
            body: body.into(),
            chunk_size: 16 * 1024,
            chunk_delay: Duration::ZERO,
            declare_length: true,
            abort_after: None,
            status: StatusCode::OK,
            content_type: "video/mp4",
        }
    }

    pub fn chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = bytes;
        self
    }

    pub fn chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    /// Serve without a `Content-Length` header (chunked transfer).
    pub fn undeclared_length(mut self) -> Self {
        self.declare_length = false;
        self
    }

    /// Drop the connection after roughly this many body bytes.
    pub fn abort_after(mut self, bytes: usize) -> Self {
        self.abort_after = Some(bytes);
        self
    }

    /// Respond with this status and no body.
    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn content_type(mut self, content_type: &'static str) -> Self {
        self.content_type = content_type;
        self
    }

    /// The full payload this resource would serve when healthy.
    pub fn payload(&self) -> Bytes {
        self.body.clone()
    }
}

#[derive(Clone, Default)]
struct FixtureState {
    resources: Arc<Mutex<HashMap<String, ServedResource>>>,
    request_counts: Arc<Mutex<HashMap<String, usize>>>,
}

/// Fixture server: scripted resources under `/media/{name}`.
#[derive(Default)]
pub struct MediaFixture {
    state: FixtureState,
}

impl MediaFixture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a resource under `/media/{name}`.
    pub fn with_resource(self, name: &str, resource: ServedResource) -> Self {
        self.state
            .resources
            .lock()
            .expect("resources mutex poisoned")
            .insert(name.to_string(), resource);
        self
    }

    /// How many times `/media/{name}` has been requested.
    pub fn request_count(&self, name: &str) -> usize {
        *self
            .state
            .request_counts
            .lock()
            .expect("request_counts mutex poisoned")
            .get(name)
            .unwrap_or(&0)
    }

    /// Starts the fixture server and returns the base URL (ending in
    /// `/media/`).
    ///
    /// Server startup:
    /// - bind a `std::net::TcpListener` on `127.0.0.1:0`,
    /// - mark it non-blocking,
    /// - hand it off to `tokio::net::TcpListener::from_std`,
    /// - spawn `axum::serve` in the background.
    pub async fn start(&self) -> Url {
        let app = Router::new()
            .route("/media/{name}", get(serve_media))
            .with_state(self.state.clone());

        let listener = std::net::TcpListener::bind("127.0.0.1:0")
            .expect("failed to bind local fixture server");
        listener
            .set_nonblocking(true)
            .expect("failed to set nonblocking on fixture listener");
        let addr = listener
            .local_addr()
            .expect("fixture listener must report its address");

        tokio::spawn(async move {
            let listener = tokio::net::TcpListener::from_std(listener)
                .expect("failed to convert fixture listener to tokio listener");
            axum::serve(listener, app)
                .await
                .expect("fixture server failed");
        });

        Url::parse(&format!("http://{addr}/media/")).expect("failed to build base url")
    }
}

/// Resolves a resource name against the fixture base URL.
pub fn media_url(base: &Url, name: &str) -> Url {
    base.join(name).expect("failed to join media url")
}

async fn serve_media(
    State(state): State<FixtureState>,
    Path(name): Path<String>,
) -> Response<Body> {
    *state
        .request_counts
        .lock()
        .expect("request_counts mutex poisoned")
        .entry(name.clone())
        .or_insert(0) += 1;

    let resource = state
        .resources
        .lock()
        .expect("resources mutex poisoned")
        .get(&name)
        .cloned();
    let Some(resource) = resource else {
        return Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Body::from("no such fixture resource"))
            .expect("static response must build");
    };

    if resource.status != StatusCode::OK {
        return Response::builder()
            .status(resource.status)
            .body(Body::empty())
            .expect("status response must build");
    }

    let declared_len = resource.body.len();
    let sendable = match resource.abort_after {
        Some(limit) => resource.body.slice(..limit.min(resource.body.len())),
        None => resource.body.clone(),
    };

    let chunk_size = resource.chunk_size.max(1);
    let mut items: Vec<io::Result<Bytes>> = Vec::new();
    let mut offset = 0usize;
    while offset < sendable.len() {
        let end = (offset + chunk_size).min(sendable.len());
        items.push(Ok(sendable.slice(offset..end)));
        offset = end;
    }
    if resource.abort_after.is_some() {
        items.push(Err(io::Error::new(
            io::ErrorKind::ConnectionAborted,
            "fixture abort",
        )));
    }

    let delay = resource.chunk_delay;
    let stream = futures_util::stream::iter(items).then(move |item| async move {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        item
    });

    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, resource.content_type);
    if resource.declare_length {
        response = response.header(header::CONTENT_LENGTH, declared_len);
    }
    response
        .body(Body::from_stream(stream))
        .expect("fixture response must build")
}
