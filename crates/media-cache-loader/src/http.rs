//! Network source for progressive fetches.
//!
//! The [`FetchSource`] trait is the seam between the coordinator and the
//! transport: one call opens the resource and yields response metadata
//! plus a body stream. [`HttpFetchSource`] is the production impl on top
//! of a process-wide `reqwest` client; tests drive the coordinator with
//! scripted sources instead.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::header;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::{LoadError, LoadResult};
use crate::handle::ResponseMeta;

/// One opened fetch: headers first, then the body.
pub struct FetchResponse {
    /// Metadata extracted from the response headers.
    pub meta: ResponseMeta,
    /// Body chunks in arrival order.
    pub body: BoxStream<'static, LoadResult<Bytes>>,
}

/// Transport abstraction used by [`crate::ProgressiveLoader`].
#[async_trait]
pub trait FetchSource: Send + Sync + 'static {
    /// Opens the resource and returns headers plus the body stream.
    ///
    /// Implementations must honor `cancel` while establishing the
    /// response; body-side cancellation is handled by the caller.
    async fn open(&self, url: &Url, cancel: &CancellationToken) -> LoadResult<FetchResponse>;
}

/// Process-wide HTTP client so every loader shares pooling and DNS cache.
static HTTP_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()
        .expect("default reqwest client must build")
});

/// Returns the shared HTTP client used by [`HttpFetchSource`].
pub fn shared_http_client() -> reqwest::Client {
    HTTP_CLIENT.clone()
}

/// HTTP GET source over the shared client.
///
/// Requests are sent with `Cache-Control: no-store` so no intermediate
/// HTTP cache short-circuits the fetch; durable caching happens in
/// `media-cache`, after the payload is complete.
#[derive(Debug, Clone)]
pub struct HttpFetchSource {
    client: reqwest::Client,
    request_timeout: Duration,
}

impl HttpFetchSource {
    /// Creates a source over the shared client.
    pub fn new(request_timeout: Duration) -> Self {
        Self {
            client: shared_http_client(),
            request_timeout,
        }
    }

    /// Creates a source over a caller-supplied client.
    pub fn with_client(client: reqwest::Client, request_timeout: Duration) -> Self {
        Self {
            client,
            request_timeout,
        }
    }

    fn map_stream_errors(
        url: String,
        response: reqwest::Response,
    ) -> BoxStream<'static, LoadResult<Bytes>> {
        let url: Arc<str> = Arc::from(url);
        response
            .bytes_stream()
            .map(move |res| {
                res.map_err(|e| {
                    LoadError::transport(format!("stream read error (url={}): {}", url, e))
                })
            })
            .boxed()
    }
}

#[async_trait]
impl FetchSource for HttpFetchSource {
    async fn open(&self, url: &Url, cancel: &CancellationToken) -> LoadResult<FetchResponse> {
        let send_fut = timeout(
            self.request_timeout,
            self.client
                .get(url.clone())
                .header(header::CACHE_CONTROL, "no-store")
                .header(header::PRAGMA, "no-cache")
                .send(),
        );

        // Establishing the response is cancellable; once the body stream
        // is handed out, the coordinator races it against the token.
        let res = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(LoadError::Cancelled),
            res = send_fut => res,
        };

        let response = match res {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                return Err(LoadError::transport(format!(
                    "request failed (url={}): {}",
                    url, e
                )));
            }
            Err(_) => {
                return Err(LoadError::transport(format!(
                    "request timed out (url={})",
                    url
                )));
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::transport(format!(
                "HTTP {} (url={})",
                status, url
            )));
        }

        let meta = ResponseMeta::new(
            response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            response.content_length(),
        );

        Ok(FetchResponse {
            meta,
            body: Self::map_stream_errors(url.to_string(), response),
        })
    }
}
