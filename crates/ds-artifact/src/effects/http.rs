use std::future::Future;
use std::io;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::Stream;

/// A boxed stream type for HTTP response bodies.
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = T> + Send + 'a>>;

/// Request body stream handed to [`HttpClient::put`].
pub type UploadStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + Sync>>;

/// Status line and headers of a response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseHead {
    pub status:  u16,
    pub headers: Vec<(String, String)>,
}

impl ResponseHead {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn is_success(&self) -> bool { (200..300).contains(&self.status) }

    pub fn header(&self, name: &str) -> Option<&str> {
        crate::core::header_value(&self.headers, name)
    }
}

/// A response whose body is still on the wire.
pub struct StreamingResponse<E> {
    pub head: ResponseHead,
    pub body: BoxStream<'static, Result<Bytes, E>>,
}

/// A response whose (small) body has been read in full.
#[derive(Debug, Clone, Default)]
pub struct BufferedResponse {
    pub head: ResponseHead,
    pub body: Bytes,
}

/// A streamed request body with its exact length.
pub struct UploadBody {
    pub stream:         UploadStream,
    pub content_length: u64,
}

/// Asynchronous HTTP transport used by the artifact client.
///
/// Implementations only move bytes: they report every status code as a
/// response and leave status interpretation, progress and cancellation to
/// the caller.
///
/// # Implementations
///
/// - [`ReqwestClient`]: Production implementation using `reqwest`
/// - In-memory implementations for testing
pub trait HttpClient: Send + Sync {
    /// Error type for transport failures (DNS, connect, TLS, reset, ...).
    type Error: std::error::Error + Send + 'static;

    /// Issue a HEAD request.
    fn head(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> impl Future<Output = Result<ResponseHead, Self::Error>> + Send;

    /// Issue a GET request and return the body as a stream.
    fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> impl Future<Output = Result<StreamingResponse<Self::Error>, Self::Error>> + Send;

    /// Issue a PUT request with a streamed body.
    ///
    /// The transport must send `Content-Length: body.content_length` and
    /// pull the stream as it writes to the connection.
    fn put(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: UploadBody,
    ) -> impl Future<Output = Result<BufferedResponse, Self::Error>> + Send;
}

#[cfg(feature = "reqwest")]
mod reqwest_impl {
    use std::time::Duration;

    use futures_util::StreamExt;
    use reqwest::header::{CONTENT_LENGTH, HeaderMap};

    use super::*;
    use crate::error::{Error, Result};

    /// Production HTTP client implementation using reqwest.
    #[derive(Debug, Clone)]
    pub struct ReqwestClient {
        client: reqwest::Client,
    }

    impl ReqwestClient {
        /// Create a client with a 30 second connect timeout.
        ///
        /// No overall request timeout is set; long transfers are bounded by
        /// the artifact client's stall timeout instead.
        pub fn new() -> Result<Self> {
            let client = reqwest::Client::builder()
                .connect_timeout(Duration::from_secs(30))
                .user_agent(concat!("ds-artifact/", env!("CARGO_PKG_VERSION")))
                .build()
                .map_err(Error::network)?;
            Ok(Self { client })
        }

        /// Wrap an already configured reqwest client (proxies, TLS roots, ...).
        pub fn with_client(client: reqwest::Client) -> Self { Self { client } }

        fn request(
            &self,
            method: reqwest::Method,
            url: &str,
            headers: &[(String, String)],
        ) -> reqwest::RequestBuilder {
            let mut request = self.client.request(method, url);
            for (key, value) in headers {
                request = request.header(key, value);
            }
            request
        }
    }

    fn head_of(status: reqwest::StatusCode, headers: &HeaderMap) -> ResponseHead {
        ResponseHead {
            status:  status.as_u16(),
            headers: headers
                .iter()
                .filter_map(|(k, v)| {
                    v.to_str()
                        .ok()
                        .map(|v| (k.as_str().to_string(), v.to_string()))
                })
                .collect(),
        }
    }

    impl HttpClient for ReqwestClient {
        type Error = reqwest::Error;

        async fn head(
            &self,
            url: &str,
            headers: &[(String, String)],
        ) -> std::result::Result<ResponseHead, Self::Error> {
            let response = self.request(reqwest::Method::HEAD, url, headers).send().await?;
            Ok(head_of(response.status(), response.headers()))
        }

        async fn get(
            &self,
            url: &str,
            headers: &[(String, String)],
        ) -> std::result::Result<StreamingResponse<Self::Error>, Self::Error> {
            let response = self.request(reqwest::Method::GET, url, headers).send().await?;
            let head = head_of(response.status(), response.headers());
            let body = response.bytes_stream().boxed();
            Ok(StreamingResponse { head, body })
        }

        async fn put(
            &self,
            url: &str,
            headers: &[(String, String)],
            body: UploadBody,
        ) -> std::result::Result<BufferedResponse, Self::Error> {
            let response = self
                .request(reqwest::Method::PUT, url, headers)
                .header(CONTENT_LENGTH, body.content_length)
                .body(reqwest::Body::wrap_stream(body.stream))
                .send()
                .await?;
            let head = head_of(response.status(), response.headers());
            let body = response.bytes().await?;
            Ok(BufferedResponse { head, body })
        }
    }
}

#[cfg(feature = "reqwest")]
pub use reqwest_impl::ReqwestClient;
