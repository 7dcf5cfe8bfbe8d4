//! In-memory transport shared by the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use ds_artifact::{
    ArtifactClient, BoxStream, BufferedResponse, Endpoint, HttpClient, ResponseHead,
    StreamingResponse, TransferOptions, UploadBody,
};
use futures_util::{StreamExt, stream};
use tokio::sync::Notify;

pub const ENDPOINT: &str = "https://ds.example.com/20190101";

#[derive(Debug)]
pub struct MockError(pub String);

impl std::fmt::Display for MockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "{}", self.0) }
}

impl std::error::Error for MockError {}

/// Canned response for GET and HEAD.
#[derive(Debug, Clone, Default)]
pub struct Route {
    pub head:        ResponseHead,
    pub chunks:      Vec<Bytes>,
    /// Serve this many chunks, then never produce another one.
    pub stall_after: Option<usize>,
    pub fail:        Option<String>,
    /// Notified once the body has handed out its last chunk.
    pub drained:     Option<Arc<Notify>>,
}

impl Route {
    pub fn ok(chunks: &[&[u8]]) -> Self {
        let total: usize = chunks.iter().map(|c| c.len()).sum();
        Self {
            head: ResponseHead::new(200)
                .with_header("Content-Length", total.to_string())
                .with_header("Content-Disposition", "attachment; filename=\"artifact.zip\""),
            chunks: chunks.iter().map(|c| Bytes::copy_from_slice(c)).collect(),
            ..Self::default()
        }
    }

    pub fn status(status: u16, body: &str) -> Self {
        Self {
            head: ResponseHead::new(status),
            chunks: vec![Bytes::copy_from_slice(body.as_bytes())],
            ..Self::default()
        }
    }
}

/// Canned response for PUT.
#[derive(Debug, Clone)]
pub struct Sink {
    pub response:   BufferedResponse,
    /// Pull this many chunks, then stop reading without answering.
    pub pull_limit: Option<usize>,
}

impl Default for Sink {
    fn default() -> Self {
        Self {
            response:   BufferedResponse {
                head: ResponseHead::new(200),
                body: Bytes::new(),
            },
            pull_limit: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method:  &'static str,
    pub url:     String,
    pub headers: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default)]
pub struct MockClient {
    pub route:    Route,
    pub sink:     Sink,
    pub requests: Arc<Mutex<Vec<Recorded>>>,
    pub uploaded: Arc<Mutex<Vec<u8>>>,
}

impl MockClient {
    pub fn serving(route: Route) -> Self {
        Self {
            route,
            ..Self::default()
        }
    }

    pub fn accepting(sink: Sink) -> Self {
        Self {
            sink,
            ..Self::default()
        }
    }

    fn record(&self, method: &'static str, url: &str, headers: &[(String, String)]) {
        self.requests.lock().unwrap().push(Recorded {
            method,
            url: url.to_string(),
            headers: headers.to_vec(),
        });
    }

    pub fn last_request(&self) -> Recorded { self.requests.lock().unwrap().last().cloned().unwrap() }
}

impl HttpClient for MockClient {
    type Error = MockError;

    async fn head(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<ResponseHead, Self::Error> {
        self.record("HEAD", url, headers);
        match &self.route.fail {
            Some(msg) => Err(MockError(msg.clone())),
            None => Ok(self.route.head.clone()),
        }
    }

    async fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> Result<StreamingResponse<Self::Error>, Self::Error> {
        self.record("GET", url, headers);
        if let Some(msg) = &self.route.fail {
            return Err(MockError(msg.clone()));
        }
        let chunks = stream::iter(self.route.chunks.clone().into_iter().map(Ok));
        let drained = self.route.drained.clone();
        let body: BoxStream<'static, Result<Bytes, MockError>> = match self.route.stall_after {
            Some(n) => Box::pin(chunks.take(n).chain(stream::pending())),
            None => Box::pin(chunks.chain(
                stream::once(async move {
                    if let Some(notify) = drained {
                        notify.notify_one();
                    }
                })
                .filter_map(|()| async { None::<Result<Bytes, MockError>> }),
            )),
        };
        Ok(StreamingResponse {
            head: self.route.head.clone(),
            body,
        })
    }

    async fn put(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: UploadBody,
    ) -> Result<BufferedResponse, Self::Error> {
        self.record("PUT", url, headers);
        let mut stream = body.stream;
        let mut pulled = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| MockError(e.to_string()))?;
            self.uploaded.lock().unwrap().extend_from_slice(&chunk);
            pulled += 1;
            if self.sink.pull_limit == Some(pulled) {
                std::future::pending::<()>().await;
            }
            // Hand control back like a socket write would.
            tokio::task::yield_now().await;
        }
        Ok(self.sink.response.clone())
    }
}

pub fn client(mock: MockClient, options: TransferOptions) -> ArtifactClient<MockClient> {
    ArtifactClient::new(mock, Endpoint::parse(ENDPOINT).unwrap(), options)
}

pub fn every_chunk() -> TransferOptions {
    TransferOptions::default().progress_interval(std::time::Duration::ZERO)
}
