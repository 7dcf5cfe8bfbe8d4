//! I/O operations for artifact transfers.
//!
//! Everything that talks to the network or the filesystem lives here,
//! behind the [`HttpClient`] transport trait.

mod client;
mod download;
mod handle;
mod http;
mod upload;

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

pub use client::{ArtifactClient, ArtifactClientBuilder};
pub use download::{DownloadLocation, Downloaded};
pub use handle::TransferHandle;
pub use http::{
    BoxStream, BufferedResponse, HttpClient, ResponseHead, StreamingResponse, UploadBody,
    UploadStream,
};
#[cfg(feature = "reqwest")]
pub use http::ReqwestClient;
pub use upload::Uploaded;

/// Await `fut` unless the token fires or nothing happens within `stall`.
///
/// Cancellation is checked first so an abort always settles as
/// [`Error::Cancelled`], even when the operation is ready at the same time.
pub(crate) async fn guarded<F: Future>(
    token: &CancellationToken,
    stall: Option<Duration>,
    fut: F,
) -> Result<F::Output> {
    let timed = async {
        match stall {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| Error::Timeout(limit)),
            None => Ok(fut.await),
        }
    };

    tokio::select! {
        biased;
        _ = token.cancelled() => Err(Error::Cancelled),
        out = timed => out,
    }
}
