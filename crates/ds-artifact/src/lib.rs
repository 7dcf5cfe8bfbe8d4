//! Cancellable, progress-reporting transfer of Data Science artifacts.
//!
//! Model and job artifacts live under
//! `{endpoint}/artifacts/{model|job}/{id}[/steps/{step}]`. This crate
//! inspects, downloads and uploads them over HTTP while reporting byte-level
//! progress and honoring caller-initiated aborts.
//!
//! # Architecture
//!
//! This crate follows the three-layer pattern:
//! - [`data`] - Immutable requests, options and progress values
//! - [`core`](crate::core) - Pure transformations: endpoint selection, header parsing,
//!   error normalization and the transfer status state machine
//! - `effects` - I/O operations behind the [`HttpClient`] trait
//!
//! # Key Features
//!
//! - **Streaming**: Bodies move chunk by chunk in both directions; nothing is
//!   buffered whole unless the caller asks for an in-memory download
//! - **Staged Writes**: Downloads land in a temporary file next to the
//!   destination and are renamed into place only on success
//! - **Per-Request Cancellation**: Aborting settles the in-flight transfer as
//!   cancelled and leaves later transfers untouched
//! - **Uniform Errors**: Every failure can be reduced to
//!   `{ "body": { "message": ... } }` via [`Error::normalize`]

pub mod core;
pub mod data;
mod effects;
mod error;

pub use crate::core::{Endpoint, FeatureFlags, TransferState, TransferStatus, resolve_endpoint};
pub use data::{
    ArtifactMetadata, Direction, DownloadTarget, Progress, ResourceType, TransferOptions,
    TransferOutcome, TransferPhase, TransferRequest, UploadFile,
};
pub use effects::{
    ArtifactClient, ArtifactClientBuilder, BoxStream, BufferedResponse, DownloadLocation,
    Downloaded, HttpClient, ResponseHead, StreamingResponse, TransferHandle, UploadBody,
    UploadStream, Uploaded,
};

#[cfg(feature = "reqwest")]
pub use effects::ReqwestClient;

pub use error::{Error, ErrorBody, NormalizedError, Result};
