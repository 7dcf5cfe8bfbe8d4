//! Immutable data types for artifact transfers.
//!
//! Requests, options, metadata and progress values are built once and
//! passed by reference between the pure core and the effectful client.

pub mod options;
pub mod progress;
pub mod request;

pub use options::TransferOptions;
pub use progress::{Direction, Progress, TransferOutcome, TransferPhase};
pub use request::{ArtifactMetadata, DownloadTarget, ResourceType, TransferRequest, UploadFile};
