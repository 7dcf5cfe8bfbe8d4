//! Pure transformations for artifact transfers.
//!
//! Nothing in here touches the network or the filesystem: endpoint
//! selection, URL construction, header parsing, error-body normalization,
//! progress throttling and the status state machine.

mod endpoint;
mod headers;
mod normalize;
mod status;
mod throttle;

pub use endpoint::{
    Endpoint, FeatureFlags, NON_PROD_ENDPOINT_ENV, NON_PROD_ENDPOINT_FLAG, resolve_endpoint,
    resolve_from_env,
};
pub use headers::{
    content_disposition, header_value, parse_content_disposition, parse_metadata,
};
pub use normalize::normalize_error_body;
pub use status::{TransferState, TransferStatus};
pub use throttle::ProgressThrottle;
