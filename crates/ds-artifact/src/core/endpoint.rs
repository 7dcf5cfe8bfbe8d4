use std::collections::HashMap;
use std::fmt;

use url::Url;

use crate::data::TransferRequest;
use crate::error::{Error, Result};

/// Feature flag carrying a non-production endpoint.
pub const NON_PROD_ENDPOINT_FLAG: &str = "ds-non-prod-endpoint";

/// Environment variable carrying a non-production endpoint.
pub const NON_PROD_ENDPOINT_ENV: &str = "NON_PROD_ENDPOINT";

/// Lookup of host-provided feature flag values.
pub trait FeatureFlags {
    fn flag(&self, name: &str) -> Option<String>;
}

impl FeatureFlags for HashMap<String, String> {
    fn flag(&self, name: &str) -> Option<String> { self.get(name).cloned() }
}

impl<F: FeatureFlags + ?Sized> FeatureFlags for &F {
    fn flag(&self, name: &str) -> Option<String> { (**self).flag(name) }
}

/// Pick the endpoint override, if any.
///
/// The feature flag wins over the environment; blank values count as
/// absent. `None` means the client's default endpoint applies.
///
/// # Examples
///
/// ```
/// use ds_artifact::core::resolve_endpoint;
///
/// assert_eq!(
///     resolve_endpoint(Some("https://nonprod.example.com"), Some("https://env.example.com")),
///     Some("https://nonprod.example.com".to_string())
/// );
/// assert_eq!(resolve_endpoint(None, None), None);
/// ```
pub fn resolve_endpoint(feature_flag: Option<&str>, env_override: Option<&str>) -> Option<String> {
    [feature_flag, env_override]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

/// Resolve the override from a flag lookup and the process environment.
pub fn resolve_from_env(flags: &impl FeatureFlags) -> Option<String> {
    let flag = flags.flag(NON_PROD_ENDPOINT_FLAG);
    let env = std::env::var(NON_PROD_ENDPOINT_ENV).ok();
    resolve_endpoint(flag.as_deref(), env.as_deref())
}

/// A validated base URL that artifact paths are appended to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint(Url);

impl Endpoint {
    pub fn parse(s: &str) -> Result<Self> {
        let url = Url::parse(s.trim()).map_err(|e| Error::InvalidEndpoint(format!("{s}: {e}")))?;
        if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
            return Err(Error::InvalidEndpoint(format!("{s}: not an http(s) base URL")));
        }
        Ok(Self(url))
    }

    pub fn as_url(&self) -> &Url { &self.0 }

    /// `{endpoint}/artifacts/{resource_type}/{id}[/steps/{step}]`.
    ///
    /// Each segment is percent-encoded, so ids containing `/` or `?` stay
    /// inside their segment.
    pub fn artifact_url(&self, request: &TransferRequest) -> Result<Url> {
        let mut url = self.0.clone();
        url.set_query(None);
        url.set_fragment(None);
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| Error::InvalidEndpoint(self.0.to_string()))?;
            segments
                .pop_if_empty()
                .push("artifacts")
                .push(request.resource_type.as_str())
                .push(&request.resource_id);
            if let Some(step) = &request.step_name {
                segments.push("steps").push(step);
            }
        }
        Ok(url)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.0.fmt(f) }
}
