use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use ds_artifact::TransferOptions;
use ds_artifact::core::resolve_from_env;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix of environment variables merged over the config file, e.g.
/// `DS_ARTIFACT_ENDPOINT` or `DS_ARTIFACT_HEADERS__AUTHORIZATION`.
pub const ENV_PREFIX: &str = "DS_ARTIFACT_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file {0} does not exist")]
    Missing(PathBuf),
    #[error(transparent)]
    Figment(#[from] Box<figment::Error>),
}

/// Settings for the command-line client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Production endpoint.
    pub endpoint: Option<String>,

    /// Feature flags as the host would expose them. `ds-non-prod-endpoint`
    /// redirects every request.
    pub flags: HashMap<String, String>,

    /// Extra headers sent with every request.
    pub headers: BTreeMap<String, String>,

    pub progress_interval_ms: u64,

    /// Zero disables the stall timeout.
    pub stall_timeout_secs: u64,

    pub chunk_size: usize,
}

impl Default for CliConfig {
    fn default() -> Self {
        let options = TransferOptions::default();
        Self {
            endpoint:             None,
            flags:                HashMap::new(),
            headers:              BTreeMap::new(),
            progress_interval_ms: options.progress_interval.as_millis() as u64,
            stall_timeout_secs:   options.stall_timeout.map_or(0, |d| d.as_secs()),
            chunk_size:           options.chunk_size,
        }
    }
}

impl CliConfig {
    /// Defaults, then `file` (if given), then the environment.
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut fig = Figment::from(Serialized::defaults(CliConfig::default()));
        if let Some(path) = file {
            fig = fig.merge(Toml::file(path));
        }
        fig.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = file
            && !path.is_file()
        {
            return Err(ConfigError::Missing(path.to_path_buf()));
        }
        Self::figment(file).extract().map_err(|e| ConfigError::Figment(Box::new(e)))
    }

    pub fn transfer_options(&self) -> TransferOptions {
        let stall = (self.stall_timeout_secs > 0).then(|| Duration::from_secs(self.stall_timeout_secs));
        TransferOptions::default()
            .progress_interval(Duration::from_millis(self.progress_interval_ms))
            .stall_timeout(stall)
            .chunk_size(self.chunk_size)
            .headers(self.headers.clone().into_iter().collect())
    }

    /// The non-production override from the flags table or
    /// `NON_PROD_ENDPOINT`.
    pub fn endpoint_override(&self) -> Option<String> { resolve_from_env(&self.flags) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_library() {
        let config = CliConfig::default();
        assert_eq!(config.progress_interval_ms, 100);
        assert_eq!(config.stall_timeout_secs, 60);

        let options = config.transfer_options();
        assert_eq!(options.stall_timeout, Some(Duration::from_secs(60)));
        assert_eq!(options.chunk_size, 64 * 1024);
        assert!(options.headers.is_empty());
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ds-artifact.toml");
        std::fs::write(
            &path,
            r#"
endpoint = "https://datascience.example.com/20190101"
stall_timeout_secs = 0
chunk_size = 1024

[headers]
opc-request-id = "abc"

[flags]
ds-non-prod-endpoint = "https://nonprod.example.com"
"#,
        )
        .unwrap();

        let config: CliConfig = CliConfig::figment(Some(path.as_path())).extract().unwrap();
        assert_eq!(
            config.endpoint.as_deref(),
            Some("https://datascience.example.com/20190101")
        );
        assert_eq!(config.progress_interval_ms, 100);

        let options = config.transfer_options();
        assert_eq!(options.stall_timeout, None);
        assert_eq!(options.chunk_size, 1024);
        assert_eq!(
            options.headers.to_vec(),
            vec![("opc-request-id".to_string(), "abc".to_string())]
        );
        assert_eq!(
            config.endpoint_override().as_deref(),
            Some("https://nonprod.example.com")
        );
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            CliConfig::load(Some(missing.as_path())),
            Err(ConfigError::Missing(_))
        ));
    }
}
