use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use bytes::Bytes;

use crate::error::{Error, Result};

/// Kind of resource an artifact belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Model,
    Job,
}

impl ResourceType {
    /// Path segment used in the artifact URL.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Model => "model",
            ResourceType::Job => "job",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for ResourceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "model" | "models" => Ok(ResourceType::Model),
            "job" | "jobs" => Ok(ResourceType::Job),
            other => Err(Error::InvalidRequest(format!("unknown resource type `{other}`"))),
        }
    }
}

/// Identifies a single artifact transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub resource_id:   String,
    pub resource_type: ResourceType,
    pub step_name:     Option<String>,
}

impl TransferRequest {
    pub fn new(resource_type: ResourceType, resource_id: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            resource_type,
            step_name: None,
        }
    }

    #[must_use]
    pub fn with_step(mut self, step_name: impl Into<String>) -> Self {
        self.step_name = Some(step_name.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.resource_id.trim().is_empty() {
            return Err(Error::InvalidRequest("resource id is empty".into()));
        }
        if matches!(&self.step_name, Some(step) if step.trim().is_empty()) {
            return Err(Error::InvalidRequest("step name is empty".into()));
        }
        Ok(())
    }
}

/// Metadata advertised by the backend for an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ArtifactMetadata {
    pub file_name:     String,
    pub size:          Option<u64>,
    pub content_type:  Option<String>,
    pub etag:          Option<String>,
    pub last_modified: Option<String>,
}

/// Where a downloaded artifact body ends up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadTarget {
    /// Write to this path. A directory receives the advertised file name.
    File(PathBuf),
    /// Keep the body in memory and hand it back to the caller.
    Memory,
}

#[derive(Debug, Clone)]
pub(crate) enum UploadSource {
    Path(PathBuf),
    Memory(Bytes),
}

/// A file to upload, with its size fixed when it is opened.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub(crate) name:   String,
    pub(crate) size:   u64,
    pub(crate) source: UploadSource,
}

impl UploadFile {
    /// Describe a file on disk; the size is read from its metadata.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        if metadata.is_dir() {
            return Err(Error::InvalidRequest(format!(
                "{} is a directory",
                path.display()
            )));
        }
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("artifact")
            .to_string();
        Ok(Self {
            name,
            size: metadata.len(),
            source: UploadSource::Path(path.to_path_buf()),
        })
    }

    /// Upload an in-memory buffer under the given file name.
    pub fn from_bytes(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            name:   name.into(),
            size:   data.len() as u64,
            source: UploadSource::Memory(data),
        }
    }

    pub fn name(&self) -> &str { &self.name }

    pub fn size(&self) -> u64 { self.size }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_type_parse() {
        assert_eq!("model".parse::<ResourceType>().unwrap(), ResourceType::Model);
        assert_eq!("Jobs".parse::<ResourceType>().unwrap(), ResourceType::Job);
        assert!("deployment".parse::<ResourceType>().is_err());
    }

    #[test]
    fn request_validation() {
        assert!(TransferRequest::new(ResourceType::Model, "ocid1.model").validate().is_ok());
        assert!(TransferRequest::new(ResourceType::Model, "  ").validate().is_err());
        assert!(
            TransferRequest::new(ResourceType::Job, "ocid1.job")
                .with_step("")
                .validate()
                .is_err()
        );
    }

    #[tokio::test]
    async fn upload_file_open_reads_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.zip");
        std::fs::write(&path, vec![7u8; 42]).unwrap();

        let file = UploadFile::open(&path).await.unwrap();
        assert_eq!(file.name(), "model.zip");
        assert_eq!(file.size(), 42);
    }

    #[tokio::test]
    async fn upload_file_rejects_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            UploadFile::open(dir.path()).await,
            Err(Error::InvalidRequest(_))
        ));
    }
}
