use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use ds_artifact::{ResourceType, TransferRequest};

use crate::logging::LogFormat;

#[derive(Clone, Debug, Parser)]
#[command(name = "ds-artifact", version = env!("CARGO_PKG_VERSION"), about, long_about = None, propagate_version = true)]
pub struct App {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(long, value_enum, default_value_t = LogFormatArg::Text, global = true)]
    pub log_format: LogFormatArg,

    /// TOML file merged over the built-in defaults.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Default endpoint; wins over the config file.
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    #[command(alias = "h", name = "head", about = "Show an artifact's file name and size")]
    Head(TargetArg),
    #[command(alias = "d", name = "download", about = "Download an artifact")]
    Download(DownloadArg),
    #[command(alias = "u", name = "upload", about = "Upload a file as an artifact")]
    Upload(UploadArg),
}

#[derive(Clone, Debug, Args)]
pub struct TargetArg {
    /// model or job
    #[arg(long = "type")]
    pub resource_type: ResourceType,

    /// OCID of the model or job.
    #[arg(long)]
    pub id: String,

    /// Pipeline step the artifact belongs to.
    #[arg(long)]
    pub step: Option<String>,
}

impl TargetArg {
    pub fn request(&self) -> TransferRequest {
        let request = TransferRequest::new(self.resource_type, self.id.clone());
        match &self.step {
            Some(step) => request.with_step(step.clone()),
            None => request,
        }
    }
}

#[derive(Clone, Debug, Args)]
pub struct DownloadArg {
    #[command(flatten)]
    pub target: TargetArg,

    /// File or directory to write to. A directory receives the file name the
    /// backend advertises.
    #[arg(short, long, default_value = ".")]
    pub output: PathBuf,
}

#[derive(Clone, Debug, Args)]
pub struct UploadArg {
    #[command(flatten)]
    pub target: TargetArg,

    #[arg(short, long)]
    pub file: PathBuf,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    Text,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => LogFormat::Text,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_download_with_step() {
        let app = App::parse_from([
            "ds-artifact",
            "-vv",
            "download",
            "--type",
            "job",
            "--id",
            "ocid1.job",
            "--step",
            "train",
            "-o",
            "/tmp/out",
        ]);
        assert_eq!(app.verbose, 2);
        let Commands::Download(arg) = app.cmd else {
            panic!("expected download");
        };
        assert_eq!(
            arg.target.request(),
            TransferRequest::new(ResourceType::Job, "ocid1.job").with_step("train")
        );
        assert_eq!(arg.output, PathBuf::from("/tmp/out"));
    }

    #[test]
    fn rejects_unknown_resource_type() {
        let parsed = App::try_parse_from(["ds-artifact", "head", "--type", "notebook", "--id", "x"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn upload_requires_file() {
        let parsed = App::try_parse_from(["ds-artifact", "upload", "--type", "model", "--id", "x"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn clap_definition() {
        use clap::CommandFactory;
        App::command().debug_assert();
    }
}
