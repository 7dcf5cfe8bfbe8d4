use std::future::Future;
use std::process::ExitCode;

use anyhow::Context;
use ds_artifact::{
    ArtifactClient, DownloadLocation, DownloadTarget, HttpClient, ReqwestClient, TransferHandle,
    TransferOutcome, TransferState, TransferStatus, UploadFile,
};
use tokio_util::sync::CancellationToken;

use crate::cli::{App, Commands, DownloadArg, TargetArg, UploadArg};
use crate::config::CliConfig;
use crate::tracker::{ProgressTracker, ProgressTrackerBuilder};

/// Exit status for a transfer interrupted with Ctrl-C.
const INTERRUPTED: u8 = 130;

pub async fn run(app: App) -> anyhow::Result<ExitCode> {
    let config = CliConfig::load(app.config.as_deref()).context("loading configuration")?;
    let client = connect(&config, app.endpoint)?;

    match app.cmd {
        Commands::Head(arg) => head(&client, &arg).await,
        Commands::Download(arg) => download(&client, arg).await,
        Commands::Upload(arg) => upload(&client, arg).await,
    }
}

fn connect(config: &CliConfig, endpoint: Option<String>) -> anyhow::Result<ArtifactClient<ReqwestClient>> {
    let transport = ReqwestClient::new().context("building HTTP client")?;
    let mut builder = ArtifactClient::builder(transport)
        .endpoint_override(config.endpoint_override())
        .options(config.transfer_options());
    if let Some(endpoint) = endpoint.or_else(|| config.endpoint.clone()) {
        builder = builder.default_endpoint(endpoint);
    }
    let client = builder
        .build()
        .context("set `endpoint` in the config file, DS_ARTIFACT_ENDPOINT or --endpoint")?;
    tracing::info!(endpoint = %client.endpoint(), "using endpoint");
    Ok(client)
}

/// Cancel the transfer behind `token` once `signal` fires.
fn cancel_on<S>(signal: S, token: CancellationToken)
where
    S: Future<Output = std::io::Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        if signal.await.is_ok() {
            tracing::debug!("interrupt received");
            token.cancel();
        }
    });
}

/// Installed once the transfer exists. Until then SIGINT keeps its default
/// action, so no interrupt is lost.
fn abort_on_ctrl_c(token: CancellationToken) { cancel_on(tokio::signal::ctrl_c(), token); }

fn not_found(arg: &TargetArg) -> ExitCode {
    eprintln!("warning: no artifact for {} {}", arg.resource_type, arg.id);
    ExitCode::FAILURE
}

async fn head<C: HttpClient>(client: &ArtifactClient<C>, arg: &TargetArg) -> anyhow::Result<ExitCode> {
    match client.head_artifact(&arg.request()).await {
        Ok(metadata) => {
            println!("name:          {}", metadata.file_name);
            match metadata.size {
                Some(size) => println!("size:          {size}"),
                None => println!("size:          unknown"),
            }
            if let Some(content_type) = &metadata.content_type {
                println!("content-type:  {content_type}");
            }
            if let Some(etag) = &metadata.etag {
                println!("etag:          {etag}");
            }
            if let Some(modified) = &metadata.last_modified {
                println!("last-modified: {modified}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(err) if err.is_not_found() => Ok(not_found(arg)),
        Err(err) => Err(err).context("probing artifact"),
    }
}

async fn download<C: HttpClient + 'static>(
    client: &ArtifactClient<C>,
    arg: DownloadArg,
) -> anyhow::Result<ExitCode> {
    let request = arg.target.request();
    // HEAD first so a missing artifact writes nothing.
    let metadata = match client.head_artifact(&request).await {
        Ok(metadata) => metadata,
        Err(err) if err.is_not_found() => return Ok(not_found(&arg.target)),
        Err(err) => return Err(err).context("probing artifact"),
    };
    tracing::debug!(file = %metadata.file_name, size = ?metadata.size, "artifact found");

    let handle = client.download(request, DownloadTarget::File(arg.output))?;
    abort_on_ctrl_c(handle.cancellation_token());
    let mut builder = ProgressTrackerBuilder::default()
        .with_prefix("Downloading")
        .with_finish("done");
    if let Some(size) = metadata.size {
        builder = builder.with_len(size);
    }

    let mut status = TransferStatus::new();
    let result = drive(handle, &mut status, builder.build()).await;
    if let Ok(downloaded) = &result
        && let DownloadLocation::File(path) = &downloaded.location
    {
        println!("{}", path.display());
    }
    Ok(report(&status))
}

async fn upload<C: HttpClient + 'static>(
    client: &ArtifactClient<C>,
    arg: UploadArg,
) -> anyhow::Result<ExitCode> {
    let file = UploadFile::open(&arg.file)
        .await
        .with_context(|| format!("opening {}", arg.file.display()))?;
    let tracker = ProgressTrackerBuilder::default()
        .with_len(file.size())
        .with_prefix("Uploading")
        .with_finish("done")
        .build();

    let handle = client.upload(arg.target.request(), file)?;
    abort_on_ctrl_c(handle.cancellation_token());

    let mut status = TransferStatus::new();
    let result = drive(handle, &mut status, tracker).await;
    if let Ok(uploaded) = &result {
        tracing::info!(file = %uploaded.file_name, bytes = uploaded.bytes, "artifact uploaded");
    }
    Ok(report(&status))
}

/// Render a transfer until it settles, folding everything into `status`.
async fn drive<T>(
    mut handle: TransferHandle<T>,
    status: &mut TransferStatus,
    mut tracker: ProgressTracker,
) -> ds_artifact::Result<T> {
    while let Some(progress) = handle.next_progress().await {
        if status.on_progress(&progress) {
            tracker.update(&progress);
        }
    }

    let result = handle.join().await;
    status.on_outcome(&TransferOutcome::from_result(&result));
    match status.state() {
        TransferState::Completed => tracker.finish(),
        TransferState::Cancelled => tracker.clear(),
        _ => tracker.abandon("failed"),
    }
    result
}

fn report(status: &TransferStatus) -> ExitCode {
    match status.state() {
        TransferState::Completed => ExitCode::SUCCESS,
        TransferState::Cancelled => ExitCode::from(INTERRUPTED),
        _ => {
            let message = status.message().unwrap_or("transfer failed");
            if status.has_warning() {
                eprintln!("warning: {message}");
            } else {
                eprintln!("error: {message}");
            }
            if let Some(hint) = retry_hint(status) {
                eprintln!("{hint}");
            }
            ExitCode::FAILURE
        }
    }
}

/// Failed transfers can be started again as-is; a missing artifact will
/// stay missing.
fn retry_hint(status: &TransferStatus) -> Option<&'static str> {
    (status.can_retry() && status.has_error()).then_some("hint: run the same command again to retry")
}
