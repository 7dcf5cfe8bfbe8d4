use std::process::ExitCode;

use clap::Parser;

mod cli;
mod config;
mod logging;
mod run;
mod tracker;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let app = cli::App::parse();
    logging::init_logging(app.verbose, app.log_format.into())?;
    run::run(app).await
}
