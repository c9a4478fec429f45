use clap::Parser;
use lijo::cli::{self, Cli};
use lijo::logging::init_logging;
use std::process::ExitCode;
use tracing::debug;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Cli::parse();

    if let Err(err) = init_logging(args.verbose, args.quiet, args.log_file.as_deref()) {
        eprintln!("warning: failed to initialize logging: {err}");
    }

    match cli::run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            debug!(error = ?err, "Command failed");
            eprintln!("error: {err}");
            ExitCode::from(u8::try_from(err.exit_code()).unwrap_or(1))
        }
    }
}
