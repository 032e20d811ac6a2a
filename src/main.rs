//! ghchain command-line entry point

mod cli;

use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match cli::run().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            anstream::eprintln!("{} {e}", cli::style::error_prefix());
            ExitCode::FAILURE
        }
    }
}
