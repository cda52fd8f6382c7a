use anyhow::Result;
use seccheck::cli;
use std::process::ExitCode;

// Main function
#[tokio::main]
async fn main() -> Result<ExitCode> {
    let action = cli::start()?;

    action.execute().await
}
