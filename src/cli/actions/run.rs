use crate::cli::actions::{Action, hash, login};
use anyhow::Result;
use std::process::ExitCode;

/// Execute the provided action.
// Single dispatch point for all CLI actions.
/// # Errors
/// Returns an error if the action fails.
pub async fn execute(action: Action) -> Result<ExitCode> {
    match action {
        Action::Login(options) => login::execute(options).await,
        Action::Hash(options) => hash::execute(&options),
    }
}
