pub mod hash;
pub mod login;

// Internal "interpreter" for `Action`; the match lives in `run`.
mod run;

use crate::cli::commands;
use std::process::ExitCode;

#[derive(Debug)]
pub enum Action {
    Login(commands::login::Options),
    Hash(commands::hash::Options),
}

impl Action {
    /// Execute the action.
    /// # Errors
    /// Returns an error if the action fails before an outcome can be reported.
    pub async fn execute(self) -> anyhow::Result<ExitCode> {
        run::execute(self).await
    }
}
