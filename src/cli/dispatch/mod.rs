use crate::cli::{
    actions::Action,
    commands::{hash, login},
};
use anyhow::{Result, bail};

/// # Errors
/// Returns an error if the subcommand is unknown or its arguments are inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    match matches.subcommand() {
        Some((login::CMD_LOGIN, sub_m)) => Ok(Action::Login(login::Options::parse(sub_m)?)),
        Some((hash::CMD_HASH, sub_m)) => Ok(Action::Hash(hash::Options::parse(sub_m)?)),
        Some((name, _)) => bail!("unknown subcommand: {name}"),
        None => bail!("a subcommand is required"),
    }
}
