use crate::auth::hash;
use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const CMD_HASH: &str = "hash";
pub const ARG_PASSWORD: &str = "password";
pub const ARG_COST: &str = "cost";

#[derive(Debug)]
pub struct Options {
    pub password: SecretString,
    pub cost: u32,
}

impl Options {
    /// Read validated `hash` arguments.
    ///
    /// # Errors
    /// Returns an error if the password argument is absent.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let password = matches
            .get_one::<String>(ARG_PASSWORD)
            .map(|password| SecretString::from(password.as_str()))
            .context("missing required argument: <password>")?;
        let cost = matches
            .get_one::<u32>(ARG_COST)
            .copied()
            .unwrap_or(hash::DEFAULT_COST);

        Ok(Self { password, cost })
    }
}

#[must_use]
pub fn command() -> Command {
    Command::new(CMD_HASH)
        .about("Print a bcrypt hash for a password (offline, no database needed)")
        .long_about(
            "Print a bcrypt hash for a password. Insert the printed value into the \
             users.password_hash column. Runs offline; no database configuration is read.",
        )
        .arg(
            Arg::new(ARG_PASSWORD)
                .help("Plain-text password to hash")
                .required(true),
        )
        .arg(
            Arg::new(ARG_COST)
                .short('c')
                .long(ARG_COST)
                .help("bcrypt cost factor (2^cost rounds)")
                .env("SECCHECK_BCRYPT_COST")
                .default_value("10")
                .value_parser(clap::value_parser!(u32).range(4..=31)),
        )
}
