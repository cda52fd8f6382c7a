use crate::auth::{decision::DEFAULT_LOOKUP_TIMEOUT, hash};
use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use std::{path::PathBuf, time::Duration};

pub const CMD_LOGIN: &str = "login";
pub const ARG_ENV_FILE: &str = "env-file";
pub const ARG_STORE_TIMEOUT_SECONDS: &str = "store-timeout-seconds";
pub const ARG_BCRYPT_COST: &str = "bcrypt-cost";

#[derive(Debug)]
pub struct Options {
    pub env_file: PathBuf,
    pub store_timeout: Duration,
    pub bcrypt_cost: u32,
}

impl Options {
    /// Read validated `login` arguments.
    ///
    /// # Errors
    /// Returns an error if an argument with a default is unexpectedly absent.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let env_file = matches
            .get_one::<PathBuf>(ARG_ENV_FILE)
            .cloned()
            .context("missing required argument: --env-file")?;
        let store_timeout = matches
            .get_one::<u64>(ARG_STORE_TIMEOUT_SECONDS)
            .copied()
            .map_or(DEFAULT_LOOKUP_TIMEOUT, Duration::from_secs);
        let bcrypt_cost = matches
            .get_one::<u32>(ARG_BCRYPT_COST)
            .copied()
            .unwrap_or(hash::DEFAULT_COST);

        Ok(Self {
            env_file,
            store_timeout,
            bcrypt_cost,
        })
    }
}

#[must_use]
pub fn command() -> Command {
    Command::new(CMD_LOGIN)
        .about("Verify a username and password against the credential store")
        .long_about(
            "Prompt for a username and password and verify them against the users table. \
             DB_URL, DB_USER and DB_PASSWORD are read from the override file, falling back to the environment.",
        )
        .arg(
            Arg::new(ARG_ENV_FILE)
                .long(ARG_ENV_FILE)
                .help("Override file with DB_URL, DB_USER and DB_PASSWORD (KEY=value lines)")
                .env("SECCHECK_ENV_FILE")
                .default_value(".env")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new(ARG_STORE_TIMEOUT_SECONDS)
                .long(ARG_STORE_TIMEOUT_SECONDS)
                .help("Give up on the credential store after this many seconds")
                .env("SECCHECK_STORE_TIMEOUT_SECONDS")
                .default_value("5")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_BCRYPT_COST)
                .long(ARG_BCRYPT_COST)
                .help("bcrypt cost of the stored hashes, used for the unknown-user placeholder")
                .env("SECCHECK_BCRYPT_COST")
                .default_value("10")
                .value_parser(clap::value_parser!(u32).range(4..=31)),
        )
}
