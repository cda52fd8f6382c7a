use crate::{auth::hash, cli::commands::hash::Options};
use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use std::{
    io::{self, Write},
    process::ExitCode,
};

/// Print one hash line for the given password. No configuration is read.
/// # Errors
/// Returns an error if hashing fails or stdout cannot be written.
pub fn execute(options: &Options) -> Result<ExitCode> {
    let mut stdout = io::stdout().lock();

    write_hash(&mut stdout, &options.password, options.cost)?;

    Ok(ExitCode::SUCCESS)
}

/// # Errors
/// Returns an error if hashing fails or `out` cannot be written.
pub fn write_hash<W: Write>(out: &mut W, password: &SecretString, cost: u32) -> Result<()> {
    let hashed = hash::hash(password.expose_secret(), cost).context("failed to hash password")?;

    writeln!(out, "{hashed}").context("failed to write hash")?;

    Ok(())
}
